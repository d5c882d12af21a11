//! Generation pipeline
//!
//! One run moves through `Resolving → Synthesizing → Composing →
//! Materializing → Done`. Any failure moves it to `Failed` and nothing after
//! that stage runs. Nothing is written before `Materializing`.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, warn};

use stackgen_config::{Config, DEFAULT_OLLAMA_MODELS, DEFAULT_PORT_STRIDE};
use stackgen_utils::error::StackError;
use stackgen_utils::logging::{StageTimer, generation_span, log_stack_committed};

use crate::archive::{archive_file_name, build_archive};
use crate::artifacts::{Artifact, ArtifactOptions, build_artifacts};
use crate::catalog::{ServiceCatalog, port_alias};
use crate::manifest::synthesize;
use crate::materialize::{FsWriter, Materializer, StagingWriter};
use crate::scripts::compose_scripts;
use crate::version::{absolutize_base, resolve_next};

/// Where a generation run currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Resolving,
    Synthesizing,
    Composing,
    Materializing,
    Done,
    Failed(String),
}

impl Stage {
    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Synthesizing => "synthesizing",
            Self::Composing => "composing",
            Self::Materializing => "materializing",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Inputs of one generation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Absolute base directory
    pub base_dir: Utf8PathBuf,
    /// Optional services to enable
    pub enabled: Vec<String>,
    pub port_stride: u16,
    pub archive: bool,
    pub ollama_models: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl GenerationRequest {
    /// Defaults for everything except the base directory
    #[must_use]
    pub fn new(base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            enabled: Vec::new(),
            port_stride: DEFAULT_PORT_STRIDE,
            archive: false,
            ollama_models: DEFAULT_OLLAMA_MODELS.iter().map(|m| (*m).to_string()).collect(),
            generated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_enabled<I, S>(mut self, enabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enabled = enabled.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    #[must_use]
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Build from effective configuration, resolving a relative base
    /// directory against `cwd`
    pub fn from_config(config: &Config, cwd: &Utf8Path) -> Result<Self, StackError> {
        let base_dir = absolutize_base(Utf8Path::new(config.base_dir()), cwd)?;
        Ok(Self {
            base_dir,
            enabled: config.enabled_optional().to_vec(),
            port_stride: config.port_stride(),
            archive: config.archive(),
            ollama_models: config.ollama_models(),
            generated_at: Utc::now(),
        })
    }
}

/// Result of a committed run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutcome {
    pub version: u32,
    pub stack: String,
    pub path: Utf8PathBuf,
    /// Manifest order
    pub services: Vec<String>,
    pub optional_enabled: Vec<String>,
    pub files: usize,
    pub archive: Option<Utf8PathBuf>,
}

/// Runs the pipeline against a service catalog
#[derive(Debug)]
pub struct Generator<W = FsWriter> {
    catalog: ServiceCatalog,
    materializer: Materializer<W>,
    stage: Stage,
}

impl Generator<FsWriter> {
    #[must_use]
    pub fn new(catalog: ServiceCatalog) -> Self {
        Self::with_materializer(catalog, Materializer::new())
    }

    /// Built-in catalog with `[services.*]` and `[tts]` overrides applied
    pub fn from_config(config: &Config) -> Result<Self, StackError> {
        Ok(Self::new(ServiceCatalog::builtin().with_overrides(config)?))
    }
}

impl<W: StagingWriter> Generator<W> {
    pub fn with_materializer(catalog: ServiceCatalog, materializer: Materializer<W>) -> Self {
        Self {
            catalog,
            materializer,
            stage: Stage::Idle,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// Stage reached by the most recent run
    #[must_use]
    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Generate the next stack version under `request.base_dir`
    pub fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationOutcome, StackError> {
        let span = generation_span(request.base_dir.as_str());
        let _guard = span.enter();

        self.stage = Stage::Idle;
        match self.run(request) {
            Ok(outcome) => {
                enter(&mut self.stage, Stage::Done);
                Ok(outcome)
            }
            Err(err) => {
                error!(stage = %self.stage.label(), error = %err, "Generation failed");
                enter(&mut self.stage, Stage::Failed(err.to_string()));
                Err(err)
            }
        }
    }

    fn run(&mut self, request: &GenerationRequest) -> Result<GenerationOutcome, StackError> {
        let Self {
            catalog,
            materializer,
            stage,
        } = self;

        enter(stage, Stage::Resolving);
        let timer = StageTimer::start("resolving");
        let version = resolve_next(&request.base_dir)?;
        let selected = catalog.select(&request.enabled)?;
        timer.finish();

        enter(stage, Stage::Synthesizing);
        let timer = StageTimer::start("synthesizing");
        let manifest = synthesize(&version, &selected, request.port_stride)?;
        if let Some(alias) = port_alias(&selected, request.port_stride)
            && version.index() >= alias.gap
        {
            warn!(
                version = version.number,
                lower = %alias.lower,
                higher = %alias.higher,
                earlier = version.number - alias.gap,
                "Host port of {} matches {} in stack-v{}; do not run both",
                alias.lower,
                alias.higher,
                version.number - alias.gap
            );
        }
        timer.finish();

        enter(stage, Stage::Composing);
        let timer = StageTimer::start("composing");
        let scripts = compose_scripts(&manifest)?;
        let mut artifacts = build_artifacts(
            &version,
            &manifest,
            &scripts,
            &ArtifactOptions {
                ollama_models: &request.ollama_models,
                port_stride: request.port_stride,
                generated_at: request.generated_at,
            },
        )?;
        let archive = if request.archive {
            let name = archive_file_name(&version.name());
            let mtime = u64::try_from(request.generated_at.timestamp()).unwrap_or(0);
            let bytes = build_archive(&version.name(), &artifacts, mtime)
                .map_err(|e| StackError::materialization(version.path.join(&name), e))?;
            artifacts.push(Artifact {
                path: Utf8PathBuf::from(&name),
                contents: bytes,
                executable: false,
            });
            Some(version.path.join(name))
        } else {
            None
        };
        timer.finish();

        enter(stage, Stage::Materializing);
        let timer = StageTimer::start("materializing");
        let path = materializer.materialize(&version, &artifacts)?;
        timer.finish();

        log_stack_committed(version.number, path.as_str(), manifest.services().len());
        Ok(GenerationOutcome {
            version: version.number,
            stack: version.name(),
            path,
            services: manifest
                .service_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            optional_enabled: manifest
                .services()
                .iter()
                .filter(|s| !s.required)
                .map(|s| s.name.clone())
                .collect(),
            files: artifacts.len(),
            archive,
        })
    }
}

fn enter(stage: &mut Stage, next: Stage) {
    debug!(from = %stage.label(), to = %next.label(), "Stage transition");
    *stage = next;
}

/// Generate with the built-in catalog and filesystem writer
pub fn generate(request: &GenerationRequest) -> Result<GenerationOutcome, StackError> {
    Generator::new(ServiceCatalog::builtin()).generate(request)
}
