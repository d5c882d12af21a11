//! In-memory artifact set for one stack version
//!
//! Everything the materializer writes is rendered here first, so a
//! rendering failure never touches the filesystem.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;

use stackgen_utils::canonicalization::{blake3_hex, emit_jcs};
use stackgen_utils::error::StackError;

use crate::catalog::ServiceKind;
use crate::manifest::OrchestrationManifest;
use crate::scripts::ScriptSet;
use crate::templates;
use crate::version::StackVersion;

pub const COMPOSE_FILE: &str = "docker-compose.yml";
pub const METADATA_FILE: &str = "stack.json";
pub const README_FILE: &str = "README.md";
pub const MODELS_FILE: &str = "config/ollama_models.txt";

/// Schema version of `stack.json`
pub const METADATA_SCHEMA_VERSION: &str = "1";

/// One file of a stack, path relative to the version directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: Utf8PathBuf,
    pub contents: Vec<u8>,
    pub executable: bool,
}

impl Artifact {
    pub fn text(path: impl Into<Utf8PathBuf>, contents: String) -> Self {
        Self {
            path: path.into(),
            contents: contents.into_bytes(),
            executable: false,
        }
    }

    pub fn script(path: impl Into<Utf8PathBuf>, contents: String) -> Self {
        Self {
            executable: true,
            ..Self::text(path, contents)
        }
    }
}

/// Ordered set of artifacts with unique relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    artifacts: Vec<Artifact>,
}

impl ArtifactSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `artifact`, replacing an earlier one at the same path
    pub fn push(&mut self, artifact: Artifact) {
        if let Some(existing) = self.artifacts.iter_mut().find(|a| a.path == artifact.path) {
            *existing = artifact;
        } else {
            self.artifacts.push(artifact);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.path == path)
    }

    #[must_use]
    pub fn paths(&self) -> Vec<&Utf8Path> {
        self.artifacts.iter().map(|a| a.path.as_path()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.artifacts.iter().map(|a| a.contents.len() as u64).sum()
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.iter()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratorInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub kind: ServiceKind,
    pub required: bool,
    pub image: String,
    pub host_port: Option<u16>,
    pub container_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactDigest {
    pub path: String,
    pub blake3: String,
    pub bytes: u64,
    pub executable: bool,
}

/// Contents of `stack.json`
///
/// Digests cover every artifact except `stack.json` itself and the
/// optional archive.
#[derive(Debug, Clone, Serialize)]
pub struct StackMetadata {
    pub schema_version: String,
    pub stack: String,
    pub version: u32,
    pub generator: GeneratorInfo,
    /// RFC3339 UTC timestamp of the generation run
    pub generated_at: DateTime<Utc>,
    pub port_stride: u16,
    pub optional_enabled: Vec<String>,
    pub services: Vec<ServiceSummary>,
    /// Sorted by path
    pub artifacts: Vec<ArtifactDigest>,
}

impl StackMetadata {
    fn new(
        version: &StackVersion,
        manifest: &OrchestrationManifest,
        artifacts: &ArtifactSet,
        port_stride: u16,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let services = manifest
            .services()
            .iter()
            .map(|s| ServiceSummary {
                name: s.name.clone(),
                kind: s.kind,
                required: s.required,
                image: s.image.clone(),
                host_port: s.host_port(),
                container_port: s.ports.first().map(|p| p.container),
            })
            .collect();

        let mut digests: Vec<ArtifactDigest> = artifacts
            .iter()
            .map(|a| ArtifactDigest {
                path: a.path.to_string(),
                blake3: blake3_hex(&a.contents),
                bytes: a.contents.len() as u64,
                executable: a.executable,
            })
            .collect();
        digests.sort_by(|a, b| a.path.cmp(&b.path));

        Self {
            schema_version: METADATA_SCHEMA_VERSION.to_string(),
            stack: version.name(),
            version: version.number,
            generator: GeneratorInfo {
                name: "stackgen".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            generated_at,
            port_stride,
            optional_enabled: manifest
                .services()
                .iter()
                .filter(|s| !s.required)
                .map(|s| s.name.clone())
                .collect(),
            services,
            artifacts: digests,
        }
    }
}

/// Inputs beyond the manifest and scripts
#[derive(Debug, Clone)]
pub struct ArtifactOptions<'a> {
    pub ollama_models: &'a [String],
    pub port_stride: u16,
    pub generated_at: DateTime<Utc>,
}

fn render_failure(path: &str, err: impl std::fmt::Display) -> StackError {
    StackError::materialization(path, io::Error::other(err.to_string()))
}

/// Render every file of the stack, `stack.json` last
pub fn build_artifacts(
    version: &StackVersion,
    manifest: &OrchestrationManifest,
    scripts: &ScriptSet,
    options: &ArtifactOptions<'_>,
) -> Result<ArtifactSet, StackError> {
    let stack_name = manifest.project.as_str();
    let mut set = ArtifactSet::new();

    let compose = manifest
        .to_yaml()
        .map_err(|e| render_failure(COMPOSE_FILE, e))?;
    set.push(Artifact::text(COMPOSE_FILE, compose));

    set.push(Artifact::script(
        scripts.driver.relative_path(),
        scripts.driver.body.clone(),
    ));
    set.push(Artifact::script(
        "scripts/common.sh",
        templates::common_sh(stack_name),
    ));
    for installer in &scripts.installers {
        set.push(Artifact::script(
            installer.relative_path(),
            installer.body.clone(),
        ));
    }

    set.push(Artifact::script(
        "scripts/health_check.sh",
        templates::health_check_sh(stack_name, &manifest.service_names()),
    ));
    set.push(Artifact::script(
        "scripts/clean_stack.sh",
        templates::clean_stack_sh(stack_name),
    ));

    if let Some(llm) = manifest
        .services()
        .iter()
        .find(|s| s.kind == ServiceKind::LlmInference)
    {
        set.push(Artifact::script(
            "scripts/download_ollama_models.sh",
            templates::download_models_sh(stack_name, &llm.name, options.ollama_models),
        ));
        set.push(Artifact::text(
            MODELS_FILE,
            templates::models_list(options.ollama_models),
        ));
    }

    set.push(Artifact::text(
        README_FILE,
        templates::readme_md(manifest, &scripts.installer_names()),
    ));

    let metadata = StackMetadata::new(
        version,
        manifest,
        &set,
        options.port_stride,
        options.generated_at,
    );
    let json = emit_jcs(&metadata).map_err(|e| render_failure(METADATA_FILE, e))?;
    set.push(Artifact::text(METADATA_FILE, json));

    Ok(set)
}
