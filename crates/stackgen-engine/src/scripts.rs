//! Installer Script Composer
//!
//! One installer per manifest service, rendered by a closed set of typed
//! templates, plus the `install.sh` driver that runs them in manifest order.

use camino::Utf8PathBuf;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use stackgen_utils::error::StackError;

use crate::catalog::ServiceKind;
use crate::manifest::{OrchestrationManifest, ResolvedService};
use crate::params;
use crate::templates::{self, ScriptHeader};

/// Spacing between installer ranks
pub const RANK_STEP: u16 = 10;

/// Built-in installer templates, one per service variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum ScriptTemplate {
    LlmInference,
    Frontend,
    ImageGen,
    TtsEngine,
    TtsAdapter,
}

impl From<ServiceKind> for ScriptTemplate {
    fn from(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::LlmInference => Self::LlmInference,
            ServiceKind::Frontend => Self::Frontend,
            ServiceKind::ImageGen => Self::ImageGen,
            ServiceKind::TtsEngine => Self::TtsEngine,
            ServiceKind::TtsAdapter => Self::TtsAdapter,
        }
    }
}

fn param(service: &ResolvedService, key: &str) -> Result<String, StackError> {
    params::require(&service.name, &service.params, key).map(str::to_string)
}

fn endpoint(service: &ResolvedService) -> Result<String, StackError> {
    service.endpoint().ok_or_else(|| StackError::MissingParameter {
        service: service.name.clone(),
        parameter: "host_port".to_string(),
    })
}

impl ScriptTemplate {
    /// Look up a template by name, failing with `TemplateMissing`
    pub fn lookup(service: &str, name: &str) -> Result<Self, StackError> {
        Self::from_str(name).map_err(|_| StackError::TemplateMissing {
            service: service.to_string(),
            template: name.to_string(),
        })
    }

    /// Render the installer body for `service`
    ///
    /// Builds the template's parameter record first; an absent or empty
    /// parameter fails with `MissingParameter` before any text is produced.
    pub fn render(
        self,
        header: &ScriptHeader,
        service: &ResolvedService,
    ) -> Result<String, StackError> {
        let body = match self {
            Self::LlmInference => templates::llm_inference(
                header,
                &templates::LlmInferenceParams {
                    data_dir: param(service, "data_dir")?,
                    endpoint: endpoint(service)?,
                },
            ),
            Self::Frontend => templates::frontend(
                header,
                &templates::FrontendParams {
                    data_dir: param(service, "data_dir")?,
                    endpoint: endpoint(service)?,
                },
            ),
            Self::ImageGen => templates::image_gen(
                header,
                &templates::ImageGenParams {
                    models_dir: param(service, "models_dir")?,
                    workflows_dir: param(service, "workflows_dir")?,
                    output_dir: param(service, "output_dir")?,
                    endpoint: endpoint(service)?,
                },
            ),
            Self::TtsEngine => templates::tts_engine(
                header,
                &templates::TtsEngineParams {
                    data_dir: param(service, "data_dir")?,
                    voice: param(service, "voice")?,
                    endpoint: endpoint(service)?,
                },
            ),
            Self::TtsAdapter => templates::tts_adapter(
                header,
                &templates::TtsAdapterParams {
                    data_dir: param(service, "data_dir")?,
                    endpoint: endpoint(service)?,
                },
            ),
        };
        Ok(body)
    }
}

/// A named, ranked shell script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerScript {
    /// File name under `scripts/` (or the stack root for the driver)
    pub name: String,
    /// Service this script provisions; `None` for the driver
    pub service: Option<String>,
    pub rank: u16,
    pub body: String,
}

impl InstallerScript {
    /// Path relative to the stack directory
    #[must_use]
    pub fn relative_path(&self) -> Utf8PathBuf {
        if self.service.is_some() {
            Utf8PathBuf::from("scripts").join(&self.name)
        } else {
            Utf8PathBuf::from(&self.name)
        }
    }
}

/// Installers in manifest order plus the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSet {
    pub installers: Vec<InstallerScript>,
    pub driver: InstallerScript,
}

impl ScriptSet {
    #[must_use]
    pub fn installer_names(&self) -> Vec<String> {
        self.installers.iter().map(|s| s.name.clone()).collect()
    }
}

/// `<rank>_install_<service>.sh`, rank zero-padded to two digits
#[must_use]
pub fn installer_file_name(rank: u16, service: &str) -> String {
    format!("{rank:02}_install_{service}.sh")
}

/// Compose every installer and the driver for `manifest`
pub fn compose_scripts(manifest: &OrchestrationManifest) -> Result<ScriptSet, StackError> {
    let mut installers = Vec::with_capacity(manifest.services().len());
    let mut ranks: BTreeMap<String, u16> = BTreeMap::new();

    for (index, service) in manifest.services().iter().enumerate() {
        let template = ScriptTemplate::lookup(&service.name, &service.template)?;
        let rank = u16::try_from(index + 1)
            .unwrap_or(u16::MAX / RANK_STEP)
            .saturating_mul(RANK_STEP);
        let name = installer_file_name(rank, &service.name);

        let header = ScriptHeader {
            script_name: name.clone(),
            service: service.name.clone(),
            stack_name: manifest.project.clone(),
            variant: template.to_string(),
        };
        let body = template.render(&header, service)?;
        validate_body(&service.name, &body)?;

        ranks.insert(service.name.clone(), rank);
        installers.push(InstallerScript {
            name,
            service: Some(service.name.clone()),
            rank,
            body,
        });
    }

    let names: Vec<String> = installers.iter().map(|s| s.name.clone()).collect();
    let driver = InstallerScript {
        name: "install.sh".to_string(),
        service: None,
        rank: 0,
        body: templates::install_sh(&manifest.project, &names),
    };

    debug!(
        stack = %manifest.project,
        installers = installers.len(),
        ranks = ?ranks,
        "Composed installer scripts"
    );
    Ok(ScriptSet { installers, driver })
}

/// Structural checks on a rendered installer
fn validate_body(service: &str, body: &str) -> Result<(), StackError> {
    let well_formed = body.starts_with("#!/bin/sh\n")
        && body.contains("\nset -eu\n")
        && body.contains(". \"${SCRIPT_DIR}/common.sh\"")
        && body.ends_with('\n')
        && !body.contains('\0');
    if well_formed {
        Ok(())
    } else {
        Err(StackError::TemplateMissing {
            service: service.to_string(),
            template: "rendered body failed validation".to_string(),
        })
    }
}
