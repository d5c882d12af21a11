use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use stackgen_utils::types::ConfigSource;

/// Default spacing between the host ports of consecutive stack versions
pub const DEFAULT_PORT_STRIDE: u16 = 10;

/// Default Piper voice for the TTS engine
pub const DEFAULT_TTS_VOICE: &str = "en_US-lessac-medium";

/// CPU-friendly models seeded into `config/ollama_models.txt`
pub const DEFAULT_OLLAMA_MODELS: &[&str] =
    &["mistral", "llama3", "llama3.1", "phi3", "qwen2.5", "gemma2"];

/// `[defaults]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Directory holding the `stack-v<N>` directories
    pub base_dir: Option<String>,
    /// Optional services to enable
    pub enable: Option<Vec<String>>,
    pub port_stride: Option<u16>,
    /// Also write `stack-v<N>.tar.gz` inside the version directory
    pub archive: Option<bool>,
}

/// `[services.<name>]` section
///
/// `params` is merged over the catalog's parameter mapping for that service.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServiceOverride {
    pub image: Option<String>,
    /// Host port for version 1; later versions add the stride
    pub host_port: Option<u16>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// `[models]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    pub ollama: Option<Vec<String>>,
}

/// `[tts]` section
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TtsConfig {
    pub voice: Option<String>,
}

/// Effective configuration after applying CLI > file > defaults
#[derive(Debug, Clone)]
pub struct Config {
    pub defaults: Defaults,
    pub services: BTreeMap<String, ServiceOverride>,
    pub models: ModelsConfig,
    pub tts: TtsConfig,
    pub source_attribution: HashMap<String, ConfigSource>,
    /// Config file that contributed values, if any
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let mut source_attribution = HashMap::new();
        for key in [
            "base_dir",
            "enable",
            "port_stride",
            "archive",
            "models.ollama",
            "tts.voice",
        ] {
            source_attribution.insert(key.to_string(), ConfigSource::Defaults);
        }

        Self {
            defaults: Defaults {
                base_dir: Some(".".to_string()),
                enable: Some(Vec::new()),
                port_stride: Some(DEFAULT_PORT_STRIDE),
                archive: Some(false),
            },
            services: BTreeMap::new(),
            models: ModelsConfig {
                ollama: Some(DEFAULT_OLLAMA_MODELS.iter().map(|m| (*m).to_string()).collect()),
            },
            tts: TtsConfig {
                voice: Some(DEFAULT_TTS_VOICE.to_string()),
            },
            source_attribution,
            config_path: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn base_dir(&self) -> &str {
        self.defaults.base_dir.as_deref().unwrap_or(".")
    }

    #[must_use]
    pub fn enabled_optional(&self) -> &[String] {
        self.defaults.enable.as_deref().unwrap_or(&[])
    }

    #[must_use]
    pub fn port_stride(&self) -> u16 {
        self.defaults.port_stride.unwrap_or(DEFAULT_PORT_STRIDE)
    }

    #[must_use]
    pub fn archive(&self) -> bool {
        self.defaults.archive.unwrap_or(false)
    }

    /// Models listed in `config/ollama_models.txt`
    #[must_use]
    pub fn ollama_models(&self) -> Vec<String> {
        self.models.ollama.clone().unwrap_or_else(|| {
            DEFAULT_OLLAMA_MODELS
                .iter()
                .map(|m| (*m).to_string())
                .collect()
        })
    }

    #[must_use]
    pub fn tts_voice(&self) -> &str {
        self.tts.voice.as_deref().unwrap_or(DEFAULT_TTS_VOICE)
    }

    /// Per-service override from `[services.<name>]`
    #[must_use]
    pub fn service_override(&self, name: &str) -> Option<&ServiceOverride> {
        self.services.get(name)
    }
}
