use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use stackgen_utils::error::{ConfigError, StackError};

use super::{CliArgs, Config, ConfigSource, Defaults, ModelsConfig, ServiceOverride, TtsConfig};

/// Directory that holds the project config file
pub const CONFIG_DIR_NAME: &str = ".stackgen";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    #[serde(default)]
    services: BTreeMap<String, ServiceOverride>,
    models: Option<ModelsConfig>,
    tts: Option<TtsConfig>,
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is provided in `cli_args`.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    ///
    /// Path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Self::default();

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(StackError::Config(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    })
                    .into());
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir)?,
        };

        if let Some(path) = &config_path {
            let file_config = Self::load_config_file(path)?;
            config.apply_file(file_config, ConfigSource::ConfigFile(path.clone()));
            config.config_path = Some(path.clone());
        }

        config.apply_cli(cli_args);
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, file: TomlConfig, source: ConfigSource) {
        if let Some(defaults) = file.defaults {
            if defaults.base_dir.is_some() {
                self.defaults.base_dir = defaults.base_dir;
                self.attribute("base_dir", &source);
            }
            if defaults.enable.is_some() {
                self.defaults.enable = defaults.enable;
                self.attribute("enable", &source);
            }
            if defaults.port_stride.is_some() {
                self.defaults.port_stride = defaults.port_stride;
                self.attribute("port_stride", &source);
            }
            if defaults.archive.is_some() {
                self.defaults.archive = defaults.archive;
                self.attribute("archive", &source);
            }
        }

        if let Some(ollama) = file.models.and_then(|m| m.ollama) {
            self.models.ollama = Some(ollama);
            self.attribute("models.ollama", &source);
        }

        if let Some(voice) = file.tts.and_then(|t| t.voice) {
            self.tts.voice = Some(voice);
            self.attribute("tts.voice", &source);
        }

        for (name, service) in file.services {
            if service.image.is_some() {
                self.attribute(&format!("services.{name}.image"), &source);
            }
            if service.host_port.is_some() {
                self.attribute(&format!("services.{name}.host_port"), &source);
            }
            for key in service.params.keys() {
                self.attribute(&format!("services.{name}.params.{key}"), &source);
            }
            self.services.insert(name, service);
        }
    }

    fn apply_cli(&mut self, cli_args: &CliArgs) {
        if let Some(base_dir) = &cli_args.base_dir {
            self.defaults.base_dir = Some(base_dir.clone());
            self.attribute("base_dir", &ConfigSource::Cli);
        }
        if !cli_args.enable.is_empty() {
            self.defaults.enable = Some(cli_args.enable.clone());
            self.attribute("enable", &ConfigSource::Cli);
        }
        if let Some(stride) = cli_args.port_stride {
            self.defaults.port_stride = Some(stride);
            self.attribute("port_stride", &ConfigSource::Cli);
        }
        if let Some(archive) = cli_args.archive {
            self.defaults.archive = Some(archive);
            self.attribute("archive", &ConfigSource::Cli);
        }
    }

    fn attribute(&mut self, key: &str, source: &ConfigSource) {
        self.source_attribution
            .insert(key.to_string(), source.clone());
    }

    /// Discover config file by searching upward from a given directory
    ///
    /// Walks up looking for `.stackgen/config.toml`, stopping at repository
    /// root markers (.git, .hg, .svn) or the filesystem root.
    pub fn discover_config_file_from(start_dir: &Path) -> Result<Option<PathBuf>> {
        let mut current_dir = start_dir.to_path_buf();

        loop {
            let config_path = current_dir.join(CONFIG_DIR_NAME).join("config.toml");
            if config_path.is_file() {
                return Ok(Some(config_path));
            }

            if current_dir.join(".git").exists()
                || current_dir.join(".hg").exists()
                || current_dir.join(".svn").exists()
            {
                break;
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Ok(None)
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content).map_err(|e| {
            StackError::Config(ConfigError::InvalidFile(format!("{}: {e}", path.display())))
                .into()
        })
    }
}
