use stackgen_utils::error::{ConfigError, StackError};

use super::Config;

fn invalid(key: impl Into<String>, value: impl Into<String>) -> StackError {
    StackError::Config(ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    })
}

impl Config {
    /// Validate configuration values
    ///
    /// Service names are not checked here; the catalog owns them.
    pub(crate) fn validate(&self) -> Result<(), StackError> {
        if self.base_dir().trim().is_empty() {
            return Err(invalid("base_dir", "must not be empty"));
        }

        if self.port_stride() == 0 {
            return Err(invalid("port_stride", "must be greater than 0"));
        }

        for (index, name) in self.enabled_optional().iter().enumerate() {
            if name.trim().is_empty() {
                return Err(invalid("enable", format!("entry {index} is empty")));
            }
        }

        for (name, service) in &self.services {
            if service.host_port == Some(0) {
                return Err(invalid(
                    format!("services.{name}.host_port"),
                    "must be between 1 and 65535",
                ));
            }
            if service.image.as_deref().is_some_and(|i| i.trim().is_empty()) {
                return Err(invalid(format!("services.{name}.image"), "must not be empty"));
            }
        }

        for model in self.ollama_models() {
            if model.is_empty() || model.chars().any(char::is_whitespace) {
                return Err(invalid(
                    "models.ollama",
                    format!("'{model}' is not a model tag"),
                ));
            }
        }

        let voice = self.tts_voice();
        if voice.is_empty() || voice.chars().any(char::is_whitespace) {
            return Err(invalid("tts.voice", format!("'{voice}' is not a voice name")));
        }

        Ok(())
    }
}
