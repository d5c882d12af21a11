use std::collections::BTreeMap;

use super::{Config, ConfigSource};

fn source_label(source: Option<&ConfigSource>) -> String {
    source.unwrap_or(&ConfigSource::Defaults).label().to_string()
}

impl Config {
    /// Effective configuration as key -> (value, source label)
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut config = BTreeMap::new();

        let mut add = |key: &str, value: String| {
            let source = source_label(self.source_attribution.get(key));
            config.insert(key.to_string(), (value, source));
        };

        add("base_dir", self.base_dir().to_string());
        add("enable", self.enabled_optional().join(", "));
        add("port_stride", self.port_stride().to_string());
        add("archive", self.archive().to_string());
        add("models.ollama", self.ollama_models().join(", "));
        add("tts.voice", self.tts_voice().to_string());

        for (name, service) in &self.services {
            if let Some(image) = &service.image {
                add(&format!("services.{name}.image"), image.clone());
            }
            if let Some(port) = service.host_port {
                add(&format!("services.{name}.host_port"), port.to_string());
            }
            for (key, value) in &service.params {
                add(&format!("services.{name}.params.{key}"), value.clone());
            }
        }

        config
    }
}
