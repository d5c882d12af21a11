//! Service Descriptor Set
//!
//! The fixed, ordered catalog of deployable services. Each descriptor's kind
//! decides whether it is required and which installer template it uses, so a
//! new service is a new [`ServiceKind`] variant.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use stackgen_config::Config;
use stackgen_utils::error::StackError;

use crate::params;

/// Catalog variants
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr, EnumIter, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ServiceKind {
    LlmInference,
    Frontend,
    ImageGen,
    TtsEngine,
    TtsAdapter,
}

/// Whether a service is always deployed or only on request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Requirement {
    Required,
    Optional,
}

impl ServiceKind {
    #[must_use]
    pub const fn requirement(self) -> Requirement {
        match self {
            Self::TtsAdapter => Requirement::Optional,
            Self::LlmInference | Self::Frontend | Self::ImageGen | Self::TtsEngine => {
                Requirement::Required
            }
        }
    }

    /// URL scheme of the published port, for README and logs
    #[must_use]
    pub const fn endpoint_scheme(self) -> &'static str {
        match self {
            Self::TtsEngine => "tcp",
            Self::LlmInference | Self::Frontend | Self::ImageGen | Self::TtsAdapter => "http",
        }
    }
}

/// A bind mount; `host` may contain placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeMount {
    pub host: String,
    pub container: String,
}

impl VolumeMount {
    pub fn new(host: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            container: container.into(),
        }
    }
}

/// Catalog entry for one deployable component
///
/// `params` carries scalar settings (`image`, `host_port`, `container_port`,
/// directories, voice...). Other string fields may reference them as
/// `{key}` placeholders alongside `{stack_dir}`, `{version}` and
/// `{stack_name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub kind: ServiceKind,
    pub params: BTreeMap<String, String>,
    pub volumes: Vec<VolumeMount>,
    pub environment: BTreeMap<String, String>,
    pub command: Vec<String>,
    pub depends_on: Vec<String>,
    /// Installer template name
    pub template: String,
}

impl ServiceDescriptor {
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.kind.requirement() == Requirement::Required
    }

    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

fn map<const N: usize>(pairs: [(&str, &str); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}

/// Ordered set of service descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<ServiceDescriptor>,
}

impl ServiceCatalog {
    /// Build a catalog from explicit descriptors, in the given order
    #[must_use]
    pub fn from_descriptors(services: Vec<ServiceDescriptor>) -> Self {
        Self { services }
    }

    /// The built-in CPU-only stack
    #[must_use]
    pub fn builtin() -> Self {
        let ollama = ServiceDescriptor {
            name: "ollama".to_string(),
            kind: ServiceKind::LlmInference,
            params: map([
                ("image", "ollama/ollama:latest"),
                ("host_port", "11434"),
                ("container_port", "11434"),
                ("data_dir", "{stack_dir}/data/ollama"),
                ("models_file", "{stack_dir}/config/ollama_models.txt"),
            ]),
            volumes: vec![VolumeMount::new("{data_dir}", "/root/.ollama")],
            environment: BTreeMap::new(),
            command: Vec::new(),
            depends_on: Vec::new(),
            template: ServiceKind::LlmInference.to_string(),
        };

        let open_webui = ServiceDescriptor {
            name: "open-webui".to_string(),
            kind: ServiceKind::Frontend,
            params: map([
                ("image", "ghcr.io/open-webui/open-webui:main"),
                ("host_port", "3000"),
                ("container_port", "8080"),
                ("data_dir", "{stack_dir}/data/open-webui"),
            ]),
            volumes: vec![VolumeMount::new("{data_dir}", "/app/backend/data")],
            environment: map([("OLLAMA_BASE_URL", "http://ollama:11434")]),
            command: Vec::new(),
            depends_on: strings(["ollama"]),
            template: ServiceKind::Frontend.to_string(),
        };

        let comfyui = ServiceDescriptor {
            name: "comfyui".to_string(),
            kind: ServiceKind::ImageGen,
            params: map([
                ("image", "zhangp365/comfyui:latest"),
                ("host_port", "8188"),
                ("container_port", "8188"),
                ("models_dir", "{stack_dir}/models/comfyui"),
                ("workflows_dir", "{stack_dir}/workflows"),
                ("output_dir", "{stack_dir}/output"),
            ]),
            volumes: vec![
                VolumeMount::new("{models_dir}", "/app/ComfyUI/models"),
                VolumeMount::new("{workflows_dir}", "/app/ComfyUI/user/default/workflows"),
                VolumeMount::new("{output_dir}", "/app/ComfyUI/output"),
            ],
            environment: BTreeMap::new(),
            command: Vec::new(),
            depends_on: Vec::new(),
            template: ServiceKind::ImageGen.to_string(),
        };

        let piper = ServiceDescriptor {
            name: "wyoming-piper".to_string(),
            kind: ServiceKind::TtsEngine,
            params: map([
                ("image", "rhasspy/wyoming-piper:latest"),
                ("host_port", "10200"),
                ("container_port", "10200"),
                ("data_dir", "{stack_dir}/data/piper"),
                ("voice", stackgen_config::DEFAULT_TTS_VOICE),
            ]),
            volumes: vec![VolumeMount::new("{data_dir}", "/data")],
            environment: BTreeMap::new(),
            command: strings([
                "--voice",
                "{voice}",
                "--data-dir",
                "/data",
                "--uri",
                "tcp://0.0.0.0:{container_port}",
            ]),
            depends_on: Vec::new(),
            template: ServiceKind::TtsEngine.to_string(),
        };

        let adapter = ServiceDescriptor {
            name: "tts-adapter".to_string(),
            kind: ServiceKind::TtsAdapter,
            params: map([
                ("image", "ghcr.io/matatonic/openedai-speech-min:latest"),
                ("host_port", "8000"),
                ("container_port", "8000"),
                ("data_dir", "{stack_dir}/data/tts-adapter"),
            ]),
            volumes: vec![VolumeMount::new("{data_dir}", "/app/voices")],
            environment: map([("TTS_BACKEND_URI", "tcp://wyoming-piper:10200")]),
            command: Vec::new(),
            depends_on: strings(["wyoming-piper"]),
            template: ServiceKind::TtsAdapter.to_string(),
        };

        Self::from_descriptors(vec![ollama, open_webui, comfyui, piper, adapter])
    }

    /// Apply `[services.<name>]` and `[tts]` overrides from configuration
    ///
    /// `[tts] voice` is applied first, so a `voice` in the engine's own
    /// `params` takes precedence. Override names not in the catalog fail with
    /// `UnknownService`.
    pub fn with_overrides(mut self, config: &Config) -> Result<Self, StackError> {
        let voice = config.tts_voice();
        for descriptor in &mut self.services {
            if descriptor.kind == ServiceKind::TtsEngine {
                descriptor.params.insert("voice".to_string(), voice.to_string());
            }
        }

        for (name, service) in &config.services {
            let known = self.names();
            let Some(descriptor) = self.services.iter_mut().find(|d| &d.name == name) else {
                return Err(StackError::UnknownService {
                    name: name.clone(),
                    known,
                });
            };

            let known_keys: BTreeSet<String> = descriptor.params.keys().cloned().collect();
            for (key, value) in &service.params {
                descriptor.params.insert(key.clone(), value.clone());
            }
            export_extra_params(descriptor, &known_keys, service.params.keys());
            if let Some(image) = &service.image {
                descriptor.params.insert("image".to_string(), image.clone());
            }
            if let Some(port) = service.host_port {
                descriptor
                    .params
                    .insert("host_port".to_string(), port.to_string());
            }
        }

        Ok(self)
    }

    #[must_use]
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|d| d.name == name)
    }

    /// Lookup by name, failing with `UnknownService`
    pub fn lookup(&self, name: &str) -> Result<&ServiceDescriptor, StackError> {
        self.get(name).ok_or_else(|| StackError::UnknownService {
            name: name.to_string(),
            known: self.names(),
        })
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.services.iter().map(|d| d.name.clone()).collect()
    }

    /// All required services, in catalog order
    #[must_use]
    pub fn required(&self) -> Vec<&ServiceDescriptor> {
        self.services.iter().filter(|d| d.is_required()).collect()
    }

    /// Required services plus the enabled optional ones
    ///
    /// Required services come first in catalog order, then enabled optional
    /// services in catalog order. Naming a required service is a no-op;
    /// naming an unknown one fails with `UnknownService`.
    pub fn select(&self, enabled: &[String]) -> Result<Vec<&ServiceDescriptor>, StackError> {
        let mut wanted = BTreeSet::new();
        for name in enabled {
            let descriptor = self.lookup(name)?;
            wanted.insert(descriptor.name.as_str());
        }

        let mut selected = self.required();
        selected.extend(
            self.services
                .iter()
                .filter(|d| !d.is_required() && wanted.contains(d.name.as_str())),
        );
        Ok(selected)
    }

    /// Placeholder keys referenced by a descriptor but defined nowhere
    ///
    /// Used by `stackgen services` to flag broken overrides early.
    #[must_use]
    pub fn unresolved_keys(descriptor: &ServiceDescriptor) -> Vec<String> {
        referenced_keys(descriptor)
            .into_iter()
            .filter(|key| !params::is_builtin(key) && !descriptor.params.contains_key(key))
            .collect()
    }
}

/// Every `{key}` placeholder used anywhere in `descriptor`
fn referenced_keys(descriptor: &ServiceDescriptor) -> BTreeSet<String> {
    let mut fields: Vec<&str> = descriptor.params.values().map(String::as_str).collect();
    fields.extend(descriptor.volumes.iter().map(|v| v.host.as_str()));
    fields.extend(descriptor.environment.values().map(String::as_str));
    fields.extend(descriptor.command.iter().map(String::as_str));

    fields
        .into_iter()
        .flat_map(params::placeholder_keys)
        .collect()
}

/// Config params the catalog has no slot for become environment variables
///
/// A key is exported when the descriptor did not define it before the
/// override and nothing references it as a placeholder. Existing
/// environment entries win.
fn export_extra_params<'a>(
    descriptor: &mut ServiceDescriptor,
    known_keys: &BTreeSet<String>,
    overridden: impl Iterator<Item = &'a String>,
) {
    let referenced = referenced_keys(descriptor);
    for key in overridden {
        if known_keys.contains(key)
            || referenced.contains(key)
            || descriptor.environment.contains_key(key)
        {
            continue;
        }
        if let Some(value) = descriptor.params.get(key) {
            descriptor.environment.insert(key.clone(), value.clone());
        }
    }
}

/// Two services whose host ports meet across versions
///
/// `higher`'s port in stack-v(N) equals `lower`'s port in
/// stack-v(N + gap), so versions `gap` apart cannot run side by side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAlias {
    pub gap: u32,
    pub lower: String,
    pub higher: String,
}

/// Smallest version distance at which two of `selected` share a host port
///
/// Base ports that differ by a multiple of `stride` alias once the offset
/// catches up. `None` when no two bases are congruent modulo the stride.
/// Unparsable or templated `host_port` values are skipped.
#[must_use]
pub fn port_alias(selected: &[&ServiceDescriptor], stride: u16) -> Option<PortAlias> {
    if stride == 0 {
        return None;
    }
    let bases: Vec<(&str, u32)> = selected
        .iter()
        .filter_map(|d| {
            let port = d.param("host_port")?.parse::<u16>().ok()?;
            Some((d.name.as_str(), u32::from(port)))
        })
        .collect();

    let stride = u32::from(stride);
    let mut best: Option<PortAlias> = None;
    for (i, &(a_name, a_port)) in bases.iter().enumerate() {
        for &(b_name, b_port) in &bases[i + 1..] {
            let diff = a_port.abs_diff(b_port);
            if diff == 0 || diff % stride != 0 {
                continue;
            }
            let gap = diff / stride;
            if best.as_ref().is_some_and(|b| b.gap <= gap) {
                continue;
            }
            let (lower, higher) = if a_port < b_port {
                (a_name, b_name)
            } else {
                (b_name, a_name)
            };
            best = Some(PortAlias {
                gap,
                lower: lower.to_string(),
                higher: higher.to_string(),
            });
        }
    }
    best
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgen_config::ServiceOverride;
    use strum::IntoEnumIterator;

    #[test]
    fn test_builtin_order_and_requirements() {
        let catalog = ServiceCatalog::builtin();

        assert_eq!(
            catalog.names(),
            vec!["ollama", "open-webui", "comfyui", "wyoming-piper", "tts-adapter"]
        );
        let required: Vec<_> = catalog.required().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(required, vec!["ollama", "open-webui", "comfyui", "wyoming-piper"]);
        assert!(!catalog.get("tts-adapter").unwrap().is_required());
    }

    #[test]
    fn test_every_kind_has_exactly_one_builtin_service() {
        let catalog = ServiceCatalog::builtin();
        for kind in ServiceKind::iter() {
            let count = catalog.descriptors().iter().filter(|d| d.kind == kind).count();
            assert_eq!(count, 1, "kind {kind}");
        }
    }

    #[test]
    fn test_select_required_only() {
        let catalog = ServiceCatalog::builtin();
        let selected = catalog.select(&[]).unwrap();
        assert_eq!(selected.len(), 4);
        assert!(selected.iter().all(|d| d.is_required()));
    }

    #[test]
    fn test_select_with_adapter_appends_after_required() {
        let catalog = ServiceCatalog::builtin();
        let enabled = vec!["tts-adapter".to_string(), "ollama".to_string()];

        let selected = catalog.select(&enabled).unwrap();
        let names: Vec<_> = selected.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(
            names,
            vec!["ollama", "open-webui", "comfyui", "wyoming-piper", "tts-adapter"]
        );
    }

    #[test]
    fn test_select_unknown_service_fails() {
        let catalog = ServiceCatalog::builtin();
        let err = catalog.select(&["whisper".to_string()]).unwrap_err();

        match err {
            StackError::UnknownService { name, known } => {
                assert_eq!(name, "whisper");
                assert_eq!(known.len(), 5);
            }
            other => panic!("expected UnknownService, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides_merge_params_and_voice() {
        let mut config = Config::default();
        config.tts.voice = Some("en_GB-alan-low".to_string());
        config.services.insert(
            "comfyui".to_string(),
            ServiceOverride {
                image: Some("example/comfyui:cpu".to_string()),
                host_port: Some(9188),
                params: BTreeMap::from([("output_dir".to_string(), "/mnt/out".to_string())]),
            },
        );

        let catalog = ServiceCatalog::builtin().with_overrides(&config).unwrap();

        let comfy = catalog.get("comfyui").unwrap();
        assert_eq!(comfy.param("image"), Some("example/comfyui:cpu"));
        assert_eq!(comfy.param("host_port"), Some("9188"));
        assert_eq!(comfy.param("output_dir"), Some("/mnt/out"));
        assert_eq!(
            catalog.get("wyoming-piper").unwrap().param("voice"),
            Some("en_GB-alan-low")
        );
    }

    #[test]
    fn test_service_voice_param_beats_tts_section() {
        let piper_voice = |config: &Config| {
            ServiceCatalog::builtin()
                .with_overrides(config)
                .unwrap()
                .get("wyoming-piper")
                .unwrap()
                .param("voice")
                .map(str::to_string)
        };
        let with_param = |config: &mut Config| {
            config.services.insert(
                "wyoming-piper".to_string(),
                ServiceOverride {
                    params: BTreeMap::from([(
                        "voice".to_string(),
                        "de_DE-thorsten-high".to_string(),
                    )]),
                    ..ServiceOverride::default()
                },
            );
        };

        // Default [tts] voice must not clobber the service param
        let mut config = Config::default();
        with_param(&mut config);
        assert_eq!(piper_voice(&config).as_deref(), Some("de_DE-thorsten-high"));

        // Nor an explicit one
        let mut config = Config::default();
        config.tts.voice = Some("en_GB-alan-low".to_string());
        with_param(&mut config);
        assert_eq!(piper_voice(&config).as_deref(), Some("de_DE-thorsten-high"));

        // Without a service param the [tts] voice applies
        let mut config = Config::default();
        config.tts.voice = Some("en_GB-alan-low".to_string());
        assert_eq!(piper_voice(&config).as_deref(), Some("en_GB-alan-low"));
    }

    #[test]
    fn test_unreferenced_params_become_environment() {
        let mut config = Config::default();
        config.services.insert(
            "open-webui".to_string(),
            ServiceOverride {
                params: BTreeMap::from([
                    ("WEBUI_NAME".to_string(), "CPU AI Stack".to_string()),
                    ("data_dir".to_string(), "{stack_dir}/webui".to_string()),
                    ("root".to_string(), "{stack_dir}/x".to_string()),
                    ("cache_dir".to_string(), "{root}/cache".to_string()),
                ]),
                ..ServiceOverride::default()
            },
        );

        let catalog = ServiceCatalog::builtin().with_overrides(&config).unwrap();
        let webui = catalog.get("open-webui").unwrap();

        assert_eq!(
            webui.environment.get("WEBUI_NAME").map(String::as_str),
            Some("CPU AI Stack")
        );
        // Catalog parameters and referenced helpers stay parameters
        assert!(!webui.environment.contains_key("data_dir"));
        assert!(!webui.environment.contains_key("root"));
        // cache_dir is new and unreferenced, so it is exported too
        assert_eq!(
            webui.environment.get("cache_dir").map(String::as_str),
            Some("{root}/cache")
        );
    }

    #[test]
    fn test_port_alias_distance() {
        let catalog = ServiceCatalog::builtin();

        // 8000 + 10 * 220 = 10200
        let all = catalog.select(&["tts-adapter".to_string()]).unwrap();
        assert_eq!(
            port_alias(&all, 10),
            Some(PortAlias {
                gap: 220,
                lower: "tts-adapter".to_string(),
                higher: "wyoming-piper".to_string(),
            })
        );

        // 3000 + 10 * 720 = 10200
        let required = catalog.select(&[]).unwrap();
        assert_eq!(port_alias(&required, 10).map(|a| a.gap), Some(720));

        // No two builtin bases are congruent modulo 7
        assert_eq!(port_alias(&all, 7), None);
    }

    #[test]
    fn test_override_for_unknown_service_fails() {
        let mut config = Config::default();
        config
            .services
            .insert("whisper".to_string(), ServiceOverride::default());

        let err = ServiceCatalog::builtin().with_overrides(&config).unwrap_err();
        assert!(matches!(err, StackError::UnknownService { .. }));
    }

    #[test]
    fn test_builtin_descriptors_have_no_unresolved_keys() {
        for descriptor in ServiceCatalog::builtin().descriptors() {
            assert!(
                ServiceCatalog::unresolved_keys(descriptor).is_empty(),
                "{}",
                descriptor.name
            );
        }
    }
}
