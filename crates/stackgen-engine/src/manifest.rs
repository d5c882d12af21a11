//! Manifest Synthesizer
//!
//! Turns the selected descriptors into a fully resolved, ordered
//! [`OrchestrationManifest`] and validates it: unique names, unique host
//! ports, no dangling `depends_on` references. Serializes to compose YAML
//! with services in manifest order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use stackgen_utils::error::{ConfigError, StackError};

use crate::catalog::{ServiceDescriptor, ServiceKind, VolumeMount};
use crate::params::{self, Placeholders};
use crate::version::StackVersion;

/// Published port, `host:container`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

/// A service with every placeholder resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub name: String,
    pub kind: ServiceKind,
    pub required: bool,
    pub image: String,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMount>,
    pub environment: BTreeMap<String, String>,
    pub command: Vec<String>,
    pub depends_on: Vec<String>,
    /// Resolved parameter mapping, consumed by installer templates
    pub params: BTreeMap<String, String>,
    pub template: String,
}

impl ResolvedService {
    /// Host port of the primary published port
    #[must_use]
    pub fn host_port(&self) -> Option<u16> {
        self.ports.first().map(|p| p.host)
    }

    /// `http://localhost:<port>` style endpoint, if the service publishes a port
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.host_port()
            .map(|port| format!("{}://localhost:{port}", self.kind.endpoint_scheme()))
    }
}

/// Ordered mapping of service name to resolved definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationManifest {
    /// Compose project name, `stack-v<N>`
    pub project: String,
    services: Vec<ResolvedService>,
}

impl OrchestrationManifest {
    #[must_use]
    pub fn services(&self) -> &[ResolvedService] {
        &self.services
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedService> {
        self.services.iter().find(|s| s.name == name)
    }

    #[must_use]
    pub fn service_names(&self) -> Vec<&str> {
        self.services.iter().map(|s| s.name.as_str()).collect()
    }

    /// Compose YAML document
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[derive(Serialize)]
struct ComposeService<'a> {
    image: &'a str,
    restart: &'static str,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    command: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    environment: Vec<String>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    depends_on: &'a [String],
}

impl<'a> From<&'a ResolvedService> for ComposeService<'a> {
    fn from(service: &'a ResolvedService) -> Self {
        Self {
            image: &service.image,
            restart: "unless-stopped",
            command: &service.command,
            ports: service
                .ports
                .iter()
                .map(|p| format!("{}:{}", p.host, p.container))
                .collect(),
            volumes: service
                .volumes
                .iter()
                .map(|v| format!("{}:{}", v.host, v.container))
                .collect(),
            environment: service
                .environment
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect(),
            depends_on: &service.depends_on,
        }
    }
}

struct OrderedServices<'a>(&'a [ResolvedService]);

impl Serialize for OrderedServices<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for service in self.0 {
            map.serialize_entry(&service.name, &ComposeService::from(service))?;
        }
        map.end()
    }
}

impl Serialize for OrchestrationManifest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("name", &self.project)?;
        map.serialize_entry("services", &OrderedServices(&self.services))?;
        map.end()
    }
}

fn parse_port(service: &str, key: &str, value: &str) -> Result<u32, StackError> {
    value.trim().parse::<u32>().map_err(|_| {
        StackError::Config(ConfigError::InvalidValue {
            key: format!("services.{service}.params.{key}"),
            value: value.to_string(),
        })
    })
}

fn to_port(service: &str, port: u32) -> Result<u16, StackError> {
    match u16::try_from(port) {
        Ok(p) if p != 0 => Ok(p),
        _ => Err(StackError::PortOutOfRange {
            service: service.to_string(),
            port,
        }),
    }
}

/// Resolve one descriptor for `version`
pub fn resolve_service(
    descriptor: &ServiceDescriptor,
    ctx: &Placeholders,
    version: &StackVersion,
    port_stride: u16,
) -> Result<ResolvedService, StackError> {
    let name = descriptor.name.as_str();
    let resolved = ctx.resolve_params(name, &descriptor.params)?;

    let image = params::require(name, &resolved, "image")?.to_string();
    let base_port = parse_port(name, "host_port", params::require(name, &resolved, "host_port")?)?;
    let container_port = parse_port(
        name,
        "container_port",
        params::require(name, &resolved, "container_port")?,
    )?;

    let offset = u64::from(version.index()) * u64::from(port_stride);
    let host_port = u32::try_from(u64::from(base_port) + offset).unwrap_or(u32::MAX);

    let ports = vec![PortMapping {
        host: to_port(name, host_port)?,
        container: to_port(name, container_port)?,
    }];

    let volumes = descriptor
        .volumes
        .iter()
        .map(|v| {
            Ok(VolumeMount {
                host: ctx.substitute(name, &v.host, &resolved)?,
                container: ctx.substitute(name, &v.container, &resolved)?,
            })
        })
        .collect::<Result<Vec<_>, StackError>>()?;

    let environment = descriptor
        .environment
        .iter()
        .map(|(k, v)| Ok((k.clone(), ctx.substitute(name, v, &resolved)?)))
        .collect::<Result<BTreeMap<_, _>, StackError>>()?;

    let command = descriptor
        .command
        .iter()
        .map(|arg| ctx.substitute(name, arg, &resolved))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ResolvedService {
        name: descriptor.name.clone(),
        kind: descriptor.kind,
        required: descriptor.is_required(),
        image,
        ports,
        volumes,
        environment,
        command,
        depends_on: descriptor.depends_on.clone(),
        params: resolved,
        template: descriptor.template.clone(),
    })
}

/// Build and validate the manifest for `version`
///
/// `selected` must already be in manifest order (see
/// [`ServiceCatalog::select`](crate::catalog::ServiceCatalog::select)).
pub fn synthesize(
    version: &StackVersion,
    selected: &[&ServiceDescriptor],
    port_stride: u16,
) -> Result<OrchestrationManifest, StackError> {
    let ctx = Placeholders::for_version(version);

    let services = selected
        .iter()
        .map(|d| resolve_service(d, &ctx, version, port_stride))
        .collect::<Result<Vec<_>, _>>()?;

    let manifest = OrchestrationManifest {
        project: version.name(),
        services,
    };
    validate(&manifest)?;

    debug!(
        version = version.number,
        services = manifest.services.len(),
        "Synthesized manifest"
    );
    Ok(manifest)
}

fn validate(manifest: &OrchestrationManifest) -> Result<(), StackError> {
    let mut names = HashSet::new();
    for service in &manifest.services {
        if !names.insert(service.name.as_str()) {
            return Err(StackError::Config(ConfigError::InvalidValue {
                key: "services".to_string(),
                value: format!("duplicate service name '{}'", service.name),
            }));
        }
    }

    let mut claimed: HashMap<u16, &str> = HashMap::new();
    for service in &manifest.services {
        for port in &service.ports {
            if let Some(first) = claimed.insert(port.host, &service.name) {
                return Err(StackError::PortCollision {
                    port: port.host,
                    first: first.to_string(),
                    second: service.name.clone(),
                });
            }
        }
    }

    for service in &manifest.services {
        for dependency in &service.depends_on {
            if !names.contains(dependency.as_str()) {
                return Err(StackError::DanglingDependency {
                    service: service.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ServiceCatalog;
    use camino::Utf8Path;

    fn v(number: u32) -> StackVersion {
        StackVersion::new(Utf8Path::new("/stack"), number)
    }

    #[test]
    fn test_v1_required_services_in_catalog_order() {
        let catalog = ServiceCatalog::builtin();
        let selected = catalog.select(&[]).unwrap();

        let manifest = synthesize(&v(1), &selected, 10).unwrap();

        assert_eq!(manifest.project, "stack-v1");
        assert_eq!(
            manifest.service_names(),
            vec!["ollama", "open-webui", "comfyui", "wyoming-piper"]
        );
        let ollama = manifest.get("ollama").unwrap();
        assert_eq!(ollama.host_port(), Some(11434));
        assert_eq!(ollama.volumes[0].host, "/stack/stack-v1/data/ollama");
        assert_eq!(
            manifest.get("open-webui").unwrap().ports[0],
            PortMapping {
                host: 3000,
                container: 8080
            }
        );
    }

    #[test]
    fn test_ports_offset_by_version() {
        let catalog = ServiceCatalog::builtin();
        let selected = catalog.select(&["tts-adapter".to_string()]).unwrap();

        let manifest = synthesize(&v(3), &selected, 10).unwrap();

        assert_eq!(manifest.get("ollama").unwrap().host_port(), Some(11454));
        assert_eq!(manifest.get("tts-adapter").unwrap().host_port(), Some(8020));
        // container ports never move
        assert_eq!(manifest.get("open-webui").unwrap().ports[0].container, 8080);
    }

    #[test]
    fn test_piper_command_resolves_voice() {
        let catalog = ServiceCatalog::builtin();
        let selected = catalog.select(&[]).unwrap();

        let manifest = synthesize(&v(1), &selected, 10).unwrap();

        let piper = manifest.get("wyoming-piper").unwrap();
        assert_eq!(
            piper.command,
            vec![
                "--voice",
                "en_US-lessac-medium",
                "--data-dir",
                "/data",
                "--uri",
                "tcp://0.0.0.0:10200"
            ]
        );
    }

    #[test]
    fn test_port_collision_names_both_services() {
        let mut catalog_services = ServiceCatalog::builtin().descriptors().to_vec();
        catalog_services[2]
            .params
            .insert("host_port".to_string(), "3000".to_string());
        let catalog = ServiceCatalog::from_descriptors(catalog_services);
        let selected = catalog.select(&[]).unwrap();

        let err = synthesize(&v(1), &selected, 10).unwrap_err();

        match err {
            StackError::PortCollision {
                port,
                first,
                second,
            } => {
                assert_eq!(port, 3000);
                assert_eq!(first, "open-webui");
                assert_eq!(second, "comfyui");
            }
            other => panic!("expected PortCollision, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_image_is_missing_parameter() {
        let mut services = ServiceCatalog::builtin().descriptors().to_vec();
        services[0].params.insert("image".to_string(), String::new());
        let catalog = ServiceCatalog::from_descriptors(services);
        let selected = catalog.select(&[]).unwrap();

        let err = synthesize(&v(1), &selected, 10).unwrap_err();
        assert!(matches!(
            err,
            StackError::MissingParameter { ref service, ref parameter }
                if service == "ollama" && parameter == "image"
        ));
    }

    #[test]
    fn test_dangling_dependency_is_rejected() {
        let services = ServiceCatalog::builtin().descriptors().to_vec();
        // Drop ollama; open-webui still depends on it
        let catalog = ServiceCatalog::from_descriptors(services[1..].to_vec());
        let selected = catalog.select(&[]).unwrap();

        let err = synthesize(&v(1), &selected, 10).unwrap_err();
        assert!(matches!(
            err,
            StackError::DanglingDependency { ref service, ref dependency }
                if service == "open-webui" && dependency == "ollama"
        ));
    }

    #[test]
    fn test_port_out_of_range() {
        let mut services = ServiceCatalog::builtin().descriptors().to_vec();
        services[0]
            .params
            .insert("host_port".to_string(), "65530".to_string());
        let catalog = ServiceCatalog::from_descriptors(services);
        let selected = catalog.select(&[]).unwrap();

        let err = synthesize(&v(2), &selected, 10).unwrap_err();
        assert!(matches!(
            err,
            StackError::PortOutOfRange { port: 65540, .. }
        ));
    }

    #[test]
    fn test_yaml_preserves_service_order_and_project_name() {
        let catalog = ServiceCatalog::builtin();
        let selected = catalog.select(&["tts-adapter".to_string()]).unwrap();
        let manifest = synthesize(&v(2), &selected, 10).unwrap();

        let yaml = manifest.to_yaml().unwrap();

        assert!(yaml.starts_with("name: stack-v2\n"));
        let positions: Vec<usize> = manifest
            .service_names()
            .iter()
            .map(|name| yaml.find(&format!("  {name}:\n")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(yaml.contains("11444:11434"));
        assert!(yaml.contains("OLLAMA_BASE_URL=http://ollama:11434"));
        assert!(!yaml.contains("container_name"));

        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            value["services"]["tts-adapter"]["depends_on"][0].as_str(),
            Some("wyoming-piper")
        );
        assert_eq!(
            value["services"]["comfyui"]["restart"].as_str(),
            Some("unless-stopped")
        );
    }
}
