//! End-to-end generation scenarios against a temporary base directory
//!
//! Drives the library pipeline directly; the CLI is covered by
//! `test_cli_exit_codes.rs`.

mod test_support;

use camino::Utf8Path;
use std::fs;
use std::io;
use tempfile::TempDir;

use stackgen::{Config, GenerationRequest, Generator, ServiceCatalog, Stage, StackError};
use stackgen_config::ServiceOverride;
use std::collections::BTreeMap;
use stackgen_engine::materialize::{Materializer, StagingWriter};
use test_support::{entries, fixed_time, snapshot, utf8_base};

fn request(base: &Utf8Path) -> GenerationRequest {
    GenerationRequest::new(base).with_generated_at(fixed_time())
}

struct FailOnNthWrite {
    writes: usize,
    fail_at: usize,
}

impl StagingWriter for FailOnNthWrite {
    fn write(&mut self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        self.writes += 1;
        if self.writes == self.fail_at {
            return Err(io::Error::other("disk full (simulated)"));
        }
        stackgen_utils::atomic_write::write_file_synced(path, contents)
    }
}

#[test]
fn test_v1_in_empty_base_has_required_services_only() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp).join("stack");

    let outcome = stackgen::generate(&request(&base)).unwrap();

    assert_eq!(outcome.version, 1);
    assert_eq!(outcome.path, base.join("stack-v1"));
    assert_eq!(
        outcome.services,
        vec!["ollama", "open-webui", "comfyui", "wyoming-piper"]
    );

    let compose: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(outcome.path.join("docker-compose.yml")).unwrap())
            .unwrap();
    assert_eq!(compose["name"].as_str(), Some("stack-v1"));
    let services = compose["services"].as_mapping().unwrap();
    assert_eq!(services.len(), 4);
    assert!(services.get("tts-adapter").is_none());

    let scripts = entries(&outcome.path.join("scripts"));
    assert!(scripts.contains(&"10_install_ollama.sh".to_string()));
    assert!(scripts.contains(&"40_install_wyoming-piper.sh".to_string()));
    assert!(!scripts.iter().any(|s| s.contains("tts-adapter")));

    let driver = fs::read_to_string(outcome.path.join("install.sh")).unwrap();
    let order: Vec<usize> = [
        "10_install_ollama.sh",
        "20_install_open-webui.sh",
        "30_install_comfyui.sh",
        "40_install_wyoming-piper.sh",
    ]
    .iter()
    .map(|s| driver.find(&format!("run_installer {s}")).unwrap())
    .collect();
    assert!(order.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(entries(&base), vec!["stack-v1"]);
}

#[test]
fn test_v2_with_adapter_leaves_v1_untouched() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp).join("stack");

    let v1 = stackgen::generate(&request(&base)).unwrap();
    let before = snapshot(&v1.path);

    let v2 = stackgen::generate(&request(&base).with_enabled(["tts-adapter"])).unwrap();

    assert_eq!(v2.version, 2);
    assert_eq!(v2.path, base.join("stack-v2"));
    assert_eq!(v2.services.last().map(String::as_str), Some("tts-adapter"));
    assert_eq!(v2.optional_enabled, vec!["tts-adapter"]);
    assert!(v2.path.join("scripts/50_install_tts-adapter.sh").is_file());

    assert_eq!(snapshot(&v1.path), before);
    assert_eq!(entries(&base), vec!["stack-v1", "stack-v2"]);
}

#[test]
fn test_simulated_write_failure_leaves_no_stack_v3() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp);
    stackgen::generate(&request(&base)).unwrap();
    stackgen::generate(&request(&base)).unwrap();

    let mut generator = Generator::with_materializer(
        ServiceCatalog::builtin(),
        Materializer::with_writer(FailOnNthWrite {
            writes: 0,
            fail_at: 5,
        }),
    );
    let err = generator.generate(&request(&base)).unwrap_err();

    assert!(matches!(err, StackError::Materialization { .. }));
    assert!(matches!(generator.stage(), Stage::Failed(_)));
    assert!(!base.join("stack-v3").exists());
    assert_eq!(entries(&base), vec!["stack-v1", "stack-v2"]);

    // Nothing is left behind, so the next run takes v3
    let next = stackgen::generate(&request(&base)).unwrap();
    assert_eq!(next.version, 3);
}

#[test]
fn test_unknown_service_performs_no_writes() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp).join("never-created");

    let err = stackgen::generate(&request(&base).with_enabled(["stable-diffusion"])).unwrap_err();

    match err {
        StackError::UnknownService { name, known } => {
            assert_eq!(name, "stable-diffusion");
            assert!(known.contains(&"tts-adapter".to_string()));
        }
        other => panic!("expected UnknownService, got {other:?}"),
    }
    assert!(!base.exists());
}

#[test]
fn test_port_collision_fails_before_composing() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp);

    let mut services = ServiceCatalog::builtin().descriptors().to_vec();
    services[1]
        .params
        .insert("host_port".to_string(), "11434".to_string());
    // An unknown template would fail composing; collision must win
    services[1].template = "no-such-template".to_string();
    let mut generator = Generator::new(ServiceCatalog::from_descriptors(services));

    let err = generator.generate(&request(&base)).unwrap_err();

    match err {
        StackError::PortCollision {
            port,
            first,
            second,
        } => {
            assert_eq!(port, 11434);
            assert_eq!(first, "ollama");
            assert_eq!(second, "open-webui");
        }
        other => panic!("expected PortCollision, got {other:?}"),
    }
    assert!(entries(&base).is_empty());
}

#[test]
fn test_consecutive_versions_are_structurally_identical() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp);

    let v1 = stackgen::generate(&request(&base)).unwrap();
    let v2 = stackgen::generate(&request(&base)).unwrap();

    let a = snapshot(&v1.path);
    let b = snapshot(&v2.path);
    assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());

    let parse = |path: &Utf8Path| -> serde_yaml::Value {
        serde_yaml::from_str(&fs::read_to_string(path.join("docker-compose.yml")).unwrap())
            .unwrap()
    };
    let (c1, c2) = (parse(&v1.path), parse(&v2.path));
    let (s1, s2) = (
        c1["services"].as_mapping().unwrap(),
        c2["services"].as_mapping().unwrap(),
    );
    assert_eq!(
        s1.keys().collect::<Vec<_>>(),
        s2.keys().collect::<Vec<_>>()
    );

    for (name, svc1) in s1 {
        let svc2 = s2.get(name).unwrap();
        assert_eq!(svc1["image"], svc2["image"]);
        assert_eq!(svc1["depends_on"], svc2["depends_on"]);
        assert_eq!(svc1["environment"], svc2["environment"]);

        let port = |v: &serde_yaml::Value| -> (u32, u32) {
            let mapping = v["ports"][0].as_str().unwrap();
            let (host, container) = mapping.split_once(':').unwrap();
            (host.parse().unwrap(), container.parse().unwrap())
        };
        let ((host1, container1), (host2, container2)) = (port(svc1), port(svc2));
        assert_eq!(container1, container2, "container ports never shift");
        assert_eq!(host2, host1 + 10, "host ports shift by one stride");
    }

    // Static files differ only in version-derived text
    for file in ["scripts/common.sh", "scripts/clean_stack.sh", "install.sh"] {
        let one = String::from_utf8(a[file].clone()).unwrap();
        let two = String::from_utf8(b[file].clone()).unwrap();
        assert_eq!(one.replace("stack-v1", "stack-v2"), two, "{file}");
    }
}

#[test]
fn test_config_params_reach_the_compose_file() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp);

    let mut config = Config::default();
    config.services.insert(
        "open-webui".to_string(),
        ServiceOverride {
            params: BTreeMap::from([("WEBUI_NAME".to_string(), "CPU AI Stack".to_string())]),
            ..ServiceOverride::default()
        },
    );
    config.services.insert(
        "wyoming-piper".to_string(),
        ServiceOverride {
            params: BTreeMap::from([("voice".to_string(), "en_GB-alan-low".to_string())]),
            ..ServiceOverride::default()
        },
    );

    let outcome = Generator::from_config(&config)
        .unwrap()
        .generate(&request(&base))
        .unwrap();

    let compose: serde_yaml::Value = serde_yaml::from_str(
        &fs::read_to_string(outcome.path.join("docker-compose.yml")).unwrap(),
    )
    .unwrap();
    let webui_env: Vec<&str> = compose["services"]["open-webui"]["environment"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(webui_env.contains(&"WEBUI_NAME=CPU AI Stack"), "{webui_env:?}");

    let piper_command: Vec<&str> = compose["services"]["wyoming-piper"]["command"]
        .as_sequence()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert!(piper_command.windows(2).any(|w| w == ["--voice", "en_GB-alan-low"]));
}

#[test]
fn test_unknown_template_and_dangling_dependency_write_nothing() {
    let temp = TempDir::new().unwrap();
    let base = utf8_base(&temp).join("stacks");

    let mut services = ServiceCatalog::builtin().descriptors().to_vec();
    services[2].template = "no-such-template".to_string();
    let err = Generator::new(ServiceCatalog::from_descriptors(services))
        .generate(&request(&base))
        .unwrap_err();
    assert!(
        matches!(&err, StackError::TemplateMissing { service, template }
            if service == "comfyui" && template == "no-such-template"),
        "{err:?}"
    );
    assert_eq!(err.to_exit_code(), stackgen::ExitCode::TEMPLATE_MISSING);

    let mut services = ServiceCatalog::builtin().descriptors().to_vec();
    services[1].depends_on.push("searxng".to_string());
    let err = Generator::new(ServiceCatalog::from_descriptors(services))
        .generate(&request(&base))
        .unwrap_err();
    assert!(
        matches!(&err, StackError::DanglingDependency { .. }),
        "{err:?}"
    );
    assert_eq!(err.to_exit_code(), stackgen::ExitCode::DANGLING_DEPENDENCY);

    assert!(!base.exists());
}
