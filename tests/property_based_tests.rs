//! Property-based tests for version sequencing and port arithmetic
//!
//! Case counts honour `PROPTEST_CASES`; filesystem-heavy properties are
//! capped lower.

mod test_support;

use camino::Utf8Path;
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;
use std::env;
use tempfile::TempDir;

use stackgen::{GenerationRequest, ServiceCatalog, StackError, StackVersion};
use stackgen_engine::manifest::synthesize;
use stackgen_engine::version::{parse_stack_dir_name, stack_dir_name};
use test_support::{entries, fixed_time, utf8_base};

const DEFAULT_PROPTEST_CASES: u32 = 64;

fn proptest_config(max_cases: Option<u32>) -> ProptestConfig {
    let env_cases = env::var("PROPTEST_CASES")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PROPTEST_CASES);

    let cases = match max_cases {
        Some(max) => env_cases.min(max),
        None => env_cases,
    };

    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

/// N successful runs against an empty base yield 1..=N with no gaps
#[test]
fn prop_versions_strictly_increase_without_gaps() {
    let config = proptest_config(Some(12));

    proptest!(config, |(runs in 1usize..6, adapter_mask in any::<u8>())| {
        let temp = TempDir::new().unwrap();
        let base = utf8_base(&temp);

        let mut versions = Vec::new();
        for run in 0..runs {
            let mut request = GenerationRequest::new(&base).with_generated_at(fixed_time());
            if adapter_mask & (1 << run) != 0 {
                request = request.with_enabled(["tts-adapter"]);
            }
            versions.push(stackgen::generate(&request).unwrap().version);
        }

        let expected: Vec<u32> = (1..=u32::try_from(runs).unwrap()).collect();
        prop_assert_eq!(&versions, &expected);

        let dirs: Vec<String> = expected.iter().map(|n| stack_dir_name(*n)).collect();
        let mut sorted_dirs = dirs.clone();
        sorted_dirs.sort();
        prop_assert_eq!(entries(&base), sorted_dirs);
    });
}

/// Host port = base + (N - 1) * stride, or PortOutOfRange past 65535
#[test]
fn prop_host_ports_offset_by_version() {
    let config = proptest_config(None);

    proptest!(config, |(version in 1u32..2000, stride in 1u16..200)| {
        let catalog = ServiceCatalog::builtin();
        let selected = catalog.select(&[]).unwrap();
        let stack = StackVersion::new(Utf8Path::new("/stack"), version);

        let offset = u64::from(version - 1) * u64::from(stride);
        let highest_base = 11434u64;

        match synthesize(&stack, &selected, stride) {
            Ok(manifest) => {
                prop_assert!(highest_base + offset <= 65535);
                let ollama = manifest.get("ollama").unwrap();
                prop_assert_eq!(u64::from(ollama.host_port().unwrap()), 11434 + offset);
                prop_assert_eq!(ollama.ports[0].container, 11434);
                let webui = manifest.get("open-webui").unwrap();
                prop_assert_eq!(u64::from(webui.host_port().unwrap()), 3000 + offset);
            }
            Err(StackError::PortOutOfRange { port, .. }) => {
                prop_assert!(u64::from(port) > 65535);
                prop_assert!(highest_base + offset > 65535);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    });
}

/// Only canonical `stack-v<N>` names count as versions
#[test]
fn prop_version_dir_names_round_trip() {
    let config = proptest_config(None);

    proptest!(config, |(n in 1u32..u32::MAX, junk in "[a-z0-9._-]{0,12}")| {
        prop_assert_eq!(parse_stack_dir_name(&stack_dir_name(n)), Some(n));

        let padded = format!("stack-v0{n}");
        prop_assert_eq!(parse_stack_dir_name(&padded), None);

        let suffixed = format!("{}{junk}", stack_dir_name(n));
        if !junk.is_empty() && !junk.chars().all(|c| c.is_ascii_digit()) {
            prop_assert_eq!(parse_stack_dir_name(&suffixed), None);
        }
    });
}
