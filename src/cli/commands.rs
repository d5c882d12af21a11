//! Command implementations
//!
//! Results go to stdout, either as short text or as JCS canonical JSON with
//! `--json`. Logging goes to stderr.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use tracing::{debug, info};

use stackgen_config::{CONFIG_DIR_NAME, default_config_toml};
use stackgen_engine::artifacts::METADATA_FILE;
use stackgen_engine::version::{absolutize_base, scan_versions};
use stackgen_utils::atomic_write::write_file_atomic;

use crate::{
    Config, ConfigError, GenerationRequest, Generator, ServiceCatalog, StackError, StackVersion,
    emit_jcs,
};

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|p| anyhow::anyhow!("Current directory is not valid UTF-8: {}", p.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", emit_jcs(value)?);
    Ok(())
}

/// `stackgen generate`
pub fn execute_generate_command(config: &Config, json: bool) -> Result<()> {
    let cwd = current_dir()?;
    let request = GenerationRequest::from_config(config, &cwd)?;
    let mut generator = Generator::from_config(config)?;
    let outcome = generator.generate(&request)?;

    if json {
        return print_json(&outcome);
    }

    println!("version: {}", outcome.version);
    println!("path: {}", outcome.path);
    if let Some(archive) = &outcome.archive {
        println!("archive: {archive}");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StackListing {
    version: u32,
    stack: String,
    path: Utf8PathBuf,
    /// From `stack.json`, when readable
    generated_at: Option<String>,
    services: Option<usize>,
}

fn read_listing(version: StackVersion) -> StackListing {
    let metadata: Option<serde_json::Value> = fs::read(version.path.join(METADATA_FILE))
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    StackListing {
        version: version.number,
        stack: version.name(),
        generated_at: metadata
            .as_ref()
            .and_then(|m| m["generated_at"].as_str())
            .map(str::to_string),
        services: metadata
            .as_ref()
            .and_then(|m| m["services"].as_array())
            .map(Vec::len),
        path: version.path,
    }
}

/// `stackgen list`
pub fn execute_list_command(config: &Config, json: bool) -> Result<()> {
    let cwd = current_dir()?;
    let base = absolutize_base(Utf8Path::new(config.base_dir()), &cwd)?;
    let listings: Vec<StackListing> = scan_versions(&base)?
        .into_iter()
        .map(|n| read_listing(StackVersion::new(&base, n)))
        .collect();
    debug!(base = %base, versions = listings.len(), "Listed stacks");

    if json {
        return print_json(&listings);
    }

    if listings.is_empty() {
        println!("No stacks under {base}");
        return Ok(());
    }
    for listing in &listings {
        match &listing.generated_at {
            Some(at) => println!("{}\t{}\t{}", listing.stack, at, listing.path),
            None => println!("{}\t-\t{}", listing.stack, listing.path),
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ServiceListing {
    name: String,
    kind: String,
    requirement: String,
    image: Option<String>,
    host_port: Option<String>,
    depends_on: Vec<String>,
    unresolved: Vec<String>,
}

/// `stackgen services`
pub fn execute_services_command(config: &Config, json: bool) -> Result<()> {
    let catalog = ServiceCatalog::builtin().with_overrides(config)?;
    let listings: Vec<ServiceListing> = catalog
        .descriptors()
        .iter()
        .map(|d| ServiceListing {
            name: d.name.clone(),
            kind: d.kind.to_string(),
            requirement: d.kind.requirement().to_string(),
            image: d.param("image").map(str::to_string),
            host_port: d.param("host_port").map(str::to_string),
            depends_on: d.depends_on.clone(),
            unresolved: ServiceCatalog::unresolved_keys(d),
        })
        .collect();

    if json {
        return print_json(&listings);
    }

    for listing in &listings {
        println!(
            "{:<15} {:<14} {:<9} {:<6} {}",
            listing.name,
            listing.kind,
            listing.requirement,
            listing.host_port.as_deref().unwrap_or("-"),
            listing.image.as_deref().unwrap_or("-"),
        );
        if !listing.unresolved.is_empty() {
            println!("  ⚠ unresolved placeholders: {}", listing.unresolved.join(", "));
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ConfigValue {
    value: String,
    source: String,
}

/// `stackgen config`
pub fn execute_config_command(config: &Config, json: bool) -> Result<()> {
    let effective = config.effective_config();

    if json {
        let values: BTreeMap<String, ConfigValue> = effective
            .into_iter()
            .map(|(key, (value, source))| (key, ConfigValue { value, source }))
            .collect();
        return print_json(&values);
    }

    match &config.config_path {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: none (using defaults)"),
    }
    for (key, (value, source)) in &effective {
        println!("  {key} = {value}  [{source}]");
    }
    Ok(())
}

/// `stackgen init`
pub fn execute_init_command(force: bool) -> Result<()> {
    let cwd = current_dir()?;
    init_config_in(&cwd, force)
}

fn init_config_in(dir: &Utf8Path, force: bool) -> Result<()> {
    let path = dir.join(CONFIG_DIR_NAME).join("config.toml");
    if path.exists() && !force {
        return Err(StackError::Config(ConfigError::InvalidValue {
            key: path.to_string(),
            value: "already exists (use --force to overwrite)".to_string(),
        })
        .into());
    }

    let result = write_file_atomic(&path, &default_config_toml())
        .with_context(|| format!("Failed to write {path}"))?;
    info!(path = %path, bytes = result.bytes_written, "Wrote config template");
    if result.replaced_existing {
        println!("Overwrote {path}");
    } else {
        println!("Created {path}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn utf8(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_init_refuses_to_overwrite_without_force() {
        let temp = TempDir::new().unwrap();
        let dir = utf8(&temp);

        init_config_in(&dir, false).unwrap();
        let path = dir.join(".stackgen/config.toml");
        fs::write(&path, "# edited\n").unwrap();

        let err = init_config_in(&dir, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StackError>(),
            Some(StackError::Config(_))
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# edited\n");

        init_config_in(&dir, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), default_config_toml());
    }

    #[test]
    fn test_listing_reads_metadata_when_present() {
        let temp = TempDir::new().unwrap();
        let base = utf8(&temp);
        let version = StackVersion::new(&base, 4);
        fs::create_dir_all(&version.path).unwrap();
        fs::write(
            version.path.join(METADATA_FILE),
            r#"{"generated_at":"2026-01-02T03:04:05Z","services":[{},{}]}"#,
        )
        .unwrap();

        let listing = read_listing(version);
        assert_eq!(listing.stack, "stack-v4");
        assert_eq!(listing.generated_at.as_deref(), Some("2026-01-02T03:04:05Z"));
        assert_eq!(listing.services, Some(2));

        let bare = read_listing(StackVersion::new(&base, 5));
        assert!(bare.generated_at.is_none());
    }
}
