//! Version Resolver
//!
//! Scans a base directory for `stack-v<N>` entries and picks the next free
//! version. Only reads the directory listing; creation happens at commit.

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io;
use std::sync::LazyLock;
use tracing::debug;

use stackgen_utils::error::{ConfigError, StackError};

/// Prefix of every version directory name
pub const STACK_DIR_PREFIX: &str = "stack-v";

static VERSION_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^stack-v([1-9][0-9]*)$").expect("static pattern"));

/// A resolved stack version and where it will live
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackVersion {
    pub number: u32,
    /// Absolute base directory
    pub base: Utf8PathBuf,
    /// Absolute `<base>/stack-v<N>`
    pub path: Utf8PathBuf,
}

impl StackVersion {
    /// Build the version record for `number` under an absolute `base`
    #[must_use]
    pub fn new(base: &Utf8Path, number: u32) -> Self {
        Self {
            number,
            base: base.to_path_buf(),
            path: base.join(stack_dir_name(number)),
        }
    }

    /// `stack-v<N>`, also used as the compose project name
    #[must_use]
    pub fn name(&self) -> String {
        stack_dir_name(self.number)
    }

    /// Zero-based offset applied to host ports; 0 for the (invalid) version 0
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.number.saturating_sub(1)
    }
}

#[must_use]
pub fn stack_dir_name(number: u32) -> String {
    format!("{STACK_DIR_PREFIX}{number}")
}

/// Parse a directory name of the form `stack-v<N>`, `N >= 1`
#[must_use]
pub fn parse_stack_dir_name(name: &str) -> Option<u32> {
    VERSION_DIR
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Resolve a possibly relative base directory against `cwd`
pub fn absolutize_base(base: &Utf8Path, cwd: &Utf8Path) -> Result<Utf8PathBuf, StackError> {
    if base.as_str().trim().is_empty() {
        return Err(StackError::Config(ConfigError::InvalidValue {
            key: "base_dir".to_string(),
            value: "must not be empty".to_string(),
        }));
    }
    if base.is_absolute() {
        Ok(base.to_path_buf())
    } else {
        Ok(cwd.join(base))
    }
}

/// Existing version numbers under `base`, ascending
///
/// A missing base directory has no versions.
pub fn scan_versions(base: &Utf8Path) -> Result<Vec<u32>, StackError> {
    let entries = match fs::read_dir(base.as_std_path()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StackError::materialization(base, e)),
    };

    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StackError::materialization(base, e))?;
        let file_name = entry.file_name();
        if let Some(number) = file_name.to_str().and_then(parse_stack_dir_name) {
            versions.push(number);
        }
    }

    versions.sort_unstable();
    Ok(versions)
}

/// Determine the next version and its target path
///
/// Fails with `VersionConflict` if the computed target already exists.
pub fn resolve_next(base: &Utf8Path) -> Result<StackVersion, StackError> {
    let versions = scan_versions(base)?;
    let highest = versions.last().copied().unwrap_or(0);

    let Some(next) = highest.checked_add(1) else {
        return Err(StackError::VersionConflict {
            version: highest,
            path: base.join(stack_dir_name(highest)),
        });
    };

    let version = StackVersion::new(base, next);
    if version.path.exists() {
        return Err(StackError::VersionConflict {
            version: next,
            path: version.path,
        });
    }

    debug!(
        base = %base,
        existing = versions.len(),
        version = next,
        "Resolved next stack version"
    );
    Ok(version)
}
