use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Machine-readable error kind, emitted in `--json` failure reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CliArgs,
    LockHeld,
    VersionConflict,
    UnknownService,
    PortCollision,
    MissingParameter,
    TemplateMissing,
    MaterializationError,
    DanglingDependency,
    PortOutOfRange,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CliArgs => "cli_args",
            Self::LockHeld => "lock_held",
            Self::VersionConflict => "version_conflict",
            Self::UnknownService => "unknown_service",
            Self::PortCollision => "port_collision",
            Self::MissingParameter => "missing_parameter",
            Self::TemplateMissing => "template_missing",
            Self::MaterializationError => "materialization_error",
            Self::DanglingDependency => "dangling_dependency",
            Self::PortOutOfRange => "port_out_of_range",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an effective configuration value came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Value from a command-line flag
    Cli,
    /// Value from a discovered or explicit config file
    ConfigFile(PathBuf),
    /// Built-in default
    Defaults,
}

impl ConfigSource {
    /// Stable short label used in `stackgen config` output
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::ConfigFile(_) => "config",
            Self::Defaults => "default",
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::ConfigFile(path) => write!(f, "config ({})", path.display()),
            Self::Defaults => write!(f, "default"),
        }
    }
}
