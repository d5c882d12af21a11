use camino::Utf8PathBuf;
use std::fmt;
use std::io;
use thiserror::Error;

use crate::exit_codes::{ExitCode, error_to_exit_code_and_kind};
use crate::types::ErrorKind;

/// Library-level error type for a generation run.
///
/// Every variant is fatal to the run. Generation has no side effects until the
/// final rename, so a caller that receives any of these can retry safely.
///
/// # Exit Code Mapping
///
/// Use [`to_exit_code()`](Self::to_exit_code) to map errors to CLI exit codes;
/// see [`crate::exit_codes`] for the table.
///
/// # Example
///
/// ```rust
/// use stackgen_utils::error::StackError;
/// use stackgen_utils::exit_codes::ExitCode;
///
/// let err = StackError::MissingParameter {
///     service: "ollama".to_string(),
///     parameter: "image".to_string(),
/// };
/// assert_eq!(err.to_exit_code(), ExitCode::MISSING_PARAMETER);
/// assert!(err.display_for_user().contains("ollama"));
/// ```
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Version conflict: stack-v{version} already exists at {path}")]
    VersionConflict { version: u32, path: Utf8PathBuf },

    #[error("Unknown service '{name}'")]
    UnknownService { name: String, known: Vec<String> },

    #[error("Port collision: '{first}' and '{second}' both claim host port {port}")]
    PortCollision {
        port: u16,
        first: String,
        second: String,
    },

    #[error("Service '{service}' is missing required parameter '{parameter}'")]
    MissingParameter { service: String, parameter: String },

    #[error("Service '{service}' references unknown installer template '{template}'")]
    TemplateMissing { service: String, template: String },

    #[error("Failed to materialize {path}: {source}")]
    Materialization {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Service '{service}' depends on '{dependency}', which is not in the manifest")]
    DanglingDependency { service: String, dependency: String },

    #[error("Service '{service}' resolves to host port {port}, outside 1-65535")]
    PortOutOfRange { service: String, port: u32 },

    #[error("Concurrent generation detected in {base}: {reason}")]
    ConcurrentGeneration { base: Utf8PathBuf, reason: String },
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Catalog,
    Synthesis,
    Composition,
    FileSystem,
    Concurrency,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Catalog => write!(f, "Service Catalog"),
            Self::Synthesis => write!(f, "Manifest Synthesis"),
            Self::Composition => write!(f, "Script Composition"),
            Self::FileSystem => write!(f, "File System"),
            Self::Concurrency => write!(f, "Concurrency"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => {
                format!("Configuration file has invalid format: {reason}")
            }
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has invalid value: {value}")
            }
            Self::NotFound { path } => format!("Configuration file not found: {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Failed to discover configuration: {reason}")
            }
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::InvalidFile(_) => Some(
                "stackgen reads TOML with [defaults], [services.<name>], [models] and [tts] sections"
                    .to_string(),
            ),
            Self::NotFound { .. } => Some(
                "An explicit --config path must point at an existing file".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .stackgen/config.toml".to_string(),
                "Run 'stackgen init --force' to regenerate a default configuration".to_string(),
            ],
            Self::InvalidValue { key, .. } => match key.as_str() {
                "port_stride" => vec!["Use a positive integer, e.g. port_stride = 10".to_string()],
                "base_dir" => vec!["Use a directory path, e.g. base_dir = \"/srv/stack\"".to_string()],
                _ => vec!["Remove the option to use the default value".to_string()],
            },
            Self::NotFound { .. } => vec![
                "Run 'stackgen init' to create .stackgen/config.toml".to_string(),
                "Omit --config to use discovery and built-in defaults".to_string(),
            ],
            Self::DiscoveryFailed { .. } => vec![
                "Check read permissions on the current directory and its parents".to_string(),
                "Use --config <path> to specify the configuration file explicitly".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

impl UserFriendlyError for StackError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Materialization { path, source } => {
                format!("Could not write the stack directory at {path}: {source}")
            }
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::VersionConflict { version, .. } => Some(format!(
                "Another run or a manual mkdir created stack-v{version} after the version scan"
            )),
            Self::UnknownService { known, .. } => {
                Some(format!("Known services: {}", known.join(", ")))
            }
            Self::PortCollision { .. } => Some(
                "Host ports are the configured base port plus (version - 1) * port_stride"
                    .to_string(),
            ),
            Self::Materialization { .. } => Some(
                "The staging directory was discarded; no stack directory was created".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::VersionConflict { .. } => vec![
                "Re-run stackgen; the next free version will be selected".to_string(),
                "Remove the empty or stray directory if it was created by hand".to_string(),
            ],
            Self::UnknownService { .. } => {
                vec!["Run 'stackgen services' to list the catalog".to_string()]
            }
            Self::PortCollision { .. } => vec![
                "Change host_port for one of the services in [services.<name>]".to_string(),
                "Increase [defaults] port_stride if stacks overlap".to_string(),
            ],
            Self::MissingParameter { service, parameter } => vec![format!(
                "Set '{parameter}' under [services.{service}.params] or restore the default"
            )],
            Self::TemplateMissing { .. } => vec![
                "Installer templates are built in; check the service's template name".to_string(),
            ],
            Self::Materialization { .. } => vec![
                "Check free space and write permission on the base directory".to_string(),
                "Re-run stackgen; nothing was committed".to_string(),
            ],
            Self::DanglingDependency { dependency, .. } => vec![format!(
                "Enable '{dependency}' or remove it from the dependency list"
            )],
            Self::PortOutOfRange { .. } => vec![
                "Lower the base host_port or [defaults] port_stride".to_string(),
                "Prune old stack versions from the base directory".to_string(),
            ],
            Self::ConcurrentGeneration { .. } => vec![
                "Wait for the other stackgen process to finish and retry".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::UnknownService { .. } => ErrorCategory::Catalog,
            Self::PortCollision { .. }
            | Self::MissingParameter { .. }
            | Self::DanglingDependency { .. }
            | Self::PortOutOfRange { .. } => ErrorCategory::Synthesis,
            Self::TemplateMissing { .. } => ErrorCategory::Composition,
            Self::Materialization { .. } => ErrorCategory::FileSystem,
            Self::VersionConflict { .. } | Self::ConcurrentGeneration { .. } => {
                ErrorCategory::Concurrency
            }
        }
    }
}

impl StackError {
    /// Get a user-friendly error message with context and actionable suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {ctx}\n"));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }

        output
    }

    /// Map this error to the appropriate CLI exit code.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        error_to_exit_code_and_kind(self).0
    }

    /// Machine-readable kind for JSON reports.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        error_to_exit_code_and_kind(self).1
    }

    /// Wrap an I/O failure at `path` as a materialization error.
    pub fn materialization(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::Materialization {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_port_collision_names_both_services_and_port() {
        let err = StackError::PortCollision {
            port: 3000,
            first: "open-webui".to_string(),
            second: "comfyui".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("open-webui"));
        assert!(msg.contains("comfyui"));
        assert!(msg.contains("3000"));
        assert_eq!(err.category(), ErrorCategory::Synthesis);
    }

    #[test]
    fn test_materialization_keeps_io_source() {
        let err = StackError::materialization(
            "/stack/.stack-v3.staging",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let source = err.source().expect("io source preserved");
        assert!(source.to_string().contains("denied"));
        assert!(err.display_for_user().contains("no stack directory was created"));
    }

    #[test]
    fn test_unknown_service_context_lists_catalog() {
        let err = StackError::UnknownService {
            name: "whisper".to_string(),
            known: vec!["ollama".to_string(), "tts-adapter".to_string()],
        };
        let report = err.display_for_user();
        assert!(report.starts_with("Error: Unknown service 'whisper'"));
        assert!(report.contains("Known services: ollama, tts-adapter"));
        assert!(report.contains("Suggestions:"));
    }

    #[test]
    fn test_config_error_wraps_into_stack_error() {
        let err: StackError = ConfigError::InvalidValue {
            key: "port_stride".to_string(),
            value: "0".to_string(),
        }
        .into();
        assert_eq!(err.to_exit_code(), ExitCode::CLI_ARGS);
        assert!(
            err.suggestions()
                .iter()
                .any(|s| s.contains("port_stride = 10"))
        );
    }
}
