//! Configuration management for stackgen
//!
//! Hierarchical configuration with discovery and precedence:
//! CLI > file > defaults. The TOML file supports `[defaults]`,
//! `[services.<name>]`, `[models]` and `[tts]` sections.

mod cli_args;
mod discovery;
mod model;
mod sources;
mod template;
mod validation;

pub use cli_args::CliArgs;
pub use discovery::CONFIG_DIR_NAME;
pub use model::*;
pub use stackgen_utils::types::ConfigSource;
pub use template::default_config_toml;
