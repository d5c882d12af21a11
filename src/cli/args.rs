//! CLI argument definitions and parsing structures

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use crate::CliArgs;

/// stackgen - versioned CPU-only AI stack generator
#[derive(Parser, Debug)]
#[command(name = "stackgen")]
#[command(about = "Generate versioned, self-contained CPU-only AI container stacks")]
#[command(long_about = r#"
stackgen writes a new, immutable stack-v<N> directory on every run: a compose
manifest, one idempotent installer per service, an install.sh driver that runs
them in order, and supporting scripts. Existing versions are never modified.

EXAMPLES:
  # First stack under ./stacks (required services only)
  stackgen generate --base ./stacks

  # Next version with the OpenAI-compatible TTS adapter
  stackgen generate --base ./stacks --enable tts-adapter

  # Machine-readable result, plus a tar.gz of the stack
  stackgen generate --base ./stacks --archive --json

  # Existing versions and the service catalog
  stackgen list --base ./stacks
  stackgen services

CONFIGURATION:
  Precedence: CLI flags > config file > defaults
  The config file is found by searching upward from CWD for .stackgen/config.toml
  Use --config to give an explicit path, `stackgen init` to create one
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output (debug logs with stage timings on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate the next stack version
    Generate {
        /// Base directory that holds stack-v<N> directories
        #[arg(long, value_name = "DIR")]
        base: Option<String>,

        /// Enable an optional service (repeatable; replaces the config list)
        #[arg(long = "enable", value_name = "SERVICE")]
        enable: Vec<String>,

        /// Host port offset between consecutive versions
        #[arg(long, value_name = "N")]
        port_stride: Option<u16>,

        /// Also write stack-v<N>.tar.gz inside the version directory
        #[arg(long)]
        archive: bool,

        /// Print the result as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// List existing stack versions
    List {
        /// Base directory that holds stack-v<N> directories
        #[arg(long, value_name = "DIR")]
        base: Option<String>,

        /// Print the result as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the service catalog after config overrides
    Services {
        /// Print the result as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration and where each value came from
    Config {
        /// Print the result as canonical JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a commented .stackgen/config.toml in the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Subcommand name, used in error reports
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::List { .. } => "list",
            Self::Services { .. } => "services",
            Self::Config { .. } => "config",
            Self::Init { .. } => "init",
        }
    }

    /// Whether results, and failures, are reported as JSON
    #[must_use]
    pub fn json(&self) -> bool {
        match self {
            Self::Generate { json, .. }
            | Self::List { json, .. }
            | Self::Services { json }
            | Self::Config { json } => *json,
            Self::Init { .. } => false,
        }
    }
}

impl Cli {
    /// Values that override the config file
    #[must_use]
    pub fn config_overrides(&self) -> CliArgs {
        let mut args = CliArgs {
            config_path: self.config.clone(),
            ..CliArgs::default()
        };

        match &self.command {
            Commands::Generate {
                base,
                enable,
                port_stride,
                archive,
                ..
            } => {
                args.base_dir = base.clone();
                args.enable = enable.clone();
                args.port_stride = *port_stride;
                args.archive = archive.then_some(true);
            }
            Commands::List { base, .. } => {
                args.base_dir = base.clone();
            }
            Commands::Services { .. } | Commands::Config { .. } | Commands::Init { .. } => {}
        }

        args
    }
}

/// Build the clap command, for completions and tests
#[must_use]
pub fn build_cli() -> clap::Command {
    Cli::command()
}
