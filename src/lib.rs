//! stackgen - versioned generator for a modular CPU-only AI container stack
//!
//! Each run writes a new, immutable `stack-v<N>` directory under a base
//! directory: a compose manifest, one idempotent installer script per
//! service, a driver script that runs them in order, and supporting files.
//! Earlier versions are never touched.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! # Generate the next version under ./stacks with the TTS adapter enabled
//! stackgen generate --base ./stacks --enable tts-adapter
//!
//! # List generated versions
//! stackgen list --base ./stacks
//!
//! # Show the service catalog
//! stackgen services
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use stackgen::{GenerationRequest, generate};
//!
//! let outcome = generate(&GenerationRequest::new("/srv/stacks"))?;
//! println!("{} -> {}", outcome.stack, outcome.path);
//! # Ok::<(), stackgen::StackError>(())
//! ```
//!
//! # Exit codes
//!
//! Every fatal error kind has a distinct [`ExitCode`]; see
//! [`stackgen_utils::exit_codes`].

pub mod cli;

pub use stackgen_config::{CliArgs, Config, ConfigSource};
pub use stackgen_engine::{
    GenerationOutcome, GenerationRequest, Generator, OrchestrationManifest, ServiceCatalog,
    ServiceDescriptor, ServiceKind, Stage, StackVersion, generate,
};
pub use stackgen_utils::canonicalization::emit_jcs;
pub use stackgen_utils::error::{ConfigError, StackError, UserFriendlyError};
pub use stackgen_utils::exit_codes::ExitCode;
