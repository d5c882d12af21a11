//! Core of stackgen: turns a base directory and a set of enabled optional
//! services into a new, immutable `stack-v<N>` directory.
//!
//! Modules follow the pipeline order:
//!
//! 1. [`version`]: pick the next free version under the base directory
//! 2. [`catalog`]: the fixed service catalog and selection
//! 3. [`manifest`]: resolve parameters and ports into a compose manifest
//! 4. [`scripts`]: render installer scripts and the driver
//! 5. [`materialize`]: stage every artifact and rename into place
//!
//! [`pipeline`] ties them together.

pub mod archive;
pub mod artifacts;
pub mod catalog;
pub mod manifest;
pub mod materialize;
pub mod params;
pub mod pipeline;
pub mod scripts;
pub mod templates;
pub mod version;

pub use artifacts::{Artifact, ArtifactSet, StackMetadata};
pub use catalog::{
    PortAlias, Requirement, ServiceCatalog, ServiceDescriptor, ServiceKind, port_alias,
};
pub use manifest::{OrchestrationManifest, PortMapping, ResolvedService, synthesize};
pub use materialize::{FsWriter, Materializer, StagingWriter};
pub use pipeline::{GenerationOutcome, GenerationRequest, Generator, Stage, generate};
pub use scripts::{InstallerScript, ScriptSet, ScriptTemplate, compose_scripts};
pub use version::{StackVersion, resolve_next, scan_versions};
