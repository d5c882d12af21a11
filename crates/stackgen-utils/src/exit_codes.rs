//! Exit code constants and error kind mapping for stackgen.
//!
//! Every fatal generation error has its own exit code so that wrapper scripts
//! can react to a specific failure without parsing stderr.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Stack generated successfully |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments or configuration |
//! | 9 | `LOCK_HELD` | Another process is committing into the same base directory |
//! | 20 | `VERSION_CONFLICT` | Target version directory already exists |
//! | 21 | `UNKNOWN_SERVICE` | Service name not in the catalog |
//! | 22 | `PORT_COLLISION` | Two services resolve to the same host port |
//! | 23 | `MISSING_PARAMETER` | A service lacks a required parameter |
//! | 24 | `TEMPLATE_MISSING` | A descriptor names an unknown installer template |
//! | 25 | `MATERIALIZATION` | Writing the stack directory failed |
//! | 26 | `DANGLING_DEPENDENCY` | A dependency names a service absent from the manifest |
//! | 27 | `PORT_OUT_OF_RANGE` | A resolved host port exceeds 65535 |

use crate::error::StackError;
use crate::types::ErrorKind;

/// Exit codes matching the documented exit code table.
///
/// The numeric values are part of the public CLI contract.
///
/// # Example
///
/// ```rust
/// use stackgen_utils::exit_codes::ExitCode;
///
/// let code = ExitCode::PORT_COLLISION;
/// assert_eq!(code.as_i32(), 22);
/// assert_eq!(ExitCode::SUCCESS, ExitCode::from_i32(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - stack generated and committed
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid flags or configuration file
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Lock held - another generation run is committing into the same base directory
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// Version conflict - the computed `stack-v<N>` directory already exists
    pub const VERSION_CONFLICT: ExitCode = ExitCode(20);

    /// Unknown service - an enabled or configured service is not in the catalog
    pub const UNKNOWN_SERVICE: ExitCode = ExitCode(21);

    /// Port collision - two services claim the same host port
    pub const PORT_COLLISION: ExitCode = ExitCode(22);

    /// Missing parameter - a service definition cannot be fully resolved
    pub const MISSING_PARAMETER: ExitCode = ExitCode(23);

    /// Template missing - a descriptor references an installer template that does not exist
    pub const TEMPLATE_MISSING: ExitCode = ExitCode(24);

    /// Materialization failure - staging or committing the stack directory failed
    pub const MATERIALIZATION: ExitCode = ExitCode(25);

    /// Dangling dependency - `depends_on` names a service that is not in the manifest
    pub const DANGLING_DEPENDENCY: ExitCode = ExitCode(26);

    /// Port out of range - base port plus version offset does not fit in a TCP port
    pub const PORT_OUT_OF_RANGE: ExitCode = ExitCode(27);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

/// Convert `StackError` to (`exit_code`, `error_kind`) tuple
#[must_use]
pub fn error_to_exit_code_and_kind(error: &StackError) -> (ExitCode, ErrorKind) {
    match error {
        StackError::Config(_) => (ExitCode::CLI_ARGS, ErrorKind::CliArgs),
        StackError::VersionConflict { .. } => {
            (ExitCode::VERSION_CONFLICT, ErrorKind::VersionConflict)
        }
        StackError::UnknownService { .. } => (ExitCode::UNKNOWN_SERVICE, ErrorKind::UnknownService),
        StackError::PortCollision { .. } => (ExitCode::PORT_COLLISION, ErrorKind::PortCollision),
        StackError::MissingParameter { .. } => {
            (ExitCode::MISSING_PARAMETER, ErrorKind::MissingParameter)
        }
        StackError::TemplateMissing { .. } => {
            (ExitCode::TEMPLATE_MISSING, ErrorKind::TemplateMissing)
        }
        StackError::Materialization { .. } => {
            (ExitCode::MATERIALIZATION, ErrorKind::MaterializationError)
        }
        StackError::DanglingDependency { .. } => {
            (ExitCode::DANGLING_DEPENDENCY, ErrorKind::DanglingDependency)
        }
        StackError::PortOutOfRange { .. } => {
            (ExitCode::PORT_OUT_OF_RANGE, ErrorKind::PortOutOfRange)
        }
        StackError::ConcurrentGeneration { .. } => (ExitCode::LOCK_HELD, ErrorKind::LockHeld),
    }
}
