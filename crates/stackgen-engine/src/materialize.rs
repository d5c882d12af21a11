//! Directory Materializer
//!
//! Writes an [`ArtifactSet`] to `<base>/stack-v<N>` atomically: every file
//! goes into a staging directory next to the target, and the staging
//! directory is renamed into place only after all writes succeeded. On any
//! failure the staging directory is removed and the target never appears.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use tracing::{debug, warn};

use stackgen_lock::{BaseLock, LockError};
use stackgen_utils::atomic_write::{set_executable, sync_dir, write_file_synced};
use stackgen_utils::error::StackError;

use crate::artifacts::ArtifactSet;
use crate::version::StackVersion;

/// Sink for staged files
///
/// `path` is absolute and inside the staging directory; parent directories
/// may not exist yet.
pub trait StagingWriter {
    fn write(&mut self, path: &Utf8Path, contents: &[u8]) -> io::Result<()>;
}

/// Writes with `create_new` and fsync
#[derive(Debug, Default, Clone, Copy)]
pub struct FsWriter;

impl StagingWriter for FsWriter {
    fn write(&mut self, path: &Utf8Path, contents: &[u8]) -> io::Result<()> {
        write_file_synced(path, contents)
    }
}

/// Commits artifact sets into version directories
#[derive(Debug, Default)]
pub struct Materializer<W = FsWriter> {
    writer: W,
}

impl Materializer<FsWriter> {
    #[must_use]
    pub fn new() -> Self {
        Self { writer: FsWriter }
    }
}

impl<W: StagingWriter> Materializer<W> {
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Write `artifacts` to `version.path`, all or nothing
    ///
    /// Returns the committed path. Fails with `VersionConflict` if the target
    /// exists at commit time, `ConcurrentGeneration` if another process holds
    /// the base lock, and `Materialization` for any I/O failure. A base
    /// directory created by this call is removed again on failure.
    pub fn materialize(
        &mut self,
        version: &StackVersion,
        artifacts: &ArtifactSet,
    ) -> Result<Utf8PathBuf, StackError> {
        let created = ensure_base(&version.base)?;
        let result = self.stage_and_commit(version, artifacts);
        if result.is_err() {
            remove_created(&created);
        }
        result
    }

    fn stage_and_commit(
        &mut self,
        version: &StackVersion,
        artifacts: &ArtifactSet,
    ) -> Result<Utf8PathBuf, StackError> {
        let base = &version.base;
        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}.staging-", version.name()))
            .tempdir_in(base)
            .map_err(|e| StackError::materialization(base.as_path(), e))?;
        let staging_path = Utf8Path::from_path(staging.path())
            .ok_or_else(|| {
                StackError::materialization(
                    base.as_path(),
                    io::Error::new(io::ErrorKind::InvalidData, "staging path is not UTF-8"),
                )
            })?
            .to_path_buf();
        debug!(staging = %staging_path, files = artifacts.len(), "Staging artifacts");

        for artifact in artifacts {
            let path = staging_path.join(&artifact.path);
            self.writer
                .write(&path, &artifact.contents)
                .map_err(|e| StackError::materialization(version.path.join(&artifact.path), e))?;
            if artifact.executable {
                set_executable(&path)
                    .map_err(|e| StackError::materialization(version.path.join(&artifact.path), e))?;
            }
        }
        publish_mode(&staging_path).map_err(|e| StackError::materialization(&staging_path, e))?;

        let lock = BaseLock::acquire(base, &format!("commit {}", version.name()))
            .map_err(|e| lock_error(base, e))?;

        if version.path.exists() {
            return Err(StackError::VersionConflict {
                version: version.number,
                path: version.path.clone(),
            });
        }
        fs::rename(&staging_path, &version.path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty => {
                StackError::VersionConflict {
                    version: version.number,
                    path: version.path.clone(),
                }
            }
            _ => StackError::materialization(version.path.as_path(), e),
        })?;
        let _ = staging.keep();

        if let Err(e) = sync_dir(base) {
            warn!(base = %base, error = %e, "Failed to sync base directory after commit");
        }
        if let Err(e) = lock.release() {
            warn!(base = %base, error = %e, "Failed to release base lock");
        }
        Ok(version.path.clone())
    }
}

fn lock_error(base: &Utf8Path, err: LockError) -> StackError {
    match err {
        LockError::Io(e) => StackError::materialization(BaseLock::lock_path(base), e),
        other => StackError::ConcurrentGeneration {
            base: base.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

/// Create `base` and any missing ancestors; returns what was created,
/// outermost first
fn ensure_base(base: &Utf8Path) -> Result<Vec<Utf8PathBuf>, StackError> {
    let mut missing = Vec::new();
    let mut cursor = Some(base);
    while let Some(dir) = cursor {
        if dir.as_str().is_empty() || dir.exists() {
            break;
        }
        missing.push(dir.to_path_buf());
        cursor = dir.parent();
    }
    missing.reverse();

    let mut created = Vec::with_capacity(missing.len());
    for dir in missing {
        match fs::create_dir(&dir) {
            Ok(()) => created.push(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                remove_created(&created);
                return Err(StackError::materialization(dir, e));
            }
        }
    }
    if !created.is_empty() {
        debug!(base = %base, created = created.len(), "Created base directory");
    }
    Ok(created)
}

/// Remove directories from [`ensure_base`], deepest first; non-empty ones stay
fn remove_created(created: &[Utf8PathBuf]) {
    for dir in created.iter().rev() {
        if let Err(e) = fs::remove_dir(dir) {
            debug!(dir = %dir, error = %e, "Leaving directory in place");
        }
    }
}

#[cfg(unix)]
fn publish_mode(dir: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn publish_mode(_dir: &Utf8Path) -> io::Result<()> {
    Ok(())
}
