//! Atomic and durable file operations
//!
//! - `write_file_atomic`: temp file in the target directory, fsync, rename
//! - `write_file_synced`: plain create-new write with fsync, used inside a
//!   private staging directory where the directory rename is the commit point
//! - `set_executable`: mark installer scripts `0755` on Unix

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use std::io::{self, Write};

use tempfile::NamedTempFile;

/// Result of an atomic write operation
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Whether the target already existed and was replaced
    pub replaced_existing: bool,
    /// Bytes written after line-ending normalization
    pub bytes_written: usize,
}

/// Atomically write content to a file using temp file + fsync + rename.
///
/// Content is normalized to LF line endings. Readers observe either the old
/// file or the complete new one.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    let normalized_content = normalize_line_endings(content);
    let replaced_existing = path.exists();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {parent}"))?;
    }

    let temp_dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let mut temp_file = NamedTempFile::new_in(temp_dir)
        .with_context(|| format!("Failed to create temporary file in: {temp_dir}"))?;

    temp_file
        .write_all(normalized_content.as_bytes())
        .with_context(|| "Failed to write content to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .with_context(|| "Failed to fsync temporary file")?;

    temp_file
        .persist(path.as_std_path())
        .map_err(|e| anyhow::anyhow!(e.error))
        .with_context(|| format!("Failed to atomically write file: {path}"))?;

    Ok(AtomicWriteResult {
        replaced_existing,
        bytes_written: normalized_content.len(),
    })
}

/// Write bytes to a new file and fsync it.
///
/// Fails if the file already exists. Parent directories are created.
pub fn write_file_synced(path: &Utf8Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path.as_std_path())?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Mark a file executable for user/group/others (`0755`).
#[cfg(unix)]
pub fn set_executable(path: &Utf8Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path.as_std_path())?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path.as_std_path(), perms)
}

/// Mark a file executable (no-op where the platform has no mode bits).
#[cfg(not(unix))]
pub fn set_executable(_path: &Utf8Path) -> io::Result<()> {
    Ok(())
}

/// fsync a directory so a completed rename survives a crash.
#[cfg(unix)]
pub fn sync_dir(path: &Utf8Path) -> io::Result<()> {
    fs::File::open(path.as_std_path())?.sync_all()
}

/// fsync a directory (unsupported on this platform; no-op).
#[cfg(not(unix))]
pub fn sync_dir(_path: &Utf8Path) -> io::Result<()> {
    Ok(())
}

/// Normalize line endings to LF
pub fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}
