//! Optional `stack-v<N>.tar.gz` bundle
//!
//! Built from the in-memory artifact set so it lands in the staging
//! directory and is committed by the same rename as everything else.
//! Entries carry fixed ownership and the generation timestamp as mtime, so
//! identical inputs give identical bytes.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io;

use crate::artifacts::ArtifactSet;

#[must_use]
pub fn archive_file_name(stack_name: &str) -> String {
    format!("{stack_name}.tar.gz")
}

/// Gzipped tar of `artifacts`, each entry under `<stack_name>/`
pub fn build_archive(stack_name: &str, artifacts: &ArtifactSet, mtime: u64) -> io::Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::best());
    let mut builder = tar::Builder::new(encoder);

    for artifact in artifacts {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(artifact.contents.len() as u64);
        header.set_mode(if artifact.executable { 0o755 } else { 0o644 });
        header.set_mtime(mtime);
        header.set_uid(0);
        header.set_gid(0);
        builder.append_data(
            &mut header,
            format!("{stack_name}/{}", artifact.path),
            artifact.contents.as_slice(),
        )?;
    }

    builder.into_inner()?.finish()
}
