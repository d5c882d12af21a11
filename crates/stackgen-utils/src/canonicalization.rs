//! Deterministic JSON emission and content hashing
//!
//! `stack.json` and `--json` reports are emitted in JCS (RFC 8785) canonical
//! form so that two runs with identical inputs produce byte-identical output.

use anyhow::{Context, Result};
use serde::Serialize;

/// Emit JSON in JCS (RFC 8785) canonical form
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// BLAKE3 digest of `bytes`, lowercase hex
#[must_use]
pub fn blake3_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
