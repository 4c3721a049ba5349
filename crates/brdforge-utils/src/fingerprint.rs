//! Deterministic content fingerprinting
//!
//! Fingerprints identify a document by structure, not by formatting: the
//! value is serialized in JCS canonical form (RFC 8785, sorted keys,
//! minimal separators) and the canonical bytes are hashed with BLAKE3.
//! Two structurally equal documents always produce the same digest
//! regardless of key insertion order.

use anyhow::{Context, Result};
use blake3::Hasher;
use serde::Serialize;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// This is the standard way to produce deterministic JSON for hashing and
/// for machine-readable status output.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

/// Compute the content fingerprint of a JSON-like value.
///
/// Returns the lowercase hex BLAKE3 digest of the JCS-canonical bytes.
///
/// # Errors
/// Fails only if the value cannot be represented as JSON.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String> {
    let canonical = canonical_json(value)?;
    let mut hasher = Hasher::new();
    hasher.update(canonical.as_bytes());
    Ok(hasher.finalize().to_hex().to_string())
}
