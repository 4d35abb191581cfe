//! BLAKE3 hashing for prompt digests and deterministic record identifiers.
//!
//! Every record the pipeline writes is keyed by an ID derived from its natural key, so
//! a redelivered event maps onto the record it already produced instead of creating
//! a duplicate.

use blake3::Hasher;

/// Number of hex characters kept for derived record IDs (128 bits).
pub const RECORD_ID_HEX_LEN: usize = 32;

/// Full 256-bit hex digest of a prompt, as stored on DFN records.
#[inline]
pub fn prompt_digest(prompt: &str) -> String {
    blake3::hash(prompt.as_bytes()).to_hex().to_string()
}

/// First 64 bits of a BLAKE3 digest, little-endian.
fn truncate_u64(hash: blake3::Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Hashes a domain tag plus ordered parts into a hex record ID.
///
/// Parts are length-prefixed so `("ab", "c")` and `("a", "bc")` never collide.
pub fn derive_record_id(domain: &str, parts: &[&str]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update(b"|");
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    hex[..RECORD_ID_HEX_LEN].to_string()
}

/// DFN ID from `(speaker, source draft, vector version, attempt key)`.
#[inline]
pub fn dfn_id(
    speaker_id: &str,
    source_draft_id: &str,
    vector_version: u64,
    attempt_key: &str,
) -> String {
    let version = vector_version.to_string();
    derive_record_id("dfn", &[speaker_id, source_draft_id, &version, attempt_key])
}

/// Evaluation ID; one evaluation per DFN.
#[inline]
pub fn evaluation_id(dfn_id: &str) -> String {
    derive_record_id("evaluation", &[dfn_id])
}

/// Vector index point ID for a speaker's correction-vector version.
///
/// Truncated to 64 bits. A collision would make two speaker versions share a point, so
/// the payload carries the full `(speaker_id, version)` pair and readers check it.
#[inline]
pub fn vector_point_id(speaker_id: &str, version: u64) -> u64 {
    let mut hasher = Hasher::new();
    hasher.update(b"correction-vector|");
    hasher.update(speaker_id.as_bytes());
    hasher.update(b"|");
    hasher.update(&version.to_le_bytes());
    truncate_u64(hasher.finalize())
}

/// Fingerprint of a correction-vector build input: sorted pair keys plus the
/// parameters that change the output.
pub fn build_fingerprint(pair_keys: &[String], min_frequency: u32, max_ngram: usize) -> String {
    let mut sorted: Vec<&str> = pair_keys.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let params = format!("min_frequency={min_frequency};max_ngram={max_ngram}");
    let mut parts = Vec::with_capacity(sorted.len() + 1);
    parts.push(params.as_str());
    parts.extend(sorted);
    derive_record_id("vector-build", &parts)
}
