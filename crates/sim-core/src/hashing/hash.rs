//! Hash helpers, abstracted so the algorithm can change without touching
//! callers. BLAKE3 is used for its speed and stable hex output.

use super::canonical_json::to_canonical_json;
use blake3::Hasher;
use serde_json::Value;

pub fn hash_str(input: &str) -> String {
    let mut h = Hasher::new();
    h.update(input.as_bytes());
    h.finalize().to_hex().to_string()
}

/// Hashes a JSON value after canonicalising it.
pub fn hash_value(v: &Value) -> String {
    hash_str(&to_canonical_json(v))
}
