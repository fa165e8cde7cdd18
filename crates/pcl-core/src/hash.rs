//! Content hashes used to key cached operators and to detect mismatched inputs.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::PclError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable SHA256 hash for the provided serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, PclError> {
    let bytes = to_canonical_json_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(format!("{:x}", digest))
}

/// Hashes a labelled sequence of `f64` arrays bit-exactly.
///
/// Two inputs hash equal only when every value has the same bit pattern,
/// which is the identity notion used for windows and beams.
pub fn hash_f64_arrays<'a>(label: &str, arrays: impl IntoIterator<Item = &'a [f64]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update((label.len() as u64).to_le_bytes());
    hasher.update(label.as_bytes());
    for array in arrays {
        hasher.update((array.len() as u64).to_le_bytes());
        for value in array {
            hasher.update(value.to_bits().to_le_bytes());
        }
    }
    format!("{:x}", hasher.finalize())
}
