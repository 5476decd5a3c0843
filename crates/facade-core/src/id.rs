//! Deterministic document ids.
//!
//! Ids are a pure function of an entity's identifying fields, so saving an
//! entity twice overwrites the same document.

use sha2::{Digest, Sha256};

/// Separator between id components. Not valid in any component.
const SEPARATOR: u8 = 0x1f;

/// Hashes the given identifying parts into a stable hex id.
///
/// # Example
///
/// ```
/// use facade_core::id::document_id;
///
/// let a = document_id(&["gitea", "platform", "billing"]);
/// let b = document_id(&["gitea", "platform", "billing"]);
/// assert_eq!(a, b);
/// assert_ne!(a, document_id(&["gitea", "platformbilling", ""]));
/// ```
pub fn document_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([SEPARATOR]);
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_stable() {
        assert_eq!(document_id(&["a", "b"]), document_id(&["a", "b"]));
    }

    #[test]
    fn test_id_respects_boundaries() {
        assert_ne!(document_id(&["ab", "c"]), document_id(&["a", "bc"]));
    }

    #[test]
    fn test_id_is_hex_sha256() {
        let id = document_id(&["x"]);
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
