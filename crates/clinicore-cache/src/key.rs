//! Physical cache key derivation.
//!
//! ## Key Format
//!
//! `{prefix}:{key}` when a prefix is given, the logical key alone
//! otherwise. Keys longer than [`MAX_KEY_LENGTH`] are replaced by
//! `{prefix}:hash:{sha256-hex}` (or `hash:{sha256-hex}` without a prefix)
//! so the backing store never sees an oversized key. Derivation is pure
//! and deterministic: identical inputs always yield the same physical key.

use sha2::{Digest, Sha256};

/// Longest physical key passed to the backing store as-is.
pub const MAX_KEY_LENGTH: usize = 250;

/// Derive the physical key for a (logical key, optional prefix) pair.
pub fn build_key(key: &str, prefix: Option<&str>) -> String {
    let naive = match prefix {
        Some(p) => format!("{p}:{key}"),
        None => key.to_string(),
    };

    if naive.len() <= MAX_KEY_LENGTH {
        return naive;
    }

    let mut hasher = Sha256::new();
    hasher.update(naive.as_bytes());
    let digest = hex::encode(hasher.finalize());

    match prefix {
        Some(p) => format!("{p}:hash:{digest}"),
        None => format!("hash:{digest}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key_passes_through() {
        assert_eq!(build_key("proc:42", None), "proc:42");
        assert_eq!(build_key("proc:42", Some("procedures")), "procedures:proc:42");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let long = "a".repeat(300);
        assert_eq!(build_key(&long, None), build_key(&long, None));
        assert_eq!(
            build_key(&long, Some("patients")),
            build_key(&long, Some("patients"))
        );
    }

    #[test]
    fn test_oversized_key_is_hashed() {
        let long = "a".repeat(300);
        let physical = build_key(&long, None);

        assert!(physical.starts_with("hash:"));
        let digest = physical.strip_prefix("hash:").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_oversized_key_with_prefix() {
        let long = "b".repeat(260);
        let physical = build_key(&long, Some("appointments"));

        assert!(physical.starts_with("appointments:hash:"));
        assert_eq!(physical.split(':').nth(2).unwrap().len(), 64);
    }

    #[test]
    fn test_260_char_key_reproduces_same_physical_key() {
        let key = "a".repeat(260);
        let first = build_key(&key, None);
        let second = build_key(&key, None);

        assert!(first.starts_with("hash:"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_boundary_length_is_not_hashed() {
        let key = "k".repeat(MAX_KEY_LENGTH);
        assert_eq!(build_key(&key, None), key);

        let key = "k".repeat(MAX_KEY_LENGTH + 1);
        assert!(build_key(&key, None).starts_with("hash:"));
    }

    #[test]
    fn test_prefix_changes_physical_key() {
        assert_ne!(build_key("42", Some("patients")), build_key("42", Some("billing")));
    }
}
