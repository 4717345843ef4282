//! Content fingerprints.

use sha2::{Digest, Sha256};

/// Length in characters of a hex-encoded fingerprint.
pub const FINGERPRINT_LEN: usize = 64;

/// Compute the SHA-256 fingerprint of `data` as lowercase hex.
pub fn compute_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Returns `true` if `value` has the shape of a fingerprint produced by
/// [`compute_hash`]. Used to keep arbitrary strings out of store paths.
pub fn is_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            compute_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_fixed_length_and_valid_shape() {
        for input in [&b""[..], b"a", &[0u8; 4096]] {
            let hash = compute_hash(input);
            assert_eq!(hash.len(), FINGERPRINT_LEN);
            assert!(is_fingerprint(&hash));
        }
    }

    #[test]
    fn test_distinct_inputs_distinct_hashes() {
        assert_ne!(compute_hash(b"version one"), compute_hash(b"version two"));
    }

    #[test]
    fn test_rejects_non_fingerprints() {
        assert!(!is_fingerprint(""));
        assert!(!is_fingerprint("../../etc/passwd"));
        assert!(!is_fingerprint(&"A".repeat(FINGERPRINT_LEN)));
        assert!(!is_fingerprint(&"a".repeat(FINGERPRINT_LEN - 1)));
    }
}
