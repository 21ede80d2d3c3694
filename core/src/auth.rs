use sha2::{Digest, Sha256};

/// SHA-256 digest of a secret string.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Compare a presented credential against the configured shared secret.
///
/// Both sides are hashed first so the comparison runs over fixed-length
/// digests and does not short-circuit on the first differing byte.
pub fn secret_matches(presented: &str, expected: &str) -> bool {
    if presented.is_empty() || expected.is_empty() {
        return false;
    }
    let left = hash_token(presented);
    let right = hash_token(expected);
    left.iter()
        .zip(right.iter())
        .fold(0_u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
