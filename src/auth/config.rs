/// Bearer tokens starting with this marker carry an access code, not an API key.
pub const ACCESS_CODE_PREFIX: &str = "nk-";

/// Lifetime of signed upstream tokens (in seconds).
/// One hour, matching what the signing providers accept.
pub const SIGNED_TOKEN_TTL: i64 = 3600;

/// One-way digest used for access codes.
///
/// Codes are stored and compared only in this form: lowercase hex SHA-256.
///
/// Example: `hash_access_code("")` →
/// `"e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"`
pub fn hash_access_code(code: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(code.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_access_code_known_vector() {
        assert_eq!(
            hash_access_code("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_access_code_is_stable() {
        let h1 = hash_access_code("team-code");
        let h2 = hash_access_code("team-code");
        assert_eq!(h1, h2);
        // SHA-256 hex is 64 chars
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn test_hash_ignores_surrounding_whitespace() {
        assert_eq!(hash_access_code(" code \n"), hash_access_code("code"));
    }

    #[test]
    fn test_signed_token_ttl() {
        assert_eq!(SIGNED_TOKEN_TTL, 3600);
    }
}
