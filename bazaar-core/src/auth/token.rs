use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use constant_time_eq::constant_time_eq;
use rand::{TryRngCore, rngs::OsRng};

use crate::error::{BazaarError, Result};

/// Raw entropy per token (256 bits).
pub const TOKEN_BYTES: usize = 32;
/// Encoded length of a token: unpadded URL-safe base64 of [`TOKEN_BYTES`].
pub const TOKEN_ENCODED_LEN: usize = 43;

/// Generate an opaque, URL-safe token from the OS CSPRNG.
///
/// Used for both session identifiers and CSRF tokens.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut bytes).map_err(|err| {
        BazaarError::internal(format!("token generation failed: {err}"))
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Cheap structural check run before any store lookup.
///
/// Rejecting foreign shapes up front keeps client-supplied values from ever
/// addressing a non-session key (for example a `user_sessions:` index).
pub fn is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_ENCODED_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Constant-time comparison of two token strings.
pub fn secure_compare(left: &str, right: &str) -> bool {
    let left = left.as_bytes();
    let right = right.as_bytes();

    if left.len() != right.len() {
        return false;
    }

    constant_time_eq(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_well_formed_and_distinct() {
        let first = generate_token().unwrap();
        let second = generate_token().unwrap();

        assert_eq!(first.len(), TOKEN_ENCODED_LEN);
        assert!(is_well_formed(&first));
        assert!(is_well_formed(&second));
        assert_ne!(first, second);
    }

    #[test]
    fn rejects_foreign_shapes() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("user_sessions:42"));
        assert!(!is_well_formed(&"a".repeat(TOKEN_ENCODED_LEN + 1)));
        assert!(!is_well_formed(&format!("{}=", "a".repeat(42))));
        assert!(is_well_formed(&"a".repeat(TOKEN_ENCODED_LEN)));
    }

    #[test]
    fn secure_compare_matches_equality() {
        let token = generate_token().unwrap();
        let other = generate_token().unwrap();

        assert!(secure_compare(&token, &token.clone()));
        assert!(!secure_compare(&token, &other));
        assert!(!secure_compare(&token, &token[..10]));
    }
}
