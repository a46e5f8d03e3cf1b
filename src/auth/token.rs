//! Refresh-token and session-id generation

use crate::error::AppError;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use secrecy::Secret;
use sha2::{Digest, Sha256};

/// Random bytes per token (256 bits)
pub const TOKEN_BYTES: usize = 32;

/// Issues opaque bearer tokens and derives their lookup hashes
pub struct RefreshTokenIssuer;

impl RefreshTokenIssuer {
    /// Generate a new token: 32 bytes from the OS RNG, URL-safe base64 without padding.
    pub fn issue() -> Result<Secret<String>, AppError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| {
            tracing::error!(error = %e, "OS random source unavailable");
            AppError::Hashing(format!("Failed to generate token: {}", e))
        })?;

        Ok(Secret::new(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Lookup hash stored in place of the token (SHA-256, lowercase hex)
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashSet;

    #[test]
    fn test_issue_token_shape() {
        let token = RefreshTokenIssuer::issue().unwrap();
        let token = token.expose_secret();
        // 32 bytes -> 43 base64 chars without padding
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
        assert!(!token.contains('+') && !token.contains('/'));
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000)
            .map(|_| RefreshTokenIssuer::issue().unwrap().expose_secret().clone())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let hash1 = RefreshTokenIssuer::hash("token-a");
        let hash2 = RefreshTokenIssuer::hash("token-a");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, RefreshTokenIssuer::hash("token-b"));
    }

    #[test]
    fn test_hash_length() {
        let token = RefreshTokenIssuer::issue().unwrap();
        let hash = RefreshTokenIssuer::hash(token.expose_secret());
        assert_eq!(hash.len(), 64);
        assert_ne!(&hash, token.expose_secret());
    }
}
