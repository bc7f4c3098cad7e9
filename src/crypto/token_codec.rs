/// OAuth token encryption at rest
///
/// Tokens are sealed with Fernet (AES-128-CBC + HMAC-SHA256). The Fernet key is
/// derived from the configured secret with PBKDF2-HMAC-SHA256 once, when the
/// codec is constructed.

use crate::error::{AppError, AppResult};
use base64::{engine::general_purpose::URL_SAFE, Engine};
use fernet::Fernet;
use sha2::Sha256;

/// Fixed salt for key derivation. Changing it invalidates every stored token.
const KEY_SALT: &[u8] = b"linkshelf-oauth-token-salt";

/// PBKDF2 iteration count
const KDF_ITERATIONS: u32 = 100_000;

/// Symmetric codec for OAuth access/refresh tokens
pub struct TokenCodec {
    fernet: Fernet,
}

impl TokenCodec {
    /// Derive the cipher key from `secret`
    pub fn new(secret: &str) -> AppResult<Self> {
        if secret.is_empty() {
            return Err(AppError::Crypto("Encryption secret is empty".to_string()));
        }

        let mut key = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), KEY_SALT, KDF_ITERATIONS, &mut key);

        let encoded = URL_SAFE.encode(key);
        let fernet = Fernet::new(&encoded)
            .ok_or_else(|| AppError::Crypto("Derived key rejected by cipher".to_string()))?;

        Ok(Self { fernet })
    }

    /// Encrypt a token for storage
    pub fn encrypt(&self, plaintext: &str) -> String {
        self.fernet.encrypt(plaintext.as_bytes())
    }

    /// Decrypt a stored token.
    ///
    /// Returns an empty string on any failure. An empty result means the token
    /// is unavailable, never that the token itself is empty.
    pub fn decrypt(&self, ciphertext: &str) -> String {
        if ciphertext.is_empty() {
            return String::new();
        }

        match self.fernet.decrypt(ciphertext) {
            Ok(bytes) => String::from_utf8(bytes).unwrap_or_else(|_| {
                tracing::warn!("Decrypted token is not valid UTF-8");
                String::new()
            }),
            Err(_) => {
                tracing::warn!("Failed to decrypt stored token");
                String::new()
            }
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenCodec { .. }")
    }
}
