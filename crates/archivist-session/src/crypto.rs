//! Session envelope encryption: an authenticated symmetric
//! cipher keyed by SHA-256 of a configured secret. Plaintext is never
//! persisted — only `{ciphertext, session_id}` reaches the Cache/Broker.

use crate::error::{Result, SessionError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

pub struct SessionCipher {
    cipher: Aes256Gcm,
}

impl SessionCipher {
    /// Derives a 256-bit key from `secret` via SHA-256.
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self { cipher: Aes256Gcm::new(key) }
    }

    /// `nonce || ciphertext`, so each envelope carries its own nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let mut ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| SessionError::Encryption(e.to_string()))?;
        let mut out = nonce_bytes.to_vec();
        out.append(&mut ciphertext);
        Ok(out)
    }

    /// A decrypt failure (truncated envelope, authentication failure, or
    /// wrong key) is surfaced as an error; the caller treats it as
    /// `session_missing` and logs at WARN rather than propagating it
    /// further up.
    pub fn decrypt(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        if envelope.len() < NONCE_LEN {
            return Err(SessionError::Encryption("envelope shorter than nonce".to_string()));
        }
        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| SessionError::Encryption(e.to_string()))
    }
}

/// A cryptographically random 256-bit session id, URL-safe encoded.
pub fn generate_session_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let cipher = SessionCipher::new("top-secret");
        let ciphertext = cipher.encrypt(b"hello session").unwrap();
        let plaintext = cipher.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, b"hello session");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let ciphertext = SessionCipher::new("secret-a").encrypt(b"payload").unwrap();
        let result = SessionCipher::new("secret-b").decrypt(&ciphertext);
        assert!(result.is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = SessionCipher::new("top-secret");
        let mut ciphertext = cipher.encrypt(b"payload").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(cipher.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn session_ids_are_unique_and_url_safe() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
