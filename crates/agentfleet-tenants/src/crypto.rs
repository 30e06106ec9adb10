//! AES-256-GCM credential encryption. Packing format: `enc:` + base64(nonce
//! || ciphertext+tag), matching the convention used for encrypted-at-rest
//! fields elsewhere in the corpus.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use rand::RngCore;

use crate::error::{Result, TenantError};

const ENC_PREFIX: &str = "enc:";

/// Decode a base64-encoded 32-byte key from `credentials encryption key` config.
pub fn decode_key(b64: &str) -> Result<[u8; 32]> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| TenantError::Crypto(format!("invalid base64 encryption key: {e}")))?;
    raw.try_into()
        .map_err(|_| TenantError::Crypto("encryption key must decode to exactly 32 bytes".into()))
}

pub fn encrypt(plaintext: &str, key: &[u8; 32]) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| TenantError::Crypto(format!("cipher init failed: {e}")))?;

    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| TenantError::Crypto(format!("encryption failed: {e}")))?;

    let mut packed = Vec::with_capacity(12 + ciphertext.len());
    packed.extend_from_slice(&nonce_bytes);
    packed.extend_from_slice(&ciphertext);

    let encoded = base64::engine::general_purpose::STANDARD.encode(packed);
    Ok(format!("{ENC_PREFIX}{encoded}"))
}

pub fn decrypt(stored: &str, key: &[u8; 32]) -> Result<String> {
    let encoded = stored
        .strip_prefix(ENC_PREFIX)
        .ok_or_else(|| TenantError::Crypto("value is missing the enc: prefix".into()))?;

    let packed = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| TenantError::Crypto(format!("base64 decode failed: {e}")))?;

    if packed.len() < 12 + 16 {
        return Err(TenantError::Crypto("ciphertext too short".into()));
    }
    let (nonce_bytes, ciphertext) = packed.split_at(12);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| TenantError::Crypto(format!("cipher init failed: {e}")))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| TenantError::Crypto("decryption failed — wrong key or corrupted data".into()))?;

    String::from_utf8(plaintext).map_err(|e| TenantError::Crypto(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = [0x11u8; 32];
        let encrypted = encrypt("shhh-api-key", &key).unwrap();
        assert!(encrypted.starts_with(ENC_PREFIX));
        assert_eq!(decrypt(&encrypted, &key).unwrap(), "shhh-api-key");
    }

    #[test]
    fn decrypt_rejects_wrong_key() {
        let key_a = [0x11u8; 32];
        let key_b = [0x22u8; 32];
        let encrypted = encrypt("shhh-api-key", &key_a).unwrap();
        assert!(decrypt(&encrypted, &key_b).is_err());
    }

    #[test]
    fn decode_key_rejects_wrong_length() {
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        assert!(decode_key(&short).is_err());
    }
}
