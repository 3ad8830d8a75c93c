//! Envelope encryption of record bodies
//!
//! Each record gets its own random AES-256-GCM content key. The content key
//! is wrapped (AES-256-GCM again) under the session master key and travels
//! with the ciphertext:
//!
//! ```text
//! ciphertext = AES-GCM(content_key, nonce_a, plaintext)
//! wrappedKey = nonce_b || AES-GCM(master_key, nonce_b, content_key)
//! nonce      = nonce_a
//! ```
//!
//! All three fields are standard base64 on the wire.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::codec::{from_text, to_text, CodecError};
use crate::keys::MasterKey;

/// AES-256 key length
pub const CONTENT_KEY_LEN: usize = 32;

/// Nonce length for AES-256-GCM (96 bits)
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length
pub const TAG_LEN: usize = 16;

/// Decoded length of `wrappedKey`: nonce || wrapped content key || tag
pub const WRAPPED_KEY_LEN: usize = NONCE_LEN + CONTENT_KEY_LEN + TAG_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    /// Wrong key, corrupted ciphertext or tampering. Carries no plaintext.
    #[error("Decryption failed: wrong key or corrupted data")]
    DecryptionFailed,
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error(transparent)]
    InvalidEncoding(#[from] CodecError),
}

/// The literal `true` in `"isEncrypted": true`.
///
/// Deserializing `false` (or anything else) fails, so an object can only be
/// read as an envelope when it claims to be one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncryptedTag;

impl Serialize for EncryptedTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for EncryptedTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(EncryptedTag)
        } else {
            Err(serde::de::Error::custom("isEncrypted must be true"))
        }
    }
}

/// Encrypted record body as embedded in uploaded JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptedEnvelope {
    pub ciphertext: String,
    pub wrapped_key: String,
    pub nonce: String,
    pub is_encrypted: EncryptedTag,
}

/// Decoded, length-checked envelope fields.
struct EnvelopeParts {
    ciphertext: Vec<u8>,
    wrap_nonce: [u8; NONCE_LEN],
    wrapped: Vec<u8>,
    nonce: [u8; NONCE_LEN],
}

impl EncryptedEnvelope {
    fn decode(&self) -> Result<EnvelopeParts, CipherError> {
        let ciphertext = from_text(&self.ciphertext)?;
        let wrapped_key = from_text(&self.wrapped_key)?;
        let nonce_bytes = from_text(&self.nonce)?;

        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::MalformedEnvelope(format!(
                "ciphertext is {} bytes, shorter than the {}-byte tag",
                ciphertext.len(),
                TAG_LEN
            )));
        }
        if wrapped_key.len() != WRAPPED_KEY_LEN {
            return Err(CipherError::MalformedEnvelope(format!(
                "wrappedKey is {} bytes, expected {}",
                wrapped_key.len(),
                WRAPPED_KEY_LEN
            )));
        }
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CipherError::MalformedEnvelope(format!(
                "nonce is {} bytes, expected {}",
                nonce_bytes.len(),
                NONCE_LEN
            )));
        }

        let mut wrap_nonce = [0u8; NONCE_LEN];
        wrap_nonce.copy_from_slice(&wrapped_key[..NONCE_LEN]);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&nonce_bytes);

        Ok(EnvelopeParts {
            ciphertext,
            wrap_nonce,
            wrapped: wrapped_key[NONCE_LEN..].to_vec(),
            nonce,
        })
    }
}

fn random_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

fn cipher_for(key: &[u8; CONTENT_KEY_LEN]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

/// Encrypt a record body under a fresh content key wrapped by `master`.
///
/// Every call draws a new content key and two new nonces, so encrypting the
/// same plaintext twice never produces matching fields.
pub fn encrypt(plaintext: &[u8], master: &MasterKey) -> Result<EncryptedEnvelope, CipherError> {
    let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
    OsRng.fill_bytes(content_key.as_mut_slice());

    let nonce = random_nonce();
    let ciphertext = cipher_for(&content_key)
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    let wrap_nonce = random_nonce();
    let wrapped = cipher_for(master.as_bytes())
        .encrypt(Nonce::from_slice(&wrap_nonce), content_key.as_slice())
        .map_err(|e| CipherError::EncryptionFailed(format!("key wrap: {}", e)))?;

    let mut wrapped_key = Vec::with_capacity(WRAPPED_KEY_LEN);
    wrapped_key.extend_from_slice(&wrap_nonce);
    wrapped_key.extend_from_slice(&wrapped);

    Ok(EncryptedEnvelope {
        ciphertext: to_text(&ciphertext),
        wrapped_key: to_text(&wrapped_key),
        nonce: to_text(&nonce),
        is_encrypted: EncryptedTag,
    })
}

/// Decrypt a record body.
///
/// # Errors
/// - `InvalidEncoding` if a field is not base64
/// - `MalformedEnvelope` if a field decodes to the wrong length
/// - `DecryptionFailed` if either the key unwrap or the body fails to
///   authenticate
pub fn decrypt(envelope: &EncryptedEnvelope, master: &MasterKey) -> Result<Vec<u8>, CipherError> {
    let parts = envelope.decode()?;

    let unwrapped = Zeroizing::new(
        cipher_for(master.as_bytes())
            .decrypt(Nonce::from_slice(&parts.wrap_nonce), parts.wrapped.as_slice())
            .map_err(|_| CipherError::DecryptionFailed)?,
    );
    if unwrapped.len() != CONTENT_KEY_LEN {
        return Err(CipherError::MalformedEnvelope(format!(
            "unwrapped content key is {} bytes",
            unwrapped.len()
        )));
    }
    let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
    content_key.copy_from_slice(&unwrapped);

    cipher_for(&content_key)
        .decrypt(Nonce::from_slice(&parts.nonce), parts.ciphertext.as_slice())
        .map_err(|_| CipherError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master(byte: u8) -> MasterKey {
        MasterKey::from_bytes([byte; 32], "owner")
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = master(1);
        let envelope = encrypt(b"hello world", &key).unwrap();
        assert_eq!(decrypt(&envelope, &key).unwrap(), b"hello world");
    }

    #[test]
    fn test_field_lengths() {
        let envelope = encrypt(b"abc", &master(1)).unwrap();
        assert_eq!(from_text(&envelope.nonce).unwrap().len(), NONCE_LEN);
        assert_eq!(from_text(&envelope.wrapped_key).unwrap().len(), WRAPPED_KEY_LEN);
        assert_eq!(from_text(&envelope.ciphertext).unwrap().len(), 3 + TAG_LEN);
    }

    #[test]
    fn test_wrong_master_key_fails() {
        let envelope = encrypt(b"secret", &master(1)).unwrap();
        assert_eq!(
            decrypt(&envelope, &master(2)),
            Err(CipherError::DecryptionFailed)
        );
    }

    #[test]
    fn test_short_nonce_is_malformed() {
        let mut envelope = encrypt(b"secret", &master(1)).unwrap();
        envelope.nonce = to_text(&[0u8; 8]);
        assert!(matches!(
            decrypt(&envelope, &master(1)),
            Err(CipherError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_truncated_wrapped_key_is_malformed() {
        let mut envelope = encrypt(b"secret", &master(1)).unwrap();
        let mut wrapped = from_text(&envelope.wrapped_key).unwrap();
        wrapped.pop();
        envelope.wrapped_key = to_text(&wrapped);
        assert!(matches!(
            decrypt(&envelope, &master(1)),
            Err(CipherError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_non_base64_is_invalid_encoding() {
        let mut envelope = encrypt(b"secret", &master(1)).unwrap();
        envelope.ciphertext = "%%%".to_string();
        assert!(matches!(
            decrypt(&envelope, &master(1)),
            Err(CipherError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_wire_format() {
        let envelope = encrypt(b"x", &master(1)).unwrap();
        let json = serde_json::to_value(&envelope).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["isEncrypted"], serde_json::Value::Bool(true));
        assert!(obj["wrappedKey"].is_string());
        assert!(obj["ciphertext"].is_string());
        assert!(obj["nonce"].is_string());
    }

    #[test]
    fn test_is_encrypted_false_rejected() {
        let json = r#"{"ciphertext":"AA==","wrappedKey":"AA==","nonce":"AA==","isEncrypted":false}"#;
        assert!(serde_json::from_str::<EncryptedEnvelope>(json).is_err());
    }

    #[test]
    fn test_extra_fields_rejected() {
        let json = r#"{"ciphertext":"AA==","wrappedKey":"AA==","nonce":"AA==","isEncrypted":true,"iv":"AA=="}"#;
        assert!(serde_json::from_str::<EncryptedEnvelope>(json).is_err());
    }
}
