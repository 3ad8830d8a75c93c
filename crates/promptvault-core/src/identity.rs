//! Signing identity boundary
//!
//! The only capability the vault needs from a wallet: a stable address and a
//! deterministic signature over arbitrary bytes. Browser wallets, hardware
//! signers and test doubles all plug in behind [`SigningIdentity`].

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::keys::KeyError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// No signer reachable (wallet disconnected, extension missing).
    #[error("Identity unavailable: {0}")]
    Unavailable(String),
    /// The signer declined or failed to produce a signature.
    #[error("Signature rejected: {0}")]
    Rejected(String),
}

impl From<IdentityError> for KeyError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::Unavailable(msg) => KeyError::IdentityUnavailable(msg),
            IdentityError::Rejected(msg) => KeyError::SignatureRejected(msg),
        }
    }
}

/// A wallet-like signer.
///
/// `sign` must be deterministic: the same message always yields the same
/// signature, otherwise master keys cannot be re-derived across sessions.
#[async_trait]
pub trait SigningIdentity: Send + Sync {
    /// Stable identity string (wallet address).
    async fn address(&self) -> Result<String, IdentityError>;

    /// Sign an arbitrary message.
    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError>;
}

/// In-process secp256k1 signer.
///
/// Address: unpadded base64url of SHA-256 over the compressed public key.
/// Signature: 64-byte compact ECDSA (RFC 6979 nonces) over SHA-256(message).
pub struct LocalSigner {
    secret: SecretKey,
    address: String,
}

impl LocalSigner {
    pub fn new(secret: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret);
        let digest = Sha256::digest(public.serialize());
        Self {
            secret,
            address: URL_SAFE_NO_PAD.encode(digest),
        }
    }

    /// Fresh random identity.
    pub fn generate() -> Self {
        Self::new(SecretKey::new(&mut rand::thread_rng()))
    }

    /// Parse a 32-byte secret key from hex.
    pub fn from_hex(secret_hex: &str) -> Result<Self, IdentityError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| IdentityError::Unavailable(format!("invalid key hex: {}", e)))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| IdentityError::Unavailable(format!("invalid secret key: {}", e)))?;
        Ok(Self::new(secret))
    }

    /// Synchronous accessor; the trait method just wraps this.
    pub fn address_str(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl SigningIdentity for LocalSigner {
    async fn address(&self) -> Result<String, IdentityError> {
        Ok(self.address.clone())
    }

    async fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let secp = Secp256k1::signing_only();
        let digest: [u8; 32] = Sha256::digest(message).into();
        let msg = Message::from_digest(digest);
        let signature = secp.sign_ecdsa(&msg, &self.secret);
        Ok(signature.serialize_compact().to_vec())
    }
}
