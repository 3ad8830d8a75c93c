//! Master key derivation
//!
//! The master key is stretched from a wallet signature over a fixed message
//! using PBKDF2-HMAC-SHA256. The signature is deterministic for a given
//! identity, so the same wallet always re-derives the same key and can read
//! records it sealed in earlier sessions.
//!
//! # Security Notes
//!
//! - The salt binds the identity address, so two identities never share a key
//! - An optional password is folded into the salt as an extra secret
//! - Key material is zeroized on drop and never serialized
//! - There is no recovery path: losing the wallet loses the records

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use zeroize::Zeroizing;

/// Application label bound into both the signing message and the salt.
pub const APP_LABEL: &str = "promptvault-master-key-v1";

/// Minimum accepted PBKDF2 iteration count.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Master key length (AES-256)
pub const MASTER_KEY_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Signing identity unavailable: {0}")]
    IdentityUnavailable(String),
    #[error("Signature rejected: {0}")]
    SignatureRejected(String),
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Invalid KDF parameters: {0}")]
    InvalidParams(String),
}

/// PBKDF2 parameters for master key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
}

impl KdfParams {
    pub fn new(iterations: u32) -> Result<Self, KeyError> {
        if iterations < MIN_PBKDF2_ITERATIONS {
            return Err(KeyError::InvalidParams(format!(
                "{} iterations is below the minimum of {}",
                iterations, MIN_PBKDF2_ITERATIONS
            )));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

/// Session master key. Only ever used to wrap and unwrap content keys.
///
/// Clones share the same zeroizing allocation.
#[derive(Clone)]
pub struct MasterKey {
    material: Arc<Zeroizing<[u8; MASTER_KEY_LEN]>>,
    owner: Arc<str>,
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN], owner: &str) -> Self {
        Self {
            material: Arc::new(Zeroizing::new(bytes)),
            owner: Arc::from(owner),
        }
    }

    pub fn as_bytes(&self) -> &[u8; MASTER_KEY_LEN] {
        &self.material
    }

    /// Address of the identity this key was derived for.
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("owner", &self.owner)
            .field("material", &"<redacted>")
            .finish()
    }
}

/// Human-readable message the identity is asked to sign.
pub fn signing_message(address: &str) -> String {
    format!(
        "PromptVault\n\n\
         Sign this message to unlock your private prompts.\n\
         It does not authorize any transaction or cost anything.\n\n\
         Wallet: {}\n\
         Key: {}",
        address, APP_LABEL
    )
}

/// Salt: label || 0x00 || address [|| 0x00 || password]
fn derivation_salt(address: &str, password: Option<&str>) -> Zeroizing<Vec<u8>> {
    let mut salt = Zeroizing::new(Vec::with_capacity(
        APP_LABEL.len() + 2 + address.len() + password.map_or(0, str::len),
    ));
    salt.extend_from_slice(APP_LABEL.as_bytes());
    salt.push(0x00);
    salt.extend_from_slice(address.as_bytes());
    if let Some(password) = password {
        salt.push(0x00);
        salt.extend_from_slice(password.as_bytes());
    }
    salt
}

/// Stretch a signature into a master key for `address`.
///
/// Pure: the same signature, address, password and parameters always give the
/// same key.
pub fn derive_master_key(
    signature: &[u8],
    address: &str,
    password: Option<&str>,
    params: &KdfParams,
) -> Result<MasterKey, KeyError> {
    if signature.is_empty() {
        return Err(KeyError::KeyDerivationFailed(
            "empty signature".to_string(),
        ));
    }

    let salt = derivation_salt(address, password);
    let mut key = Zeroizing::new([0u8; MASTER_KEY_LEN]);
    pbkdf2_hmac::<Sha256>(signature, &salt, params.iterations, &mut key[..]);

    Ok(MasterKey::from_bytes(*key, address))
}
