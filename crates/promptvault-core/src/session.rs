//! Session key management
//!
//! [`MasterKeyManager`] derives the master key at most once per session and
//! shares it with every caller. The manager is a three-state machine:
//!
//! | State      | Meaning                                            |
//! |------------|----------------------------------------------------|
//! | `Idle`     | No key, nothing in flight                          |
//! | `Deriving` | One derivation running; callers wait on its outcome |
//! | `Ready`    | Key cached for one identity address                |
//!
//! Transitions happen under a short, non-async lock that is never held across
//! an `.await`. Every new derivation and every [`MasterKeyManager::clear_session`]
//! bumps a generation counter; a derivation only writes its key back if its
//! generation is still current, so a cleared session is never repopulated by a
//! derivation that was already in flight.
//!
//! [`VaultSession`] binds one manager to one injected identity and exposes the
//! encrypt/decrypt operations callers actually use.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tokio::sync::watch;
use zeroize::Zeroizing;

use crate::cipher::{self, CipherError, EncryptedEnvelope};
use crate::identity::SigningIdentity;
use crate::keys::{derive_master_key, signing_message, KdfParams, KeyError, MasterKey};
use crate::password::estimate_strength;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error(transparent)]
    Key(#[from] KeyError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

type Outcome = Option<Result<MasterKey, KeyError>>;

enum KeyState {
    Idle,
    Deriving {
        owner: String,
        generation: u64,
        outcome: watch::Receiver<Outcome>,
    },
    Ready(MasterKey),
}

struct Inner {
    state: KeyState,
    generation: u64,
}

enum Step {
    Wait(watch::Receiver<Outcome>),
    Derive(watch::Sender<Outcome>, u64),
}

/// Derives, caches and invalidates the session master key.
pub struct MasterKeyManager {
    inner: Mutex<Inner>,
    params: KdfParams,
    password: Option<Zeroizing<String>>,
}

impl MasterKeyManager {
    pub fn new(params: KdfParams) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: KeyState::Idle,
                generation: 0,
            }),
            params,
            password: None,
        }
    }

    /// Fold an extra password into every derivation.
    ///
    /// Weak passwords are accepted but logged.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        let password = Zeroizing::new(password.into());
        let analysis = estimate_strength(&password);
        if !analysis.strength.is_recommended() {
            log::warn!(
                "Vault password is {:?} (~{:.0} bits); it protects every private record",
                analysis.strength,
                analysis.entropy_bits
            );
        }
        self.password = Some(password);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Return the cached key for `identity`, joining or starting a derivation
    /// if needed.
    ///
    /// Concurrent callers for the same address share one signature request.
    /// A failure is delivered to every waiter and leaves the manager `Idle`
    /// so a later call can retry.
    pub async fn get_or_create_master_key(
        &self,
        identity: &dyn SigningIdentity,
    ) -> Result<MasterKey, KeyError> {
        let address = identity.address().await?;

        loop {
            let step = {
                let mut inner = self.lock();
                let joined = match &inner.state {
                    KeyState::Ready(key) if key.owner() == address => {
                        return Ok(key.clone());
                    }
                    KeyState::Deriving { owner, outcome, .. } if *owner == address => {
                        Some(outcome.clone())
                    }
                    _ => None,
                };
                match joined {
                    Some(rx) => Step::Wait(rx),
                    None => {
                        // Idle, or state belongs to another identity
                        inner.generation += 1;
                        let generation = inner.generation;
                        let (tx, rx) = watch::channel(None);
                        inner.state = KeyState::Deriving {
                            owner: address.clone(),
                            generation,
                            outcome: rx,
                        };
                        Step::Derive(tx, generation)
                    }
                }
            };

            match step {
                Step::Wait(mut rx) => {
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(value) => (*value).clone(),
                        Err(_) => None,
                    };
                    match outcome {
                        Some(result) => return result,
                        // Driving task went away without an outcome; its guard
                        // has already reset the state, so go around again.
                        None => {
                            log::debug!("Master key derivation abandoned, retrying");
                            continue;
                        }
                    }
                }
                Step::Derive(tx, generation) => {
                    let mut guard = DerivationGuard {
                        manager: self,
                        generation,
                        settled: false,
                    };
                    let result = self.derive(identity, &address).await;
                    guard.settle(&result);
                    let _ = tx.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    async fn derive(
        &self,
        identity: &dyn SigningIdentity,
        address: &str,
    ) -> Result<MasterKey, KeyError> {
        log::debug!("Deriving master key for {}", address);

        let message = signing_message(address);
        let signature = Zeroizing::new(identity.sign(message.as_bytes()).await?);
        if signature.is_empty() {
            return Err(KeyError::SignatureRejected(
                "identity returned an empty signature".to_string(),
            ));
        }

        let address = address.to_string();
        let password = self.password.clone();
        let params = self.params;
        tokio::task::spawn_blocking(move || {
            derive_master_key(&signature, &address, password.as_deref().map(String::as_str), &params)
        })
        .await
        .map_err(|e| KeyError::KeyDerivationFailed(format!("derivation task: {}", e)))?
    }

    /// Forget the cached key and abandon any in-flight derivation.
    ///
    /// Safe to call mid-derivation: the pending result still reaches its
    /// callers but is not cached.
    pub fn clear_session(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.state = KeyState::Idle;
        log::debug!("Session key cleared");
    }

    /// Address the cached key belongs to, if any.
    pub fn cached_owner(&self) -> Option<String> {
        match &self.lock().state {
            KeyState::Ready(key) => Some(key.owner().to_string()),
            _ => None,
        }
    }

    pub fn is_deriving(&self) -> bool {
        matches!(self.lock().state, KeyState::Deriving { .. })
    }
}

/// Writes a derivation's outcome back into the manager, or resets the state
/// if the deriving future is dropped before finishing.
struct DerivationGuard<'a> {
    manager: &'a MasterKeyManager,
    generation: u64,
    settled: bool,
}

impl DerivationGuard<'_> {
    fn settle(&mut self, result: &Result<MasterKey, KeyError>) {
        self.settled = true;
        let mut inner = self.manager.lock();
        if !self.is_current(&inner) {
            if result.is_ok() {
                log::warn!("Discarding master key from a derivation superseded by session teardown");
            }
            return;
        }
        inner.state = match result {
            Ok(key) => {
                log::debug!("Master key ready for {}", key.owner());
                KeyState::Ready(key.clone())
            }
            Err(e) => {
                log::warn!("Master key derivation failed: {}", e);
                KeyState::Idle
            }
        };
    }

    fn is_current(&self, inner: &Inner) -> bool {
        matches!(
            inner.state,
            KeyState::Deriving { generation, .. } if generation == self.generation
        )
    }
}

impl Drop for DerivationGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut inner = self.manager.lock();
        if self.is_current(&inner) {
            inner.state = KeyState::Idle;
        }
    }
}

/// One identity's vault session.
///
/// Owned by the application: open it when a wallet connects, close it when
/// the wallet disconnects. Independent sessions never share key state.
pub struct VaultSession {
    identity: Arc<dyn SigningIdentity>,
    keys: MasterKeyManager,
}

impl VaultSession {
    pub fn open(
        identity: Arc<dyn SigningIdentity>,
        params: KdfParams,
        password: Option<String>,
    ) -> Self {
        let keys = MasterKeyManager::new(params);
        let keys = match password {
            Some(password) => keys.with_password(password),
            None => keys,
        };
        Self { identity, keys }
    }

    pub fn identity(&self) -> &dyn SigningIdentity {
        self.identity.as_ref()
    }

    pub async fn master_key(&self) -> Result<MasterKey, KeyError> {
        self.keys.get_or_create_master_key(self.identity.as_ref()).await
    }

    pub async fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope, VaultError> {
        let key = self.master_key().await?;
        Ok(cipher::encrypt(plaintext, &key)?)
    }

    pub async fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Vec<u8>, VaultError> {
        let key = self.master_key().await?;
        Ok(cipher::decrypt(envelope, &key)?)
    }

    pub async fn encrypt_text(&self, text: &str) -> Result<EncryptedEnvelope, VaultError> {
        self.encrypt(text.as_bytes()).await
    }

    pub async fn decrypt_text(&self, envelope: &EncryptedEnvelope) -> Result<String, VaultError> {
        let bytes = self.decrypt(envelope).await?;
        String::from_utf8(bytes).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    /// Key manager backing this session.
    pub fn keys(&self) -> &MasterKeyManager {
        &self.keys
    }

    /// Wipe cached key material. The session can be reused; the next
    /// operation re-derives.
    pub fn close(&self) {
        self.keys.clear_session();
    }
}
