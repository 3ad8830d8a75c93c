//! PromptVault Core
//!
//! Session envelope encryption for prompt records stored on a permanent ledger.
//!
//! # Key Hierarchy
//!
//! - **Master key**: stretched (PBKDF2-HMAC-SHA256) from a one-time wallet
//!   signature, derived at most once per session and held only in memory.
//! - **Content key**: fresh random AES-256 key per record, wrapped under the
//!   master key and shipped next to the ciphertext.
//!
//! # Record Policy
//!
//! Records are encrypted unless one of their tags is `public`
//! (case-insensitive, exact match).

pub mod cipher;
pub mod codec;
pub mod identity;
pub mod keys;
pub mod password;
pub mod policy;
pub mod record;
pub mod session;

pub use cipher::{decrypt, encrypt, CipherError, EncryptedEnvelope};
pub use codec::{from_text, to_text, CodecError};
pub use identity::{IdentityError, LocalSigner, SigningIdentity};
pub use keys::{KdfParams, KeyError, MasterKey};
pub use policy::should_encrypt;
pub use record::{open, open_all, seal, BulkOpen, PromptDraft, PromptRecord, RecordBody};
pub use session::{MasterKeyManager, VaultError, VaultSession};
