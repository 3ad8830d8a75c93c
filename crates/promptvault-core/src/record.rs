//! Prompt records at the upload/download boundary.
//!
//! A stored record body is either a raw string (public prompt) or an
//! [`EncryptedEnvelope`]. Which one a record gets is decided by its tags
//! through [`should_encrypt`].

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::cipher::EncryptedEnvelope;
use crate::policy::should_encrypt;
use crate::session::{VaultError, VaultSession};

/// Stored form of a record body.
///
/// Untagged on the wire: a JSON string is plain text, an object with
/// `"isEncrypted": true` is an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordBody {
    Plain(String),
    Encrypted(EncryptedEnvelope),
}

impl RecordBody {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, RecordBody::Encrypted(_))
    }
}

/// A prompt as uploaded to or downloaded from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: RecordBody,
}

/// A prompt with readable content, before sealing or after opening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDraft {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub content: String,
}

/// Prepare a draft for upload. Drafts tagged `public` stay plain text and
/// never touch the session key.
pub async fn seal(draft: PromptDraft, session: &VaultSession) -> Result<PromptRecord, VaultError> {
    let content = if should_encrypt(&draft.tags) {
        RecordBody::Encrypted(session.encrypt_text(&draft.content).await?)
    } else {
        RecordBody::Plain(draft.content)
    };

    Ok(PromptRecord {
        id: draft.id,
        title: draft.title,
        tags: draft.tags,
        content,
    })
}

/// Recover a readable draft from a stored record.
pub async fn open(record: &PromptRecord, session: &VaultSession) -> Result<PromptDraft, VaultError> {
    let content = match &record.content {
        RecordBody::Plain(text) => text.clone(),
        RecordBody::Encrypted(envelope) => session.decrypt_text(envelope).await?,
    };

    Ok(PromptDraft {
        id: record.id.clone(),
        title: record.title.clone(),
        tags: record.tags.clone(),
        content,
    })
}

/// Outcome of opening a batch of records.
#[derive(Debug, Default)]
pub struct BulkOpen {
    pub opened: Vec<PromptDraft>,
    /// Record id and the reason it could not be opened.
    pub skipped: Vec<(String, VaultError)>,
}

/// Open every record, isolating failures per record.
///
/// Encrypted records are decrypted concurrently; they all share the one
/// master key derivation.
pub async fn open_all(records: &[PromptRecord], session: &VaultSession) -> BulkOpen {
    let results = join_all(records.iter().map(|record| open(record, session))).await;

    let mut bulk = BulkOpen::default();
    for (record, result) in records.iter().zip(results) {
        match result {
            Ok(draft) => bulk.opened.push(draft),
            Err(e) => {
                log::warn!("Skipping record {}: {}", record.id, e);
                bulk.skipped.push((record.id.clone(), e));
            }
        }
    }
    bulk
}
