//! Command implementations: seal drafts for upload, open downloaded records.

use crate::config::VaultConfig;
use anyhow::{Context, Result};
use promptvault_core::{
    open_all, seal, BulkOpen, LocalSigner, PromptDraft, PromptRecord, VaultError, VaultSession,
};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// Open a session for the configured identity.
pub fn open_session(config: &VaultConfig) -> Result<VaultSession> {
    let signer = LocalSigner::from_hex(&config.identity.signing_key)
        .context("Failed to load signing key")?;
    log::info!("Identity: {}", signer.address_str());

    Ok(VaultSession::open(
        Arc::new(signer),
        config.kdf_params()?,
        config.identity.password.clone(),
    ))
}

/// Seal every draft in `input` and write the records to `output`.
///
/// Unlike opening, sealing is all-or-nothing: a partial upload set is worse
/// than none.
pub async fn seal_file(session: &VaultSession, input: &Path, output: &Path) -> Result<usize> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read drafts: {}", input.display()))?;
    let drafts: Vec<PromptDraft> =
        serde_json::from_str(&contents).context("Drafts must be a JSON array of prompts")?;

    let mut records = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let id = draft.id.clone();
        let record = seal(draft, session)
            .await
            .with_context(|| format!("Failed to seal prompt {}", id))?;
        log::debug!(
            "Sealed {} ({})",
            record.id,
            if record.content.is_encrypted() { "private" } else { "public" }
        );
        records.push(record);
    }

    let json = serde_json::to_string_pretty(&records)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write records: {}", output.display()))?;

    let private = records.iter().filter(|r| r.content.is_encrypted()).count();
    log::info!(
        "Sealed {} prompts ({} private, {} public) → {}",
        records.len(),
        private,
        records.len() - private,
        output.display()
    );
    Ok(records.len())
}

/// Open every record in `input`. Malformed or undecryptable records are
/// skipped, not fatal.
pub async fn open_file(session: &VaultSession, input: &Path) -> Result<BulkOpen> {
    let contents = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read records: {}", input.display()))?;
    let entries: Vec<Value> =
        serde_json::from_str(&contents).context("Records must be a JSON array")?;
    let total = entries.len();

    let mut records = Vec::with_capacity(total);
    let mut malformed = Vec::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let id = record_label(&entry, index);
        match serde_json::from_value::<PromptRecord>(entry) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("Skipping malformed record {}: {}", id, e);
                malformed.push((id, VaultError::Serialization(e.to_string())));
            }
        }
    }

    let mut bulk = open_all(&records, session).await;
    bulk.skipped.extend(malformed);
    log::info!(
        "Opened {} of {} records ({} skipped)",
        bulk.opened.len(),
        total,
        bulk.skipped.len()
    );
    Ok(bulk)
}

/// The record's `id` when it has one, otherwise its position in the file.
fn record_label(entry: &Value, index: usize) -> String {
    match entry.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => format!("#{}", index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY: &str = "0909090909090909090909090909090909090909090909090909090909090909";

    fn config() -> VaultConfig {
        let mut config = VaultConfig::default();
        config.identity.signing_key = KEY.to_string();
        config
    }

    #[tokio::test]
    async fn test_seal_then_open_files() {
        let dir = TempDir::new().unwrap();
        let drafts = dir.path().join("drafts.json");
        let records = dir.path().join("records.json");
        std::fs::write(
            &drafts,
            r#"[
                {"id": "a", "title": "Private", "tags": ["work"], "content": "summarise the meeting"},
                {"id": "b", "title": "Shared", "tags": ["Public"], "content": "explain monads"}
            ]"#,
        )
        .unwrap();

        let session = open_session(&config()).unwrap();
        assert_eq!(seal_file(&session, &drafts, &records).await.unwrap(), 2);

        let written = std::fs::read_to_string(&records).unwrap();
        assert!(!written.contains("summarise the meeting"));
        assert!(written.contains("explain monads"));

        // Fresh session, same identity
        let session = open_session(&config()).unwrap();
        let bulk = open_file(&session, &records).await.unwrap();
        assert!(bulk.skipped.is_empty());
        assert_eq!(bulk.opened[0].content, "summarise the meeting");
        assert_eq!(bulk.opened[1].content, "explain monads");
    }

    #[tokio::test]
    async fn test_other_identity_skips_private_records() {
        let dir = TempDir::new().unwrap();
        let drafts = dir.path().join("drafts.json");
        let records = dir.path().join("records.json");
        std::fs::write(
            &drafts,
            r#"[{"id": "a", "title": "Private", "content": "mine only"}]"#,
        )
        .unwrap();

        let session = open_session(&config()).unwrap();
        seal_file(&session, &drafts, &records).await.unwrap();

        let mut other = config();
        other.identity.signing_key = "0a".repeat(32);
        let session = open_session(&other).unwrap();
        let bulk = open_file(&session, &records).await.unwrap();

        assert!(bulk.opened.is_empty());
        assert_eq!(bulk.skipped.len(), 1);
        assert_eq!(bulk.skipped[0].0, "a");
    }

    #[tokio::test]
    async fn test_malformed_drafts_file() {
        let dir = TempDir::new().unwrap();
        let drafts = dir.path().join("drafts.json");
        std::fs::write(&drafts, "{not json").unwrap();

        let session = open_session(&config()).unwrap();
        let result = seal_file(&session, &drafts, &dir.path().join("out.json")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_skips_malformed_records() {
        let dir = TempDir::new().unwrap();
        let records = dir.path().join("records.json");
        std::fs::write(
            &records,
            r#"[
                {"id": "ok", "title": "Shared", "tags": ["public"], "content": "explain monads"},
                {"id": "bad", "title": "Private", "content": {"ciphertext": "AAAA", "nonce": "AAAAAAAAAAAAAAAA", "isEncrypted": true}},
                {"id": "flag", "title": "Private", "content": {"ciphertext": "AAAA", "wrappedKey": "AAAA", "nonce": "AAAA", "isEncrypted": false}},
                {"title": "No id", "content": 42}
            ]"#,
        )
        .unwrap();

        let session = open_session(&config()).unwrap();
        let bulk = open_file(&session, &records).await.unwrap();

        assert_eq!(bulk.opened.len(), 1);
        assert_eq!(bulk.opened[0].id, "ok");
        assert_eq!(bulk.opened[0].content, "explain monads");

        let skipped: Vec<_> = bulk.skipped.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(skipped, vec!["bad", "flag", "#3"]);
        for (_, err) in &bulk.skipped {
            assert!(matches!(err, VaultError::Serialization(_)));
        }
    }

    #[tokio::test]
    async fn test_open_rejects_non_array_file() {
        let dir = TempDir::new().unwrap();
        let records = dir.path().join("records.json");
        std::fs::write(&records, r#"{"id": "a"}"#).unwrap();

        let session = open_session(&config()).unwrap();
        assert!(open_file(&session, &records).await.is_err());
    }
}
