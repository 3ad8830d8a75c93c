//! CLI configuration, parsed from a TOML file plus environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use promptvault_core::keys::MIN_PBKDF2_ITERATIONS;
use promptvault_core::KdfParams;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// General settings
    #[serde(default)]
    pub vault: VaultSection,

    /// Signing identity
    #[serde(default)]
    pub identity: IdentitySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// PBKDF2 iterations for master key derivation
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySection {
    /// secp256k1 secret key (hex). Prefer `PROMPTVAULT_SIGNING_KEY`.
    #[serde(default)]
    pub signing_key: String,

    /// Optional extra secret folded into key derivation
    pub password: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_kdf_iterations() -> u32 {
    MIN_PBKDF2_ITERATIONS
}

impl VaultConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: VaultConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `PROMPTVAULT_LOG_LEVEL`
    /// - `PROMPTVAULT_KDF_ITERATIONS`
    /// - `PROMPTVAULT_SIGNING_KEY`
    /// - `PROMPTVAULT_PASSWORD`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PROMPTVAULT_LOG_LEVEL") {
            self.vault.log_level = v;
        }
        if let Ok(v) = std::env::var("PROMPTVAULT_KDF_ITERATIONS") {
            if let Ok(iterations) = v.parse::<u32>() {
                self.vault.kdf_iterations = iterations;
            }
        }
        if let Ok(v) = std::env::var("PROMPTVAULT_SIGNING_KEY") {
            self.identity.signing_key = v;
        }
        if let Ok(v) = std::env::var("PROMPTVAULT_PASSWORD") {
            self.identity.password = Some(v);
        }
    }

    /// KDF parameters; only valid after [`validate`](Self::validate).
    pub fn kdf_params(&self) -> Result<KdfParams> {
        KdfParams::new(self.vault.kdf_iterations).map_err(Into::into)
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        let key = self.identity.signing_key.trim();
        anyhow::ensure!(!key.is_empty(), "identity.signing_key must not be empty");
        anyhow::ensure!(
            key.len() == 64 && hex::decode(key).is_ok(),
            "identity.signing_key must be 64 hex characters"
        );

        anyhow::ensure!(
            self.vault.kdf_iterations >= MIN_PBKDF2_ITERATIONS,
            "vault.kdf_iterations must be >= {}",
            MIN_PBKDF2_ITERATIONS
        );

        if let Some(ref password) = self.identity.password {
            anyhow::ensure!(
                !password.is_empty(),
                "identity.password must not be empty when set"
            );
        }

        Ok(())
    }
}
