//! Vault runtime settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vaultbox_common::{Error, Result};
use vaultbox_crypto::KdfParams;

/// Default inactivity period before the vault relocks (15 minutes).
pub const DEFAULT_AUTO_LOCK_SECS: u64 = 15 * 60;

/// Default auto-lock poll interval (1 minute).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Settings controlling key derivation and auto-lock.
///
/// Every field has a default, so an empty JSON object is a valid settings
/// document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Inactivity period after which the vault locks itself.
    pub auto_lock_secs: u64,
    /// How often the auto-lock task checks for inactivity.
    pub poll_interval_secs: u64,
    /// Argon2id cost parameters.
    pub kdf: KdfParams,
    /// Where a front-end may keep the salt across restarts.
    ///
    /// The vault itself never reads or writes this path.
    pub salt_file: Option<PathBuf>,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            auto_lock_secs: DEFAULT_AUTO_LOCK_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            kdf: KdfParams::default(),
            salt_file: None,
        }
    }
}

impl VaultSettings {
    /// Auto-lock duration.
    pub fn auto_lock(&self) -> Duration {
        Duration::from_secs(self.auto_lock_secs)
    }

    /// Auto-lock poll interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Check that the settings are usable.
    ///
    /// # Errors
    /// - Zero auto-lock duration or poll interval
    /// - Invalid KDF parameters
    pub fn validate(&self) -> Result<()> {
        if self.auto_lock_secs == 0 {
            return Err(Error::Validation(
                "auto_lock_secs must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Validation(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        self.kdf.validate()
    }

    /// Deserialize and validate settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)
            .map_err(|e| Error::Validation(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize settings to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Validation(format!("Invalid settings: {}", e)))
    }

    /// Load settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = VaultSettings::default();
        assert_eq!(settings.auto_lock(), Duration::from_secs(900));
        assert_eq!(settings.poll_interval(), Duration::from_secs(60));
        assert_eq!(settings.kdf, KdfParams::standard());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let settings = VaultSettings::from_json("{}").unwrap();
        assert_eq!(settings, VaultSettings::default());
    }

    #[test]
    fn test_partial_document() {
        let settings = VaultSettings::from_json(r#"{"auto_lock_secs": 120}"#).unwrap();
        assert_eq!(settings.auto_lock(), Duration::from_secs(120));
        assert_eq!(settings.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn test_zero_auto_lock_rejected() {
        assert!(VaultSettings::from_json(r#"{"auto_lock_secs": 0}"#).is_err());
        assert!(VaultSettings::from_json(r#"{"poll_interval_secs": 0}"#).is_err());
    }

    #[test]
    fn test_json_roundtrip() {
        let settings = VaultSettings {
            salt_file: Some(PathBuf::from("/var/lib/vaultbox/salt")),
            ..VaultSettings::default()
        };
        let restored = VaultSettings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(restored, settings);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vaultbox.json");
        std::fs::write(&path, r#"{"poll_interval_secs": 5}"#).unwrap();

        let settings = VaultSettings::load(&path).unwrap();
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
    }
}
