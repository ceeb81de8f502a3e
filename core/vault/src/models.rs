//! Plaintext request and response shapes at the vault boundary.
//!
//! These carry secret values in the clear, so their `Debug` output redacts
//! the value and the value buffer is wiped on drop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use zeroize::Zeroize;

use vaultbox_common::{Error, Result, SecretId};
use vaultbox_storage::SecretRecord;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// Request to store a new secret.
#[derive(Clone, Serialize, Deserialize)]
pub struct CreateSecretRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub value: String,
}

impl CreateSecretRequest {
    pub fn new(
        title: impl Into<String>,
        secret_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            secret_type: secret_type.into(),
            value: value.into(),
        }
    }

    /// Reject missing or blank fields.
    pub fn validate(&self) -> Result<()> {
        require("title", &self.title)?;
        require("type", &self.secret_type)?;
        require("value", &self.value)
    }
}

impl fmt::Debug for CreateSecretRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateSecretRequest")
            .field("title", &self.title)
            .field("secret_type", &self.secret_type)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Drop for CreateSecretRequest {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// Request to replace an existing secret's title, type and value.
#[derive(Clone, Serialize, Deserialize)]
pub struct UpdateSecretRequest {
    pub title: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub value: String,
}

impl UpdateSecretRequest {
    pub fn new(
        title: impl Into<String>,
        secret_type: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            secret_type: secret_type.into(),
            value: value.into(),
        }
    }

    /// Reject missing or blank fields.
    pub fn validate(&self) -> Result<()> {
        require("title", &self.title)?;
        require("type", &self.secret_type)?;
        require("value", &self.value)
    }
}

impl fmt::Debug for UpdateSecretRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSecretRequest")
            .field("title", &self.title)
            .field("secret_type", &self.secret_type)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl Drop for UpdateSecretRequest {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// A secret with its value decrypted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretResponse {
    pub id: SecretId,
    pub title: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretResponse {
    /// Pair a stored record with its plaintext value.
    pub fn from_record(record: &SecretRecord, value: String) -> Self {
        Self {
            id: record.id,
            title: record.title.clone(),
            secret_type: record.secret_type.clone(),
            value,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl fmt::Debug for SecretResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretResponse")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("secret_type", &self.secret_type)
            .field("value", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl Drop for SecretResponse {
    fn drop(&mut self) {
        self.value.zeroize();
    }
}

/// Snapshot of the vault lock state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStatus {
    pub unlocked: bool,
    /// Last key access; present only while unlocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    /// Time left before auto-lock; present only while unlocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_lock_in: Option<Duration>,
}

impl VaultStatus {
    pub fn locked() -> Self {
        Self {
            unlocked: false,
            last_activity: None,
            auto_lock_in: None,
        }
    }

    pub fn unlocked(last_activity: DateTime<Utc>, auto_lock_in: Duration) -> Self {
        Self {
            unlocked: true,
            last_activity: Some(last_activity),
            auto_lock_in: Some(auto_lock_in),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultbox_common::ErrorKind;

    #[test]
    fn test_create_request_validation() {
        assert!(CreateSecretRequest::new("GitHub", "api_token", "ghp_abc")
            .validate()
            .is_ok());

        for (title, kind, value) in [("", "t", "v"), ("t", " ", "v"), ("t", "t", "")] {
            let err = CreateSecretRequest::new(title, kind, value)
                .validate()
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_update_request_validation() {
        let err = UpdateSecretRequest::new("GitHub", "", "ghp_abc")
            .validate()
            .unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: type is required");
    }

    #[test]
    fn test_request_wire_names() {
        let req: CreateSecretRequest =
            serde_json::from_str(r#"{"title":"GitHub","type":"api_token","value":"ghp_abc"}"#)
                .unwrap();
        assert_eq!(req.secret_type, "api_token");
        assert_eq!(req.value, "ghp_abc");
    }

    #[test]
    fn test_debug_redacts_value() {
        let req = CreateSecretRequest::new("GitHub", "api_token", "ghp_abc");
        assert!(!format!("{:?}", req).contains("ghp_abc"));

        let now = Utc::now();
        let resp = SecretResponse {
            id: SecretId::new(),
            title: "GitHub".to_string(),
            secret_type: "api_token".to_string(),
            value: "ghp_abc".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(!format!("{:?}", resp).contains("ghp_abc"));
    }

    #[test]
    fn test_locked_status_omits_optional_fields() {
        let json = serde_json::to_string(&VaultStatus::locked()).unwrap();
        assert_eq!(json, r#"{"unlocked":false}"#);
    }
}
