//! Secret store trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use vaultbox_common::{Result, SecretId};

/// A secret as persisted: metadata in the clear, value sealed.
///
/// `id` and `created_at` are assigned by the store on create and never
/// change afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRecord {
    /// Identity assigned by the store.
    pub id: SecretId,
    /// Human-readable label.
    pub title: String,
    /// Free-form category, e.g. "api_token" or "password".
    #[serde(rename = "type")]
    pub secret_type: String,
    /// nonce || sealed payload, opaque outside the cipher.
    pub ciphertext: Vec<u8>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("secret_type", &self.secret_type)
            .field("ciphertext_len", &self.ciphertext.len())
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Fields supplied when creating a record; the store fills in the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSecret {
    pub title: String,
    pub secret_type: String,
    pub ciphertext: Vec<u8>,
}

/// Persistence collaborator for secret records.
///
/// Implementations never see plaintext. They must be safe to share across
/// tasks and must not depend on the vault being unlocked.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get the store name (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Persist a new record.
    ///
    /// # Postconditions
    /// - Returns the record with a fresh id and `created_at == updated_at`
    ///
    /// # Errors
    /// - Storage failure
    async fn create(&self, secret: NewSecret) -> Result<SecretRecord>;

    /// Fetch a record by id.
    ///
    /// # Errors
    /// - Not found
    /// - Storage failure
    async fn get(&self, id: &SecretId) -> Result<SecretRecord>;

    /// Fetch all records, newest first by creation time.
    async fn list(&self) -> Result<Vec<SecretRecord>>;

    /// Replace title, type and ciphertext of an existing record.
    ///
    /// `id` and `created_at` of the stored record are kept; `updated_at` is
    /// refreshed.
    ///
    /// # Errors
    /// - Not found
    /// - Storage failure
    async fn update(&self, record: SecretRecord) -> Result<SecretRecord>;

    /// Remove a record.
    ///
    /// # Errors
    /// - Not found
    /// - Storage failure
    async fn delete(&self, id: &SecretId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serialization() {
        let now = Utc::now();
        let record = SecretRecord {
            id: SecretId::new(),
            title: "GitHub".to_string(),
            secret_type: "api_token".to_string(),
            ciphertext: vec![1, 2, 3],
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"api_token\""));

        let deserialized: SecretRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, record);
    }

    #[test]
    fn test_record_debug_omits_ciphertext() {
        let now = Utc::now();
        let record = SecretRecord {
            id: SecretId::new(),
            title: "GitHub".to_string(),
            secret_type: "api_token".to_string(),
            ciphertext: vec![0xAA; 40],
            created_at: now,
            updated_at: now,
        };

        let rendered = format!("{:?}", record);
        assert!(rendered.contains("ciphertext_len: 40"));
    }
}
