//! Secret operations with transparent envelope encryption.
//!
//! Every operation fetches a copy of the master key from the vault in a short
//! critical section, then encrypts or decrypts locally and talks to the store
//! without holding any vault lock.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::models::{CreateSecretRequest, SecretResponse, UpdateSecretRequest};
use crate::state::VaultState;
use vaultbox_common::{DecryptionFailure, Error, Outcome, Result, SecretId};
use vaultbox_crypto::{decrypt, encrypt, MasterKey};
use vaultbox_storage::{NewSecret, SecretRecord, SecretStore};

/// Create, read, update and delete secrets stored encrypted at rest.
pub struct SecretService {
    vault: Arc<VaultState>,
    store: Arc<dyn SecretStore>,
}

impl SecretService {
    /// Create a service over a shared vault and store.
    pub fn new(vault: Arc<VaultState>, store: Arc<dyn SecretStore>) -> Self {
        Self { vault, store }
    }

    /// The vault whose key this service uses.
    pub fn vault(&self) -> &Arc<VaultState> {
        &self.vault
    }

    /// Encrypt and store a new secret.
    ///
    /// Returns the stored metadata together with the submitted plaintext.
    ///
    /// # Errors
    /// - Validation, VaultLocked, Encryption, Storage
    pub async fn create(&self, req: &CreateSecretRequest) -> Result<SecretResponse> {
        req.validate()?;

        let result: Result<SecretResponse> = async {
            let key = self.vault.get_key().await?;
            let ciphertext = encrypt(key.as_bytes(), req.value.as_bytes())?;
            drop(key);

            let record = self
                .store
                .create(NewSecret {
                    title: req.title.clone(),
                    secret_type: req.secret_type.clone(),
                    ciphertext,
                })
                .await?;

            info!(secret_id = %record.id, "Secret created");
            Ok(SecretResponse::from_record(&record, req.value.clone()))
        }
        .await;

        report("create", result)
    }

    /// Fetch and decrypt one secret.
    ///
    /// # Errors
    /// - VaultLocked, NotFound, Decryption, Storage
    pub async fn get(&self, id: &SecretId) -> Result<SecretResponse> {
        let result: Result<SecretResponse> = async {
            let key = self.vault.get_key().await?;
            let record = self.store.get(id).await?;
            open(&record, &key)
        }
        .await;

        report("get", result)
    }

    /// Fetch and decrypt every secret, newest first.
    ///
    /// Fails closed: if any record cannot be decrypted the whole call fails
    /// and no plaintext is returned.
    ///
    /// # Errors
    /// - VaultLocked, Decryption, Storage
    pub async fn list(&self) -> Result<Vec<SecretResponse>> {
        let result: Result<Vec<SecretResponse>> = async {
            let key = self.vault.get_key().await?;
            let records = self.store.list().await?;

            let secrets = records
                .iter()
                .map(|record| open(record, &key))
                .collect::<Result<Vec<_>>>()?;

            debug!(count = secrets.len(), "Secrets listed");
            Ok(secrets)
        }
        .await;

        report("list", result)
    }

    /// Re-encrypt a secret with new contents.
    ///
    /// Identity and creation time are preserved; the store refreshes the
    /// modification time.
    ///
    /// # Errors
    /// - Validation, VaultLocked, NotFound, Encryption, Storage
    pub async fn update(&self, id: &SecretId, req: &UpdateSecretRequest) -> Result<SecretResponse> {
        req.validate()?;

        let result: Result<SecretResponse> = async {
            let key = self.vault.get_key().await?;
            let existing = self.store.get(id).await?;

            let ciphertext = encrypt(key.as_bytes(), req.value.as_bytes())?;
            drop(key);

            let record = self
                .store
                .update(SecretRecord {
                    title: req.title.clone(),
                    secret_type: req.secret_type.clone(),
                    ciphertext,
                    ..existing
                })
                .await?;

            info!(secret_id = %record.id, "Secret updated");
            Ok(SecretResponse::from_record(&record, req.value.clone()))
        }
        .await;

        report("update", result)
    }

    /// Remove a secret.
    ///
    /// Needs no key since ciphertext is opaque, but the vault must be unlocked.
    ///
    /// # Errors
    /// - VaultLocked, NotFound, Storage
    pub async fn delete(&self, id: &SecretId) -> Result<()> {
        let result: Result<()> = async {
            if !self.vault.is_unlocked().await {
                return Err(Error::VaultLocked);
            }
            self.store.delete(id).await?;

            info!(secret_id = %id, "Secret deleted");
            Ok(())
        }
        .await;

        report("delete", result)
    }
}

/// Decrypt a record into a response.
fn open(record: &SecretRecord, key: &MasterKey) -> Result<SecretResponse> {
    let plaintext = decrypt(key.as_bytes(), &record.ciphertext).inspect_err(|err| {
        error!(secret_id = %record.id, error = %err, "Failed to decrypt secret");
    })?;

    let value = plaintext
        .to_utf8()
        .ok_or(Error::Decryption(DecryptionFailure::Malformed))?;

    Ok(SecretResponse::from_record(record, value))
}

/// Log internal failures with detail; expected conditions only at debug.
fn report<T>(operation: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        match err.kind().outcome() {
            Outcome::Internal => error!(operation, error = %err, "Secret operation failed"),
            _ => debug!(operation, error = %err, "Secret operation rejected"),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultSettings;
    use async_trait::async_trait;
    use vaultbox_common::ErrorKind;
    use vaultbox_crypto::KdfParams;
    use vaultbox_storage::MemoryStore;

    fn settings() -> VaultSettings {
        VaultSettings {
            kdf: KdfParams::lightweight(),
            ..VaultSettings::default()
        }
    }

    fn service_with(store: Arc<dyn SecretStore>) -> SecretService {
        let vault = Arc::new(VaultState::new(settings()).unwrap());
        SecretService::new(vault, store)
    }

    fn service() -> (SecretService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (service_with(store.clone()), store)
    }

    fn github() -> CreateSecretRequest {
        CreateSecretRequest::new("GitHub", "api_token", "ghp_abc")
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let (service, store) = service();
        service.vault().unlock(b"hunter2").await.unwrap();

        let created = service.create(&github()).await.unwrap();
        assert_eq!(created.value, "ghp_abc");
        assert_eq!(created.title, "GitHub");
        assert_eq!(created.secret_type, "api_token");

        let stored = store.get(&created.id).await.unwrap();
        assert_ne!(stored.ciphertext, b"ghp_abc".to_vec());

        let fetched = service.get(&created.id).await.unwrap();
        assert_eq!(fetched.value, "ghp_abc");
        assert_eq!(fetched.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_lock_then_unlock_same_password() {
        let (service, _) = service();
        service.vault().unlock(b"hunter2").await.unwrap();
        let created = service.create(&github()).await.unwrap();

        service.vault().lock().await;
        let err = service.get(&created.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VaultLocked);

        service.vault().unlock(b"hunter2").await.unwrap();
        assert_eq!(service.get(&created.id).await.unwrap().value, "ghp_abc");
    }

    #[tokio::test]
    async fn test_new_salt_after_restart_orphans_secrets() {
        let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());

        let before = service_with(store.clone());
        before.vault().unlock(b"hunter2").await.unwrap();
        let created = before.create(&github()).await.unwrap();
        let old_salt = before.vault().salt().await.unwrap();
        drop(before);

        // A fresh process generates a fresh salt on first unlock.
        let after = service_with(store.clone());
        after.vault().unlock(b"hunter2").await.unwrap();
        let err = after.get(&created.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Decryption(DecryptionFailure::Integrity)
        ));

        // Carrying the old salt over makes them readable again.
        after.vault().lock().await;
        after.vault().restore_salt(old_salt).await.unwrap();
        after.vault().unlock(b"hunter2").await.unwrap();
        assert_eq!(after.get(&created.id).await.unwrap().value, "ghp_abc");
    }

    #[tokio::test]
    async fn test_wrong_password_surfaces_on_read() {
        let (service, _) = service();
        service.vault().unlock(b"hunter2").await.unwrap();
        let created = service.create(&github()).await.unwrap();

        service.vault().lock().await;
        service.vault().unlock(b"hunter3").await.unwrap();

        let err = service.get(&created.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decryption);
        assert_eq!(err.kind().outcome(), Outcome::Internal);
    }

    #[tokio::test]
    async fn test_operations_require_unlock() {
        let (service, _) = service();
        let id = SecretId::new();

        assert_eq!(
            service.create(&github()).await.unwrap_err().kind(),
            ErrorKind::VaultLocked
        );
        assert_eq!(service.get(&id).await.unwrap_err().kind(), ErrorKind::VaultLocked);
        assert_eq!(service.list().await.unwrap_err().kind(), ErrorKind::VaultLocked);
        assert_eq!(
            service
                .update(&id, &UpdateSecretRequest::new("a", "b", "c"))
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::VaultLocked
        );
        assert_eq!(service.delete(&id).await.unwrap_err().kind(), ErrorKind::VaultLocked);
    }

    #[tokio::test]
    async fn test_validation_precedes_vault_check() {
        let (service, store) = service();

        let err = service
            .create(&CreateSecretRequest::new("", "api_token", "ghp_abc"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (service, _) = service();
        service.vault().unlock(b"hunter2").await.unwrap();

        let err = service.get(&SecretId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (service, _) = service();
        service.vault().unlock(b"hunter2").await.unwrap();

        service
            .create(&CreateSecretRequest::new("one", "password", "1"))
            .await
            .unwrap();
        service
            .create(&CreateSecretRequest::new("two", "password", "2"))
            .await
            .unwrap();

        let values: Vec<String> = service
            .list()
            .await
            .unwrap()
            .iter()
            .map(|s| s.value.clone())
            .collect();
        assert_eq!(values, vec!["2".to_string(), "1".to_string()]);
    }

    #[tokio::test]
    async fn test_list_fails_closed() {
        let (service, store) = service();
        service.vault().unlock(b"hunter2").await.unwrap();

        service.create(&github()).await.unwrap();
        let victim = service
            .create(&CreateSecretRequest::new("db", "password", "s3cret"))
            .await
            .unwrap();

        let mut record = store.get(&victim.id).await.unwrap();
        let last = record.ciphertext.len() - 1;
        record.ciphertext[last] ^= 0x01;
        store.update(record).await.unwrap();

        let err = service.list().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Decryption(DecryptionFailure::Integrity)
        ));
    }

    #[tokio::test]
    async fn test_truncated_ciphertext_is_malformed() {
        let (service, store) = service();
        service.vault().unlock(b"hunter2").await.unwrap();
        let created = service.create(&github()).await.unwrap();

        let mut record = store.get(&created.id).await.unwrap();
        record.ciphertext.truncate(4);
        store.update(record).await.unwrap();

        let err = service.get(&created.id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Decryption(DecryptionFailure::Malformed)
        ));
    }

    #[tokio::test]
    async fn test_update_preserves_identity() {
        let (service, _) = service();
        service.vault().unlock(b"hunter2").await.unwrap();
        let created = service.create(&github()).await.unwrap();

        let updated = service
            .update(
                &created.id,
                &UpdateSecretRequest::new("GitHub (work)", "api_token", "ghp_xyz"),
            )
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.value, "ghp_xyz");

        let fetched = service.get(&created.id).await.unwrap();
        assert_eq!(fetched.title, "GitHub (work)");
        assert_eq!(fetched.value, "ghp_xyz");
    }

    #[tokio::test]
    async fn test_update_missing() {
        let (service, _) = service();
        service.vault().unlock(b"hunter2").await.unwrap();

        let err = service
            .update(&SecretId::new(), &UpdateSecretRequest::new("a", "b", "c"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete() {
        let (service, _) = service();
        service.vault().unlock(b"hunter2").await.unwrap();
        let created = service.create(&github()).await.unwrap();

        service.delete(&created.id).await.unwrap();
        assert_eq!(
            service.get(&created.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            service.delete(&created.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    struct BrokenStore;

    #[async_trait]
    impl SecretStore for BrokenStore {
        fn name(&self) -> &str {
            "broken"
        }

        async fn create(&self, _secret: NewSecret) -> Result<SecretRecord> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn get(&self, _id: &SecretId) -> Result<SecretRecord> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn list(&self) -> Result<Vec<SecretRecord>> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn update(&self, _record: SecretRecord) -> Result<SecretRecord> {
            Err(Error::Storage("disk full".to_string()))
        }

        async fn delete(&self, _id: &SecretId) -> Result<()> {
            Err(Error::Storage("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_internal() {
        let service = service_with(Arc::new(BrokenStore));
        service.vault().unlock(b"hunter2").await.unwrap();

        let err = service.create(&github()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.public_message(), "Internal error");

        assert_eq!(service.list().await.unwrap_err().kind(), ErrorKind::Storage);
    }
}
