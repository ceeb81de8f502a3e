//! In-memory secret store.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::provider::{NewSecret, SecretRecord, SecretStore};
use vaultbox_common::{Error, Result, SecretId};

#[derive(Debug, Clone)]
struct Entry {
    /// Insertion order, breaks ties between equal creation timestamps.
    seq: u64,
    record: SecretRecord,
}

#[derive(Debug, Default)]
struct Table {
    next_seq: u64,
    entries: HashMap<SecretId, Entry>,
}

/// In-memory secret store.
///
/// Useful for testing and ephemeral vaults. All records are lost on drop.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Arc<RwLock<Table>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Table>> {
        self.table
            .read()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Table>> {
        self.table
            .write()
            .map_err(|_| Error::Storage("Memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, secret: NewSecret) -> Result<SecretRecord> {
        let now = Utc::now();
        let record = SecretRecord {
            id: SecretId::new(),
            title: secret.title,
            secret_type: secret.secret_type,
            ciphertext: secret.ciphertext,
            created_at: now,
            updated_at: now,
        };

        let mut table = self.write()?;
        let seq = table.next_seq;
        table.next_seq += 1;
        table.entries.insert(
            record.id,
            Entry {
                seq,
                record: record.clone(),
            },
        );

        Ok(record)
    }

    async fn get(&self, id: &SecretId) -> Result<SecretRecord> {
        self.read()?
            .entries
            .get(id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| Error::NotFound(format!("Secret not found: {}", id)))
    }

    async fn list(&self) -> Result<Vec<SecretRecord>> {
        let table = self.read()?;
        let mut entries: Vec<&Entry> = table.entries.values().collect();
        entries.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        Ok(entries.into_iter().map(|e| e.record.clone()).collect())
    }

    async fn update(&self, record: SecretRecord) -> Result<SecretRecord> {
        let mut table = self.write()?;
        let entry = table
            .entries
            .get_mut(&record.id)
            .ok_or_else(|| Error::NotFound(format!("Secret not found: {}", record.id)))?;

        entry.record.title = record.title;
        entry.record.secret_type = record.secret_type;
        entry.record.ciphertext = record.ciphertext;
        entry.record.updated_at = Utc::now();

        Ok(entry.record.clone())
    }

    async fn delete(&self, id: &SecretId) -> Result<()> {
        self.write()?
            .entries
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Secret not found: {}", id)))
    }
}
