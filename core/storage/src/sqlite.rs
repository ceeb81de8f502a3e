//! SQLite-backed secret store.
//!
//! Statements run on tokio's blocking pool; the connection is shared behind a
//! mutex so the store can be cloned across tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use crate::provider::{NewSecret, SecretRecord, SecretStore};
use vaultbox_common::{Error, Result, SecretId};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS secrets (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    type TEXT NOT NULL,
    encrypted_value BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_secrets_title ON secrets(title);
CREATE INDEX IF NOT EXISTS idx_secrets_type ON secrets(type);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, title, type, encrypted_value, created_at, updated_at FROM secrets";

/// Secret store persisting records in a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Create or open a store database.
    ///
    /// # Errors
    /// - Database creation or schema initialization failure
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref()).map_err(storage_error)?;
        conn.execute_batch(SCHEMA).map_err(storage_error)?;

        info!(path = %db_path.as_ref().display(), "Secret store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::Storage("SQLite connection lock poisoned".to_string()))?;
            f(&conn).map_err(storage_error)
        })
        .await
        .map_err(|e| Error::Storage(format!("SQLite task failed: {}", e)))?
    }
}

fn storage_error(err: rusqlite::Error) -> Error {
    Error::Storage(err.to_string())
}

fn not_found(id: &SecretId) -> Error {
    Error::NotFound(format!("Secret not found: {}", id))
}

fn to_datetime(column: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, micros))
}

/// Current time at the precision the table stores.
fn now() -> DateTime<Utc> {
    let micros = Utc::now().timestamp_micros();
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<SecretRecord> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    Ok(SecretRecord {
        id: SecretId::from(id),
        title: row.get(1)?,
        secret_type: row.get(2)?,
        ciphertext: row.get(3)?,
        created_at: to_datetime(4, row.get(4)?)?,
        updated_at: to_datetime(5, row.get(5)?)?,
    })
}

fn select_one(conn: &Connection, id: &str) -> rusqlite::Result<Option<SecretRecord>> {
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_COLUMNS),
        [id],
        row_to_record,
    )
    .optional()
}

#[async_trait]
impl SecretStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, secret: NewSecret) -> Result<SecretRecord> {
        let now = now();
        let record = SecretRecord {
            id: SecretId::new(),
            title: secret.title,
            secret_type: secret.secret_type,
            ciphertext: secret.ciphertext,
            created_at: now,
            updated_at: now,
        };

        let row = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO secrets (id, title, type, encrypted_value, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    row.id.to_string(),
                    row.title,
                    row.secret_type,
                    row.ciphertext,
                    row.created_at.timestamp_micros(),
                    row.updated_at.timestamp_micros(),
                ],
            )
        })
        .await?;

        debug!(secret_id = %record.id, "Inserted secret row");
        Ok(record)
    }

    async fn get(&self, id: &SecretId) -> Result<SecretRecord> {
        let key = id.to_string();
        self.with_conn(move |conn| select_one(conn, &key))
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn list(&self) -> Result<Vec<SecretRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} ORDER BY created_at DESC, rowid DESC",
                SELECT_COLUMNS
            ))?;
            let records = stmt
                .query_map([], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn update(&self, record: SecretRecord) -> Result<SecretRecord> {
        let id = record.id;
        let updated_at = now();

        self.with_conn(move |conn| {
            let key = record.id.to_string();
            let changed = conn.execute(
                r#"
                UPDATE secrets
                SET title = ?1, type = ?2, encrypted_value = ?3, updated_at = ?4
                WHERE id = ?5
                "#,
                params![
                    record.title,
                    record.secret_type,
                    record.ciphertext,
                    updated_at.timestamp_micros(),
                    key,
                ],
            )?;

            if changed == 0 {
                return Ok(None);
            }
            select_one(conn, &key)
        })
        .await?
        .ok_or_else(|| not_found(&id))
    }

    async fn delete(&self, id: &SecretId) -> Result<()> {
        let key = id.to_string();
        let changed = self
            .with_conn(move |conn| conn.execute("DELETE FROM secrets WHERE id = ?1", [key]))
            .await?;

        if changed == 0 {
            return Err(not_found(id));
        }
        debug!(secret_id = %id, "Deleted secret row");
        Ok(())
    }
}
