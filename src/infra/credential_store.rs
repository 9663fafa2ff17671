//! Usage: Durable key-value persistence for OAuth session material, scoped to one origin.

use crate::shared::error::WalletResult;
use crate::shared::mutex_ext::MutexExt;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

pub const ACCESS_TOKEN_KEY: &str = "alby_access_token";
pub const REFRESH_TOKEN_KEY: &str = "alby_refresh_token";
pub const PKCE_VERIFIER_KEY: &str = "alby_pkce_verifier";
pub const OAUTH_STATE_KEY: &str = "alby_oauth_state";

const POOL_MAX_SIZE: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Pass-through storage; no validation happens here.
pub trait CredentialStore: Send + Sync {
    fn save(&self, key: &str, value: &str) -> WalletResult<()>;
    fn load(&self, key: &str) -> WalletResult<Option<String>>;
    fn remove(&self, key: &str) -> WalletResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock_or_recover().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, key: &str, value: &str) -> WalletResult<()> {
        self.values
            .lock_or_recover()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> WalletResult<Option<String>> {
        Ok(self.values.lock_or_recover().get(key).cloned())
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        self.values.lock_or_recover().remove(key);
        Ok(())
    }
}

/// SQLite-backed store; rows are keyed by `(origin, key)` so several origins can share a file.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: Pool<SqliteConnectionManager>,
    origin: String,
}

impl SqliteCredentialStore {
    pub fn open(path: &Path, origin: impl Into<String>) -> WalletResult<Self> {
        let manager =
            SqliteConnectionManager::file(path).with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder().max_size(POOL_MAX_SIZE).build(manager)?;
        let store = Self {
            pool,
            origin: origin.into(),
        };
        store.ensure_schema()?;
        tracing::debug!(path = %path.display(), origin = %store.origin, "credential store opened");
        Ok(store)
    }

    fn ensure_schema(&self) -> WalletResult<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS credentials (
  origin TEXT NOT NULL,
  key TEXT NOT NULL,
  value TEXT NOT NULL,
  PRIMARY KEY (origin, key)
);
"#,
        )?;
        Ok(())
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn save(&self, key: &str, value: &str) -> WalletResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            r#"
INSERT INTO credentials (origin, key, value) VALUES (?1, ?2, ?3)
ON CONFLICT(origin, key) DO UPDATE SET value = excluded.value
"#,
            params![self.origin, key, value],
        )?;
        Ok(())
    }

    fn load(&self, key: &str) -> WalletResult<Option<String>> {
        let conn = self.pool.get()?;
        let value = conn
            .query_row(
                "SELECT value FROM credentials WHERE origin = ?1 AND key = ?2",
                params![self.origin, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn remove(&self, key: &str) -> WalletResult<()> {
        let conn = self.pool.get()?;
        conn.execute(
            "DELETE FROM credentials WHERE origin = ?1 AND key = ?2",
            params![self.origin, key],
        )?;
        Ok(())
    }
}
