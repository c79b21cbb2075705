use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::StoreError;

/// One pending mutation in a batch: `Some` writes the value, `None` removes the key.
pub type KvWrite<'a> = (&'a str, Option<&'a str>);

/// Persistent string key/value state that survives restarts.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Applies every write or none of them.
    fn write_batch(&mut self, writes: &[KvWrite<'_>]) -> Result<(), StoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write_batch(&[(key, Some(value))])
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.write_batch(&[(key, None)])
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn write_batch(&mut self, writes: &[KvWrite<'_>]) -> Result<(), StoreError> {
        for (key, value) in writes {
            match value {
                Some(value) => {
                    self.entries.insert((*key).to_string(), (*value).to_string());
                }
                None => {
                    self.entries.remove(*key);
                }
            }
        }
        Ok(())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_db(path)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite")?;
        Self::from_connection(conn)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write_batch(&mut self, writes: &[KvWrite<'_>]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut upsert = tx.prepare_cached(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            let mut delete = tx.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
            for (key, value) in writes {
                match value {
                    Some(value) => {
                        upsert.execute(params![key, value])?;
                    }
                    None => {
                        delete.execute(params![key])?;
                    }
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS prediction_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            league TEXT NOT NULL,
            is_mock INTEGER NOT NULL,
            payload TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_history_created ON prediction_history(created_at);
        "#,
    )
    .context("init sqlite schema")?;
    Ok(())
}

pub fn app_cache_dir() -> Option<PathBuf> {
    const CACHE_DIR: &str = "matchcast";
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("matchcast.sqlite"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_batch_sets_and_removes() {
        let mut store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store
            .write_batch(&[("a", None), ("b", Some("3")), ("c", Some("4"))])
            .unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("3"));
        assert_eq!(store.get("c").unwrap().as_deref(), Some("4"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn sqlite_store_round_trips_and_overwrites() {
        let mut store = SqliteStore::in_memory().expect("sqlite");
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn sqlite_store_removing_missing_key_is_ok() {
        let mut store = SqliteStore::in_memory().expect("sqlite");
        store.write_batch(&[("missing", None)]).unwrap();
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
