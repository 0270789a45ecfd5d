use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Key-value persistence port. Values are JSON documents, one per collection.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KvStore + ?Sized> KvStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub key: String,
    pub size: usize,
    pub updated_at: String,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    // ~/.studybook.db unless overridden
    pub fn default_path() -> PathBuf {
        let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home_dir).join(".studybook.db")
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        log::debug!("opened store at {}", path.display());
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        Ok(Database { conn })
    }

    pub fn list_entries(&self) -> Result<Vec<StoreEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, LENGTH(value), updated_at FROM kv_store ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok(StoreEntry {
                key: row.get(0)?,
                size: row.get::<_, i64>(1)? as usize,
                updated_at: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}

impl KvStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            [key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
        Ok(())
    }
}

/// Reads a JSON value from the store. Missing or malformed entries yield `None`;
/// malformed ones are logged since they indicate a damaged store.
pub fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>>
where
    S: KvStore + ?Sized,
    T: serde::de::DeserializeOwned,
{
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            log::warn!("ignoring malformed value under '{}': {}", key, e);
            Ok(None)
        }
    }
}

pub fn save_json<S, T>(store: &S, key: &str, value: &T) -> Result<()>
where
    S: KvStore + ?Sized,
    T: serde::Serialize + ?Sized,
{
    store.set(key, &serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get("missing").unwrap(), None);

        db.set("k", "\"one\"").unwrap();
        db.set("k", "\"two\"").unwrap();
        assert_eq!(db.get("k").unwrap().as_deref(), Some("\"two\""));

        db.remove("k").unwrap();
        assert_eq!(db.get("k").unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        {
            let db = Database::open(&path).unwrap();
            save_json(&db, "numbers", &vec![1, 2, 3]).unwrap();
        }
        let db = Database::open(&path).unwrap();
        let numbers: Option<Vec<i32>> = load_json(&db, "numbers").unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));

        let entries = db.list_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "numbers");
        assert_eq!(entries[0].size, "[1,2,3]".len());
    }

    #[test]
    fn test_malformed_json_loads_as_none() {
        let db = Database::open_in_memory().unwrap();
        db.set("broken", "{not json").unwrap();
        let value: Option<Vec<String>> = load_json(&db, "broken").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_store_through_reference() {
        let db = Database::open_in_memory().unwrap();
        let by_ref = &db;
        by_ref.set("a", "1").unwrap();
        assert_eq!(KvStore::get(&by_ref, "a").unwrap().as_deref(), Some("1"));
    }
}
