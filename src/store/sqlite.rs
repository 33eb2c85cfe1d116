use std::sync::Mutex;

use rusqlite::Connection;

use super::TokenStore;
use crate::consts::TOKEN_KEY;
use crate::error::Result;

/// Token slot in a SQLite key-value table. Survives restarts.
pub struct SqliteTokenStore {
    conn: Mutex<Connection>,
}

impl SqliteTokenStore {
    /// Open or create the `kv` table in the given database path.
    /// Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the store at a filesystem path, creating parent directories.
    pub fn open_path(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            // Connection::open reports the real failure if this did not work.
            let _ = std::fs::create_dir_all(parent);
        }
        Self::open(&path.to_string_lossy())
    }
}

impl TokenStore for SqliteTokenStore {
    fn get(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query([TOKEN_KEY])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn set(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [TOKEN_KEY, token],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM kv WHERE key = ?1", [TOKEN_KEY])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_store() -> SqliteTokenStore {
        SqliteTokenStore::open(":memory:").unwrap()
    }

    #[test]
    fn get_returns_none_when_empty() {
        assert!(mem_store().get().unwrap().is_none());
    }

    #[test]
    fn set_and_get() {
        let store = mem_store();
        store.set("bearer-1").unwrap();
        assert_eq!(store.get().unwrap().unwrap(), "bearer-1");
    }

    #[test]
    fn set_overwrites_existing() {
        let store = mem_store();
        store.set("old").unwrap();
        store.set("new").unwrap();
        assert_eq!(store.get().unwrap().unwrap(), "new");
    }

    #[test]
    fn clear_removes_token() {
        let store = mem_store();
        store.set("bearer-1").unwrap();
        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn clear_when_empty_is_ok() {
        mem_store().clear().unwrap();
    }
}
