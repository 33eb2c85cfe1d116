//! The single persisted bearer token.
//!
//! Components never reach for a global: they are handed an
//! `Arc<dyn TokenStore>` and read/write through it.

pub mod sqlite;

use std::sync::Mutex;

use crate::error::Result;

/// Holder of one bearer token. Writes are visible to every later read.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Result<Option<String>>;
    fn set(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Process-local store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(self.token.lock().unwrap().clone())
    }

    fn set(&self, token: &str) -> Result<()> {
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        assert!(MemoryTokenStore::new().get().unwrap().is_none());
    }

    #[test]
    fn set_then_get() {
        let store = MemoryTokenStore::new();
        store.set("abc").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("abc"));
    }

    #[test]
    fn set_overwrites() {
        let store = MemoryTokenStore::with_token("old");
        store.set("new").unwrap();
        assert_eq!(store.get().unwrap().as_deref(), Some("new"));
    }

    #[test]
    fn clear_empties() {
        let store = MemoryTokenStore::with_token("abc");
        store.clear().unwrap();
        assert!(store.get().unwrap().is_none());
    }
}
