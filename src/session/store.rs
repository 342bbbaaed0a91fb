//! Session store capability.

use crate::error::StoreError;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// String-keyed storage grouped by session id. Expiry is the store's business.
pub trait SessionStore: Send + Sync {
    fn get(&self, id: &str, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, id: &str, key: &str, value: Value) -> Result<(), StoreError>;

    fn delete(&self, id: &str, key: &str) -> Result<(), StoreError>;

    /// Every key stored for `id`.
    fn all(&self, id: &str) -> Result<Map<String, Value>, StoreError>;

    /// Drop the whole session.
    fn flush(&self, id: &str) -> Result<(), StoreError>;
}

/// In-memory session store. Sessions never expire.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Map<String, Value>>>,
}

impl MemorySessionStore {
    /// Create a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &str, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .sessions
            .read()
            .get(id)
            .and_then(|data| data.get(key))
            .cloned())
    }

    fn set(&self, id: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.sessions
            .write()
            .entry(id.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, id: &str, key: &str) -> Result<(), StoreError> {
        if let Some(data) = self.sessions.write().get_mut(id) {
            data.remove(key);
        }
        Ok(())
    }

    fn all(&self, id: &str) -> Result<Map<String, Value>, StoreError> {
        Ok(self.sessions.read().get(id).cloned().unwrap_or_default())
    }

    fn flush(&self, id: &str) -> Result<(), StoreError> {
        self.sessions.write().remove(id);
        Ok(())
    }
}
