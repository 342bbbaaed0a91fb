//! Per-request session accessor.

use crate::error::StoreError;
use crate::session::store::{MemorySessionStore, SessionStore};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const MAX_ID_LEN: usize = 128;

/// Session-backed storage for one request.
///
/// Reads with no session id are empty. The first write creates a session and
/// marks its id for a `Set-Cookie` header on the response.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: Arc<dyn SessionStore>,
    id: Mutex<Option<String>>,
    issued: AtomicBool,
}

impl Session {
    /// Open the session named by a client-supplied id, if it looks valid.
    pub fn new(store: Arc<dyn SessionStore>, id: Option<&str>) -> Self {
        let id = id.filter(|id| is_valid_id(id)).map(str::to_string);
        Self {
            inner: Arc::new(SessionInner {
                store,
                id: Mutex::new(id),
                issued: AtomicBool::new(false),
            }),
        }
    }

    /// A session over a private in-memory store.
    pub fn detached() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), None)
    }

    pub fn id(&self) -> Option<String> {
        self.inner.id.lock().clone()
    }

    /// Whether the request carries (or has created) a session.
    pub fn exists(&self) -> bool {
        self.inner.id.lock().is_some()
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.id() {
            Some(id) => self.inner.store.get(&id, key),
            None => Ok(None),
        }
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.get(key)?
            .map(|value| serde_json::from_value(value).map_err(|e| StoreError::new(e.to_string())))
            .transpose()
    }

    pub fn set(&self, key: &str, value: impl Serialize) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::new(e.to_string()))?;
        let id = self.ensure_id();
        self.inner.store.set(&id, key, value)
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.id() {
            Some(id) => self.inner.store.delete(&id, key),
            None => Ok(()),
        }
    }

    pub fn all(&self) -> Result<Map<String, Value>, StoreError> {
        match self.id() {
            Some(id) => self.inner.store.all(&id),
            None => Ok(Map::new()),
        }
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        match self.id() {
            Some(id) => self.inner.store.flush(&id),
            None => Ok(()),
        }
    }

    /// Move the data to a fresh id and flush the old session.
    pub fn regenerate(&self) -> Result<(), StoreError> {
        let Some(old) = self.id() else {
            return Ok(());
        };
        let data = self.inner.store.all(&old)?;
        let new = new_id();
        for (key, value) in data {
            self.inner.store.set(&new, &key, value)?;
        }
        self.inner.store.flush(&old)?;
        *self.inner.id.lock() = Some(new);
        self.inner.issued.store(true, Ordering::Release);
        debug!("regenerated session id");
        Ok(())
    }

    /// Stored data, when there is any. Store errors read as no data.
    pub fn snapshot(&self) -> Option<Map<String, Value>> {
        self.all().ok().filter(|data| !data.is_empty())
    }

    /// `Set-Cookie` value for an id created during this request.
    pub(crate) fn issued_cookie(&self, name: &str) -> Option<String> {
        if !self.inner.issued.load(Ordering::Acquire) {
            return None;
        }
        self.id()
            .map(|id| format!("{}={}; Path=/; HttpOnly", name, id))
    }

    fn ensure_id(&self) -> String {
        let mut id = self.inner.id.lock();
        if let Some(existing) = id.as_ref() {
            return existing.clone();
        }
        let created = new_id();
        *id = Some(created.clone());
        self.inner.issued.store(true, Ordering::Release);
        created
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("id", &self.id()).finish()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
