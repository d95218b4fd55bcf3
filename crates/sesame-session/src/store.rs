//! Record stores: the persistence boundary of a session.
//!
//! [`SessionStore`] describes the operations a backend must provide. The
//! session handle owns the lifecycle (key generation, encoding, expiry);
//! stores only move [`SessionRecord`]s in and out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session key (primary identifier).
    pub key: String,

    /// Encoded session payload.
    pub data: String,

    /// When the record stops being loadable.
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a new record.
    pub fn new(key: impl Into<String>, data: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            expires_at,
        }
    }

    /// Whether the record has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Trait for session record backends.
///
/// Implementations must be safe to share across concurrent requests; each
/// call is one blocking unit of work.
pub trait SessionStore: Send + Sync {
    /// Short backend name, used to namespace keys.
    fn backend_name(&self) -> &'static str;

    /// Whether any record holds `key`, expired or not.
    ///
    /// Used for key uniqueness, so a key is never reused while its row
    /// remains, even after expiry.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Fetch the non-expired record for `key`.
    fn load(&self, key: &str) -> Result<Option<SessionRecord>>;

    /// Persist a record.
    ///
    /// With `must_create`, insert only and fail with [`Error::Create`] if the
    /// key is taken. Otherwise update the existing row in place and fail with
    /// [`Error::Update`] if it is gone.
    fn save(&self, record: &SessionRecord, must_create: bool) -> Result<()>;

    /// Delete the record for `key`. Absent records are not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Remove all expired records, returning how many were removed.
    ///
    /// Backends that cannot do this report [`Error::NotSupported`].
    fn clear_expired(&self) -> Result<usize> {
        Err(Error::NotSupported("clear_expired"))
    }
}

impl<T: SessionStore + ?Sized> SessionStore for &T {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }

    fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        (**self).load(key)
    }

    fn save(&self, record: &SessionRecord, must_create: bool) -> Result<()> {
        (**self).save(record, must_create)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn clear_expired(&self) -> Result<usize> {
        (**self).clear_expired()
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn exists(&self, key: &str) -> Result<bool> {
        (**self).exists(key)
    }

    fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        (**self).load(key)
    }

    fn save(&self, record: &SessionRecord, must_create: bool) -> Result<()> {
        (**self).save(record, must_create)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn clear_expired(&self) -> Result<usize> {
        (**self).clear_expired()
    }
}

/// In-process record store.
///
/// Records live in a `HashMap` behind a lock; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Fetch a record regardless of expiry.
    pub fn get_raw(&self, key: &str) -> Option<SessionRecord> {
        self.records.read().get(key).cloned()
    }
}

impl SessionStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.records.read().contains_key(key))
    }

    fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
        let now = Utc::now();
        Ok(self
            .records
            .read()
            .get(key)
            .filter(|record| !record.is_expired(now))
            .cloned())
    }

    fn save(&self, record: &SessionRecord, must_create: bool) -> Result<()> {
        let mut records = self.records.write();
        match (records.contains_key(&record.key), must_create) {
            (true, true) => Err(Error::Create(record.key.clone())),
            (false, false) => Err(Error::Update(record.key.clone())),
            _ => {
                records.insert(record.key.clone(), record.clone());
                Ok(())
            }
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.records.write().remove(key);
        Ok(())
    }

    fn clear_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(before - records.len())
    }
}
