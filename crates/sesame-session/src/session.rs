//! The session handle: lifecycle of one client's state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cache::{SessionCache, SessionMap};
use crate::codec::{JsonCodec, SessionCodec};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::expiry::{EXPIRY_KEY, ExpiryPolicy, ExpiryValue, SessionExpiry};
use crate::key::{KeyGenerator, SessionKey};
use crate::store::{SessionRecord, SessionStore};

/// Insert attempts `create` makes before giving up on key races.
pub const MAX_CREATE_ATTEMPTS: usize = 100;

/// A session bound (or not yet bound) to a key.
///
/// One handle serves one request. State is loaded from the store on first
/// access and written back only by [`Session::save`]. The handle never owns
/// the persisted record; dropping it leaves the store untouched.
///
/// ```rust,ignore
/// let store = MemoryStore::new();
/// let mut session = Session::new(&store, &SessionConfig::default(), cookie.as_deref());
/// session.set("cart", json!([42]))?;
/// session.save(false)?;
/// ```
pub struct Session<S: SessionStore> {
    store: S,
    codec: Box<dyn SessionCodec>,
    keys: KeyGenerator,
    policy: ExpiryPolicy,
    key_salt: String,
    key: Option<SessionKey>,
    cache: SessionCache,
}

impl<S: SessionStore> Session<S> {
    /// Create a handle over `store`, bound to `key` if it is valid.
    ///
    /// Invalid keys (empty or shorter than 8 characters) are discarded and
    /// the handle starts unbound.
    pub fn new(store: S, config: &SessionConfig, key: Option<&str>) -> Self {
        let mut session = Self {
            store,
            codec: Box::new(JsonCodec),
            keys: KeyGenerator::new(),
            policy: ExpiryPolicy::from_config(config),
            key_salt: config.key_salt.clone(),
            key: None,
            cache: SessionCache::new(),
        };
        session.bind(key);
        session
    }

    /// Replace the payload codec.
    pub fn with_codec(mut self, codec: impl SessionCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    /// Replace the key generator.
    pub fn with_key_generator(mut self, keys: KeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The bound key, if any.
    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// Bind to a caller-supplied key.
    ///
    /// Returns whether the key was accepted. A rejected key leaves the
    /// handle unbound rather than failing, so a malformed cookie behaves
    /// like no cookie at all.
    pub fn bind(&mut self, candidate: Option<&str>) -> bool {
        self.key = candidate.and_then(SessionKey::parse);
        if candidate.is_some() && self.key.is_none() {
            debug!("Discarding invalid session key candidate");
        }
        self.key.is_some()
    }

    /// Whether session state has been read or written.
    pub fn accessed(&self) -> bool {
        self.cache.accessed()
    }

    /// Whether session state has been changed.
    pub fn modified(&self) -> bool {
        self.cache.modified()
    }

    /// Key namespace for this handle's store.
    pub fn key_salt(&self) -> String {
        format!("{}.{}", self.key_salt, self.store.backend_name())
    }

    /// True when there is no key and no state, without forcing a load.
    pub fn is_empty(&self) -> bool {
        self.key.is_none() && self.cache.is_vacant()
    }

    fn ensure_loaded(&mut self) -> Result<&mut SessionCache> {
        if !self.cache.is_loaded() && self.key.is_some() {
            let data = self.load()?;
            self.cache.materialize(|| Ok(data))?;
        } else {
            self.cache.materialize_empty();
        }
        Ok(&mut self.cache)
    }

    // ── Mapping ─────────────────────────────────────────────────────

    /// Whether an entry exists.
    pub fn contains(&mut self, key: &str) -> Result<bool> {
        Ok(self.ensure_loaded()?.contains(key))
    }

    /// Alias of [`Session::contains`].
    pub fn has_key(&mut self, key: &str) -> Result<bool> {
        self.contains(key)
    }

    /// Clone an entry.
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        Ok(self.ensure_loaded()?.get(key))
    }

    /// Clone an entry, or return `default`.
    pub fn get_or(&mut self, key: &str, default: Value) -> Result<Value> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Insert or replace an entry.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        self.ensure_loaded()?.set(key, value);
        Ok(())
    }

    /// Remove an entry, returning it.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        Ok(self.ensure_loaded()?.remove(key))
    }

    /// Remove and return an entry.
    pub fn pop(&mut self, key: &str) -> Result<Option<Value>> {
        self.remove(key)
    }

    /// Remove and return an entry, or return `default`.
    pub fn pop_or(&mut self, key: &str, default: Value) -> Result<Value> {
        Ok(self.remove(key)?.unwrap_or(default))
    }

    /// Return the existing entry, or insert and return `value`.
    pub fn setdefault(&mut self, key: &str, value: Value) -> Result<Value> {
        Ok(self.ensure_loaded()?.setdefault(key, value))
    }

    /// Merge entries.
    pub fn update<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.ensure_loaded()?.update(entries);
        Ok(())
    }

    /// Snapshot of entry keys.
    pub fn keys(&mut self) -> Result<Vec<String>> {
        Ok(self.ensure_loaded()?.keys())
    }

    /// Snapshot of entry values.
    pub fn values(&mut self) -> Result<Vec<Value>> {
        Ok(self.ensure_loaded()?.values())
    }

    /// Snapshot of entries.
    pub fn items(&mut self) -> Result<Vec<(String, Value)>> {
        Ok(self.ensure_loaded()?.items())
    }

    /// Number of entries.
    pub fn len(&mut self) -> Result<usize> {
        Ok(self.ensure_loaded()?.len())
    }

    /// Drop all entries without loading the stored ones first.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    // ── Expiry ──────────────────────────────────────────────────────

    fn stored_expiry(&mut self) -> Result<Option<SessionExpiry>> {
        match self.get(EXPIRY_KEY)? {
            Some(value) => SessionExpiry::from_value(&value),
            None => Ok(None),
        }
    }

    /// Seconds until this session expires, counted from now.
    pub fn get_expiry_age(&mut self) -> Result<i64> {
        let expiry = self.stored_expiry()?;
        Ok(self.policy.expiry_age(Utc::now(), expiry))
    }

    /// Instant at which this session expires, counted from now.
    pub fn get_expiry_date(&mut self) -> Result<DateTime<Utc>> {
        let expiry = self.stored_expiry()?;
        self.policy.expiry_date(Utc::now(), expiry)
    }

    /// Expiry age for explicit inputs. Never loads session state.
    pub fn expiry_age_with(&self, modification: DateTime<Utc>, expiry: Option<SessionExpiry>) -> i64 {
        self.policy.expiry_age(modification, expiry)
    }

    /// Expiry instant for explicit inputs. Never loads session state.
    pub fn expiry_date_with(
        &self,
        modification: DateTime<Utc>,
        expiry: Option<SessionExpiry>,
    ) -> Result<DateTime<Utc>> {
        self.policy.expiry_date(modification, expiry)
    }

    /// Set or remove this session's expiry override.
    ///
    /// An override that would overflow or fall past the latest storable
    /// year is rejected with [`Error::InvalidExpiry`] and leaves the session
    /// unchanged.
    pub fn set_expiry(&mut self, value: ExpiryValue) -> Result<()> {
        match value.resolve(Utc::now())? {
            Some(expiry) => self.set(EXPIRY_KEY, expiry.to_value()),
            None => self.remove(EXPIRY_KEY).map(|_| ()),
        }
    }

    /// Whether the cookie for this session should expire with the browser.
    pub fn get_expire_at_browser_close(&mut self) -> Result<bool> {
        let expiry = self.stored_expiry()?;
        Ok(self.policy.expire_at_browser_close(expiry))
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Load the stored state for the bound key.
    ///
    /// A missing or expired record yields an empty map and unbinds the
    /// handle, so the stale key is never written back. An undecodable
    /// payload is logged and treated as empty.
    pub fn load(&mut self) -> Result<SessionMap> {
        let Some(key) = self.key.clone() else {
            return Ok(SessionMap::new());
        };

        match self.store.load(key.as_str())? {
            Some(record) => match self.codec.decode(&record.data) {
                Ok(data) => Ok(data),
                Err(e) => {
                    warn!(error = %e, "Session payload could not be decoded, starting empty");
                    Ok(SessionMap::new())
                }
            },
            None => {
                debug!(
                    backend = self.store.backend_name(),
                    "No active record for session key, unbinding"
                );
                self.key = None;
                Ok(SessionMap::new())
            }
        }
    }

    /// Persist the session.
    ///
    /// An unbound handle is created under a fresh key. With `must_create`
    /// the current state is written without loading stored state first, and
    /// a taken key fails with [`Error::Create`]. Otherwise the existing
    /// record is updated and a vanished one fails with [`Error::Update`].
    pub fn save(&mut self, must_create: bool) -> Result<()> {
        if self.key.is_none() {
            return self.create();
        }

        if must_create {
            self.cache.materialize_empty();
        } else {
            self.ensure_loaded()?;
        }

        // Loading may have found the record gone and unbound the handle.
        let Some(key) = self.key.clone() else {
            return self.create();
        };

        let expires_at = self.get_expiry_date()?;
        let data = match self.cache.peek() {
            Some(map) => self.codec.encode(map)?,
            None => self.codec.encode(&SessionMap::new())?,
        };
        let record = SessionRecord::new(key.into_string(), data, expires_at);

        self.store.save(&record, must_create)?;
        debug!(
            backend = self.store.backend_name(),
            must_create,
            expires_at = %expires_at,
            "Session saved"
        );
        Ok(())
    }

    /// Create a new record under a fresh unique key.
    ///
    /// Keys are checked against the store before use; if another writer
    /// claims the same key between the check and the insert, a new key is
    /// drawn. On return the record exists exactly once.
    pub fn create(&mut self) -> Result<()> {
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let key = self
                .keys
                .new_unique_key(|candidate| self.store.exists(candidate))?;
            self.key = Some(key);

            match self.save(true) {
                Ok(()) => {
                    self.cache.mark_modified();
                    debug!(attempt, backend = self.store.backend_name(), "Session created");
                    return Ok(());
                }
                Err(Error::Create(_)) => {
                    debug!(attempt, "Session key claimed concurrently, retrying");
                }
                Err(e) => {
                    self.key = None;
                    return Err(e);
                }
            }
        }

        self.key = None;
        error!(
            attempts = MAX_CREATE_ATTEMPTS,
            "Session creation kept colliding on insert"
        );
        Err(Error::KeyExhausted {
            attempts: MAX_CREATE_ATTEMPTS,
        })
    }

    /// Delete the record for `key`, or for the bound key when `None`.
    ///
    /// An unbound handle with no explicit key is a no-op.
    pub fn delete(&mut self, key: Option<&str>) -> Result<()> {
        let target = match (key, &self.key) {
            (Some(key), _) => key.to_string(),
            (None, Some(own)) => own.as_str().to_string(),
            (None, None) => return Ok(()),
        };
        self.store.delete(&target)?;
        debug!(backend = self.store.backend_name(), "Session record deleted");
        Ok(())
    }

    /// Drop all state, delete the record, and unbind.
    pub fn flush(&mut self) -> Result<()> {
        self.clear();
        self.delete(None)?;
        self.key = None;
        Ok(())
    }

    /// Move the current state to a fresh key and delete the old record.
    pub fn cycle_key(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let old = self.key.take();
        self.create()?;
        if let Some(old) = old {
            self.store.delete(old.as_str())?;
        }
        Ok(())
    }

    /// Remove expired records from the backing store.
    pub fn clear_expired(&self) -> Result<usize> {
        self.store.clear_expired()
    }
}

impl<S: SessionStore> fmt::Debug for Session<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.store.backend_name())
            .field("bound", &self.key.is_some())
            .field("loaded", &self.cache.is_loaded())
            .field("accessed", &self.cache.accessed())
            .field("modified", &self.cache.modified())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KEY_LENGTH, MAX_KEY_LENGTH, random_key};
    use crate::store::MemoryStore;
    use chrono::TimeDelta;
    use parking_lot::Mutex;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store wrapper that counts loads and can hide existing keys from
    /// `exists`, simulating a writer that wins the race after the check.
    struct Probe {
        inner: MemoryStore,
        loads: AtomicUsize,
        blind_exists: bool,
    }

    impl Probe {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                loads: AtomicUsize::new(0),
                blind_exists: false,
            }
        }

        fn blind() -> Self {
            Self {
                blind_exists: true,
                ..Self::new()
            }
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    impl SessionStore for Probe {
        fn backend_name(&self) -> &'static str {
            "probe"
        }
        fn exists(&self, key: &str) -> Result<bool> {
            if self.blind_exists {
                Ok(false)
            } else {
                self.inner.exists(key)
            }
        }
        fn load(&self, key: &str) -> Result<Option<SessionRecord>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(key)
        }
        fn save(&self, record: &SessionRecord, must_create: bool) -> Result<()> {
            self.inner.save(record, must_create)
        }
        fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key)
        }
        fn clear_expired(&self) -> Result<usize> {
            self.inner.clear_expired()
        }
    }

    fn scripted(keys: &[&str]) -> KeyGenerator {
        let queue: Mutex<Vec<String>> =
            Mutex::new(keys.iter().rev().map(|k| k.to_string()).collect());
        KeyGenerator::with_source(move || queue.lock().pop().unwrap_or_else(random_key))
    }

    fn config() -> SessionConfig {
        SessionConfig::default().with_cookie_age(3600)
    }

    fn seed(store: &MemoryStore, key: &str, data: &str, ttl_secs: i64) {
        let record = SessionRecord::new(key, data, Utc::now() + TimeDelta::seconds(ttl_secs));
        store.save(&record, true).unwrap();
    }

    #[test]
    fn test_new_unbound_handle_is_empty() {
        let store = MemoryStore::new();
        let session = Session::new(&store, &config(), None);
        assert!(session.key().is_none());
        assert!(session.is_empty());
        assert!(!session.accessed());
        assert!(!session.modified());
    }

    #[test]
    fn test_invalid_key_is_discarded() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), Some("short"));
        assert!(session.key().is_none());
        assert!(!session.bind(Some("")));
        assert!(session.bind(Some("long-enough-key")));
        assert_eq!(session.key().unwrap().as_str(), "long-enough-key");

        let overlong = "k".repeat(MAX_KEY_LENGTH + 1);
        assert!(!session.bind(Some(&overlong)));
        assert!(session.key().is_none());
    }

    proptest! {
        #[test]
        fn prop_bind_accepts_iff_valid(candidate in ".{0,16}") {
            let store = MemoryStore::new();
            let session = Session::new(&store, &config(), Some(&candidate));
            prop_assert_eq!(session.key().is_some(), candidate.chars().count() >= 8);
        }
    }

    #[test]
    fn test_mutation_makes_handle_non_empty() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);

        assert!(!session.contains("a").unwrap());
        assert!(session.is_empty());
        assert!(session.accessed());

        session.set("a", json!(1)).unwrap();
        assert!(!session.is_empty());
        assert!(session.modified());
    }

    #[test]
    fn test_save_creates_record() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);
        session.set("a", json!(1)).unwrap();
        assert!(session.modified());

        session.save(false).unwrap();

        let key = session.key().unwrap().as_str().to_string();
        assert_eq!(key.len(), KEY_LENGTH);
        let record = store.load(&key).unwrap().unwrap();
        let decoded = JsonCodec.decode(&record.data).unwrap();
        assert_eq!(serde_json::Value::Object(decoded), json!({"a": 1}));
    }

    #[test]
    fn test_saved_expiry_follows_cookie_age() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);
        let before = Utc::now();
        session.save(false).unwrap();

        let record = store.get_raw(session.key().unwrap().as_str()).unwrap();
        assert!(record.expires_at >= before + TimeDelta::seconds(3600));
        assert!(record.expires_at <= Utc::now() + TimeDelta::seconds(3600));
    }

    #[test]
    fn test_lazy_load_happens_once() {
        let store = Probe::new();
        seed(&store.inner, "existing-key-01", r#"{"user":"ada"}"#, 60);

        let mut session = Session::new(&store, &config(), Some("existing-key-01"));
        assert_eq!(store.loads(), 0);

        assert_eq!(session.get("user").unwrap(), Some(json!("ada")));
        assert_eq!(session.get_or("missing", json!(0)).unwrap(), json!(0));
        assert_eq!(store.loads(), 1);
        assert!(session.accessed());
        assert!(!session.modified());
    }

    #[test]
    fn test_expired_record_loads_empty_and_unbinds() {
        let store = MemoryStore::new();
        seed(&store, "expired-key-01", r#"{"stale":true}"#, -10);

        let mut session = Session::new(&store, &config(), Some("expired-key-01"));
        assert!(session.load().unwrap().is_empty());
        assert!(session.key().is_none());
    }

    #[test]
    fn test_save_after_missing_record_uses_fresh_key() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), Some("vanished-key-01"));
        session.set("a", json!(1)).unwrap();
        session.save(false).unwrap();

        let key = session.key().unwrap().as_str();
        assert_ne!(key, "vanished-key-01");
        assert!(store.exists(key).unwrap());
        assert!(!store.exists("vanished-key-01").unwrap());
    }

    #[test]
    fn test_undecodable_payload_loads_empty() {
        let store = MemoryStore::new();
        seed(&store, "corrupt-key-01", "not json", 60);

        let mut session = Session::new(&store, &config(), Some("corrupt-key-01"));
        assert_eq!(session.len().unwrap(), 0);
        assert!(session.key().is_some());
    }

    #[test]
    fn test_clear_skips_store() {
        let store = Probe::new();
        seed(&store.inner, "existing-key-01", r#"{"a":1}"#, 60);

        let mut session = Session::new(&store, &config(), Some("existing-key-01"));
        session.clear();
        assert!(session.keys().unwrap().is_empty());
        assert_eq!(store.loads(), 0);
        assert!(session.modified());
    }

    #[test]
    fn test_update_existing_record() {
        let store = MemoryStore::new();
        seed(&store, "existing-key-01", r#"{"a":1}"#, 60);

        let mut session = Session::new(&store, &config(), Some("existing-key-01"));
        session.update(vec![("b".to_string(), json!(2))]).unwrap();
        session.save(false).unwrap();

        let record = store.load("existing-key-01").unwrap().unwrap();
        let data = JsonCodec.decode(&record.data).unwrap();
        assert_eq!(data.get("a"), Some(&json!(1)));
        assert_eq!(data.get("b"), Some(&json!(2)));
    }

    #[test]
    fn test_update_of_deleted_record_fails() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);
        session.set("a", json!(1)).unwrap();
        session.save(false).unwrap();

        let key = session.key().unwrap().as_str().to_string();
        store.delete(&key).unwrap();

        session.set("a", json!(2)).unwrap();
        let err = session.save(false).unwrap_err();
        assert!(matches!(err, Error::Update(k) if k == key));
    }

    #[test]
    fn test_must_create_on_taken_key() {
        let store = MemoryStore::new();
        seed(&store, "existing-key-01", "{}", 60);

        let mut session = Session::new(&store, &config(), Some("existing-key-01"));
        let err = session.save(true).unwrap_err();
        assert!(matches!(err, Error::Create(_)));
        // Forced create never loads the stored record.
        assert!(session.key().is_some());
    }

    #[test]
    fn test_create_skips_existing_key() {
        let store = MemoryStore::new();
        seed(&store, "collide-key-0001", "{}", 60);

        let mut session = Session::new(&store, &config(), None)
            .with_key_generator(scripted(&["collide-key-0001", "fresh-key-00001"]));
        session.create().unwrap();

        assert_eq!(session.key().unwrap().as_str(), "fresh-key-00001");
        assert!(session.modified());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_create_retries_when_insert_collides() {
        // `exists` cannot see the row, so the collision only shows at insert.
        let store = Probe::blind();
        seed(&store.inner, "collide-key-0001", "{}", 60);

        let mut session = Session::new(&store, &config(), None)
            .with_key_generator(scripted(&["collide-key-0001", "fresh-key-00001"]));
        session.create().unwrap();

        assert_eq!(session.key().unwrap().as_str(), "fresh-key-00001");
        assert_eq!(store.inner.len(), 2);
    }

    #[test]
    fn test_create_gives_up_after_cap() {
        let store = Probe::blind();
        seed(&store.inner, "collide-key-0001", "{}", 60);

        let mut session = Session::new(&store, &config(), None)
            .with_key_generator(KeyGenerator::with_source(|| "collide-key-0001".to_string()));
        let err = session.create().unwrap_err();

        assert!(matches!(err, Error::KeyExhausted { attempts: MAX_CREATE_ATTEMPTS }));
        assert!(session.key().is_none());
    }

    #[test]
    fn test_delete_without_key_is_noop() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);
        session.delete(None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_explicit_and_own_key() {
        let store = MemoryStore::new();
        seed(&store, "other-key-00001", "{}", 60);

        let mut session = Session::new(&store, &config(), None);
        session.save(false).unwrap();
        session.delete(Some("other-key-00001")).unwrap();
        assert_eq!(store.len(), 1);

        session.delete(None).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_flush() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);
        session.set("a", json!(1)).unwrap();
        session.save(false).unwrap();

        session.flush().unwrap();

        assert!(store.is_empty());
        assert!(session.is_empty());
    }

    #[test]
    fn test_cycle_key_keeps_data() {
        let store = MemoryStore::new();
        seed(&store, "original-key-01", r#"{"cart":[1,2]}"#, 60);

        let mut session = Session::new(&store, &config(), Some("original-key-01"));
        session.cycle_key().unwrap();

        let new_key = session.key().unwrap().as_str().to_string();
        assert_ne!(new_key, "original-key-01");
        assert!(!store.exists("original-key-01").unwrap());

        let record = store.load(&new_key).unwrap().unwrap();
        let data = JsonCodec.decode(&record.data).unwrap();
        assert_eq!(data.get("cart"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_set_expiry_round_trip() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);

        session.set_expiry(ExpiryValue::Seconds(120)).unwrap();
        assert_eq!(session.get_expiry_age().unwrap(), 120);
        assert!(session.modified());

        let at = Utc::now() + TimeDelta::days(3);
        session.set_expiry(ExpiryValue::At(at)).unwrap();
        // Stored at microsecond precision.
        let stored = session.get_expiry_date().unwrap();
        assert!((stored - at).abs() < TimeDelta::milliseconds(1));

        session.set_expiry(ExpiryValue::Default).unwrap();
        assert!(!session.contains(EXPIRY_KEY).unwrap());
        assert_eq!(session.get_expiry_age().unwrap(), 3600);
    }

    #[test]
    fn test_expiry_override_is_persisted() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);
        let at = Utc::now() + TimeDelta::days(30);
        session.set_expiry(ExpiryValue::At(at)).unwrap();
        session.save(false).unwrap();

        let record = store.get_raw(session.key().unwrap().as_str()).unwrap();
        assert!((record.expires_at - at).abs() < TimeDelta::milliseconds(1));
    }

    #[test]
    fn test_expiry_with_explicit_inputs() {
        let store = MemoryStore::new();
        let session = Session::new(&store, &config(), Some("unloaded-key-01"));
        let t = Utc::now();

        assert_eq!(session.expiry_date_with(t, None).unwrap(), t + TimeDelta::seconds(3600));
        let t2 = t + TimeDelta::hours(5);
        assert_eq!(session.expiry_date_with(t, Some(SessionExpiry::At(t2))).unwrap(), t2);
        assert_eq!(session.expiry_age_with(t, Some(SessionExpiry::Seconds(7))), 7);
        assert!(!session.accessed());
    }

    #[test]
    fn test_set_expiry_rejects_unrepresentable_overrides() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);
        session.set("a", json!(1)).unwrap();

        let err = session.set_expiry(ExpiryValue::Seconds(i64::MAX)).unwrap_err();
        assert!(matches!(err, Error::InvalidExpiry(_)));
        let err = session
            .set_expiry(ExpiryValue::In(TimeDelta::days(365 * 9000)))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidExpiry(_)));
        assert!(!session.contains(EXPIRY_KEY).unwrap());

        // Rejected overrides leave the session saveable.
        session.save(false).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_stored_huge_expiry_is_an_error() {
        let store = MemoryStore::new();
        seed(&store, "huge-expiry-001", r#"{"_session_expiry":1e300}"#, 60);
        let mut session = Session::new(&store, &config(), Some("huge-expiry-001"));

        assert!(matches!(session.get_expiry_date(), Err(Error::InvalidExpiry(_))));
        assert!(matches!(session.save(false), Err(Error::InvalidExpiry(_))));
    }

    #[test]
    fn test_oversized_cookie_age_fails_save() {
        let store = MemoryStore::new();
        let config = SessionConfig::default().with_cookie_age(i64::MAX);
        let mut session = Session::new(&store, &config, None);
        session.set("a", json!(1)).unwrap();

        assert!(matches!(session.save(false), Err(Error::InvalidExpiry(_))));
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_pop_and_setdefault() {
        let store = MemoryStore::new();
        let mut session = Session::new(&store, &config(), None);

        assert_eq!(session.pop("nope").unwrap(), None);
        assert!(!session.modified());
        assert_eq!(session.pop_or("nope", json!("d")).unwrap(), json!("d"));

        assert_eq!(session.setdefault("k", json!(1)).unwrap(), json!(1));
        assert!(session.modified());
        assert_eq!(session.setdefault("k", json!(2)).unwrap(), json!(1));
        assert!(session.has_key("k").unwrap());
        assert_eq!(session.pop("k").unwrap(), Some(json!(1)));
        assert!(session.items().unwrap().is_empty());
        assert!(session.values().unwrap().is_empty());
    }

    #[test]
    fn test_key_salt_names_backend() {
        let store = MemoryStore::new();
        let session = Session::new(&store, &config().with_key_salt("app"), None);
        assert_eq!(session.key_salt(), "app.memory");
    }
}
