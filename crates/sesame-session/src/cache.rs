//! Lazily materialized session state with accessed/modified tracking.

use serde_json::Value;

use crate::error::Result;

/// Mapping held by a session.
pub type SessionMap = serde_json::Map<String, Value>;

/// Materialization state of a session cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CacheState {
    /// Nothing has touched the session yet.
    #[default]
    Unloaded,
    /// Populated, either empty or from the store.
    Loaded(SessionMap),
}

/// In-memory session state.
///
/// Starts [`CacheState::Unloaded`] and is materialized exactly once, either
/// by a loader or directly to an empty map. Every mutating operation sets
/// the `modified` flag; materialization sets `accessed`.
///
/// The mapping operations below assume materialization already happened.
/// On an unloaded cache they materialize to empty, which is the right
/// behavior for a cache that has no store behind it.
#[derive(Debug, Default)]
pub struct SessionCache {
    state: CacheState,
    accessed: bool,
    modified: bool,
}

impl SessionCache {
    /// Create an unloaded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current materialization state.
    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// Whether the cache has been materialized.
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, CacheState::Loaded(_))
    }

    /// Whether the session state has been read or written.
    pub fn accessed(&self) -> bool {
        self.accessed
    }

    /// Whether the session state has been changed.
    pub fn modified(&self) -> bool {
        self.modified
    }

    /// Flag the state as changed.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// The loaded map, without materializing.
    pub fn peek(&self) -> Option<&SessionMap> {
        match &self.state {
            CacheState::Unloaded => None,
            CacheState::Loaded(map) => Some(map),
        }
    }

    /// True when unloaded or loaded with no entries.
    pub fn is_vacant(&self) -> bool {
        self.peek().is_none_or(SessionMap::is_empty)
    }

    /// Materialize through `load` unless already loaded.
    ///
    /// A failing loader leaves the cache unloaded so a later access retries.
    pub fn materialize<F>(&mut self, load: F) -> Result<&mut SessionMap>
    where
        F: FnOnce() -> Result<SessionMap>,
    {
        self.accessed = true;
        if let CacheState::Unloaded = self.state {
            self.state = CacheState::Loaded(load()?);
        }
        Ok(self.map_mut())
    }

    /// Materialize to an empty map unless already loaded.
    pub fn materialize_empty(&mut self) -> &mut SessionMap {
        self.accessed = true;
        self.map_mut()
    }

    fn map_mut(&mut self) -> &mut SessionMap {
        if let CacheState::Unloaded = self.state {
            self.state = CacheState::Loaded(SessionMap::new());
        }
        match &mut self.state {
            CacheState::Loaded(map) => map,
            CacheState::Unloaded => unreachable!("cache materialized above"),
        }
    }

    /// Check for an entry.
    pub fn contains(&mut self, key: &str) -> bool {
        self.map_mut().contains_key(key)
    }

    /// Clone an entry.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        self.map_mut().get(key).cloned()
    }

    /// Insert or replace an entry.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.map_mut().insert(key.into(), value);
        self.modified = true;
    }

    /// Remove an entry. Only an actual removal marks the cache modified.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let removed = self.map_mut().remove(key);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    /// Return the existing entry, or insert `value` and return it.
    pub fn setdefault(&mut self, key: &str, value: Value) -> Value {
        if let Some(existing) = self.map_mut().get(key) {
            return existing.clone();
        }
        self.set(key, value.clone());
        value
    }

    /// Merge entries into the map.
    pub fn update<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.map_mut().extend(entries);
        self.modified = true;
    }

    /// Snapshot of the keys.
    pub fn keys(&mut self) -> Vec<String> {
        self.map_mut().keys().cloned().collect()
    }

    /// Snapshot of the values.
    pub fn values(&mut self) -> Vec<Value> {
        self.map_mut().values().cloned().collect()
    }

    /// Snapshot of the entries.
    pub fn items(&mut self) -> Vec<(String, Value)> {
        self.map_mut()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Number of entries.
    pub fn len(&mut self) -> usize {
        self.map_mut().len()
    }

    /// Whether the materialized map has no entries.
    pub fn is_empty(&mut self) -> bool {
        self.map_mut().is_empty()
    }

    /// Replace the state with an empty map without loading anything.
    pub fn clear(&mut self) {
        self.state = CacheState::Loaded(SessionMap::new());
        self.accessed = true;
        self.modified = true;
    }

    /// Drop the state back to unloaded, keeping the flags.
    pub fn unload(&mut self) {
        self.state = CacheState::Unloaded;
    }
}
