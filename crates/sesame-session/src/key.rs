//! Session keys and their generation.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use tracing::{error, trace};

use crate::error::{Error, Result};

/// Length of generated session keys.
pub const KEY_LENGTH: usize = 32;

/// Shortest key accepted when binding a caller-supplied key.
pub const MIN_KEY_LENGTH: usize = 8;

/// Longest key the record schema can hold.
pub const MAX_KEY_LENGTH: usize = 40;

/// Candidates tried before key generation gives up.
pub const MAX_KEY_ATTEMPTS: usize = 10_000;

/// Cookie-safe alphabet: 64 symbols, so a 32-character key carries 192 bits.
const KEY_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";

/// Check whether a candidate is acceptable as a session key.
///
/// A key must be between [`MIN_KEY_LENGTH`] and [`MAX_KEY_LENGTH`]
/// characters long. Longer keys could never be stored, so a cookie carrying
/// one is discarded like a short one.
pub fn is_valid_key(candidate: &str) -> bool {
    (MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&candidate.chars().count())
}

/// Produce a random [`KEY_LENGTH`]-character key from the thread RNG.
pub fn random_key() -> String {
    let mut rng = rand::rng();
    (0..KEY_LENGTH)
        .map(|_| KEY_ALPHABET[rng.random_range(0..KEY_ALPHABET.len())] as char)
        .collect()
}

/// A validated session key.
///
/// Only constructible through [`SessionKey::parse`], so holding one proves
/// the key passed [`is_valid_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Validate a candidate key. Returns `None` if it is empty, too short, or too long.
    pub fn parse(candidate: &str) -> Option<Self> {
        is_valid_key(candidate).then(|| Self(candidate.to_string()))
    }

    /// Borrow the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

type KeySource = Arc<dyn Fn() -> String + Send + Sync>;

/// Generates session keys that are not yet in use.
///
/// The candidate source defaults to [`random_key`]; tests and embedders can
/// replace it with [`KeyGenerator::with_source`].
#[derive(Clone)]
pub struct KeyGenerator {
    source: KeySource,
    max_attempts: usize,
}

impl KeyGenerator {
    /// Create a generator backed by the thread RNG.
    pub fn new() -> Self {
        Self::with_source(random_key)
    }

    /// Create a generator drawing candidates from `source`.
    pub fn with_source(source: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            source: Arc::new(source),
            max_attempts: MAX_KEY_ATTEMPTS,
        }
    }

    /// Override the retry cap.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Draw one candidate from the source.
    pub fn generate(&self) -> String {
        (self.source)()
    }

    /// Draw candidates until `exists` reports one as unused.
    ///
    /// Invalid candidates from a custom source are skipped. Gives up with
    /// [`Error::KeyExhausted`] after the retry cap.
    pub fn new_unique_key<F>(&self, mut exists: F) -> Result<SessionKey>
    where
        F: FnMut(&str) -> Result<bool>,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.generate();
            let Some(key) = SessionKey::parse(&candidate) else {
                trace!(attempt, "Discarding invalid key candidate");
                continue;
            };
            if !exists(key.as_str())? {
                return Ok(key);
            }
            trace!(attempt, "Key candidate already in use");
        }

        error!(
            attempts = self.max_attempts,
            "Key generation exhausted its retry cap"
        );
        Err(Error::KeyExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyGenerator")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
