//! Server-side sessions.
//!
//! A [`Session`] binds an opaque client-presented key to a server-held map
//! of JSON values and manages the persisted record behind it:
//! - Unique key generation with bounded retries
//! - Lazy loading with accessed/modified tracking
//! - Distinct "must create" and "must update" save semantics
//! - Per-session expiry overrides on top of a configured cookie age
//!
//! Persistence goes through the [`SessionStore`] trait. [`MemoryStore`] is
//! provided here; the SQLite store lives in `sesame-store`.
//!
//! # Example
//!
//! ```rust,ignore
//! use sesame_session::{CookiePolicy, MemoryStore, Session, SessionConfig};
//!
//! let config = SessionConfig::default().with_cookie_age(3600);
//! let store = MemoryStore::new();
//!
//! let mut session = Session::new(&store, &config, cookie_value.as_deref());
//! session.set("user_id", serde_json::json!(42))?;
//!
//! let action = CookiePolicy::from_config(&config).finalize(&mut session, cookie_value.is_some())?;
//! ```

mod cache;
mod codec;
mod config;
mod error;
mod expiry;
mod key;
mod policy;
mod session;
mod store;

pub use cache::{CacheState, SessionCache, SessionMap};
pub use codec::{JsonCodec, SessionCodec};
pub use config::{
    DEFAULT_COOKIE_AGE, DEFAULT_COOKIE_NAME, DEFAULT_KEY_SALT, MAX_COOKIE_AGE, SessionConfig,
};
pub use error::{Error, Result};
pub use expiry::{
    EXPIRY_KEY, ExpiryPolicy, ExpiryValue, MAX_EXPIRY_YEAR, SessionExpiry, check_expiry_instant,
    format_timestamp, parse_timestamp,
};
pub use key::{
    KEY_LENGTH, KeyGenerator, MAX_KEY_ATTEMPTS, MAX_KEY_LENGTH, MIN_KEY_LENGTH, SessionKey,
    is_valid_key, random_key,
};
pub use policy::{CookieAction, CookiePolicy};
pub use session::{MAX_CREATE_ATTEMPTS, Session};
pub use store::{MemoryStore, SessionRecord, SessionStore};
