//! Configuration for session handles.

/// Default cookie age: two weeks, in seconds.
pub const DEFAULT_COOKIE_AGE: i64 = 60 * 60 * 24 * 7 * 2;

/// Longest accepted cookie age: 100 years, in seconds.
///
/// Keeps every expiry instant a session can compute inside the range the
/// record store orders correctly.
pub const MAX_COOKIE_AGE: i64 = 60 * 60 * 24 * 365 * 100;

/// Default salt used to namespace session keys per store.
pub const DEFAULT_KEY_SALT: &str = "sesame.session";

/// Default name of the cookie carrying the session key.
pub const DEFAULT_COOKIE_NAME: &str = "sessionID";

/// Configuration shared by all session handles of a process.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default lifetime of a session, in seconds.
    pub cookie_age: i64,

    /// Salt prefix for the per-store key namespace.
    pub key_salt: String,

    /// Name of the cookie that transports the session key.
    pub cookie_name: String,

    /// Persist and re-issue the cookie on every request, not only when modified.
    pub save_every_request: bool,

    /// Issue browser-session cookies unless a session sets its own expiry.
    pub expire_at_browser_close: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_age: DEFAULT_COOKIE_AGE,
            key_salt: DEFAULT_KEY_SALT.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            save_every_request: false,
            expire_at_browser_close: false,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default session lifetime in seconds.
    pub fn with_cookie_age(mut self, secs: i64) -> Self {
        self.cookie_age = secs;
        self
    }

    /// Set the key salt.
    pub fn with_key_salt(mut self, salt: impl Into<String>) -> Self {
        self.key_salt = salt.into();
        self
    }

    /// Set the cookie name.
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Enable or disable saving on every request.
    pub fn with_save_every_request(mut self, enabled: bool) -> Self {
        self.save_every_request = enabled;
        self
    }

    /// Enable or disable browser-session cookies by default.
    pub fn with_expire_at_browser_close(mut self, enabled: bool) -> Self {
        self.expire_at_browser_close = enabled;
        self
    }
}
