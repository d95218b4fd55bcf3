//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [session]                # cookie and expiry policy
//! [store]                  # database location, sweeper
//! [logging]                # log directory and level
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sesame_session::{
    DEFAULT_COOKIE_AGE, DEFAULT_COOKIE_NAME, DEFAULT_KEY_SALT, MAX_COOKIE_AGE, SessionConfig,
};

use crate::error::ConfigError;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SesameConfig {
    /// Session policy.
    pub session: Option<SessionSection>,

    /// Record store settings.
    pub store: Option<StoreSection>,

    /// Log output settings.
    pub logging: Option<LoggingSection>,
}

impl SesameConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is per section: a section present in `other` replaces the
    /// whole section here.
    pub fn merge(&mut self, other: SesameConfig) {
        if other.session.is_some() {
            self.session = other.session;
        }

        if other.store.is_some() {
            self.store = other.store;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// The `[session]` section, or defaults.
    pub fn session(&self) -> SessionSection {
        self.session.clone().unwrap_or_default()
    }

    /// The `[store]` section, or defaults.
    pub fn store(&self) -> StoreSection {
        self.store.clone().unwrap_or_default()
    }

    /// The `[logging]` section, or defaults.
    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Session policy.
///
/// ```toml
/// [session]
/// cookie_age = 1209600
/// cookie_name = "sessionID"
/// save_every_request = false
/// expire_at_browser_close = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Default session lifetime in seconds.
    pub cookie_age: i64,
    /// Name of the session cookie.
    pub cookie_name: String,
    /// Namespace for session keys.
    pub key_salt: String,
    /// Save the session on every request, not only when modified.
    pub save_every_request: bool,
    /// Issue browser-session cookies by default.
    pub expire_at_browser_close: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            cookie_age: DEFAULT_COOKIE_AGE,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            key_salt: DEFAULT_KEY_SALT.to_string(),
            save_every_request: false,
            expire_at_browser_close: false,
        }
    }
}

impl SessionSection {
    /// Validate and convert to the core session configuration.
    pub fn to_session_config(&self) -> crate::Result<SessionConfig> {
        if self.cookie_age <= 0 {
            return Err(ConfigError::invalid(
                "session.cookie_age",
                format!("must be positive, got {}", self.cookie_age),
            ));
        }
        if self.cookie_age > MAX_COOKIE_AGE {
            return Err(ConfigError::invalid(
                "session.cookie_age",
                format!("must be at most {MAX_COOKIE_AGE}, got {}", self.cookie_age),
            ));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "session.cookie_name",
                "must not be empty",
            ));
        }

        Ok(SessionConfig::default()
            .with_cookie_age(self.cookie_age)
            .with_cookie_name(self.cookie_name.clone())
            .with_key_salt(self.key_salt.clone())
            .with_save_every_request(self.save_every_request)
            .with_expire_at_browser_close(self.expire_at_browser_close))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Record store settings.
///
/// ```toml
/// [store]
/// database = "/var/lib/sesame/sessions.db"
/// sweep_interval_secs = 300
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Path to the SQLite database.
    /// Relative paths are resolved from the data directory.
    pub database: Option<PathBuf>,
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            database: None,
            sweep_interval_secs: 300,
        }
    }
}

impl StoreSection {
    /// Database file name used when none is configured.
    pub const DEFAULT_DATABASE: &'static str = "sessions.db";

    /// Resolve the database path against `data_dir`.
    pub fn database_path(&self, data_dir: &std::path::Path) -> PathBuf {
        match &self.database {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => data_dir.join(Self::DEFAULT_DATABASE),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log output settings.
///
/// ```toml
/// [logging]
/// level = "info"
/// directory = "/var/log/sesame"
/// file = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Console filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rolling JSON log files.
    pub directory: Option<PathBuf>,
    /// Whether to write the JSON log file at all.
    pub file: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            file: true,
        }
    }
}
