//! Expiry computation for sessions.
//!
//! A session may carry its own expiry override under [`EXPIRY_KEY`], stored
//! alongside user data so it is persisted and dirty-tracked like any other
//! entry. Without an override the configured cookie age applies.

use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use serde_json::Value;

use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Reserved session entry holding the expiry override.
pub const EXPIRY_KEY: &str = "_session_expiry";

/// Latest year an expiry instant may fall in.
///
/// Later years format with a sign and extra digits, which breaks both
/// parsing and the lexical ordering of stored timestamps.
pub const MAX_EXPIRY_YEAR: i32 = 9999;

/// Format a timestamp as fixed-width RFC 3339 UTC (microseconds, `Z`).
///
/// Fixed width keeps lexical order equal to chronological order for years
/// 1 through [`MAX_EXPIRY_YEAR`].
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp, or a naive ISO 8601 one read as UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::InvalidExpiry(s.to_string()))
}

/// Reject instants outside the range [`format_timestamp`] keeps ordered.
pub fn check_expiry_instant(ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if (1..=MAX_EXPIRY_YEAR).contains(&ts.year()) {
        Ok(ts)
    } else {
        Err(Error::InvalidExpiry(format_timestamp(&ts)))
    }
}

/// `base` shifted by `secs` seconds, failing instead of overflowing.
fn offset_seconds(base: DateTime<Utc>, secs: i64) -> Result<DateTime<Utc>> {
    let shifted = TimeDelta::try_seconds(secs)
        .and_then(|delta| base.checked_add_signed(delta))
        .ok_or_else(|| Error::InvalidExpiry(format!("{secs} seconds is out of range")))?;
    check_expiry_instant(shifted)
}

/// An expiry override as stored in session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    /// Expire after this many seconds of inactivity. Zero means "at browser close".
    Seconds(i64),
    /// Expire at a fixed instant.
    At(DateTime<Utc>),
}

impl SessionExpiry {
    /// Interpret a stored entry. `null` means no override.
    ///
    /// Second counts that cannot be represented as a duration, and instants
    /// past [`MAX_EXPIRY_YEAR`], are rejected.
    pub fn from_value(value: &Value) -> Result<Option<Self>> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => {
                let secs = match n.as_i64() {
                    Some(secs) => Some(secs),
                    None => n
                        .as_f64()
                        .map(f64::floor)
                        .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                        .map(|f| f as i64),
                };
                secs.filter(|secs| TimeDelta::try_seconds(*secs).is_some())
                    .map(|secs| Some(Self::Seconds(secs)))
                    .ok_or_else(|| Error::InvalidExpiry(n.to_string()))
            }
            Value::String(s) => {
                let ts = check_expiry_instant(parse_timestamp(s)?)?;
                Ok(Some(Self::At(ts)))
            }
            other => Err(Error::InvalidExpiry(other.to_string())),
        }
    }

    /// Encode for storage in session state.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Seconds(secs) => Value::from(*secs),
            Self::At(ts) => Value::String(format_timestamp(ts)),
        }
    }
}

/// Argument to `Session::set_expiry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryValue {
    /// Remove any override and fall back to the configured policy.
    Default,
    /// Expire after this many seconds of inactivity (zero: at browser close).
    Seconds(i64),
    /// Expire this long from now.
    In(TimeDelta),
    /// Expire at a fixed instant.
    At(DateTime<Utc>),
}

impl ExpiryValue {
    /// Resolve to the override to store, relative to `now`.
    ///
    /// Fails with [`Error::InvalidExpiry`] when the resulting instant would
    /// overflow or land past [`MAX_EXPIRY_YEAR`].
    pub fn resolve(self, now: DateTime<Utc>) -> Result<Option<SessionExpiry>> {
        match self {
            Self::Default => Ok(None),
            Self::Seconds(secs) => {
                offset_seconds(now, secs)?;
                Ok(Some(SessionExpiry::Seconds(secs)))
            }
            Self::In(delta) => {
                let ts = now.checked_add_signed(delta).ok_or_else(|| {
                    Error::InvalidExpiry(format!("{} seconds is out of range", delta.num_seconds()))
                })?;
                Ok(Some(SessionExpiry::At(check_expiry_instant(ts)?)))
            }
            Self::At(ts) => Ok(Some(SessionExpiry::At(check_expiry_instant(ts)?))),
        }
    }
}

/// Computes expiry ages and instants from the configured cookie age.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    cookie_age: i64,
    expire_at_browser_close: bool,
}

impl ExpiryPolicy {
    /// Create a policy with the given default age in seconds.
    pub fn new(cookie_age: i64) -> Self {
        Self {
            cookie_age,
            expire_at_browser_close: false,
        }
    }

    /// Build the policy from session configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            cookie_age: config.cookie_age,
            expire_at_browser_close: config.expire_at_browser_close,
        }
    }

    /// Default age in seconds.
    pub fn cookie_age(&self) -> i64 {
        self.cookie_age
    }

    /// Seconds from `modification` until the session expires.
    pub fn expiry_age(&self, modification: DateTime<Utc>, expiry: Option<SessionExpiry>) -> i64 {
        match expiry {
            None | Some(SessionExpiry::Seconds(0)) => self.cookie_age,
            Some(SessionExpiry::Seconds(secs)) => secs,
            Some(SessionExpiry::At(ts)) => floor_seconds(ts - modification),
        }
    }

    /// Instant at which the session expires, counted from `modification`.
    ///
    /// An age too large to add, or an instant past [`MAX_EXPIRY_YEAR`],
    /// fails with [`Error::InvalidExpiry`].
    pub fn expiry_date(
        &self,
        modification: DateTime<Utc>,
        expiry: Option<SessionExpiry>,
    ) -> Result<DateTime<Utc>> {
        match expiry {
            Some(SessionExpiry::At(ts)) => check_expiry_instant(ts),
            None | Some(SessionExpiry::Seconds(0)) => offset_seconds(modification, self.cookie_age),
            Some(SessionExpiry::Seconds(secs)) => offset_seconds(modification, secs),
        }
    }

    /// Whether the cookie should be a browser-session cookie.
    pub fn expire_at_browser_close(&self, expiry: Option<SessionExpiry>) -> bool {
        match expiry {
            None => self.expire_at_browser_close,
            Some(SessionExpiry::Seconds(secs)) => secs == 0,
            Some(SessionExpiry::At(_)) => false,
        }
    }
}

fn floor_seconds(delta: TimeDelta) -> i64 {
    let secs = delta.num_seconds();
    if delta < TimeDelta::seconds(secs) {
        secs - 1
    } else {
        secs
    }
}
