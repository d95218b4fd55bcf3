//! Outgoing cookie decision at the end of a request.
//!
//! This is a pure decision over session state; applying the resulting
//! [`CookieAction`] to a response is the HTTP layer's job.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;
use crate::store::SessionStore;

/// What to do with the session cookie on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieAction {
    /// Leave the cookie alone.
    Keep,
    /// Remove the client's cookie.
    Delete { name: String },
    /// Set the cookie. `max_age` and `expires` are `None` for a
    /// browser-session cookie.
    Set {
        name: String,
        value: String,
        max_age: Option<i64>,
        expires: Option<DateTime<Utc>>,
    },
}

/// Decides the outgoing cookie and saves the session when needed.
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    cookie_name: String,
    save_every_request: bool,
}

impl CookiePolicy {
    /// Create a policy for the named cookie that saves only modified sessions.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            save_every_request: false,
        }
    }

    /// Build the policy from session configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            save_every_request: config.save_every_request,
        }
    }

    /// Save (and refresh the cookie for) every non-empty session, modified or not.
    pub fn with_save_every_request(mut self, enabled: bool) -> Self {
        self.save_every_request = enabled;
        self
    }

    /// Name of the session cookie.
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Finish a request.
    ///
    /// `cookie_present` is whether the request carried a session cookie.
    /// A modified, non-empty session is saved before the cookie is set, so
    /// an [`Error::Update`](crate::Error::Update) from a concurrently deleted
    /// record propagates to the caller.
    pub fn finalize<S: SessionStore>(
        &self,
        session: &mut Session<S>,
        cookie_present: bool,
    ) -> Result<CookieAction> {
        if session.is_empty() {
            if cookie_present {
                debug!(cookie = %self.cookie_name, "Session emptied, deleting cookie");
                return Ok(CookieAction::Delete {
                    name: self.cookie_name.clone(),
                });
            }
            return Ok(CookieAction::Keep);
        }

        if !(session.modified() || self.save_every_request) {
            return Ok(CookieAction::Keep);
        }

        session.save(false)?;

        let Some(key) = session.key() else {
            return Ok(CookieAction::Keep);
        };
        let value = key.as_str().to_string();

        let (max_age, expires) = if session.get_expire_at_browser_close()? {
            (None, None)
        } else {
            (
                Some(session.get_expiry_age()?),
                Some(session.get_expiry_date()?),
            )
        };

        Ok(CookieAction::Set {
            name: self.cookie_name.clone(),
            value,
            max_age,
            expires,
        })
    }
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}
