//! CLI command handlers.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use sesame_config::StoreSection;
use sesame_session::SessionConfig;
use sesame_store::SqliteStore;

pub mod clear_expired;
pub mod count;
pub mod delete;
pub mod inspect;
pub mod sweep;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Resolved session database path.
    pub db_path: PathBuf,
    /// Validated session policy.
    pub session: SessionConfig,
    /// Store settings.
    pub store: StoreSection,
}

impl Context {
    /// Open the session database.
    pub fn open_store(&self) -> Result<SqliteStore> {
        SqliteStore::open(&self.db_path)
            .with_context(|| format!("failed to open session store at {}", self.db_path.display()))
    }
}
