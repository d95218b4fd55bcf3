//! SQLite-backed session records.
//!
//! [`SqliteStore`] implements [`sesame_session::SessionStore`] over a single
//! `sessions` table, created by embedded migrations on open.
//! [`spawn_cleanup_task`] runs a periodic expiry sweep on a tokio runtime.
//!
//! ```rust,ignore
//! let store = Arc::new(SqliteStore::open(&db_path)?);
//! let _sweeper = spawn_cleanup_task(Arc::clone(&store), Duration::from_secs(300));
//!
//! let mut session = Session::new(Arc::clone(&store), &config, cookie.as_deref());
//! ```

pub mod cleanup;
pub mod error;
pub mod sqlite;

pub use cleanup::{DEFAULT_SWEEP_INTERVAL_SECS, spawn_cleanup_task};
pub use error::{Result, StoreError};
pub use sqlite::SqliteStore;
