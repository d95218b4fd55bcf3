use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, ffi, params};
use sesame_session::{SessionRecord, SessionStore, format_timestamp, parse_timestamp};
use tracing::{debug, info};

use crate::{Result, StoreError};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// SQLite repository for session records.
///
/// Thread-safe via internal `Mutex<Connection>`; every call is one short
/// blocking statement. Expiry timestamps are stored as fixed-width RFC 3339
/// strings so the `expire_date` index orders them chronologically.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let mut store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.run_migrations()?;

        info!(path = %path.display(), "Session store opened");
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.run_migrations()?;

        debug!("In-memory session store created");
        Ok(store)
    }

    fn run_migrations(&mut self) -> Result<()> {
        let report = embedded::migrations::runner()
            .run(self.conn.get_mut())
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        for migration in report.applied_migrations() {
            info!(migration = %migration, "Applied session store migration");
        }
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Database file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ── Records ─────────────────────────────────────────────────────

    /// Insert a new record. A taken key is [`StoreError::Duplicate`].
    pub fn insert_record(&self, record: &SessionRecord) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (session_key, session_data, expire_date)
             VALUES (?1, ?2, ?3)",
            params![
                record.key,
                record.data,
                format_timestamp(&record.expires_at)
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(StoreError::Duplicate(record.key.clone())),
            Err(e) => Err(e.into()),
        }
    }

    /// Update an existing record in place. A missing row is
    /// [`StoreError::NotFound`].
    pub fn update_record(&self, record: &SessionRecord) -> Result<()> {
        let changed = self.conn().execute(
            "UPDATE sessions SET session_data = ?2, expire_date = ?3 WHERE session_key = ?1",
            params![
                record.key,
                record.data,
                format_timestamp(&record.expires_at)
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(record.key.clone()));
        }
        Ok(())
    }

    /// Whether any row holds `key`, expired or not.
    pub fn has_record(&self, key: &str) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM sessions WHERE session_key = ?1",
                params![key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Fetch the record for `key` if it has not expired.
    pub fn get_active(&self, key: &str) -> Result<Option<SessionRecord>> {
        let now = format_timestamp(&Utc::now());
        let record = self
            .conn()
            .query_row(
                "SELECT session_key, session_data, expire_date FROM sessions
                 WHERE session_key = ?1 AND expire_date > ?2",
                params![key, now],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Fetch the record for `key` regardless of expiry.
    pub fn get_record(&self, key: &str) -> Result<Option<SessionRecord>> {
        let record = self
            .conn()
            .query_row(
                "SELECT session_key, session_data, expire_date FROM sessions
                 WHERE session_key = ?1",
                params![key],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Delete the row for `key`, returning whether one existed.
    pub fn delete_record(&self, key: &str) -> Result<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM sessions WHERE session_key = ?1", params![key])?;
        Ok(changed > 0)
    }

    /// Delete every expired row, returning how many were removed.
    pub fn delete_expired(&self) -> Result<usize> {
        let now = format_timestamp(&Utc::now());
        let removed = self
            .conn()
            .execute("DELETE FROM sessions WHERE expire_date <= ?1", params![now])?;
        if removed > 0 {
            debug!(removed, "Deleted expired session rows");
        }
        Ok(removed)
    }

    // ── Inspection ──────────────────────────────────────────────────

    /// Total rows, expired included.
    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Rows that have not expired.
    pub fn count_active(&self) -> Result<usize> {
        let now = format_timestamp(&Utc::now());
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM sessions WHERE expire_date > ?1",
            params![now],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// All keys, soonest-expiring first.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT session_key FROM sessions ORDER BY expire_date, session_key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SessionStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn exists(&self, key: &str) -> sesame_session::Result<bool> {
        Ok(self.has_record(key)?)
    }

    fn load(&self, key: &str) -> sesame_session::Result<Option<SessionRecord>> {
        Ok(self.get_active(key)?)
    }

    fn save(&self, record: &SessionRecord, must_create: bool) -> sesame_session::Result<()> {
        if must_create {
            self.insert_record(record)?;
        } else {
            self.update_record(record)?;
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> sesame_session::Result<()> {
        self.delete_record(key)?;
        Ok(())
    }

    fn clear_expired(&self) -> sesame_session::Result<usize> {
        Ok(self.delete_expired()?)
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && matches!(
                    e.extended_code,
                    ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE
                )
    )
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
    let expire_date: String = row.get(2)?;
    let expires_at = parse_timestamp(&expire_date)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(SessionRecord {
        key: row.get(0)?,
        data: row.get(1)?,
        expires_at,
    })
}
