//! Background expiry sweeper.
//!
//! Periodically deletes expired rows so the table does not grow without
//! bound. Loads already ignore expired rows; this only reclaims space.

use std::sync::Arc;
use std::time::Duration;

use sesame_session::SessionStore;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Default sweep interval in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Spawn a task that calls `clear_expired` on `store` every `every`.
///
/// The first sweep happens one interval after spawning. Failures are logged
/// and the task keeps running; abort the returned handle to stop it.
pub fn spawn_cleanup_task<S>(store: Arc<S>, every: Duration) -> JoinHandle<()>
where
    S: SessionStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let sweep = Arc::clone(&store);
            match tokio::task::spawn_blocking(move || sweep.clear_expired()).await {
                Ok(Ok(0)) => debug!(backend = store.backend_name(), "Session sweep: nothing expired"),
                Ok(Ok(removed)) => info!(
                    backend = store.backend_name(),
                    removed, "Session sweep completed"
                ),
                Ok(Err(e)) => warn!(error = %e, "Session sweep failed"),
                Err(e) => warn!(error = %e, "Session sweep task panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteStore;
    use chrono::{TimeDelta, Utc};
    use sesame_session::SessionRecord;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_only() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let expired = SessionRecord::new("expired-0001", "{}", Utc::now() - TimeDelta::seconds(5));
        let active = SessionRecord::new("active-00001", "{}", Utc::now() + TimeDelta::hours(1));
        store.insert_record(&expired).unwrap();
        store.insert_record(&active).unwrap();

        let handle = spawn_cleanup_task(Arc::clone(&store), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.abort();

        assert_eq!(store.list_keys().unwrap(), vec!["active-00001"]);
    }

    #[tokio::test]
    async fn test_cleanup_task_survives_unsupported_store() {
        struct NoSweep;

        impl SessionStore for NoSweep {
            fn backend_name(&self) -> &'static str {
                "nosweep"
            }
            fn exists(&self, _key: &str) -> sesame_session::Result<bool> {
                Ok(false)
            }
            fn load(&self, _key: &str) -> sesame_session::Result<Option<SessionRecord>> {
                Ok(None)
            }
            fn save(&self, _r: &SessionRecord, _must_create: bool) -> sesame_session::Result<()> {
                Ok(())
            }
            fn delete(&self, _key: &str) -> sesame_session::Result<()> {
                Ok(())
            }
        }

        let handle = spawn_cleanup_task(Arc::new(NoSweep), Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
