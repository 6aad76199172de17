//! In-memory timer handles, one per pending reminder.
//!
//! The table is a rebuildable cache over the store: it never survives a
//! restart and is reconstructed by the restorer. Each armed id owns at most
//! one live tokio task; disarming aborts the task only while it is still
//! sleeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Map of reminder id to its cancellable sleep task.
///
/// Race protocol: `arm` holds the table lock across the spawn and inserts
/// the handle before releasing it. The spawned task, once its sleep ends,
/// removes its own handle *before* running the fire work, so by the time
/// the work starts there is nothing left for `disarm` to abort. A disarm
/// that loses that race returns `false` and the fire runs to completion.
#[derive(Clone, Default)]
pub struct TimerTable {
    handles: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
}

impl TimerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `fire` to run after `delay`. A zero delay still goes through
    /// the task so it runs exactly once, never inline in the caller.
    ///
    /// Arming an id that already has a live handle replaces it; the old
    /// sleeper is aborted.
    pub async fn arm<F>(&self, id: impl Into<String>, delay: Duration, fire: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let mut handles = self.handles.lock().await;

        let table = self.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Surrender the slot first. This blocks until the arming insert
            // below has completed, so even a zero-delay timer cannot leave a
            // stale handle behind.
            table.handles.lock().await.remove(&task_id);
            fire.await;
        });

        if let Some(old) = handles.insert(id, handle) {
            old.abort();
        }
    }

    /// Cancel a pending timer. Returns `false` when the id is unknown or its
    /// fire has already begun; a fire in progress is never interrupted.
    pub async fn disarm(&self, id: &str) -> bool {
        match self.handles.lock().await.remove(id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending timer. Used on shutdown.
    pub async fn disarm_all(&self) -> usize {
        let mut handles = self.handles.lock().await;
        let count = handles.len();
        for (_, handle) in handles.drain() {
            handle.abort();
        }
        count
    }

    /// Whether `id` currently has a sleeping timer.
    pub async fn is_armed(&self, id: &str) -> bool {
        self.handles.lock().await.contains_key(id)
    }

    /// Number of sleeping timers.
    pub async fn armed_count(&self) -> usize {
        self.handles.lock().await.len()
    }
}

impl std::fmt::Debug for TimerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerTable").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test]
    async fn zero_delay_fires_exactly_once() {
        let table = TimerTable::new();
        let fired = counter();

        let seen = Arc::clone(&fired);
        table
            .arm("r1", Duration::ZERO, async move {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(table.armed_count().await, 0);
    }

    #[tokio::test]
    async fn disarm_before_fire_cancels() {
        let table = TimerTable::new();
        let fired = counter();

        let seen = Arc::clone(&fired);
        table
            .arm("r1", Duration::from_millis(200), async move {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert!(table.is_armed("r1").await);
        assert!(table.disarm("r1").await);
        assert!(!table.is_armed("r1").await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disarm_after_fire_returns_false() {
        let table = TimerTable::new();
        let fired = counter();

        let seen = Arc::clone(&fired);
        table
            .arm("r1", Duration::from_millis(10), async move {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!table.disarm("r1").await);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disarm_unknown_id_returns_false() {
        let table = TimerTable::new();
        assert!(!table.disarm("nope").await);
    }

    #[tokio::test]
    async fn rearming_replaces_the_old_timer() {
        let table = TimerTable::new();
        let first = counter();
        let second = counter();

        let seen = Arc::clone(&first);
        table
            .arm("r1", Duration::from_millis(150), async move {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        let seen = Arc::clone(&second);
        table
            .arm("r1", Duration::from_millis(10), async move {
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(table.armed_count().await, 0);
    }

    #[tokio::test]
    async fn fire_in_progress_wins_over_disarm() {
        let table = TimerTable::new();
        let finished = counter();

        let seen = Arc::clone(&finished);
        table
            .arm("r1", Duration::from_millis(10), async move {
                // Simulates slow delivery after the handle is surrendered.
                tokio::time::sleep(Duration::from_millis(100)).await;
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        // Well inside the slow-delivery window.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!table.disarm("r1").await);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disarm_all_aborts_everything() {
        let table = TimerTable::new();
        let fired = counter();

        for i in 0..3 {
            let seen = Arc::clone(&fired);
            table
                .arm(format!("r{i}"), Duration::from_millis(150), async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        assert_eq!(table.disarm_all().await, 3);
        assert_eq!(table.armed_count().await, 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
