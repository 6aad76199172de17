//! Durable persistence for the reminder collection.
//!
//! The whole collection lives in one JSON document. Every mutation is a
//! read-modify-write of the full document under a single async mutex, and
//! every write goes through a temp-file-then-rename replace so a crash
//! mid-write never leaves a truncated document behind.

use crate::error::{LembraError, Result};
use crate::reminder::Reminder;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Whole-document JSON store for [`Reminder`] records.
///
/// The store is the single durable source of "pending": a record is present
/// exactly while it is neither delivered nor cancelled. All access funnels
/// through [`ReminderStore::update`] or [`ReminderStore::snapshot`].
pub struct ReminderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ReminderStore {
    /// Create a store backed by `path`. The file is created lazily on the
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current collection without mutating it.
    pub async fn snapshot(&self) -> Vec<Reminder> {
        let _guard = self.lock.lock().await;
        self.load_unlocked().await
    }

    /// Apply `apply` to the collection and persist the result, all as one
    /// critical section. This is the only mutation path; concurrent callers
    /// serialize here, so no update can be lost to an interleaved
    /// load-then-save.
    ///
    /// # Errors
    ///
    /// Returns [`LembraError::Store`] when the mutated collection cannot be
    /// written back. The mutation is not retried.
    pub async fn update<T>(&self, apply: impl FnOnce(&mut Vec<Reminder>) -> T) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut reminders = self.load_unlocked().await;
        let out = apply(&mut reminders);
        self.save_unlocked(&reminders).await?;
        Ok(out)
    }

    /// Load the collection. A missing file is an empty collection; an
    /// unreadable or corrupt one degrades to empty with a warning rather
    /// than failing the caller.
    async fn load_unlocked(&self) -> Vec<Reminder> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no reminder store yet, starting empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "cannot read reminder store, starting empty: {e}");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(reminders) => reminders,
            Err(e) => {
                warn!(path = %self.path.display(), "reminder store is corrupt, starting empty: {e}");
                Vec::new()
            }
        }
    }

    /// Replace the document atomically: serialize, write a temp sibling,
    /// rename over the target.
    async fn save_unlocked(&self, reminders: &[Reminder]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LembraError::Store(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(reminders)
            .map_err(|e| LembraError::Store(format!("cannot serialize reminders: {e}")))?;

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| LembraError::Store(format!("cannot write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| LembraError::Store(format!("cannot replace {}: {e}", self.path.display())))
    }

    // Per-process temp name; two processes on the same file keep distinct
    // temp siblings.
    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reminders.json".to_owned());
        self.path
            .with_file_name(format!(".{name}.tmp-{}", std::process::id()))
    }
}

impl std::fmt::Debug for ReminderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
