//! Scheduler engine: create, cancel, list, restore, and the fire path.
//!
//! The engine orchestrates the store and the timer table. The store is the
//! single durable truth; timers are a derived cache rebuilt on restore.
//! Delivery goes through the injected [`Transport`] and is at-most-once: a
//! fired reminder is purged whether or not the delivery succeeded.

use crate::error::Result;
use crate::reminder::{Reminder, ReminderState, ScheduleRequest, resolve_schedule};
use crate::scheduler::store::ReminderStore;
use crate::scheduler::timers::TimerTable;
use crate::transport::Transport;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Lifecycle notification, emitted when an event sender is installed.
///
/// Sending never blocks the engine; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub enum ReminderEvent {
    Scheduled(Reminder),
    Firing(Reminder),
    Delivered(Reminder),
    DeliveryFailed { reminder: Reminder, error: String },
    Cancelled(Reminder),
    Expired(Reminder),
}

impl ReminderEvent {
    /// The record the event is about.
    #[must_use]
    pub fn reminder(&self) -> &Reminder {
        match self {
            Self::Scheduled(r)
            | Self::Firing(r)
            | Self::Delivered(r)
            | Self::Cancelled(r)
            | Self::Expired(r) => r,
            Self::DeliveryFailed { reminder, .. } => reminder,
        }
    }
}

/// Outcome of a [`ReminderScheduler::restore`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Future reminders whose timers were re-armed.
    pub rearmed: usize,
    /// Reminders whose deadline passed while the process was down; purged
    /// without delivery.
    pub expired: usize,
}

/// Public scheduling API.
///
/// Cheap to clone; clones share the store, the timer table, and the
/// transport. The fire path runs on spawned tasks holding a clone.
#[derive(Clone)]
pub struct ReminderScheduler {
    store: Arc<ReminderStore>,
    timers: TimerTable,
    transport: Arc<dyn Transport>,
    events: Option<mpsc::UnboundedSender<ReminderEvent>>,
}

impl ReminderScheduler {
    pub fn new(store: ReminderStore, transport: Arc<dyn Transport>) -> Self {
        Self {
            store: Arc::new(store),
            timers: TimerTable::new(),
            transport,
            events: None,
        }
    }

    /// Install a lifecycle event sender.
    #[must_use]
    pub fn with_event_sender(mut self, events: mpsc::UnboundedSender<ReminderEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate, persist, then arm a new reminder.
    ///
    /// The instant is resolved exactly once here; a malformed date, time, or
    /// timezone fails before anything is persisted. A deadline already in
    /// the past is persisted and fires immediately.
    ///
    /// # Errors
    ///
    /// [`LembraError::Schedule`](crate::LembraError::Schedule) on invalid
    /// input, [`LembraError::Store`](crate::LembraError::Store) when the
    /// record cannot be persisted.
    pub async fn create(&self, request: ScheduleRequest) -> Result<Reminder> {
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone)?;
        let reminder = Reminder::from_request(request, scheduled_at);

        // Persist before arming: a crash after this point restores the
        // reminder, a crash before it never half-schedules one.
        let record = reminder.clone();
        self.store.update(move |list| list.push(record)).await?;

        info!(
            id = %reminder.id,
            owner = %reminder.owner,
            scheduled_at = %reminder.scheduled_at,
            "reminder scheduled"
        );
        self.emit(ReminderEvent::Scheduled(reminder.clone()));
        self.arm_reminder(&reminder).await;
        Ok(reminder)
    }

    /// Cancel one reminder, only when `owner` owns it.
    ///
    /// Returns `Ok(false)` when nothing matched; a fire already past its
    /// store check still completes, but no future firing survives this call.
    ///
    /// # Errors
    ///
    /// Store write failures propagate.
    pub async fn cancel(&self, owner: &str, id: &str) -> Result<bool> {
        let match_owner = owner.to_owned();
        let match_id = id.to_owned();
        let removed = self
            .store
            .update(move |list| {
                let index = list
                    .iter()
                    .position(|r| r.id == match_id && r.owner == match_owner)?;
                Some(list.remove(index))
            })
            .await?;

        let Some(reminder) = removed else {
            debug!(id, owner, "cancel matched nothing");
            return Ok(false);
        };

        self.timers.disarm(id).await;
        info!(id, owner, state = %ReminderState::Cancelled, "reminder cancelled");
        self.emit(ReminderEvent::Cancelled(reminder));
        Ok(true)
    }

    /// Cancel every reminder owned by `owner`. Returns how many were
    /// removed.
    ///
    /// # Errors
    ///
    /// Store write failures propagate.
    pub async fn cancel_all(&self, owner: &str) -> Result<usize> {
        let match_owner = owner.to_owned();
        let removed = self
            .store
            .update(move |list| {
                let mut removed = Vec::new();
                list.retain(|r| {
                    if r.owner == match_owner {
                        removed.push(r.clone());
                        false
                    } else {
                        true
                    }
                });
                removed
            })
            .await?;

        for reminder in &removed {
            self.timers.disarm(&reminder.id).await;
        }
        let count = removed.len();
        if count > 0 {
            info!(owner, count, "cancelled all reminders for owner");
        }
        for reminder in removed {
            self.emit(ReminderEvent::Cancelled(reminder));
        }
        Ok(count)
    }

    /// Pending reminders of `owner`, soonest first, excluding deadlines
    /// already past.
    pub async fn list_active(&self, owner: &str) -> Vec<Reminder> {
        let now = Utc::now();
        let mut active: Vec<Reminder> = self
            .store
            .snapshot()
            .await
            .into_iter()
            .filter(|r| r.owner == owner && !r.is_past(now))
            .collect();
        active.sort_by_key(|r| r.scheduled_at);
        active
    }

    /// Reconcile the store against the clock after a restart. Run once
    /// before accepting traffic.
    ///
    /// Future reminders get their timers re-armed without being re-appended;
    /// expired ones are purged in the same single save and reported, never
    /// delivered late. Afterwards the store contents and the armed timer set
    /// coincide, so a second run is a no-op apart from re-arming.
    ///
    /// # Errors
    ///
    /// Store write failures propagate.
    pub async fn restore(&self) -> Result<RestoreReport> {
        let now = Utc::now();
        let (kept, expired) = self
            .store
            .update(move |list| {
                let mut kept = Vec::new();
                let mut expired = Vec::new();
                for reminder in list.drain(..) {
                    if reminder.is_past(now) {
                        expired.push(reminder);
                    } else {
                        kept.push(reminder);
                    }
                }
                *list = kept.clone();
                (kept, expired)
            })
            .await?;

        for reminder in &kept {
            self.arm_reminder(reminder).await;
        }
        for reminder in &expired {
            warn!(
                id = %reminder.id,
                scheduled_at = %reminder.scheduled_at,
                state = %ReminderState::Expired,
                "dropping reminder that expired while offline"
            );
        }

        let report = RestoreReport {
            rearmed: kept.len(),
            expired: expired.len(),
        };
        info!(rearmed = report.rearmed, expired = report.expired, "reminder store restored");
        for reminder in expired {
            self.emit(ReminderEvent::Expired(reminder));
        }
        Ok(report)
    }

    /// Number of currently sleeping timers.
    pub async fn armed_timers(&self) -> usize {
        self.timers.armed_count().await
    }

    /// Abort all pending timers. The store is untouched; a later restore
    /// re-arms everything.
    pub async fn shutdown(&self) {
        let aborted = self.timers.disarm_all().await;
        if aborted > 0 {
            debug!(aborted, "scheduler shut down with timers pending");
        }
    }

    async fn arm_reminder(&self, reminder: &Reminder) {
        // A past deadline clamps to zero and fires immediately.
        let delay = (reminder.scheduled_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let engine = self.clone();
        let id = reminder.id.clone();
        self.timers
            .arm(reminder.id.clone(), delay, async move {
                engine.fire(&id).await;
            })
            .await;
    }

    /// Fire path. Re-checks the store (a purged id means a cancel won),
    /// delivers without holding the store section, then purges regardless
    /// of the delivery outcome.
    async fn fire(&self, id: &str) {
        let Some(reminder) = self
            .store
            .snapshot()
            .await
            .into_iter()
            .find(|r| r.id == id)
        else {
            debug!(id, "timer fired for a reminder no longer in the store, skipping");
            return;
        };

        info!(id, recipient = %reminder.recipient, state = %ReminderState::Firing, "delivering reminder");
        self.emit(ReminderEvent::Firing(reminder.clone()));

        let outcome = self
            .transport
            .deliver(&reminder.recipient, &reminder.content)
            .await;

        // Purge first either way: a fired reminder is never re-queued.
        let purge_id = reminder.id.clone();
        if let Err(e) = self
            .store
            .update(move |list| list.retain(|r| r.id != purge_id))
            .await
        {
            warn!(id, "cannot purge fired reminder: {e}");
        }

        match outcome {
            Ok(()) => {
                info!(id, state = %ReminderState::Delivered, "reminder delivered");
                if reminder.is_forward()
                    && let Err(e) = self
                        .transport
                        .confirm_delivery(&reminder.owner, &reminder)
                        .await
                {
                    warn!(id, "cannot confirm delivery to owner: {e}");
                }
                self.emit(ReminderEvent::Delivered(reminder));
            }
            Err(e) => {
                warn!(id, "delivery failed, reminder dropped: {e}");
                self.emit(ReminderEvent::DeliveryFailed {
                    reminder,
                    error: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: ReminderEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("store", &self.store)
            .field("transport", &self.transport.id())
            .finish_non_exhaustive()
    }
}
