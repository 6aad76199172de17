//! Reminder records and schedule resolution.
//!
//! Defines the persisted [`Reminder`] entity, the [`ScheduleRequest`] that
//! creates one, and [`resolve_schedule`] which turns a local date, time, and
//! IANA timezone into the absolute UTC instant stored on the record.

use crate::error::{LembraError, Result};
use chrono::{DateTime, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A scheduled delivery request. The only persistent entity.
///
/// `scheduled_at` is the single source of truth for "when": it is resolved
/// once at creation and never recomputed. `timezone` is kept for display
/// and audit only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    /// Opaque unique identifier, assigned at creation, never reused.
    pub id: String,
    /// Identifier of the party who requested the reminder.
    pub owner: String,
    /// Identifier of the delivery target. Equals `owner` for a personal
    /// reminder, differs for a forwarded message.
    pub recipient: String,
    /// Opaque payload to deliver. Never interpreted by the scheduler.
    pub content: String,
    /// Absolute delivery instant, resolved once at creation.
    pub scheduled_at: DateTime<Utc>,
    /// IANA timezone identifier used to resolve `scheduled_at`.
    pub timezone: String,
    /// Human-readable owner label for confirmation messages.
    #[serde(default)]
    pub owner_alias: Option<String>,
    /// Human-readable recipient label for confirmation messages.
    #[serde(default)]
    pub recipient_alias: Option<String>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Build a record from a validated request and its resolved instant.
    ///
    /// Assigns a fresh UUID and fills `recipient` with `owner` when the
    /// request has no explicit recipient.
    pub fn from_request(request: ScheduleRequest, scheduled_at: DateTime<Utc>) -> Self {
        let recipient = request
            .recipient
            .unwrap_or_else(|| request.owner.clone());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: request.owner,
            recipient,
            content: request.content,
            scheduled_at,
            timezone: request.timezone,
            owner_alias: request.owner_alias,
            recipient_alias: request.recipient_alias,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` when the deadline is at or before `now`.
    #[must_use]
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at <= now
    }

    /// Returns `true` when the delivery target differs from the owner.
    #[must_use]
    pub fn is_forward(&self) -> bool {
        self.recipient != self.owner
    }

    /// The deadline rendered in the record's own timezone, for display.
    ///
    /// Falls back to `None` when the stored timezone identifier no longer
    /// parses (the UTC instant stays authoritative either way).
    #[must_use]
    pub fn local_scheduled_at(&self) -> Option<DateTime<Tz>> {
        let tz: Tz = self.timezone.parse().ok()?;
        Some(self.scheduled_at.with_timezone(&tz))
    }
}

/// Lifecycle of a record. Only `Scheduled` corresponds to presence in the
/// store; the terminal states are reported through logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    /// Persisted with a live timer.
    Scheduled,
    /// Timer has fired and delivery is in flight.
    Firing,
    /// Delivery attempt succeeded; record purged.
    Delivered,
    /// Cancelled by the owner before firing; record purged.
    Cancelled,
    /// Deadline already past at restore time; record purged without delivery.
    Expired,
}

impl std::fmt::Display for ReminderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Scheduled => "scheduled",
            Self::Firing => "firing",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        };
        write!(f, "{name}")
    }
}

/// Input to [`ReminderScheduler::create`](crate::scheduler::ReminderScheduler::create).
///
/// Carries the raw local `date`, `time`, and `timezone`; the scheduler
/// resolves them into the absolute instant exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    /// Requesting party.
    pub owner: String,
    /// Delivery target. `None` means a personal reminder for `owner`.
    #[serde(default)]
    pub recipient: Option<String>,
    /// Payload to deliver.
    pub content: String,
    /// Local date, `YYYY-MM-DD`.
    pub date: String,
    /// Local time, `HH:MM` (seconds optional).
    pub time: String,
    /// IANA timezone identifier, e.g. `America/Sao_Paulo`.
    pub timezone: String,
    /// Optional owner label for confirmations.
    #[serde(default)]
    pub owner_alias: Option<String>,
    /// Optional recipient label for confirmations.
    #[serde(default)]
    pub recipient_alias: Option<String>,
}

impl ScheduleRequest {
    /// Create a personal reminder request (recipient = owner).
    pub fn new(
        owner: impl Into<String>,
        content: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            recipient: None,
            content: content.into(),
            date: date.into(),
            time: time.into(),
            timezone: timezone.into(),
            owner_alias: None,
            recipient_alias: None,
        }
    }

    /// Address the reminder to a third party instead of the owner.
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Attach a human-readable recipient label for confirmations.
    #[must_use]
    pub fn with_recipient_alias(mut self, alias: impl Into<String>) -> Self {
        self.recipient_alias = Some(alias.into());
        self
    }

    /// Attach a human-readable owner label for confirmations.
    #[must_use]
    pub fn with_owner_alias(mut self, alias: impl Into<String>) -> Self {
        self.owner_alias = Some(alias.into());
        self
    }
}

/// Resolve a local `(date, time, timezone)` triple into a UTC instant.
///
/// An ambiguous local time (clocks falling back) resolves to the earlier
/// instant. A local time skipped by a forward clock change is rejected.
///
/// # Errors
///
/// Returns [`LembraError::Schedule`] when the date, time, or timezone does
/// not parse, or the local time does not exist in that zone.
pub fn resolve_schedule(date: &str, time: &str, timezone: &str) -> Result<DateTime<Utc>> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| LembraError::Schedule(format!("unknown timezone: {timezone}")))?;

    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| LembraError::Schedule(format!("bad date '{date}': {e}")))?;

    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|e| LembraError::Schedule(format!("bad time '{time}': {e}")))?;

    match tz.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(LembraError::Schedule(format!(
            "local time {date} {time} does not exist in {timezone}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn sample_request() -> ScheduleRequest {
        ScheduleRequest::new(
            "+5511999990000",
            "pay the electricity bill",
            "2025-06-10",
            "09:00",
            "America/Sao_Paulo",
        )
    }

    #[test]
    fn resolve_sao_paulo_morning_to_utc() {
        let instant = resolve_schedule("2025-01-01", "09:00", "America/Sao_Paulo").unwrap();
        assert_eq!(instant.to_rfc3339(), "2025-01-01T12:00:00+00:00");
    }

    #[test]
    fn resolve_accepts_seconds() {
        let with_seconds = resolve_schedule("2025-01-01", "09:00:30", "America/Sao_Paulo").unwrap();
        let without = resolve_schedule("2025-01-01", "09:00", "America/Sao_Paulo").unwrap();
        assert_eq!((with_seconds - without).num_seconds(), 30);
    }

    #[test]
    fn resolve_rejects_bad_date() {
        let err = resolve_schedule("2025-13-40", "09:00", "America/Sao_Paulo");
        assert!(matches!(err, Err(LembraError::Schedule(_))));
    }

    #[test]
    fn resolve_rejects_bad_time() {
        let err = resolve_schedule("2025-01-01", "25:99", "America/Sao_Paulo");
        assert!(matches!(err, Err(LembraError::Schedule(_))));
    }

    #[test]
    fn resolve_rejects_unknown_timezone() {
        let err = resolve_schedule("2025-01-01", "09:00", "America/Nowhere");
        assert!(matches!(err, Err(LembraError::Schedule(_))));
    }

    #[test]
    fn resolve_rejects_skipped_local_time() {
        // US spring-forward gap: 02:30 does not exist on 2025-03-09.
        let err = resolve_schedule("2025-03-09", "02:30", "America/New_York");
        assert!(matches!(err, Err(LembraError::Schedule(_))));
    }

    #[test]
    fn resolve_ambiguous_local_time_picks_earliest() {
        // US fall-back: 01:30 occurs twice on 2025-11-02; earliest is EDT (UTC-4).
        let instant = resolve_schedule("2025-11-02", "01:30", "America/New_York").unwrap();
        assert_eq!(instant.to_rfc3339(), "2025-11-02T05:30:00+00:00");
    }

    #[test]
    fn from_request_defaults_recipient_to_owner() {
        let request = sample_request();
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone).unwrap();
        let reminder = Reminder::from_request(request, scheduled_at);

        assert_eq!(reminder.recipient, reminder.owner);
        assert!(!reminder.is_forward());
        assert!(!reminder.id.is_empty());
    }

    #[test]
    fn from_request_keeps_explicit_recipient() {
        let request = sample_request()
            .with_recipient("+5511888880000")
            .with_recipient_alias("joana");
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone).unwrap();
        let reminder = Reminder::from_request(request, scheduled_at);

        assert!(reminder.is_forward());
        assert_eq!(reminder.recipient, "+5511888880000");
        assert_eq!(reminder.recipient_alias.as_deref(), Some("joana"));
    }

    #[test]
    fn fresh_ids_are_unique() {
        let request = sample_request();
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone).unwrap();
        let a = Reminder::from_request(request.clone(), scheduled_at);
        let b = Reminder::from_request(request, scheduled_at);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn is_past_compares_against_now() {
        let request = sample_request();
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone).unwrap();
        let reminder = Reminder::from_request(request, scheduled_at);

        assert!(reminder.is_past(scheduled_at));
        assert!(reminder.is_past(scheduled_at + chrono::Duration::seconds(1)));
        assert!(!reminder.is_past(scheduled_at - chrono::Duration::seconds(1)));
    }

    #[test]
    fn local_scheduled_at_round_trips_the_zone() {
        let request = sample_request();
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone).unwrap();
        let reminder = Reminder::from_request(request, scheduled_at);

        let local = reminder.local_scheduled_at().expect("timezone parses");
        assert_eq!(local.format("%Y-%m-%d %H:%M").to_string(), "2025-06-10 09:00");
    }

    #[test]
    fn local_scheduled_at_tolerates_bad_zone() {
        let request = sample_request();
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone).unwrap();
        let mut reminder = Reminder::from_request(request, scheduled_at);
        reminder.timezone = "Not/AZone".to_owned();

        assert!(reminder.local_scheduled_at().is_none());
    }

    #[test]
    fn reminder_serde_round_trip() {
        let request = sample_request().with_owner_alias("rafael");
        let scheduled_at = resolve_schedule(&request.date, &request.time, &request.timezone).unwrap();
        let reminder = Reminder::from_request(request, scheduled_at);

        let json = serde_json::to_string(&reminder).unwrap();
        let restored: Reminder = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.id, reminder.id);
        assert_eq!(restored.scheduled_at, reminder.scheduled_at);
        assert_eq!(restored.owner_alias.as_deref(), Some("rafael"));
    }

    #[test]
    fn reminder_deserializes_without_alias_fields() {
        let json = r#"{
            "id": "abc",
            "owner": "+55",
            "recipient": "+55",
            "content": "water the plants",
            "scheduled_at": "2025-06-10T12:00:00Z",
            "timezone": "America/Sao_Paulo",
            "created_at": "2025-06-01T00:00:00Z"
        }"#;
        let reminder: Reminder = serde_json::from_str(json).unwrap();
        assert!(reminder.owner_alias.is_none());
        assert!(reminder.recipient_alias.is_none());
    }

    #[test]
    fn state_display_names() {
        assert_eq!(ReminderState::Scheduled.to_string(), "scheduled");
        assert_eq!(ReminderState::Firing.to_string(), "firing");
        assert_eq!(ReminderState::Delivered.to_string(), "delivered");
        assert_eq!(ReminderState::Cancelled.to_string(), "cancelled");
        assert_eq!(ReminderState::Expired.to_string(), "expired");
    }
}
