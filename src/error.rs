//! Error types for the lembra scheduler.

/// Top-level error type for the reminder delivery system.
#[derive(Debug, thiserror::Error)]
pub enum LembraError {
    /// Reminder store read/write error.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid schedule request (date, time, or timezone).
    #[error("invalid schedule: {0}")]
    Schedule(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Contact directory error.
    #[error("contacts error: {0}")]
    Contacts(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LembraError>;
