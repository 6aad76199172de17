//! Lembra: persistent reminder and message delivery scheduler.
//!
//! Accepts a request to deliver a piece of content to a recipient at a
//! future local time, survives process restarts without losing or
//! double-firing it, and lists or cancels pending requests on demand.
//!
//! # Architecture
//!
//! The scheduler is three small layers behind one API:
//! - **Store**: the reminder collection as one JSON document, every
//!   mutation a read-modify-write under a single async mutex, every write
//!   an atomic temp-then-rename replace
//! - **TimerTable**: in-memory cancellable sleeps, one per pending record,
//!   rebuilt from the store on restore
//! - **Engine**: create/cancel/list/restore plus the fire path, delivering
//!   through an injected [`Transport`]
//!
//! Around the core: a [`CommandRouter`] that turns chat text (Portuguese
//! keyword commands or free text via an optional [`Classifier`]) into
//! scheduler calls, a WhatsApp Cloud API transport, and a contact
//! directory for forwarded reminders.

pub mod commands;
pub mod config;
pub mod contacts;
pub mod error;
pub mod lembra_dirs;
pub mod nlu;
pub mod reminder;
pub mod scheduler;
pub mod transport;

pub use commands::{CommandOutcome, CommandRouter};
pub use config::LembraConfig;
pub use contacts::ContactDirectory;
pub use error::{LembraError, Result};
pub use nlu::{Classification, Classifier, OpenAiClassifier};
pub use reminder::{Reminder, ReminderState, ScheduleRequest, resolve_schedule};
pub use scheduler::{ReminderEvent, ReminderScheduler, ReminderStore, RestoreReport};
pub use transport::{ConsoleTransport, Transport, WhatsAppTransport};
