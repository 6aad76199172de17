//! Persistent reminder scheduling.
//!
//! Three layers: [`store`] owns the durable JSON document, [`timers`] owns
//! the in-memory cancellable sleeps, and [`engine`] ties them to the
//! delivery transport and exposes the public create/cancel/list/restore
//! API.

pub mod engine;
pub mod store;
pub mod timers;

pub use engine::{ReminderEvent, ReminderScheduler, RestoreReport};
pub use store::ReminderStore;
pub use timers::TimerTable;
