//! Delivery boundary.
//!
//! The scheduler never talks to a messaging service directly; it calls a
//! [`Transport`] injected once at construction. Adapters stay thin: deliver
//! a text to an address, optionally confirm a forwarded delivery back to
//! the owner.

pub mod whatsapp;

pub use whatsapp::WhatsAppTransport;

use crate::reminder::Reminder;
use async_trait::async_trait;

/// The confirmation text sent to an owner after a forwarded reminder goes
/// out.
#[must_use]
pub fn delivery_confirmation_text(reminder: &Reminder) -> String {
    format!("✅ Seu lembrete foi entregue: \"{}\"", reminder.content)
}

/// Outbound message delivery.
///
/// Errors are adapter-level and opaque to the engine: a failed delivery is
/// logged and the reminder dropped, never retried.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short stable identifier for logs.
    fn id(&self) -> &'static str;

    /// Deliver `content` to `recipient`.
    async fn deliver(&self, recipient: &str, content: &str) -> anyhow::Result<()>;

    /// Tell `owner` that their forwarded reminder went out. Only called
    /// when the delivery succeeded and owner differs from recipient.
    async fn confirm_delivery(&self, _owner: &str, _reminder: &Reminder) -> anyhow::Result<()> {
        Ok(())
    }

    /// Cheap readiness probe.
    async fn health_check(&self) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Prints deliveries to stdout. Used by the host when no real channel is
/// configured, and handy in local runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    fn id(&self) -> &'static str {
        "console"
    }

    async fn deliver(&self, recipient: &str, content: &str) -> anyhow::Result<()> {
        println!("[{recipient}] {content}");
        Ok(())
    }

    async fn confirm_delivery(&self, owner: &str, reminder: &Reminder) -> anyhow::Result<()> {
        println!("[{owner}] {}", delivery_confirmation_text(reminder));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::reminder::{Reminder, ScheduleRequest, resolve_schedule};

    fn make_reminder() -> Reminder {
        let request = ScheduleRequest::new("+55", "buy coffee", "2030-01-01", "10:00", "UTC");
        let at = resolve_schedule("2030-01-01", "10:00", "UTC").unwrap();
        Reminder::from_request(request, at)
    }

    #[test]
    fn confirmation_text_quotes_the_content() {
        let text = delivery_confirmation_text(&make_reminder());
        assert_eq!(text, "✅ Seu lembrete foi entregue: \"buy coffee\"");
    }

    #[tokio::test]
    async fn console_transport_always_delivers() {
        let transport = ConsoleTransport;
        assert_eq!(transport.id(), "console");
        assert!(transport.deliver("+55", "hello").await.is_ok());
        assert!(transport.health_check().await.unwrap());
    }
}
