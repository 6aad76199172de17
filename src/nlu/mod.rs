//! Natural-language classification boundary.
//!
//! Free text goes in, a [`Classification`] comes out: should this message
//! become a scheduled delivery, and if so when, what, and for whom. The
//! model reply is JSON; [`parse_classification`] tolerates code fences and
//! surrounding prose and degrades to "not a reminder" instead of erroring.

pub mod openai;

pub use openai::OpenAiClassifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Result of classifying one inbound message.
///
/// Wire keys are camelCase to match the JSON contract the prompt asks the
/// model for. All fields default, so a sparse reply still parses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Classification {
    /// Whether the message asks for a scheduled delivery at all.
    pub should_schedule: bool,
    /// Local date `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Local time `HH:MM`.
    pub time: Option<String>,
    /// IANA timezone; the caller's default applies when absent.
    pub timezone: Option<String>,
    /// What to deliver.
    pub content: Option<String>,
    /// Contact name when the message targets a third party.
    #[serde(rename = "recipient")]
    pub recipient_hint: Option<String>,
}

impl Classification {
    /// True when there is enough to schedule: intent plus date plus time.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.should_schedule && self.date.is_some() && self.time.is_some()
    }
}

/// Message classification service.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify `text` as seen at instant `now`. Relative phrases like
    /// "amanhã às 9" resolve against `now`.
    async fn classify(&self, text: &str, now: DateTime<Utc>) -> anyhow::Result<Classification>;
}

/// Parse a model reply into a [`Classification`].
///
/// Strips markdown fences, locates the outermost JSON object, and falls
/// back to the default ("not a reminder") with a warning when nothing
/// parses.
#[must_use]
pub fn parse_classification(raw: &str) -> Classification {
    let Some(json) = extract_json_block(raw) else {
        if !raw.trim().is_empty() {
            warn!("classifier reply carried no JSON object");
        }
        return Classification::default();
    };
    match serde_json::from_str(&json) {
        Ok(classification) => classification,
        Err(e) => {
            warn!("cannot parse classifier reply: {e}");
            Classification::default()
        }
    }
}

fn extract_json_block(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let body = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest)
    } else {
        trimmed
    };
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end >= start).then(|| body[start..=end].to_owned())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn parses_a_plain_json_reply() {
        let raw = r#"{"shouldSchedule": true, "date": "2025-06-10", "time": "09:00",
                      "timezone": "America/Sao_Paulo", "content": "pagar boleto"}"#;
        let c = parse_classification(raw);
        assert!(c.should_schedule);
        assert_eq!(c.date.as_deref(), Some("2025-06-10"));
        assert_eq!(c.time.as_deref(), Some("09:00"));
        assert_eq!(c.content.as_deref(), Some("pagar boleto"));
        assert!(c.recipient_hint.is_none());
        assert!(c.is_complete());
    }

    #[test]
    fn parses_a_fenced_reply() {
        let raw = "```json\n{\"shouldSchedule\": true, \"date\": \"2025-06-10\", \"time\": \"09:00\"}\n```";
        let c = parse_classification(raw);
        assert!(c.should_schedule);
        assert!(c.is_complete());
    }

    #[test]
    fn parses_json_buried_in_prose() {
        let raw = "Claro! Aqui está: {\"shouldSchedule\": false} espero que ajude";
        let c = parse_classification(raw);
        assert!(!c.should_schedule);
    }

    #[test]
    fn recipient_key_maps_to_the_hint() {
        let raw = r#"{"shouldSchedule": true, "date": "2025-06-10", "time": "09:00",
                      "recipient": "joana", "content": "reunião"}"#;
        let c = parse_classification(raw);
        assert_eq!(c.recipient_hint.as_deref(), Some("joana"));
    }

    #[test]
    fn garbage_degrades_to_not_a_reminder() {
        assert_eq!(parse_classification("not json at all"), Classification::default());
        assert_eq!(parse_classification(""), Classification::default());
        assert_eq!(parse_classification("{ broken"), Classification::default());
    }

    #[test]
    fn sparse_object_fills_defaults() {
        let c = parse_classification("{}");
        assert!(!c.should_schedule);
        assert!(c.date.is_none());
        assert!(!c.is_complete());
    }

    #[test]
    fn intent_without_when_is_incomplete() {
        let c = parse_classification(r#"{"shouldSchedule": true, "content": "ligar"}"#);
        assert!(c.should_schedule);
        assert!(!c.is_complete());
    }
}
