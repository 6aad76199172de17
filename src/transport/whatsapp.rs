//! WhatsApp Cloud API delivery.
//!
//! Sends plain text messages through the Graph API `messages` endpoint.
//! The API base is configurable so tests can point it at a local mock.

use super::{Transport, delivery_confirmation_text};
use crate::config::WhatsAppConfig;
use crate::reminder::Reminder;
use async_trait::async_trait;
use tracing::debug;

/// Graph API text-message transport.
#[derive(Debug, Clone)]
pub struct WhatsAppTransport {
    client: reqwest::Client,
    access_token: String,
    phone_number_id: String,
    api_base: String,
}

impl WhatsAppTransport {
    #[must_use]
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: config.access_token.clone(),
            phone_number_id: config.phone_number_id.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
        }
    }

    async fn send_text(&self, to: &str, body: &str) -> anyhow::Result<()> {
        // The Graph API takes the number without its leading "+".
        let to = to.strip_prefix('+').unwrap_or(to);
        let url = format!("{}/{}/messages", self.api_base, self.phone_number_id);
        let payload = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": { "preview_url": false, "body": body },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("whatsapp send failed ({status}): {body}");
        }
        debug!(to, "whatsapp message accepted");
        Ok(())
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    fn id(&self) -> &'static str {
        "whatsapp"
    }

    async fn deliver(&self, recipient: &str, content: &str) -> anyhow::Result<()> {
        self.send_text(recipient, content).await
    }

    async fn confirm_delivery(&self, owner: &str, reminder: &Reminder) -> anyhow::Result<()> {
        self.send_text(owner, &delivery_confirmation_text(reminder))
            .await
    }

    async fn health_check(&self) -> anyhow::Result<bool> {
        Ok(!self.access_token.is_empty() && !self.phone_number_id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::reminder::{ScheduleRequest, resolve_schedule};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_transport(api_base: &str) -> WhatsAppTransport {
        WhatsAppTransport::new(&WhatsAppConfig {
            enabled: true,
            access_token: "test-token".to_owned(),
            phone_number_id: "10555".to_owned(),
            api_base: api_base.to_owned(),
        })
    }

    fn make_forward() -> Reminder {
        let request = ScheduleRequest::new("+5511999990000", "buy bread", "2030-01-01", "08:00", "UTC")
            .with_recipient("+5511888880000");
        let at = resolve_schedule("2030-01-01", "08:00", "UTC").unwrap();
        Reminder::from_request(request, at)
    }

    #[tokio::test]
    async fn deliver_posts_the_graph_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/10555/messages"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "messaging_product": "whatsapp",
                "to": "5511888880000",
                "type": "text",
                "text": { "body": "buy bread" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [{ "id": "wamid.test" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = make_transport(&server.uri());
        transport.deliver("+5511888880000", "buy bread").await.unwrap();
    }

    #[tokio::test]
    async fn deliver_surfaces_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let transport = make_transport(&server.uri());
        let err = transport.deliver("+55", "hello").await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("401"), "unexpected error: {text}");
        assert!(text.contains("bad token"), "unexpected error: {text}");
    }

    #[tokio::test]
    async fn confirm_delivery_sends_the_confirmation_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/10555/messages"))
            .and(body_partial_json(json!({
                "to": "5511999990000",
                "text": { "body": "✅ Seu lembrete foi entregue: \"buy bread\"" },
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = make_transport(&server.uri());
        transport
            .confirm_delivery("+5511999990000", &make_forward())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn health_check_requires_credentials() {
        let transport = WhatsAppTransport::new(&WhatsAppConfig::default());
        assert!(!transport.health_check().await.unwrap());

        let configured = make_transport("https://example.invalid");
        assert!(configured.health_check().await.unwrap());
    }
}
