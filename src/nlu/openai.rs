//! OpenAI-backed classifier.
//!
//! One chat-completions call per message, JSON response mode, low
//! temperature. The system prompt embeds the current date and time so the
//! model can resolve relative phrases.

use super::{Classification, Classifier, parse_classification};
use crate::config::NluConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::debug;

/// Chat-completions classifier.
#[derive(Debug, Clone)]
pub struct OpenAiClassifier {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
    temperature: f32,
    default_timezone: String,
}

impl OpenAiClassifier {
    #[must_use]
    pub fn new(config: &NluConfig, default_timezone: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_base: config.api_base.trim_end_matches('/').to_owned(),
            temperature: config.temperature,
            default_timezone: default_timezone.into(),
        }
    }

    fn system_prompt(&self, now: DateTime<Utc>) -> String {
        // Render "now" in the default zone so relative phrases resolve to
        // the user's wall clock, not UTC.
        let local = match self.default_timezone.parse::<Tz>() {
            Ok(tz) => now.with_timezone(&tz).format("%A, %d de %B de %Y às %H:%M:%S").to_string(),
            Err(_) => now.format("%A, %d de %B de %Y às %H:%M:%S").to_string(),
        };
        format!(
            "Você é um especialista em extrair lembretes e mensagens agendadas de textos informais em português do Brasil.\n\
             Data e hora atuais: {local} (fuso: {tz})\n\
             \n\
             Responda apenas em JSON:\n\
             {{\n\
               \"shouldSchedule\": boolean,\n\
               \"date\": \"YYYY-MM-DD\" | null,\n\
               \"time\": \"HH:mm\" | null,\n\
               \"timezone\": \"string\" | null,\n\
               \"content\": \"string\" | null,\n\
               \"recipient\": \"string\" | null\n\
             }}\n\
             \n\
             \"recipient\" é o nome do contato quando a mensagem pede entrega para outra pessoa; null para lembrete próprio.",
            tz = self.default_timezone,
        )
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    async fn classify(&self, text: &str, now: DateTime<Utc>) -> anyhow::Result<Classification> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": self.system_prompt(now) },
                { "role": "user", "content": text },
            ],
            "response_format": { "type": "json_object" },
            "temperature": self.temperature,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("classification request failed ({status}): {body}");
        }

        let reply: ChatCompletionReply = response.json().await?;
        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        debug!(chars = content.len(), "classifier replied");
        Ok(parse_classification(&content))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionReply {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}
