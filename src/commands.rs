//! Text command routing.
//!
//! Turns one inbound message into one outcome: a user-facing reply or
//! `Ignored` for text that is none of this crate's business. Keyword
//! commands (list, clear, cancel, save contact) are matched on a
//! normalized form of the text; everything else goes through the optional
//! classifier and, when it asks for a schedule, into the engine.
//!
//! Replies are Portuguese, the language of the assistant this serves.

use crate::contacts::ContactDirectory;
use crate::error::Result;
use crate::nlu::Classifier;
use crate::reminder::{Reminder, ScheduleRequest, resolve_schedule};
use crate::scheduler::ReminderScheduler;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

const CLEAR_KEYWORDS: [&str; 6] = [
    "apagar lembretes",
    "deletar lembretes",
    "remover lembretes",
    "limpar lista de lembretes",
    "apagar meus lembretes",
    "excluir todos os lembretes",
];

const LIST_KEYWORDS: [&str; 7] = [
    "listar lembretes",
    "mostrar lembretes",
    "mostrar agendamentos",
    "lembretes ativos",
    "quais lembretes",
    "meus lembretes",
    "ver lembretes",
];

const CANCEL_PREFIX: &str = "cancelar lembrete";
const CONTACT_PREFIX: &str = "salvar contato";

const REPLY_NOTHING_TO_CLEAR: &str = "📭 Você não tem lembretes para apagar. Tudo limpo! 🧹";
const REPLY_CLEARED: &str = "🧹 Todos os seus lembretes foram apagados com sucesso!\n\n\
                             Se precisar marcar outros, é só pedir. Estou por aqui! 😊";
const REPLY_NOTHING_TO_LIST: &str =
    "📭 Você não tem lembretes agendados no momento. Que tal marcar um? 😊";
const REPLY_TIME_PASSED: &str = "⏰ Esse horário já passou! Quer agendar para daqui a pouco?";
const REPLY_INCOMPLETE: &str =
    "Desculpe, não entendi bem quando você quer ser lembrado. Pode ser mais específico?";
const FALLBACK_CONTENT: &str = "algo importante";

/// What [`CommandRouter::handle`] decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Send this text back to the owner.
    Reply(String),
    /// Not a reminder and not a command; the caller's other features apply.
    Ignored,
}

/// Routes inbound text to the scheduler.
pub struct CommandRouter {
    scheduler: ReminderScheduler,
    contacts: ContactDirectory,
    classifier: Option<Arc<dyn Classifier>>,
    default_timezone: String,
}

impl CommandRouter {
    pub fn new(
        scheduler: ReminderScheduler,
        contacts: ContactDirectory,
        default_timezone: impl Into<String>,
    ) -> Self {
        Self {
            scheduler,
            contacts,
            classifier: None,
            default_timezone: default_timezone.into(),
        }
    }

    /// Enable the free-text scheduling flow.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Handle one message from `owner`.
    ///
    /// # Errors
    ///
    /// Store write failures from the underlying scheduler propagate;
    /// classification and validation problems become replies, not errors.
    pub async fn handle(&self, owner: &str, text: &str) -> Result<CommandOutcome> {
        let clean = normalize(text);

        if CLEAR_KEYWORDS.iter().any(|k| clean.contains(k)) {
            info!(owner, "clear-reminders command");
            return self.clear(owner).await;
        }

        if LIST_KEYWORDS.iter().any(|k| clean.contains(k)) {
            info!(owner, "list-reminders command");
            return self.list(owner).await;
        }

        if let Some(rest) = clean.strip_prefix(CANCEL_PREFIX)
            && let Ok(position) = rest.trim().parse::<usize>()
            && position >= 1
        {
            info!(owner, position, "cancel-reminder command");
            return self.cancel_by_position(owner, position).await;
        }

        if clean.starts_with(CONTACT_PREFIX) {
            return Ok(self.save_contact(text));
        }

        self.classify_and_schedule(owner, text).await
    }

    async fn clear(&self, owner: &str) -> Result<CommandOutcome> {
        if self.scheduler.list_active(owner).await.is_empty() {
            return Ok(CommandOutcome::Reply(REPLY_NOTHING_TO_CLEAR.to_owned()));
        }
        self.scheduler.cancel_all(owner).await?;
        Ok(CommandOutcome::Reply(REPLY_CLEARED.to_owned()))
    }

    async fn list(&self, owner: &str) -> Result<CommandOutcome> {
        let active = self.scheduler.list_active(owner).await;
        if active.is_empty() {
            return Ok(CommandOutcome::Reply(REPLY_NOTHING_TO_LIST.to_owned()));
        }
        Ok(CommandOutcome::Reply(render_list(&active, Utc::now())))
    }

    async fn cancel_by_position(&self, owner: &str, position: usize) -> Result<CommandOutcome> {
        let active = self.scheduler.list_active(owner).await;
        let Some(target) = active.get(position - 1) else {
            return Ok(CommandOutcome::Reply(format!(
                "❌ Não achei o lembrete {position}. Mande \"listar lembretes\" para conferir a lista."
            )));
        };
        let content = target.content.clone();
        self.scheduler.cancel(owner, &target.id).await?;
        Ok(CommandOutcome::Reply(format!(
            "🗑️ Lembrete {position} cancelado: \"{content}\""
        )))
    }

    fn save_contact(&self, text: &str) -> CommandOutcome {
        // "salvar contato <alias> <address>": the address is the last
        // token, the alias everything in between. Parse from the raw text
        // so the address keeps its casing.
        let tokens: Vec<&str> = text.split_whitespace().skip(2).collect();
        let (address, alias_tokens) = match tokens.split_last() {
            Some((address, alias_tokens)) if !alias_tokens.is_empty() => (*address, alias_tokens),
            _ => {
                return CommandOutcome::Reply(
                    "Para salvar um contato, mande: salvar contato <nome> <número>".to_owned(),
                );
            }
        };
        let alias = alias_tokens.join(" ");
        match self.contacts.add(&alias, address) {
            Ok(()) => CommandOutcome::Reply(format!("✅ Contato \"{alias}\" salvo!")),
            Err(e) => {
                warn!("cannot save contact: {e}");
                CommandOutcome::Reply("❌ Não consegui salvar esse contato.".to_owned())
            }
        }
    }

    async fn classify_and_schedule(&self, owner: &str, text: &str) -> Result<CommandOutcome> {
        let Some(classifier) = &self.classifier else {
            return Ok(CommandOutcome::Ignored);
        };

        let now = Utc::now();
        let classification = match classifier.classify(text, now).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(owner, "classification failed: {e}");
                return Ok(CommandOutcome::Ignored);
            }
        };

        if !classification.should_schedule {
            return Ok(CommandOutcome::Ignored);
        }
        let (Some(date), Some(time)) = (classification.date, classification.time) else {
            warn!(owner, "reminder intent without a usable date/time");
            return Ok(CommandOutcome::Reply(REPLY_INCOMPLETE.to_owned()));
        };

        let timezone = classification
            .timezone
            .unwrap_or_else(|| self.default_timezone.clone());
        let content = classification
            .content
            .unwrap_or_else(|| FALLBACK_CONTENT.to_owned());

        // Interactive pre-check; a bad triple from the model reads as "did
        // not understand", not as a hard error.
        let scheduled_at = match resolve_schedule(&date, &time, &timezone) {
            Ok(at) => at,
            Err(e) => {
                warn!(owner, "classifier produced an unresolvable schedule: {e}");
                return Ok(CommandOutcome::Reply(REPLY_INCOMPLETE.to_owned()));
            }
        };
        if scheduled_at <= now {
            return Ok(CommandOutcome::Reply(REPLY_TIME_PASSED.to_owned()));
        }

        if let Some(hint) = classification.recipient_hint {
            let Some(address) = self.contacts.resolve(&hint) else {
                return Ok(CommandOutcome::Reply(format!(
                    "❌ Contato \"{hint}\" não encontrado. Use o comando para adicionar."
                )));
            };
            let request = ScheduleRequest::new(owner, content, date, time, timezone)
                .with_recipient(address)
                .with_recipient_alias(hint.clone());
            self.scheduler.create(request).await?;
            return Ok(CommandOutcome::Reply(format!(
                "📨 Mensagem agendada para {hint}."
            )));
        }

        let request = ScheduleRequest::new(owner, content, date, time, timezone);
        let reminder = self.scheduler.create(request).await?;
        Ok(CommandOutcome::Reply(confirmation_text(&reminder)))
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("default_timezone", &self.default_timezone)
            .field("classifier", &self.classifier.is_some())
            .finish_non_exhaustive()
    }
}

/// Lowercase and strip Portuguese accents so keyword matching survives
/// casual typing.
fn normalize(text: &str) -> String {
    text.trim().to_lowercase().chars().map(fold_accent).collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        other => other,
    }
}

fn render_list(active: &[Reminder], now: DateTime<Utc>) -> String {
    let mut list = "📋 *Seus lembretes agendados:*\n\n".to_owned();
    for (index, reminder) in active.iter().enumerate() {
        let (date, time) = match reminder.local_scheduled_at() {
            Some(local) => (
                local.format("%d/%m").to_string(),
                local.format("%H:%M").to_string(),
            ),
            None => (
                reminder.scheduled_at.format("%d/%m").to_string(),
                reminder.scheduled_at.format("%H:%M").to_string(),
            ),
        };
        let when = time_until_phrase((reminder.scheduled_at - now).num_minutes());
        list.push_str(&format!("📌 *{}. {}*\n", index + 1, reminder.content));
        list.push_str(&format!("   📅 {date} | ⏰ {time} | {when}\n\n"));
    }
    let total = active.len();
    let plural = if total > 1 { "s" } else { "" };
    list.push_str(&format!("✅ Total: {total} lembrete{plural}"));
    list
}

fn time_until_phrase(minutes: i64) -> String {
    if minutes < 1 {
        "em instantes".to_owned()
    } else if minutes < 60 {
        let plural = if minutes > 1 { "s" } else { "" };
        format!("em {minutes} minuto{plural}")
    } else if minutes < 1440 {
        format!("em {}h", minutes / 60)
    } else {
        let days = minutes / 1440;
        let plural = if days > 1 { "s" } else { "" };
        format!("em {days} dia{plural}")
    }
}

fn confirmation_text(reminder: &Reminder) -> String {
    let (date, time) = match reminder.local_scheduled_at() {
        Some(local) => (
            local.format("%d/%m/%Y").to_string(),
            local.format("%H:%M").to_string(),
        ),
        None => (
            reminder.scheduled_at.format("%d/%m/%Y").to_string(),
            reminder.scheduled_at.format("%H:%M").to_string(),
        ),
    };
    format!(
        "✅ Beleza! Lembrete agendado!\n\
         📅 {date}\n\
         ⏰ {time} ({zone})\n\
         💬 {content}\n\
         Te aviso com carinho na hora! 💬",
        zone = reminder.timezone.replace('_', " "),
        content = reminder.content,
    )
}
