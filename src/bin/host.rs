//! Interactive host for the lembra scheduler.
//!
//! Loads configuration, restores persisted reminders, then reads commands
//! and reminder requests line by line from stdin. Replies and console
//! deliveries go to stdout; tracing goes to stderr and a daily log file.

use lembra::config::LoggingConfig;
use lembra::{
    CommandOutcome, CommandRouter, ConsoleTransport, ContactDirectory, LembraConfig,
    OpenAiClassifier, ReminderEvent, ReminderScheduler, ReminderStore, Transport,
    WhatsAppTransport, lembra_dirs,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Owner id for reminders created from this console.
const REPL_OWNER: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var_os("LEMBRA_CONFIG") {
        Some(path) => LembraConfig::from_file(PathBuf::from(path))?,
        None => LembraConfig::load_default()?,
    };

    // The guard flushes the file appender on drop; keep it for the whole run.
    let _log_guard = init_tracing(&config.logging);
    info!("lembra-host starting");

    let transport: Arc<dyn Transport> = if config.whatsapp.enabled {
        let whatsapp = WhatsAppTransport::new(&config.whatsapp);
        if !whatsapp.health_check().await.unwrap_or(false) {
            warn!("whatsapp transport is enabled but missing credentials");
        }
        Arc::new(whatsapp)
    } else {
        info!("whatsapp disabled, delivering to the console");
        Arc::new(ConsoleTransport)
    };

    let store = ReminderStore::new(&config.scheduler.store_path);
    info!(path = %store.path().display(), "reminder store ready");
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let scheduler = ReminderScheduler::new(store, transport).with_event_sender(events_tx);

    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ReminderEvent::Delivered(r) => info!(id = %r.id, "delivered"),
                ReminderEvent::DeliveryFailed { reminder, error } => {
                    warn!(id = %reminder.id, error = %error, "delivery failed");
                }
                ReminderEvent::Expired(r) => info!(id = %r.id, "expired while offline"),
                ReminderEvent::Scheduled(_)
                | ReminderEvent::Firing(_)
                | ReminderEvent::Cancelled(_) => {}
            }
        }
    });

    // Reconcile the store before taking any input.
    let report = scheduler.restore().await?;
    info!(rearmed = report.rearmed, expired = report.expired, "restore complete");

    let contacts = ContactDirectory::new(&config.scheduler.contacts_path);
    info!(path = %contacts.path().display(), "contact directory ready");
    let mut router = CommandRouter::new(
        scheduler.clone(),
        contacts,
        config.scheduler.default_timezone.clone(),
    );
    if config.nlu.enabled {
        let classifier =
            OpenAiClassifier::new(&config.nlu, config.scheduler.default_timezone.clone());
        router = router.with_classifier(Arc::new(classifier));
    } else {
        info!("nlu disabled, only keyword commands are understood");
    }

    println!("lembra pronto. Digite um comando ou lembrete (\"sair\" encerra).");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("sair") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        match router.handle(REPL_OWNER, line).await {
            Ok(CommandOutcome::Reply(reply)) => println!("{reply}"),
            Ok(CommandOutcome::Ignored) => println!("(nada para agendar nisso)"),
            Err(e) => {
                error!("command failed: {e}");
                println!("❌ Algo deu errado: {e}");
            }
        }
    }

    scheduler.shutdown().await;
    info!("lembra-host shut down cleanly");
    Ok(())
}

/// Stderr logging always; a daily rolling file when the directory is
/// usable. Returns the appender guard that must outlive the run.
fn init_tracing(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    let directory = config
        .directory
        .clone()
        .unwrap_or_else(lembra_dirs::logs_dir);
    if let Err(e) = std::fs::create_dir_all(&directory) {
        registry.init();
        warn!(path = %directory.display(), "cannot create log directory, logging to stderr only: {e}");
        return None;
    }

    let appender = tracing_appender::rolling::daily(&directory, &config.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Some(guard)
}
