//! Configuration loading for lembra.
//!
//! Layout on disk is TOML with one table per concern:
//!
//! ```toml
//! [scheduler]
//! store_path = "/var/lib/lembra/reminders.json"
//! default_timezone = "America/Sao_Paulo"
//!
//! [whatsapp]
//! enabled = true
//! access_token = "EAAG..."
//! phone_number_id = "1055..."
//!
//! [nlu]
//! enabled = true
//! api_key = "sk-..."
//!
//! [logging]
//! file_prefix = "lembra"
//! ```
//!
//! Every table and field has a default, so a missing or partial file still
//! yields a usable configuration.

use crate::error::{LembraError, Result};
use crate::lembra_dirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LembraConfig {
    pub scheduler: SchedulerConfig,
    pub whatsapp: WhatsAppConfig,
    pub nlu: NluConfig,
    pub logging: LoggingConfig,
}

/// Scheduler and store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Path of the JSON store file.
    pub store_path: PathBuf,
    /// Timezone assumed when a request does not carry one.
    pub default_timezone: String,
    /// Path of the saved-contacts file.
    pub contacts_path: PathBuf,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            store_path: lembra_dirs::data_dir().join("reminders.json"),
            default_timezone: "America/Sao_Paulo".to_owned(),
            contacts_path: lembra_dirs::data_dir().join("contacts.json"),
        }
    }
}

/// WhatsApp Cloud API delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// When false the host delivers to the console instead.
    pub enabled: bool,
    /// Graph API access token.
    pub access_token: String,
    /// Sending phone number id.
    pub phone_number_id: String,
    /// Graph API base URL, overridable for tests.
    pub api_base: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            access_token: String::new(),
            phone_number_id: String::new(),
            api_base: "https://graph.facebook.com/v18.0".to_owned(),
        }
    }
}

/// Natural-language classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    /// When false, only keyword commands are understood.
    pub enabled: bool,
    /// OpenAI API key.
    pub api_key: String,
    /// Chat model used for classification.
    pub model: String,
    /// API base URL, overridable for tests.
    pub api_base: String,
    /// Sampling temperature for classification calls.
    pub temperature: f32,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            model: "gpt-4o".to_owned(),
            api_base: "https://api.openai.com/v1".to_owned(),
            temperature: 0.2,
        }
    }
}

/// File logging settings. Console logging is always on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rotated log files. Defaults to the app logs dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    /// File name prefix, producing `{prefix}.YYYY-MM-DD`.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            file_prefix: "lembra".to_owned(),
        }
    }
}

impl LembraConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`LembraError::Config`] when the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LembraError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| LembraError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Serialize the configuration to a TOML file, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`LembraError::Config`] when serialization or writing fails.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LembraError::Config(format!("cannot create {}: {e}", parent.display())))?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| LembraError::Config(format!("cannot serialize config: {e}")))?;
        std::fs::write(path, raw)
            .map_err(|e| LembraError::Config(format!("cannot write {}: {e}", path.display())))
    }

    /// Load from [`default_config_path`], falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LembraError::Config`] when a file exists but does not parse.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Default configuration file location: `{config_dir}/config.toml`.
#[must_use]
pub fn default_config_path() -> PathBuf {
    lembra_dirs::config_dir().join("config.toml")
}
