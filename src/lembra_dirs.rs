//! Centralized application directory paths.
//!
//! Single source of truth for the filesystem locations lembra uses. Uses the
//! [`dirs`] crate for platform-appropriate resolution.
//!
//! # Environment Overrides
//!
//! All paths can be overridden for testing or custom deployments:
//! - `LEMBRA_DATA_DIR` overrides [`data_dir`]
//! - `LEMBRA_CONFIG_DIR` overrides [`config_dir`]

use std::path::PathBuf;

/// Application data root directory.
///
/// Used for persistent user data: the reminder store, the contact
/// directory, and log files.
///
/// Resolves to `dirs::data_dir()/lembra/` by default. Override with the
/// `LEMBRA_DATA_DIR` environment variable.
#[must_use]
pub fn data_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LEMBRA_DATA_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::data_dir()
        .map(|d| d.join("lembra"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lembra-data"))
}

/// Application config directory.
///
/// Used for `config.toml`. Resolves to `dirs::config_dir()/lembra/` by
/// default. Override with the `LEMBRA_CONFIG_DIR` environment variable.
#[must_use]
pub fn config_dir() -> PathBuf {
    if let Some(override_dir) = std::env::var_os("LEMBRA_CONFIG_DIR") {
        return PathBuf::from(override_dir);
    }
    dirs::config_dir()
        .map(|d| d.join("lembra"))
        .unwrap_or_else(|| PathBuf::from("/tmp/lembra-config"))
}

/// Log file directory (`data_dir()/logs/`).
#[must_use]
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}
