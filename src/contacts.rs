//! Saved contacts: alias to deliverable address.
//!
//! Backs the forwarded-reminder flow: a classifier hands back a contact
//! name, this directory turns it into an address the transport can send
//! to. One JSON object on disk, aliases folded to trimmed lowercase on
//! both insert and lookup.

use crate::error::{LembraError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Alias-to-address map persisted as a JSON object.
#[derive(Debug, Clone)]
pub struct ContactDirectory {
    path: PathBuf,
}

impl ContactDirectory {
    /// Create a directory backed by `path`. The file is created on the
    /// first [`add`](Self::add).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up an alias. Case and surrounding whitespace are ignored.
    #[must_use]
    pub fn resolve(&self, alias: &str) -> Option<String> {
        self.load().get(&sanitize_alias(alias)).cloned()
    }

    /// Insert or replace an alias.
    ///
    /// # Errors
    ///
    /// [`LembraError::Contacts`] when the alias is empty after sanitizing
    /// or the file cannot be written.
    pub fn add(&self, alias: &str, address: &str) -> Result<()> {
        let alias = sanitize_alias(alias);
        if alias.is_empty() {
            return Err(LembraError::Contacts("alias is empty".to_owned()));
        }

        let mut contacts = self.load();
        contacts.insert(alias, address.trim().to_owned());
        self.save(&contacts)
    }

    /// Number of saved contacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self) -> BTreeMap<String, String> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "cannot read contacts, starting empty: {e}");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(contacts) => contacts,
            Err(e) => {
                warn!(path = %self.path.display(), "contacts file is corrupt, starting empty: {e}");
                BTreeMap::new()
            }
        }
    }

    fn save(&self, contacts: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                LembraError::Contacts(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(contacts)
            .map_err(|e| LembraError::Contacts(format!("cannot serialize contacts: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| LembraError::Contacts(format!("cannot write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            LembraError::Contacts(format!("cannot replace {}: {e}", self.path.display()))
        })
    }
}

fn sanitize_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn resolve_is_case_and_whitespace_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let contacts = ContactDirectory::new(dir.path().join("contacts.json"));

        contacts.add("  Joana  ", "+5511888880000").unwrap();
        assert_eq!(contacts.resolve("joana").as_deref(), Some("+5511888880000"));
        assert_eq!(contacts.resolve("JOANA ").as_deref(), Some("+5511888880000"));
        assert!(contacts.resolve("pedro").is_none());
    }

    #[test]
    fn add_replaces_an_existing_alias() {
        let dir = tempfile::tempdir().unwrap();
        let contacts = ContactDirectory::new(dir.path().join("contacts.json"));

        contacts.add("joana", "+111").unwrap();
        contacts.add("Joana", "+222").unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts.resolve("joana").as_deref(), Some("+222"));
    }

    #[test]
    fn empty_alias_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let contacts = ContactDirectory::new(dir.path().join("contacts.json"));
        assert!(matches!(contacts.add("   ", "+111"), Err(LembraError::Contacts(_))));
    }

    #[test]
    fn persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.json");

        ContactDirectory::new(&path).add("mãe", "+333").unwrap();
        let reopened = ContactDirectory::new(&path);
        assert_eq!(reopened.resolve("mãe").as_deref(), Some("+333"));
    }

    #[test]
    fn missing_and_corrupt_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ContactDirectory::new(dir.path().join("nope.json"));
        assert_eq!(missing.path(), dir.path().join("nope.json"));
        assert!(missing.is_empty());

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "][").unwrap();
        let broken = ContactDirectory::new(&path);
        assert!(broken.is_empty());
        assert!(broken.resolve("joana").is_none());
    }
}
