//! The sidecar config file.
//!
//! Holds the per-user knobs the engine consults (auto-commit,
//! auto-sync) plus the recipient-set checksums used by the
//! bare-idfile fallback: stores that predate the token chain get a
//! SHA3 checksum of their idfile recorded here, and a mismatch on read
//! fails the ACL load until the user explicitly accepts the new set.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, StoreError};

/// User configuration, loaded from `config.toml`.
///
/// Every field has a default so the engine works without any config
/// file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Commit after every mutating operation.
    #[serde(default = "default_true")]
    pub auto_commit: bool,

    /// Push after every commit.
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Author identity used when initializing revision control.
    #[serde(default)]
    pub author_name: String,

    #[serde(default)]
    pub author_email: String,

    /// SHA3 checksums of bare idfiles, keyed by `<store-location>:<idfile>`.
    #[serde(default)]
    pub recipient_checksums: BTreeMap<String, String>,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_true() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_commit: true,
            auto_sync: true,
            author_name: String::new(),
            author_email: String::new(),
            recipient_checksums: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load a config from the given path.
    ///
    /// A missing file yields defaults; a file that exists but fails to
    /// parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| StoreError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Write the config atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| StoreError::Serialization(format!("config: {e}")))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(path);
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The recorded checksum for a bare idfile, if any.
    pub fn recipient_checksum(&self, key: &str) -> Option<&str> {
        self.recipient_checksums.get(key).map(String::as_str)
    }

    /// Record (or explicitly update) a bare-idfile checksum.
    pub fn set_recipient_checksum(&mut self, key: &str, checksum: &str) {
        self.recipient_checksums
            .insert(key.to_string(), checksum.to_string());
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ))
}

// ── Tests ────────────────────────────────────────────────────────────
