// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Load-or-create and rotate the agent's durable [`Identity`] at
//! `<state_dir>/identity.json`.

use std::fs;
use std::path::{Path, PathBuf};

use agent_core::error::IdentityError;
use agent_core::Identity;

/// Owns the on-disk path for `identity.json`. Stateless beyond that path —
/// every call re-reads or re-writes the file, since identity changes (only
/// ever via explicit `rotate`) are rare enough that caching isn't worth the
/// staleness risk.
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join("identity.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted identity, or mint and persist a fresh one if
    /// `identity.json` doesn't exist yet. A present-but-corrupt file is a
    /// hard error — never silently overwritten.
    pub fn load(&self) -> Result<Identity, IdentityError> {
        if self.path.exists() {
            return self.read();
        }
        let hostname = local_hostname()?;
        let os = platform_string();
        let identity = Identity::new(hostname, os);
        self.write(&identity)?;
        Ok(identity)
    }

    /// Load the current identity and persist a fresh `instance_id`,
    /// keeping `bot_key`/`hostname`/`os` unchanged.
    pub fn rotate(&self) -> Result<Identity, IdentityError> {
        let current = self.load()?;
        let rotated = current.with_new_instance();
        self.write(&rotated)?;
        Ok(rotated)
    }

    fn read(&self) -> Result<Identity, IdentityError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| IdentityError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| IdentityError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn write(&self, identity: &Identity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| IdentityError::Write {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(identity).unwrap_or_default();
        fs::write(&self.path, json).map_err(|source| IdentityError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

fn local_hostname() -> Result<String, IdentityError> {
    hostname::get()
        .map_err(|e| IdentityError::Hostname(e.to_string()))?
        .into_string()
        .map_err(|_| IdentityError::Hostname("hostname is not valid UTF-8".to_string()))
}

/// Rust has no stdlib equivalent of Python's `platform.platform()`; target
/// OS + architecture is an adequate substitute for a descriptive platform
/// string (documented decision, see DESIGN.md).
fn platform_string() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}
