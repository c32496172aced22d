// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! This agent's durable identity: its stable `bot_key` and its per-process
//! `instance_id`.
//!
//! Persistence (load-or-create, atomic rewrite) lives in `agent-storage`,
//! which owns all stateful file I/O. This module only owns the shape of the
//! identity and the pure fingerprint it's derived from.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Stable, host-derived fingerprint plus a fresh per-process instance id.
///
/// `bot_key` survives restarts (it is recomputed identically, or reloaded
/// from disk, every time this process starts on the same host). `instance_id`
/// is regenerated every time the process starts, so the dispatcher can tell
/// successive runs of the same bot apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub bot_key: String,
    pub instance_id: String,
    pub hostname: String,
    pub os: String,
}

impl Identity {
    /// Build a fresh identity for this host, minting a new `instance_id`.
    pub fn new(hostname: impl Into<String>, os: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let os = os.into();
        let bot_key = fingerprint(&hostname, &os);
        Self {
            bot_key,
            instance_id: Uuid::new_v4().to_string(),
            hostname,
            os,
        }
    }

    /// Rebuild with a fresh `instance_id` but the same `bot_key`, hostname,
    /// and os. Used when an on-disk identity is reloaded but the process
    /// itself is new.
    pub fn with_new_instance(self) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            ..self
        }
    }
}

/// SHA-256 of `"{hostname}|{os}"`, hex-encoded.
///
/// Deterministic per host so the same machine reports the same `bot_key`
/// across restarts, without needing any state to survive a wipe of the
/// state directory.
pub fn fingerprint(hostname: &str, os: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(hostname.as_bytes());
    hasher.update(b"|");
    hasher.update(os.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
