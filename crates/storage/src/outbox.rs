// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only, line-delimited durable queue of pending terminal reports.
//!
//! The file exists iff there is at least one pending entry: a successful
//! [`Outbox::drain`] deletes it outright rather than truncating it, so an
//! empty outbox leaves no trace on disk.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use agent_core::error::OutboxError;
use agent_core::OutboxEntry;
use parking_lot::Mutex;

/// Default cap on how many entries a single [`Outbox::drain`] returns.
pub const DEFAULT_DRAIN_LIMIT: usize = 1000;

/// Durable JSONL queue at `<state_dir>/outbox.jsonl`.
///
/// `append` and `drain` take `&self` (not `&mut self`): both are called from
/// concurrent contexts in the daemon (the scheduler's tick, and potentially
/// a future out-of-band flush), and are serialized internally by a mutex
/// rather than requiring the caller to synchronize. Cross-process use is
/// not supported — the lock only orders writers within one process.
pub struct Outbox {
    path: PathBuf,
    lock: Mutex<()>,
}

impl Outbox {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: state_dir.as_ref().join("outbox.jsonl"),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry as a single JSON line. Creates the parent directory
    /// and the file if either is missing.
    pub fn append(&self, entry: &OutboxEntry) -> Result<(), OutboxError> {
        let _guard = self.lock.lock();
        self.append_locked(entry)
    }

    fn append_locked(&self, entry: &OutboxEntry) -> Result<(), OutboxError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| OutboxError::Open {
                path: self.path.display().to_string(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| OutboxError::Open {
                path: self.path.display().to_string(),
                source,
            })?;
        let line = serde_json::to_string(entry).map_err(|source| OutboxError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|source| OutboxError::Append {
                path: self.path.display().to_string(),
                source,
            })
    }

    /// Drain up to `max_items` entries in FIFO order.
    ///
    /// The file is deleted before parsing (matching the spec's documented
    /// behavior, see SPEC_FULL.md §9): if any line fails to parse, every
    /// entry in the file — parsed or not — is lost. The file is already
    /// gone by the time the error is returned, so the next tick starts
    /// clean rather than re-reading the same corrupt line forever.
    pub fn drain(&self, max_items: usize) -> Result<Vec<OutboxEntry>, OutboxError> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| OutboxError::Open {
            path: self.path.display().to_string(),
            source,
        })?;
        fs::remove_file(&self.path).map_err(|source| OutboxError::Rotate {
            path: self.path.display().to_string(),
            source,
        })?;

        let mut entries = Vec::new();
        for line in contents.lines().filter(|l| !l.is_empty()) {
            let entry: OutboxEntry =
                serde_json::from_str(line).map_err(|source| OutboxError::Corrupt {
                    path: self.path.display().to_string(),
                    source,
                })?;
            entries.push(entry);
        }
        entries.truncate(max_items);
        Ok(entries)
    }
}
