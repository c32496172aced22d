// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The terminal outcome of a claimed job, and its durable on-disk twin.

use crate::id::JobId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a claimed job finished successfully or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Complete,
    Fail,
}

impl Action {
    /// The path segment used by `POST /jobs/{job_id}/{action}`.
    pub fn as_path_segment(self) -> &'static str {
        match self {
            Action::Complete => "complete",
            Action::Fail => "fail",
        }
    }
}

/// The single `complete` or `fail` message produced per claimed job.
///
/// Exactly one of these is produced for every job the scheduler claims; once
/// produced it must eventually reach the server, live or via the outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalReport {
    pub job_id: JobId,
    pub action: Action,
    pub payload: Value,
}

impl TerminalReport {
    pub fn complete(job_id: JobId, instance_id: &str, result: Value) -> Self {
        Self {
            job_id,
            action: Action::Complete,
            payload: serde_json::json!({
                "instance_id": instance_id,
                "result": result,
            }),
        }
    }

    pub fn fail(job_id: JobId, instance_id: &str, error: impl std::fmt::Display) -> Self {
        Self {
            job_id,
            action: Action::Fail,
            payload: serde_json::json!({
                "instance_id": instance_id,
                "error": error.to_string(),
            }),
        }
    }
}

/// Durable, on-disk twin of a [`TerminalReport`] awaiting delivery.
///
/// Identical in shape; kept as a distinct type so the outbox's JSONL format
/// is decoupled from in-memory report construction (the wire shape is the
/// contract, not the Rust type).
pub type OutboxEntry = TerminalReport;
