// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A claimed unit of work and its decode from the wire.

use crate::id::JobId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single job claimed from the dispatcher.
///
/// Immutable once constructed: consumed exactly once by one scheduler
/// invocation and discarded after its terminal report lands (live or via the
/// outbox).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub op: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_until: Option<String>,
}

/// Raw job shape as returned by `POST /jobs/claim`, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawJob {
    pub id: Option<String>,
    pub op: Option<String>,
    pub payload: Option<Value>,
    #[serde(default)]
    pub lease_until: Option<String>,
}

/// A claimed job is missing a field the dispatcher is required to send.
///
/// This is treated as a dispatcher bug, not a per-job data problem: it
/// aborts the whole tick rather than being skipped (see the scheduler's
/// tick-level handling).
#[derive(Debug, Error)]
#[error("malformed claim entry: missing `{field}`")]
pub struct DecodeError {
    pub field: &'static str,
}

impl Job {
    /// Decode a raw claim-response job, validating the required fields.
    pub fn decode(raw: RawJob) -> Result<Self, DecodeError> {
        let id = raw.id.filter(|s| !s.is_empty()).ok_or(DecodeError { field: "id" })?;
        let op = raw.op.filter(|s| !s.is_empty()).ok_or(DecodeError { field: "op" })?;
        let payload = raw.payload.ok_or(DecodeError { field: "payload" })?;
        Ok(Job {
            id: JobId::new(id),
            op,
            payload,
            lease_until: raw.lease_until,
        })
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
