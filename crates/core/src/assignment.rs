// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The set of operations and concurrency the dispatcher has assigned to us.

use serde::{Deserialize, Serialize};

/// Server-pushed description of what this agent may run and at what
/// concurrency. Replaced wholesale (never merged) whenever the server sends
/// a new one, at register or via a heartbeat response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub operations: Vec<String>,
    pub max_concurrency: u32,
    #[serde(default)]
    pub paused: bool,
}

impl Assignment {
    /// The operations to claim for right now: empty while paused, so the
    /// scheduler requests no work without needing a separate code path.
    pub fn claimable_operations(&self) -> &[String] {
        if self.paused {
            &[]
        } else {
            &self.operations
        }
    }
}
