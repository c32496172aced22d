// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors a single scheduler tick can end with. Both variants are
//! tick-local: the caller (the agent's run loop) backs off and retries the
//! next tick; neither ever aborts the process.

use agent_core::error::DispatcherError;
use agent_core::job::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TickError {
    /// The claim call itself failed at the transport level.
    #[error("claim failed: {0}")]
    Claim(#[from] DispatcherError),
    /// A claimed entry was missing a required field — a dispatcher bug
    /// class, so the whole tick aborts rather than skipping the one job.
    #[error("malformed claim response: {0}")]
    MalformedClaim(#[from] DecodeError),
}
