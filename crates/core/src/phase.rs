// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent's authoritative lifecycle state.
//!
//! The run loop reads and writes this on every transition; nothing infers
//! the agent's state from side effects (an open socket, a running task) the
//! way an implicit state machine would. `AgentPhase` is the single source of
//! truth and every other component (heartbeat loop, scheduler, signal
//! handler) observes it rather than re-deriving it.

use serde::{Deserialize, Serialize};

/// Where the agent is in its life, from process start to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentPhase {
    /// Identity loaded, settings resolved, nothing sent to the dispatcher yet.
    Bootstrap,
    /// `POST /register` in flight or retrying.
    Register,
    /// Registered, waiting for the next tick; no assignment work available.
    Idle,
    /// `POST /jobs/claim` in flight for the current tick.
    Claim,
    /// Claimed jobs are being run under the concurrency semaphore.
    Process,
    /// Terminal reports are being sent (live or queued to the outbox).
    Report,
    /// The dispatcher is unreachable; retrying registration/heartbeat with
    /// backoff while continuing to serve already-claimed jobs.
    DegradedNet,
    /// A shutdown signal was received; no new jobs are claimed, in-flight
    /// jobs are allowed to finish.
    Draining,
    /// Clean exit, nothing left to flush.
    Shutdown,
}

impl AgentPhase {
    /// Whether the scheduler may start a new claim in this phase.
    pub fn may_claim(self) -> bool {
        matches!(self, AgentPhase::Idle)
    }

    /// Whether the agent is in the process of shutting down.
    pub fn is_terminal_bound(self) -> bool {
        matches!(self, AgentPhase::Draining | AgentPhase::Shutdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_idle_may_claim() {
        assert!(AgentPhase::Idle.may_claim());
        assert!(!AgentPhase::Bootstrap.may_claim());
        assert!(!AgentPhase::Claim.may_claim());
        assert!(!AgentPhase::Draining.may_claim());
    }

    #[test]
    fn draining_and_shutdown_are_terminal_bound() {
        assert!(AgentPhase::Draining.is_terminal_bound());
        assert!(AgentPhase::Shutdown.is_terminal_bound());
        assert!(!AgentPhase::Idle.is_terminal_bound());
    }

    #[test]
    fn serializes_as_snake_case() {
        let v = serde_json::to_value(AgentPhase::DegradedNet).unwrap();
        assert_eq!(v, "degraded_net");
    }
}
