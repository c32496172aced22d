// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Process wiring for the `agentd` binary: where state lives, how the agent
//! comes up (identity, register, scheduler), and the run/heartbeat loops
//! that drive it until a shutdown signal arrives.
//!
//! Everything that is actual agent *behavior* lives in `agent-core` /
//! `agent-engine` / `agent-adapters` / `agent-storage`; this crate only
//! wires those together into a long-running process.

pub mod env;
pub mod lifecycle;

pub use lifecycle::{Agent, Config, LifecycleError, ShutdownSignal};
