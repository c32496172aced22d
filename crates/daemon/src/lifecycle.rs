// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: bring the agent up (identity, register, scheduler),
//! then drive its run loop and heartbeat loop until a shutdown signal
//! arrives.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agent_adapters::HttpDispatcherClient;
use agent_core::error::{ConfigError, DispatcherError, IdentityError};
use agent_core::wire::{DispatcherClient, Resources};
use agent_core::{AgentPhase, Backoff, BotId, Clock, HandlerRegistry, Settings, SystemClock};
use agent_engine::Scheduler;
use agent_storage::{IdentityStore, Outbox};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::env;

/// `resources.mem_mb` reported at register. The corpus carries no
/// resource-sampling crate, so this is a fixed, documented estimate rather
/// than a measurement (see DESIGN.md).
const DEFAULT_MEM_MB: u32 = 1024;

/// Process-wide configuration: just the state directory today, but kept as
/// its own type (rather than passing a bare `PathBuf` around) so a future
/// daemon-only setting has somewhere to live without touching every
/// call site.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub log_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        let log_path = state_dir.join("agentd.log");
        Ok(Self { state_dir, log_path })
    }
}

/// Everything that can go wrong before the agent is ready to tick.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),
    #[error("register rejected by dispatcher: {0}")]
    Register(#[from] DispatcherError),
    #[error("no handlers registered: the agent would have nothing to claim")]
    NoHandlers,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cooperative shutdown signal shared by the run loop and the heartbeat
/// loop.
///
/// A plain `Arc<AtomicBool>` would let either loop notice a shutdown
/// request only by polling; a plain `Notify` would miss a `trigger()` that
/// happens before anyone is waiting. This combines both: `is_set` is the
/// source of truth checked between ticks/iterations, `notified`/`wait` let
/// a loop sleeping in the middle of an iteration wake up promptly instead
/// of riding out its full sleep.
#[derive(Clone)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Request shutdown. Idempotent — safe to call from more than one
    /// signal handler.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve immediately if shutdown was already requested, otherwise
    /// wait for the next `trigger()`.
    pub async fn wait(&self) {
        if self.is_set() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// A running agent: registered with the dispatcher, scheduler built,
/// ready to tick.
pub struct Agent {
    settings: Settings,
    client: Arc<dyn DispatcherClient>,
    scheduler: Scheduler<SystemClock>,
    phase: Arc<RwLock<AgentPhase>>,
    instance_id: String,
    bot_id: BotId,
}

impl Agent {
    /// Run the `start()` sequence from SPEC_FULL.md §4.7: identity, client,
    /// register, scheduler construction. Returns an agent sitting in
    /// `AgentPhase::Idle`, ready for [`Agent::run`].
    pub async fn start(
        settings: Settings,
        state_dir: &Path,
        handlers: HandlerRegistry,
    ) -> Result<Self, LifecycleError> {
        let client: Arc<dyn DispatcherClient> =
            Arc::new(HttpDispatcherClient::new(settings.server_base.clone()));
        Self::start_with_client(settings, state_dir, handlers, client).await
    }

    /// The real body of [`Agent::start`], taking the dispatcher client as a
    /// parameter so tests can swap in a fake without standing up an HTTP
    /// server.
    async fn start_with_client(
        settings: Settings,
        state_dir: &Path,
        handlers: HandlerRegistry,
        client: Arc<dyn DispatcherClient>,
    ) -> Result<Self, LifecycleError> {
        if handlers.is_empty() {
            return Err(LifecycleError::NoHandlers);
        }

        let phase = Arc::new(RwLock::new(AgentPhase::Bootstrap));

        let identity_store = IdentityStore::new(state_dir);
        let identity = identity_store.load()?;
        info!(
            bot_key = %identity.bot_key,
            instance_id = %identity.instance_id,
            "identity loaded"
        );

        let outbox = Arc::new(Outbox::new(state_dir));

        *phase.write() = AgentPhase::Register;
        let capabilities = handlers.operations();
        let resources = Resources {
            cpu_cores: std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            mem_mb: DEFAULT_MEM_MB,
        };
        let meta = serde_json::json!({ "hostname": identity.hostname, "os": identity.os });

        let response = client
            .register(
                &identity.bot_key,
                &identity.instance_id,
                &settings.bot_version,
                capabilities,
                resources,
                serde_json::json!({}),
                meta,
            )
            .await?;
        info!(bot_id = %response.bot_id, assignment = ?response.assignment, "registered with dispatcher");

        let bot_id = BotId::new(response.bot_id);
        let scheduler = Scheduler::new(
            client.clone(),
            bot_id.clone(),
            identity.instance_id.clone(),
            handlers,
            outbox,
            response.assignment,
            settings.claim_batch_size,
            SystemClock,
            phase.clone(),
        );
        *phase.write() = AgentPhase::Idle;

        Ok(Self {
            settings,
            client,
            scheduler,
            phase,
            instance_id: identity.instance_id,
            bot_id,
        })
    }

    pub fn phase(&self) -> AgentPhase {
        *self.phase.read()
    }

    /// Drive the agent until `shutdown` is triggered: spawns the heartbeat
    /// task, runs the tick loop on the current task, then waits for the
    /// heartbeat task to notice the same signal and exit before returning.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        let heartbeat_handle = tokio::spawn(heartbeat_loop(
            self.client.clone(),
            self.bot_id.clone(),
            self.instance_id.clone(),
            self.scheduler.clone(),
            Duration::from_secs(self.settings.heartbeat_interval_sec),
            shutdown.clone(),
        ));

        self.run_loop(&shutdown).await;

        if let Err(err) = heartbeat_handle.await {
            warn!(error = %err, "heartbeat task did not shut down cleanly");
        }
    }

    /// Calls `scheduler.tick()` in an unbounded loop. A tick is always run
    /// to completion — including any in-flight jobs — before `shutdown` is
    /// consulted again, so draining never cuts off work that's already
    /// started (SPEC_FULL.md §4.7's shutdown contract). Only the
    /// post-error backoff sleep races the shutdown signal, since that sleep
    /// can be as long as `MAX_BACKOFF_MS` and must not block a drain.
    ///
    /// `AgentPhase` is the authoritative gate here: `shutdown` is the signal
    /// source, but the loop itself keeps running only while
    /// `phase().is_terminal_bound()` is false, and stops claiming the
    /// instant that flips.
    async fn run_loop(&self, shutdown: &ShutdownSignal) {
        let mut backoff = Backoff::new(self.settings.min_backoff_ms, self.settings.max_backoff_ms);
        loop {
            if shutdown.is_set() {
                *self.phase.write() = AgentPhase::Draining;
            }
            if self.phase().is_terminal_bound() {
                break;
            }
            match self.scheduler.tick().await {
                Ok(()) => backoff.reset(),
                Err(err) => {
                    warn!(error = %err, "tick failed, entering degraded-network backoff");
                    *self.phase.write() = AgentPhase::DegradedNet;
                    let wait = backoff.next();
                    tokio::select! {
                        _ = shutdown.wait() => break,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
        *self.phase.write() = AgentPhase::Draining;
        info!("draining: no further jobs will be claimed");
        *self.phase.write() = AgentPhase::Shutdown;
    }
}

/// Every `interval`: report in-flight jobs and coarse load, apply any
/// assignment the response carries. Swallows every error (transport or
/// otherwise) so a flaky dispatcher never kills the loop, per
/// SPEC_FULL.md §4.7.
async fn heartbeat_loop<C: Clock>(
    client: Arc<dyn DispatcherClient>,
    bot_id: BotId,
    instance_id: String,
    scheduler: Scheduler<C>,
    interval: Duration,
    shutdown: ShutdownSignal,
) {
    while !shutdown.is_set() {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if shutdown.is_set() {
            break;
        }

        let running = scheduler.running_snapshot();
        let metrics = scheduler.metrics();
        match client.heartbeat(&bot_id, &instance_id, running, metrics).await {
            Ok(response) => {
                if let Some(assignment) = response.assignment {
                    info!(?assignment, "assignment updated by heartbeat response");
                    scheduler.set_assignment(assignment);
                }
            }
            Err(err) => {
                warn!(error = %err, "heartbeat failed, will retry next interval");
            }
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
