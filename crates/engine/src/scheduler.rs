// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler: one tick at a time, outbox flush, claim, bounded fan-out,
//! join. This is the component everything else in the agent exists to
//! drive.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agent_core::error::DispatcherError;
use agent_core::wire::{DispatcherClient, Metrics, RunningJob};
use agent_core::{
    AgentPhase, Assignment, BotId, Clock, HandlerRegistry, Job, JobId, SystemClock, TerminalReport,
};
use agent_storage::Outbox;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::TickError;

/// Entries drained from the outbox per tick before attempting to claim.
const OUTBOX_DRAIN_LIMIT: usize = agent_storage::DEFAULT_DRAIN_LIMIT;

/// Base idle sleep when a tick finds no claimable operations or an empty
/// batch, per SPEC_FULL.md §4.6.1 step 3 ("~0.4 s with small jitter").
const IDLE_SLEEP_BASE_MS: u64 = 400;
const IDLE_SLEEP_JITTER_MS: u64 = 100;

fn idle_sleep_duration() -> Duration {
    let jitter = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % IDLE_SLEEP_JITTER_MS)
        .unwrap_or(0);
    Duration::from_millis(IDLE_SLEEP_BASE_MS + jitter)
}

/// Snapshot of one in-flight job, kept so the heartbeat loop can report
/// `running` without the scheduler and heartbeat task sharing anything
/// beyond this table.
#[derive(Debug, Clone)]
struct RunningJobInfo {
    op: String,
    started: std::time::Instant,
    lease_until: String,
}

/// Current concurrency cap and the semaphore enforcing it. Replaced
/// wholesale on reconfiguration rather than resized in place (§4.7).
struct Pool {
    semaphore: Arc<Semaphore>,
    total: u32,
}

impl Pool {
    fn new(max_concurrency: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency as usize)),
            total: max_concurrency,
        }
    }
}

struct Inner<C: Clock> {
    client: Arc<dyn DispatcherClient>,
    bot_id: BotId,
    instance_id: String,
    handlers: HandlerRegistry,
    outbox: Arc<Outbox>,
    assignment: RwLock<Assignment>,
    pool: RwLock<Pool>,
    claim_batch_size: u32,
    running: Mutex<HashMap<JobId, RunningJobInfo>>,
    clock: C,
    phase: Arc<RwLock<AgentPhase>>,
}

/// The per-agent scheduler. Cheap to clone (an `Arc` around shared state);
/// the run loop and the heartbeat task each hold their own clone.
pub struct Scheduler<C: Clock = SystemClock> {
    inner: Arc<Inner<C>>,
}

impl<C: Clock> Clone for Scheduler<C> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<C: Clock> Scheduler<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn DispatcherClient>,
        bot_id: BotId,
        instance_id: String,
        handlers: HandlerRegistry,
        outbox: Arc<Outbox>,
        assignment: Assignment,
        claim_batch_size: u32,
        clock: C,
        phase: Arc<RwLock<AgentPhase>>,
    ) -> Self {
        let pool = Pool::new(assignment.max_concurrency);
        Self {
            inner: Arc::new(Inner {
                client,
                bot_id,
                instance_id,
                handlers,
                outbox,
                assignment: RwLock::new(assignment),
                pool: RwLock::new(pool),
                claim_batch_size,
                running: Mutex::new(HashMap::new()),
                clock,
                phase,
            }),
        }
    }

    /// Current lifecycle phase, as last set by this scheduler's own tick or
    /// by the run loop (`Bootstrap`/`Register`/`DegradedNet`/`Draining`/
    /// `Shutdown` are the run loop's to set; `Idle`/`Claim`/`Process` are
    /// this scheduler's).
    pub fn phase(&self) -> AgentPhase {
        *self.inner.phase.read()
    }

    fn set_phase(&self, phase: AgentPhase) {
        *self.inner.phase.write() = phase;
    }

    /// Replace the assignment wholesale. If `max_concurrency` changed, a
    /// fresh semaphore is installed; jobs already holding a permit from the
    /// old one keep running until they finish (§4.7's documented transient
    /// overshoot).
    pub fn set_assignment(&self, assignment: Assignment) {
        let mut pool = self.inner.pool.write();
        if pool.total != assignment.max_concurrency {
            *pool = Pool::new(assignment.max_concurrency);
        }
        drop(pool);
        *self.inner.assignment.write() = assignment;
    }

    /// Current assignment, for callers (the heartbeat task) that need to
    /// read it without holding a scheduler-internal lock across an await.
    pub fn assignment(&self) -> Assignment {
        self.inner.assignment.read().clone()
    }

    /// Summaries of every job currently executing, for the heartbeat's
    /// `running` array.
    pub fn running_snapshot(&self) -> Vec<RunningJob> {
        let now = self.inner.clock.now();
        self.inner
            .running
            .lock()
            .iter()
            .map(|(job_id, info)| RunningJob {
                job_id: job_id.clone(),
                op: info.op.clone(),
                elapsed_ms: now.saturating_duration_since(info.started).as_millis() as u64,
                lease_until: info.lease_until.clone(),
            })
            .collect()
    }

    /// Coarse load signal: the fraction of permits currently checked out.
    /// `mem_mb` is not measured — no resource-sampling crate is part of this
    /// stack — and is reported as zero.
    pub fn metrics(&self) -> Metrics {
        let pool = self.inner.pool.read();
        let in_use = pool.total as usize - pool.semaphore.available_permits();
        let cpu = if pool.total == 0 { 0.0 } else { in_use as f64 / pool.total as f64 };
        Metrics { cpu, mem_mb: 0 }
    }

    /// Run exactly one tick: flush outbox, claim, fan out, join. See
    /// SPEC_FULL.md §4.6.1 for the step-by-step contract this follows.
    pub async fn tick(&self) -> Result<(), TickError> {
        self.set_phase(AgentPhase::Report);
        self.flush_outbox().await;
        self.set_phase(AgentPhase::Idle);

        let ops = self.inner.assignment.read().claimable_operations().to_vec();
        if ops.is_empty() || !self.phase().may_claim() {
            tokio::time::sleep(idle_sleep_duration()).await;
            return Ok(());
        }

        self.set_phase(AgentPhase::Claim);
        let batch = self
            .inner
            .client
            .claim(&self.inner.bot_id, &ops, self.inner.claim_batch_size)
            .await
            .map_err(TickError::Claim)?;

        if batch.is_empty() {
            self.set_phase(AgentPhase::Idle);
            tokio::time::sleep(idle_sleep_duration()).await;
            return Ok(());
        }

        let mut jobs = Vec::with_capacity(batch.len());
        for raw in batch {
            jobs.push(Job::decode(raw).map_err(TickError::MalformedClaim)?);
        }

        self.set_phase(AgentPhase::Process);
        let mut tasks = Vec::with_capacity(jobs.len());
        for job in jobs {
            let semaphore = self.inner.pool.read().semaphore.clone();
            let permit = semaphore
                .acquire_owned()
                .await
                .expect("scheduler semaphore is never closed");
            let inner = self.inner.clone();
            tasks.push(tokio::spawn(async move {
                run_one(&inner, job).await;
                drop(permit);
            }));
        }

        for task in tasks {
            if let Err(join_err) = task.await {
                warn!(error = %join_err, "job task panicked");
            }
        }

        self.set_phase(AgentPhase::Idle);
        Ok(())
    }

    /// Drain the outbox and retry delivery, oldest first. Stops at the
    /// first failure and re-appends that entry so FIFO order survives a
    /// partial flush (§4.6.1 step 1).
    async fn flush_outbox(&self) {
        let entries = match self.inner.outbox.drain(OUTBOX_DRAIN_LIMIT) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "outbox drain failed, continuing without flush");
                return;
            }
        };

        for (index, entry) in entries.iter().enumerate() {
            if report_one(&self.inner.client, entry).await.is_err() {
                if let Err(err) = self.inner.outbox.append(entry) {
                    warn!(error = %err, job_id = %entry.job_id, "failed to re-append outbox entry after flush failure");
                }
                for remaining in &entries[index + 1..] {
                    if let Err(err) = self.inner.outbox.append(remaining) {
                        warn!(error = %err, job_id = %remaining.job_id, "failed to restore outbox entry after flush abort");
                    }
                }
                return;
            }
        }
    }
}

async fn report_one(
    client: &Arc<dyn DispatcherClient>,
    entry: &TerminalReport,
) -> Result<serde_json::Value, DispatcherError> {
    client.report(&entry.job_id, entry.action, entry.payload.clone()).await
}

async fn run_one<C: Clock>(inner: &Arc<Inner<C>>, job: Job) {
    let started = inner.clock.now();
    let lease_until = job.lease_until.clone().unwrap_or_default();
    inner.running.lock().insert(
        job.id.clone(),
        RunningJobInfo { op: job.op.clone(), started, lease_until },
    );

    let outcome = inner.handlers.run(&job).await;
    let report = match outcome {
        Ok(result) => {
            info!(job_id = %job.id, op = %job.op, "job completed");
            TerminalReport::complete(job.id.clone(), &inner.instance_id, result)
        }
        Err(err) => {
            warn!(job_id = %job.id, op = %job.op, error = %err, "job failed");
            TerminalReport::fail(job.id.clone(), &inner.instance_id, err)
        }
    };

    inner.running.lock().remove(&job.id);

    if let Err(err) = report_one(&inner.client, &report).await {
        warn!(job_id = %job.id, error = %err, "report failed, falling back to outbox");
        if let Err(outbox_err) = inner.outbox.append(&report) {
            warn!(job_id = %job.id, error = %outbox_err, "outbox append failed after report failure, outcome lost");
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
