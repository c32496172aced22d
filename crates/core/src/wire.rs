// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The five dispatcher protocol messages and the trait any transport
//! implements them behind.
//!
//! This module owns shape and validation only. The concrete HTTP transport
//! (connection pooling, timeouts, auth header injection) lives in
//! `agent-adapters`, which is the only crate in the workspace allowed to
//! depend on an HTTP client — keeping this crate free of network
//! dependencies so it can be used to unit-test the scheduler with a fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assignment::Assignment;
use crate::error::DispatcherError;
use crate::id::{BotId, JobId};
use crate::job::RawJob;
use crate::report::Action;

/// `resources` field of a register request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_cores: u32,
    pub mem_mb: u32,
}

/// `auth` field of a register response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// `POST /bots/register` response body on success.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub bot_id: String,
    pub auth: AuthTokens,
    pub assignment: Assignment,
    #[serde(default)]
    pub config: Option<Value>,
}

/// One entry of the `running` array sent with every heartbeat: a summary of
/// an in-flight job, not the job itself.
#[derive(Debug, Clone, Serialize)]
pub struct RunningJob {
    pub job_id: JobId,
    pub op: String,
    pub elapsed_ms: u64,
    pub lease_until: String,
}

/// Coarse load signal sent with every heartbeat.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metrics {
    pub cpu: f64,
    pub mem_mb: u64,
}

/// `PUT /bots/{bot_id}/heartbeat` response body. Every field is optional —
/// callers must tolerate a server that sends back an empty object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(default)]
    pub lease_extended_to: Option<String>,
    #[serde(default)]
    pub assignment: Option<Assignment>,
}

/// `POST /jobs/claim` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClaimResponse {
    #[serde(default)]
    pub jobs: Vec<RawJob>,
}

/// Typed request/response surface over the dispatcher's wire protocol.
///
/// Implementations own the HTTP client, the bearer token obtained at
/// `register`, and per-call timeouts. A single instance is shared by the
/// run loop and the heartbeat loop; implementations must be safe to call
/// concurrently (an internally-pooled, `Clone`-friendly HTTP client
/// satisfies this without extra locking).
#[async_trait]
pub trait DispatcherClient: Send + Sync {
    /// Register this agent with the dispatcher. On success the
    /// implementation stores the returned access token for use on every
    /// subsequent call. Any non-2xx is a hard failure surfaced verbatim.
    async fn register(
        &self,
        bot_key: &str,
        instance_id: &str,
        version: &str,
        capabilities: Vec<String>,
        resources: Resources,
        constraints: Value,
        meta: Value,
    ) -> Result<RegisterResponse, DispatcherError>;

    /// Send a liveness signal. Any 2xx response is decoded and returned,
    /// even if it lacks every optional field.
    async fn heartbeat(
        &self,
        bot_id: &BotId,
        instance_id: &str,
        running: Vec<RunningJob>,
        metrics: Metrics,
    ) -> Result<HeartbeatResponse, DispatcherError>;

    /// Ask for up to `limit` jobs among `operations`. An empty or missing
    /// `jobs` key both mean "no work now".
    async fn claim(
        &self,
        bot_id: &BotId,
        operations: &[String],
        limit: u32,
    ) -> Result<Vec<RawJob>, DispatcherError>;

    /// Report a terminal outcome for a previously claimed job.
    async fn report(
        &self,
        job_id: &JobId,
        action: Action,
        payload: Value,
    ) -> Result<Value, DispatcherError>;
}
