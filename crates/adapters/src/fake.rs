// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A programmable, in-memory [`DispatcherClient`] for exercising the
//! scheduler and agent lifecycle without a live dispatcher.
//!
//! Only compiled behind the `test-support` feature so this never ships in
//! the `agentd` binary.

use std::collections::VecDeque;
use std::sync::Arc;

use agent_core::error::DispatcherError;
use agent_core::id::{BotId, JobId};
use agent_core::report::Action;
use agent_core::wire::{
    DispatcherClient, HeartbeatResponse, Metrics, RegisterResponse, Resources, RunningJob,
};
use agent_core::RawJob;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

/// One recorded `report` call, kept so tests can assert exactly what the
/// server would have received, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReport {
    pub job_id: JobId,
    pub action: Action,
    pub payload: Value,
}

/// One recorded `claim` call, kept for assignment-update assertions (P9):
/// after a new assignment arrives, the next claim must carry its ops/limit.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedClaim {
    pub operations: Vec<String>,
    pub limit: u32,
}

#[derive(Default)]
struct State {
    register_response: Option<RegisterResponse>,
    claim_batches: VecDeque<Vec<RawJob>>,
    heartbeat_responses: VecDeque<HeartbeatResponse>,
    /// Queue of canned outcomes for the *next* `report` calls. `None` means
    /// "succeed with `{}`". Exhausting the queue always succeeds.
    report_outcomes: VecDeque<Result<Value, ()>>,
    reports: Vec<RecordedReport>,
    claims: Vec<RecordedClaim>,
    heartbeats: usize,
}

/// Shared handle so a test can both hand the client to an `Agent`/`Scheduler`
/// and separately inspect/program it.
#[derive(Clone, Default)]
pub struct FakeDispatcherClient {
    state: Arc<Mutex<State>>,
}

impl FakeDispatcherClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program the response `register` returns on its next (and only
    /// expected) call.
    pub fn set_register_response(&self, response: RegisterResponse) {
        self.state.lock().register_response = Some(response);
    }

    /// Queue a batch of jobs to return from the next `claim` call. Once the
    /// queue is drained, `claim` returns empty batches forever.
    pub fn push_claim_batch(&self, jobs: Vec<RawJob>) {
        self.state.lock().claim_batches.push_back(jobs);
    }

    /// Queue a heartbeat response. Once drained, returns an empty response.
    pub fn push_heartbeat_response(&self, response: HeartbeatResponse) {
        self.state.lock().heartbeat_responses.push_back(response);
    }

    /// Make the next `report` call fail with a transport error; the call
    /// after that (and any not explicitly queued) succeeds.
    pub fn fail_next_report(&self) {
        self.state.lock().report_outcomes.push_back(Err(()));
    }

    pub fn reports(&self) -> Vec<RecordedReport> {
        self.state.lock().reports.clone()
    }

    pub fn claims(&self) -> Vec<RecordedClaim> {
        self.state.lock().claims.clone()
    }

    pub fn heartbeat_count(&self) -> usize {
        self.state.lock().heartbeats
    }
}

#[async_trait]
impl DispatcherClient for FakeDispatcherClient {
    async fn register(
        &self,
        _bot_key: &str,
        _instance_id: &str,
        _version: &str,
        _capabilities: Vec<String>,
        _resources: Resources,
        _constraints: Value,
        _meta: Value,
    ) -> Result<RegisterResponse, DispatcherError> {
        self.state
            .lock()
            .register_response
            .clone()
            .ok_or(DispatcherError::Rejected {
                endpoint: "POST /bots/register",
                status: 500,
                body: "no response programmed on FakeDispatcherClient".to_string(),
            })
    }

    async fn heartbeat(
        &self,
        _bot_id: &BotId,
        _instance_id: &str,
        _running: Vec<RunningJob>,
        _metrics: Metrics,
    ) -> Result<HeartbeatResponse, DispatcherError> {
        let mut state = self.state.lock();
        state.heartbeats += 1;
        Ok(state.heartbeat_responses.pop_front().unwrap_or_default())
    }

    async fn claim(
        &self,
        _bot_id: &BotId,
        operations: &[String],
        limit: u32,
    ) -> Result<Vec<RawJob>, DispatcherError> {
        let mut state = self.state.lock();
        state.claims.push(RecordedClaim {
            operations: operations.to_vec(),
            limit,
        });
        Ok(state.claim_batches.pop_front().unwrap_or_default())
    }

    async fn report(
        &self,
        job_id: &JobId,
        action: Action,
        payload: Value,
    ) -> Result<Value, DispatcherError> {
        let mut state = self.state.lock();
        state.reports.push(RecordedReport {
            job_id: job_id.clone(),
            action,
            payload: payload.clone(),
        });
        match state.report_outcomes.pop_front() {
            Some(Err(())) => Err(DispatcherError::Transport {
                endpoint: "POST /jobs/{job_id}/{action}",
                message: "simulated network flap".to_string(),
            }),
            Some(Ok(v)) => Ok(v),
            None => Ok(Value::Null),
        }
    }
}

impl RegisterResponse {
    /// Convenience constructor for tests wiring a fake register response.
    pub fn test_default(bot_id: &str, operations: &[&str], max_concurrency: u32) -> Self {
        serde_json::from_value(serde_json::json!({
            "bot_id": bot_id,
            "auth": {"access_token": "fake-token"},
            "assignment": {"operations": operations, "max_concurrency": max_concurrency},
        }))
        .expect("well-formed test RegisterResponse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::JobId;

    #[tokio::test]
    async fn claim_records_requested_operations_and_limit() {
        let client = FakeDispatcherClient::new();
        client
            .claim(&BotId::new("bot-1"), &["sum".to_string()], 5)
            .await
            .unwrap();
        assert_eq!(
            client.claims(),
            vec![RecordedClaim { operations: vec!["sum".to_string()], limit: 5 }]
        );
    }

    #[tokio::test]
    async fn fail_next_report_fails_exactly_one_call() {
        let client = FakeDispatcherClient::new();
        client.fail_next_report();
        let err = client
            .report(&JobId::new("job_1"), Action::Complete, Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatcherError::Transport { .. }));

        let ok = client
            .report(&JobId::new("job_1"), Action::Complete, Value::Null)
            .await;
        assert!(ok.is_ok());
        assert_eq!(client.reports().len(), 2);
    }

    #[tokio::test]
    async fn claim_batches_drain_in_order_then_stay_empty() {
        let client = FakeDispatcherClient::new();
        client.push_claim_batch(vec![RawJob {
            id: Some("job_1".to_string()),
            op: Some("sum".to_string()),
            payload: Some(serde_json::json!({})),
            lease_until: None,
        }]);

        let first = client.claim(&BotId::new("b"), &[], 5).await.unwrap();
        assert_eq!(first.len(), 1);
        let second = client.claim(&BotId::new("b"), &[], 5).await.unwrap();
        assert!(second.is_empty());
    }
}
