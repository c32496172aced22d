// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The operation handler contract and the process-wide registry that maps
//! an `op` name to one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HandlerError;
use crate::job::Job;

/// A pluggable unit of work keyed by operation name.
///
/// Handlers may suspend (I/O, timers) but must never panic on bad input —
/// payload shape is validated at the handler edge and reported as a
/// [`HandlerError::Failed`], never a process-level panic.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, job: &Job) -> Result<Value, String>;
}

/// Blanket impl so a plain async closure can be registered without defining
/// a type for it, matching the ergonomics of the source's `@op` decorator.
#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(&Job) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Value, String>> + Send,
{
    async fn call(&self, job: &Job) -> Result<Value, String> {
        self(job).await
    }
}

/// Process-wide map from operation name to handler.
///
/// Built once at startup before the scheduler exists and never mutated
/// concurrently with a tick; registering the same `op` twice replaces the
/// prior entry (last writer wins), matching the source's module-import
/// order dependence without needing dynamic plugin discovery.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `op`.
    pub fn register(&mut self, op: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(op.into(), Arc::new(handler));
    }

    /// Run the handler for `job.op`, converting a missing handler into the
    /// exact message the spec requires (`No handler for op=<op>`).
    pub async fn run(&self, job: &Job) -> Result<Value, HandlerError> {
        let handler = self
            .handlers
            .get(&job.op)
            .ok_or_else(|| HandlerError::Unknown(job.op.clone()))?;
        handler
            .call(job)
            .await
            .map_err(|message| HandlerError::Failed {
                op: job.op.clone(),
                message,
            })
    }

    /// The operation names registered, for the `capabilities` field of a
    /// register request. Order is not significant to the dispatcher but is
    /// made deterministic (sorted) so register requests are reproducible.
    pub fn operations(&self) -> Vec<String> {
        let mut ops: Vec<String> = self.handlers.keys().cloned().collect();
        ops.sort();
        ops
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("ops", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::JobId;
    use serde_json::json;

    fn job(op: &str, payload: Value) -> Job {
        Job {
            id: JobId::new("job_1"),
            op: op.to_string(),
            payload,
            lease_until: None,
        }
    }

    #[tokio::test]
    async fn runs_a_registered_handler() {
        let mut reg = HandlerRegistry::new();
        reg.register("sum", |j: &Job| {
            let a = j.payload["a"].as_i64().unwrap_or(0);
            let b = j.payload["b"].as_i64().unwrap_or(0);
            let result = json!({"result": a + b});
            async move { Ok(result) }
        });
        let out = reg.run(&job("sum", json!({"a": 5, "b": 3}))).await.unwrap();
        assert_eq!(out, json!({"result": 8}));
    }

    #[tokio::test]
    async fn missing_handler_reports_the_spec_message() {
        let reg = HandlerRegistry::new();
        let err = reg.run(&job("unknown", json!({}))).await.unwrap_err();
        match err {
            HandlerError::Unknown(op) => assert_eq!(op, "unknown"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn operations_are_sorted_for_reproducible_register_requests() {
        let mut reg = HandlerRegistry::new();
        reg.register("subtract", |_: &Job| async { Ok(json!({})) });
        reg.register("sum", |_: &Job| async { Ok(json!({})) });
        assert_eq!(reg.operations(), vec!["subtract".to_string(), "sum".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_registration_replaces_prior_entry() {
        let mut reg = HandlerRegistry::new();
        reg.register("op", |_: &Job| async { Ok(json!({"v": 1})) });
        reg.register("op", |_: &Job| async { Ok(json!({"v": 2})) });
        assert_eq!(reg.len(), 1);
        let out = reg.run(&job("op", json!({}))).await.unwrap();
        assert_eq!(out, json!({"v": 2}));
    }

    #[tokio::test]
    async fn handler_failure_is_wrapped_with_op_context() {
        let mut reg = HandlerRegistry::new();
        reg.register("sum", |_: &Job| async { Err("Job failed".to_string()) });
        let err = reg.run(&job("sum", json!({}))).await.unwrap_err();
        match err {
            HandlerError::Failed { op, message } => {
                assert_eq!(op, "sum");
                assert_eq!(message, "Job failed");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
