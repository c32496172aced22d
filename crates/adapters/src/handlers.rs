// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `sum`/`subtract` reference handlers, wired explicitly at startup
//! (never discovered dynamically — see SPEC_FULL.md §9).

use agent_core::job::Job;
use agent_core::Handler;
use async_trait::async_trait;
use serde_json::Value;

/// Pull `a` and `b` out of a job payload as numbers, failing with a handler
/// error (never a panic) if either is missing or not numeric.
fn operands(payload: &Value) -> Result<(f64, f64), String> {
    let a = payload
        .get("a")
        .and_then(Value::as_f64)
        .ok_or_else(|| "payload.a must be a number".to_string())?;
    let b = payload
        .get("b")
        .and_then(Value::as_f64)
        .ok_or_else(|| "payload.b must be a number".to_string())?;
    Ok((a, b))
}

/// `{a, b}` -> `{result: a + b}`.
pub struct SumHandler;

#[async_trait]
impl Handler for SumHandler {
    async fn call(&self, job: &Job) -> Result<Value, String> {
        let (a, b) = operands(&job.payload)?;
        Ok(serde_json::json!({ "result": a + b }))
    }
}

/// `{a, b}` -> `{result: a - b}`.
pub struct SubtractHandler;

#[async_trait]
impl Handler for SubtractHandler {
    async fn call(&self, job: &Job) -> Result<Value, String> {
        let (a, b) = operands(&job.payload)?;
        Ok(serde_json::json!({ "result": a - b }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::JobId;
    use serde_json::json;

    fn job(payload: Value) -> Job {
        Job {
            id: JobId::new("job_1"),
            op: "sum".to_string(),
            payload,
            lease_until: None,
        }
    }

    #[tokio::test]
    async fn sum_adds_operands() {
        let out = SumHandler.call(&job(json!({"a": 5, "b": 3}))).await.unwrap();
        assert_eq!(out, json!({"result": 8.0}));
    }

    #[tokio::test]
    async fn subtract_subtracts_operands() {
        let out = SubtractHandler.call(&job(json!({"a": 10, "b": 4}))).await.unwrap();
        assert_eq!(out, json!({"result": 6.0}));
    }

    #[tokio::test]
    async fn sum_rejects_missing_operand() {
        let err = SumHandler.call(&job(json!({"a": 5}))).await.unwrap_err();
        assert!(err.contains("payload.b"));
    }

    #[tokio::test]
    async fn sum_rejects_non_numeric_operand() {
        let err = SumHandler
            .call(&job(json!({"a": "five", "b": 1})))
            .await
            .unwrap_err();
        assert!(err.contains("payload.a"));
    }
}
