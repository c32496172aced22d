// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The concrete HTTP transport for [`agent_core::DispatcherClient`].

use std::time::Duration;

use agent_core::error::DispatcherError;
use agent_core::id::{BotId, JobId};
use agent_core::report::Action;
use agent_core::wire::{
    ClaimResponse, DispatcherClient, HeartbeatResponse, Metrics, RegisterResponse, Resources,
    RunningJob,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde_json::Value;

/// Total per-request timeout, per the spec's dispatcher client contract.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reqwest-backed [`DispatcherClient`]. `reqwest::Client` is `Clone` and
/// internally pooled/synchronized, so this type is safe to share across the
/// run loop and the heartbeat loop without any locking of its own beyond
/// the bearer token, which both loops may read but only `register` writes.
pub struct HttpDispatcherClient {
    base_url: String,
    client: Client,
    access_token: RwLock<Option<String>>,
}

impl HttpDispatcherClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.into(),
            client,
            access_token: RwLock::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("Content-Type", "application/json");
        match self.access_token.read().as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, DispatcherError> {
        self.send_json_with(endpoint, builder, StatusCode::is_success).await
    }

    /// Like [`Self::send_json`] but with a caller-supplied success
    /// predicate, for the one call (`register`) whose success contract is
    /// narrower than "any 2xx".
    async fn send_json_with<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        builder: reqwest::RequestBuilder,
        is_success: impl Fn(StatusCode) -> bool,
    ) -> Result<T, DispatcherError> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(|e| DispatcherError::Transport {
                endpoint,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DispatcherError::Transport {
                endpoint,
                message: e.to_string(),
            })?;

        if !is_success(status) {
            return Err(DispatcherError::Rejected {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| DispatcherError::Transport {
            endpoint,
            message: format!("invalid JSON response: {e}"),
        })
    }
}

#[async_trait]
impl DispatcherClient for HttpDispatcherClient {
    async fn register(
        &self,
        bot_key: &str,
        instance_id: &str,
        version: &str,
        capabilities: Vec<String>,
        resources: Resources,
        constraints: Value,
        meta: Value,
    ) -> Result<RegisterResponse, DispatcherError> {
        const ENDPOINT: &str = "POST /bots/register";
        let body = serde_json::json!({
            "bot_key": bot_key,
            "instance_id": instance_id,
            "version": version,
            "capabilities": capabilities,
            "resources": resources,
            "constraints": constraints,
            "meta": meta,
        });
        let builder = self.client.post(self.url("/bots/register")).json(&body);
        let resp: RegisterResponse = self
            .send_json_with(ENDPOINT, builder, is_register_success)
            .await?;
        *self.access_token.write() = Some(resp.auth.access_token.clone());
        Ok(resp)
    }

    async fn heartbeat(
        &self,
        bot_id: &BotId,
        instance_id: &str,
        running: Vec<RunningJob>,
        metrics: Metrics,
    ) -> Result<HeartbeatResponse, DispatcherError> {
        const ENDPOINT: &str = "PUT /bots/{bot_id}/heartbeat";
        let body = serde_json::json!({
            "instance_id": instance_id,
            "running": running,
            "metrics": metrics,
        });
        let builder = self
            .client
            .put(self.url(&format!("/bots/{bot_id}/heartbeat")))
            .json(&body);
        self.send_json(ENDPOINT, builder).await
    }

    async fn claim(
        &self,
        bot_id: &BotId,
        operations: &[String],
        limit: u32,
    ) -> Result<Vec<agent_core::RawJob>, DispatcherError> {
        const ENDPOINT: &str = "POST /jobs/claim";
        let body = serde_json::json!({
            "bot_id": bot_id,
            "operations": operations,
            "limit": limit,
        });
        let builder = self.client.post(self.url("/jobs/claim")).json(&body);
        let resp: ClaimResponse = self.send_json(ENDPOINT, builder).await?;
        Ok(resp.jobs)
    }

    async fn report(
        &self,
        job_id: &JobId,
        action: Action,
        payload: Value,
    ) -> Result<Value, DispatcherError> {
        const ENDPOINT: &str = "POST /jobs/{job_id}/{action}";
        let builder = self
            .client
            .post(self.url(&format!("/jobs/{job_id}/{}", action.as_path_segment())))
            .json(&payload);
        self.send_json(ENDPOINT, builder).await
    }
}

/// A status code in `1xx`/`3xx`/`4xx`/`5xx` outside `200`/`201` is a hard
/// failure at register; kept as a standalone helper so the decision is
/// testable without a live server.
pub fn is_register_success(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}
