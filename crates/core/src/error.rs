// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the agent's components.
//!
//! Transport errors (the dispatcher HTTP client's own failure modes) live in
//! `agent-adapters`, which is the only crate that depends on an HTTP client;
//! this crate stays free of network dependencies.

use thiserror::Error;

/// Settings failed to resolve from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    MissingVar(&'static str),
    #[error("invalid value for `{name}`: {value}")]
    InvalidVar { name: &'static str, value: String },
}

/// An operation handler is missing, or the handler itself failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("no handler registered for operation `{0}`")]
    Unknown(String),
    #[error("handler for `{op}` failed: {message}")]
    Failed { op: String, message: String },
}

/// Identity could not be established or persisted.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read identity file at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write identity file at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("identity file at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not determine system hostname: {0}")]
    Hostname(String),
}

/// Outbox append or drain failed.
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("failed to open outbox at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to append to outbox at {path}: {source}")]
    Append {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to rotate corrupt outbox at {path}: {source}")]
    Rotate {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("outbox at {path} contains a malformed entry: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A call to the dispatcher failed. Shared by every [`crate::wire::DispatcherClient`]
/// method; callers decide per-call whether this is loop-local (swallow, backoff,
/// retry) or startup-fatal (register).
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// The request never got a response: DNS, connect, TLS, timeout, or a
    /// response body that did not decode as JSON.
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: &'static str, message: String },
    /// The server answered with a non-2xx status. The body is surfaced
    /// verbatim so the operator can see exactly what the dispatcher said.
    #[error("dispatcher rejected {endpoint} with status {status}: {body}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
}
