// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration resolved once from the environment and frozen for
//! the lifetime of the process.

use crate::error::ConfigError;

/// Frozen process configuration. Built once in `main` before any network or
/// disk I/O; an invalid value fails startup rather than silently defaulting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_base: String,
    pub heartbeat_interval_sec: u64,
    pub bot_lease_ttl_sec: u64,
    pub job_lease_ttl_sec: u64,
    pub claim_batch_size: u32,
    pub max_concurrency: u32,
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub bot_version: String,
}

impl Settings {
    /// Resolve from the process environment, falling back to the documented
    /// defaults for anything unset.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env(|name| std::env::var(name).ok())
    }

    /// Testable entry point: takes a lookup function instead of reading the
    /// real environment directly.
    pub fn from_env(get: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_version = get("BOT_VERSION").unwrap_or_else(|| "1.0.0".to_string());
        if !is_semver_shaped(&bot_version) {
            return Err(ConfigError::InvalidVar {
                name: "BOT_VERSION",
                value: bot_version,
            });
        }

        Ok(Settings {
            server_base: get("SERVER_BASE").unwrap_or_else(|| "http://localhost:8000/v1".to_string()),
            heartbeat_interval_sec: parse_positive(&get, "HEARTBEAT_INTERVAL_SEC", 30)?,
            bot_lease_ttl_sec: parse_positive(&get, "BOT_LEASE_TTL_SEC", 120)?,
            job_lease_ttl_sec: parse_positive(&get, "JOB_LEASE_TTL_SEC", 180)?,
            claim_batch_size: parse_positive(&get, "CLAIM_BATCH_SIZE", 5)?,
            max_concurrency: parse_positive(&get, "MAX_CONCURRENCY", 2)?,
            min_backoff_ms: parse_positive(&get, "MIN_BACKOFF_MS", 500)?,
            max_backoff_ms: parse_positive(&get, "MAX_BACKOFF_MS", 60_000)?,
            bot_version,
        })
    }
}

/// Parse an environment variable as a positive integer, or fall back to
/// `default` when unset. Zero and unparsable values are configuration
/// errors — every setting this is used for is a count or a duration that
/// would otherwise silently disable a required loop.
fn parse_positive<T>(
    get: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default + Copy,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => {
            let value: T = raw.parse().map_err(|_| ConfigError::InvalidVar {
                name,
                value: raw.clone(),
            })?;
            if value <= T::default() {
                return Err(ConfigError::InvalidVar { name, value: raw });
            }
            Ok(value)
        }
    }
}

/// Check the `\d+\.\d+\.\d+` shape the spec requires for `BOT_VERSION`,
/// without pulling in a regex dependency for one three-group pattern.
fn is_semver_shaped(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}
