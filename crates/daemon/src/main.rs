// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `agentd`: the worker-agent process. Registers with the dispatcher, then
//! runs the claim/process/report loop and a heartbeat loop side by side
//! until SIGTERM/SIGINT asks it to drain.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use agent_adapters::{SubtractHandler, SumHandler};
use agent_core::{HandlerRegistry, Settings};
use agent_daemon::{Agent, Config, LifecycleError, ShutdownSignal};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("agentd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: agentd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    rotate_log_if_needed(&config.log_path);
    write_startup_marker(&config)?;
    let _log_guard = setup_logging(&config)?;

    info!("starting agentd");

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(err) => {
            write_startup_error(&config, &LifecycleError::Config(err));
            error!("invalid configuration, exiting");
            std::process::exit(1);
        }
    };

    let mut handlers = HandlerRegistry::new();
    handlers.register("sum", SumHandler);
    handlers.register("subtract", SubtractHandler);

    let agent = match Agent::start(settings, &config.state_dir, handlers).await {
        Ok(agent) => agent,
        Err(err) => {
            write_startup_error(&config, &err);
            error!(error = %err, "failed to start agent");
            std::process::exit(1);
        }
    };

    let shutdown = ShutdownSignal::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let run_shutdown = shutdown.clone();
    let run_handle = tokio::spawn(async move {
        agent.run(run_shutdown).await;
    });

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, draining"),
        _ = sigint.recv() => info!("received SIGINT, draining"),
    }
    shutdown.trigger();

    if let Err(err) = run_handle.await {
        error!(error = %err, "agent run task did not shut down cleanly");
    }
    info!("agentd stopped");
    Ok(())
}

fn print_help() {
    println!("agentd {}", env!("CARGO_PKG_VERSION"));
    println!("Worker agent that claims and executes jobs from a dispatcher service.");
    println!();
    println!("USAGE:");
    println!("    agentd");
    println!();
    println!("Configuration is read entirely from the environment (SERVER_BASE,");
    println!("HEARTBEAT_INTERVAL_SEC, CLAIM_BATCH_SIZE, MAX_CONCURRENCY, ...).");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (agentd.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`]. Best-effort:
/// rotation failures are silently ignored so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

const STARTUP_MARKER_PREFIX: &str = "--- agentd: starting (pid: ";

fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;
    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write a startup failure synchronously, since tracing's non-blocking
/// writer may not flush before the process exits.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;
    let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&config.log_path) else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start agentd: {error}");
}

fn setup_logging(config: &Config) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
