// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! `host-metering`: collects logical CPU count and forwards it via
//! Prometheus Remote Write.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hm_adapters::{CertWatcher, HostInfoProvider, SystemHostInfoProvider};
use hm_daemon::{Config, Daemon};
use hm_remote::{Notifier, NotifierConfig, RetrySchedule};
use hm_storage::MetricsLog;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "host-metering",
    about = "Collects logical CPU count and forwards it via Prometheus Remote Write"
)]
struct Cli {
    /// Path to the INI configuration file.
    #[arg(long, default_value = "/etc/host-metering.conf")]
    config: PathBuf,
    #[arg(long)]
    write_url: Option<String>,
    /// Overrides the collect interval, in seconds.
    #[arg(long)]
    tick: Option<u64>,
    #[arg(long)]
    cert: Option<PathBuf>,
    #[arg(long)]
    key: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the collection and remote-write scheduler until a stop signal.
    Daemon,
    /// Run exactly one collect-and-notify cycle, then exit.
    Once,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    apply_overrides(&mut config, &cli);

    let _log_guard = setup_logging(&config);

    let metrics_log = match MetricsLog::new(&config.metrics_wal_path) {
        Ok(log) => log,
        Err(e) => {
            tracing::error!(error = %e, path = %config.metrics_wal_path, "failed to open metrics log");
            std::process::exit(1);
        }
    };

    let notifier: Arc<Notifier> = Arc::new(Notifier::new(NotifierConfig {
        write_url: config.write_url.clone(),
        host_cert_path: PathBuf::from(&config.host_cert_path),
        host_cert_key_path: PathBuf::from(&config.host_cert_key_path),
        write_timeout: Duration::from_secs(config.write_timeout_sec),
        retry_schedule: RetrySchedule {
            attempts: config.write_retry_attempts,
            min_interval: Duration::from_secs(config.write_retry_min_interval_sec),
            max_interval: Duration::from_secs(config.write_retry_max_interval_sec),
        },
        user_agent: format!("host-metering/{}", env!("CARGO_PKG_VERSION")),
    }));

    let host_info_provider: Arc<dyn HostInfoProvider> =
        Arc::new(SystemHostInfoProvider::new(config.host_cert_path.clone()));

    let daemon = Arc::new(Daemon::new(
        config.clone(),
        metrics_log,
        notifier,
        host_info_provider,
    ));

    match cli.command {
        Command::Once => {
            daemon.run_once().await;
        }
        Command::Daemon => {
            let cert_watcher = match CertWatcher::new(&config.host_cert_path) {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "cert watcher failed to start, disabling cert-driven reload");
                    None
                }
            };

            let stop_daemon = daemon.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop_daemon.stop().await;
                }
            });
            daemon.run(cert_watcher).await?;
        }
    }

    Ok(())
}

/// Applies the flag overrides on top of the loaded file/env configuration;
/// flags always win.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(write_url) = &cli.write_url {
        config.write_url = write_url.clone();
    }
    if let Some(tick) = cli.tick {
        config.collect_interval_sec = tick;
    }
    if let Some(cert) = &cli.cert {
        config.host_cert_path = cert.display().to_string();
    }
    if let Some(key) = &cli.key {
        config.host_cert_key_path = key.display().to_string();
    }
}

fn setup_logging(config: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));

    if config.log_path.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
        None
    } else {
        let log_path = PathBuf::from(&config.log_path);
        let dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = log_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "host-metering.log".to_string());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
        Some(guard)
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
