// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler: a single-threaded cooperative dispatcher multiplexing
//! timers, signals, and cert-watch events onto the collect/notify handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hm_adapters::{CertEvent, CertWatcher, HostInfoProvider};
use hm_core::{filter_by_age, Clock, HostInfo, Sample, SystemClock};
use hm_remote::{should_notify, NotifyError, Notifier};
use hm_storage::MetricsLog;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};

use crate::config::Config;
use crate::error::DaemonError;

/// Seam between the daemon and the remote-write notifier, so the daemon's
/// partial-failure truncation policy can be tested without a real mTLS
/// client and HTTP server.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn notify(&self, samples: &[Sample], host_info: &HostInfo) -> Result<(), NotifyError>;
    fn host_changed(&self);
}

#[async_trait]
impl NotifySink for Notifier {
    async fn notify(&self, samples: &[Sample], host_info: &HostInfo) -> Result<(), NotifyError> {
        Notifier::notify(self, samples, host_info).await
    }

    fn host_changed(&self) {
        Notifier::host_changed(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

pub struct Daemon {
    config: Config,
    metrics_log: MetricsLog,
    notifier: Arc<dyn NotifySink>,
    host_info_provider: Arc<dyn HostInfoProvider>,
    clock: Arc<dyn Clock>,
    host_info: Mutex<HostInfo>,
    state: Mutex<DaemonState>,
    stopping: AtomicBool,
    stop_notify: Notify,
    stopped_tx: watch::Sender<bool>,
}

impl Daemon {
    pub fn new(
        config: Config,
        metrics_log: MetricsLog,
        notifier: Arc<dyn NotifySink>,
        host_info_provider: Arc<dyn HostInfoProvider>,
    ) -> Self {
        Self::with_clock(
            config,
            metrics_log,
            notifier,
            host_info_provider,
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(
        config: Config,
        metrics_log: MetricsLog,
        notifier: Arc<dyn NotifySink>,
        host_info_provider: Arc<dyn HostInfoProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            metrics_log,
            notifier,
            host_info_provider,
            clock,
            host_info: Mutex::new(HostInfo::default()),
            state: Mutex::new(DaemonState::Stopped),
            stopping: AtomicBool::new(false),
            stop_notify: Notify::new(),
            stopped_tx: watch::Sender::new(true),
        }
    }

    pub fn is_started(&self) -> bool {
        *self.state.lock() == DaemonState::Running
    }

    pub fn state(&self) -> DaemonState {
        *self.state.lock()
    }

    /// Refreshes the measured CPU count and writes a sample. On provider
    /// failure, no sample is written.
    pub async fn collect(&self) -> Result<(), DaemonError> {
        let mut host_info = self.host_info.lock().clone();
        self.host_info_provider
            .refresh_cpu_count(&mut host_info)
            .await?;
        let cpu_count = host_info.cpu_count as f64;
        *self.host_info.lock() = host_info;
        self.metrics_log
            .write_sample_now(cpu_count)
            .map_err(DaemonError::from)
    }

    /// Reloads host identity from the provider and invalidates the
    /// notifier's cached client. On provider failure, the previous host
    /// info is left in place.
    pub async fn load_host_info(&self) -> Result<(), DaemonError> {
        let new_host_info = self.host_info_provider.load().await?;
        *self.host_info.lock() = new_host_info;
        self.notifier.host_changed();
        Ok(())
    }

    /// The partial-failure truncation policy (see the truncation decision
    /// table this mirrors): a successful or fatally-rejected send clears the
    /// whole offered window; a recoverable failure only drops samples that
    /// had already expired out of the batch, keeping the rest for retry.
    pub async fn notify_once(&self) -> Result<(), DaemonError> {
        let (samples, checkpoint) = self.metrics_log.get_samples()?;
        let orig_count = samples.len();
        let filtered = self.filter_expired(&samples);

        let host_info = self.host_info.lock().clone();
        if !should_notify(&filtered, Some(&host_info)) {
            tracing::debug!("notify policy rejected batch, skipping send");
            return Ok(());
        }

        match self.notifier.notify(&filtered, &host_info).await {
            Ok(()) => {
                tracing::info!(samples = filtered.len(), "remote write succeeded");
                self.metrics_log.remove_samples(checkpoint)?;
            }
            Err(NotifyError::Fatal(reason)) => {
                tracing::warn!(reason = %reason, "remote write rejected, dropping batch");
                self.metrics_log.remove_samples(checkpoint)?;
            }
            Err(NotifyError::Recoverable(reason)) => {
                let expired = orig_count - filtered.len();
                if expired > 0 {
                    tracing::warn!(
                        reason = %reason,
                        expired,
                        "remote write failed, pruning expired samples and keeping the rest for retry"
                    );
                    self.metrics_log.remove_oldest_samples(expired)?;
                } else {
                    tracing::warn!(reason = %reason, "remote write failed, keeping window for retry");
                }
            }
        }
        Ok(())
    }

    fn filter_expired(&self, samples: &[Sample]) -> Vec<Sample> {
        if self.config.metrics_max_age_sec == 0 {
            return samples.to_vec();
        }
        let now_ms = self.clock.now_ms();
        let max_age_ms = self.config.metrics_max_age_sec as i64 * 1_000;
        filter_by_age(samples, now_ms, max_age_ms).to_vec()
    }

    async fn initial_notify(&self) {
        if let Err(e) = self.load_host_info().await {
            tracing::warn!(error = %e, "initial host info load failed");
        }
        if let Err(e) = self.collect().await {
            tracing::warn!(error = %e, "initial collect failed");
        }
        if let Err(e) = self.notify_once().await {
            tracing::warn!(error = %e, "initial notify failed");
        }
    }

    /// Performs exactly one `initial_notify` cycle and returns, for manual
    /// one-shot invocations (`host-metering once`).
    pub async fn run_once(&self) {
        self.initial_notify().await;
    }

    /// Runs the event loop until `stop()` is called or a stop signal
    /// arrives. `cert_watcher` is optional: a failed watcher just disables
    /// cert-driven reloads.
    pub async fn run(&self, mut cert_watcher: Option<CertWatcher>) -> Result<(), DaemonError> {
        *self.state.lock() = DaemonState::Starting;
        let _ = self.stopped_tx.send(false);
        self.initial_notify().await;
        *self.state.lock() = DaemonState::Running;

        let collect_enabled = self.config.collect_interval_sec > 0;
        let label_enabled = self.config.label_refresh_interval_sec > 0;
        let mut collect_tick =
            tokio::time::interval(Duration::from_secs(self.config.collect_interval_sec.max(1)));
        let mut write_tick =
            tokio::time::interval(Duration::from_secs(self.config.write_interval_sec.max(1)));
        let mut label_tick = tokio::time::interval(Duration::from_secs(
            self.config.label_refresh_interval_sec.max(1),
        ));
        collect_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        write_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        label_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        #[cfg(unix)]
        let mut sighup = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGHUP handler, reload-on-signal disabled");
                None
            }
        };
        #[cfg(not(unix))]
        let mut sighup: Option<()> = None;

        #[cfg(unix)]
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map(Some)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                None
            });
        #[cfg(not(unix))]
        let mut sigterm: Option<()> = None;

        loop {
            tokio::select! {
                _ = collect_tick.tick(), if collect_enabled => {
                    if let Err(e) = self.collect().await {
                        tracing::warn!(error = %e, "collect failed");
                    }
                }
                _ = write_tick.tick() => {
                    if !collect_enabled {
                        if let Err(e) = self.collect().await {
                            tracing::warn!(error = %e, "collect failed");
                        }
                    }
                    if let Err(e) = self.notify_once().await {
                        tracing::warn!(error = %e, "notify_once failed");
                    }
                }
                _ = label_tick.tick(), if label_enabled => {
                    if let Err(e) = self.load_host_info().await {
                        tracing::warn!(error = %e, "label refresh failed");
                    }
                }
                event = recv_cert_event(&mut cert_watcher) => {
                    if let Some(event) = event {
                        tracing::info!(?event, "cert event, reloading host info");
                        if let Err(e) = self.load_host_info().await {
                            tracing::warn!(error = %e, "cert-triggered host info load failed");
                        }
                    }
                }
                _ = recv_sighup(&mut sighup) => {
                    if let Err(e) = self.load_host_info().await {
                        tracing::warn!(error = %e, "SIGHUP-triggered host info load failed");
                    }
                }
                _ = recv_sighup(&mut sigterm) => {
                    tracing::info!("SIGTERM received, stopping");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupt received, stopping");
                    break;
                }
                _ = self.stop_notify.notified() => {
                    break;
                }
            }
        }

        *self.state.lock() = DaemonState::Stopping;
        self.metrics_log.close();
        *self.state.lock() = DaemonState::Stopped;
        self.stopping.store(false, Ordering::SeqCst);
        let _ = self.stopped_tx.send(true);
        Ok(())
    }

    /// Idempotent with respect to the not-running state. Waits for the
    /// running `run()` loop, if any, to actually exit before returning.
    pub async fn stop(&self) {
        let mut rx = self.stopped_tx.subscribe();
        if *rx.borrow() {
            return;
        }
        if !self.stopping.swap(true, Ordering::SeqCst) {
            self.stop_notify.notify_one();
        }
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

async fn recv_cert_event(watcher: &mut Option<CertWatcher>) -> Option<CertEvent> {
    match watcher {
        Some(w) => w.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(unix)]
async fn recv_sighup(sighup: &mut Option<tokio::signal::unix::Signal>) {
    match sighup {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(not(unix))]
async fn recv_sighup(_sighup: &mut Option<()>) {
    std::future::pending().await
}
