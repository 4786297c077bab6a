// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level error type. Most of these are logged and swallowed at the
//! call site per the propagation rules — the type exists so call sites can
//! `match`/`log` uniformly rather than because callers usually propagate it
//! further.

use hm_adapters::{CertWatcherError, HostInfoError};
use hm_remote::NotifyError;
use hm_storage::MetricsLogError;

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("metrics log error: {0}")]
    MetricsLog(#[from] MetricsLogError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("host info load failed: {0}")]
    HostInfoLoadFailed(#[from] HostInfoError),
    #[error("certificate watcher failed to start: {0}")]
    CertWatcher(#[from] CertWatcherError),
}
