// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stateful wrapper around [`crate::writer`]: caches the mTLS client across
//! sends and classifies every failure as recoverable or fatal for the
//! daemon's truncation policy.

use std::path::PathBuf;
use std::time::Duration;

use hm_core::{HostInfo, Sample};
use parking_lot::Mutex;

use crate::client::{self, ClientError};
use crate::request;
use crate::writer::{self, RetrySchedule, WriteError};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("recoverable: {0}")]
    Recoverable(String),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<ClientError> for NotifyError {
    fn from(err: ClientError) -> Self {
        // Cert load failures are treated as transient: the cert may be
        // mid-rotation and the next notify cycle will pick up the new pair.
        NotifyError::Recoverable(err.to_string())
    }
}

impl From<WriteError> for NotifyError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Transport(e) => NotifyError::Recoverable(e.to_string()),
            WriteError::RetryExhausted { .. } => NotifyError::Recoverable(err.to_string()),
            WriteError::Fatal { .. } => NotifyError::Fatal(err.to_string()),
        }
    }
}

pub struct NotifierConfig {
    pub write_url: String,
    pub host_cert_path: PathBuf,
    pub host_cert_key_path: PathBuf,
    pub write_timeout: Duration,
    pub retry_schedule: RetrySchedule,
    pub user_agent: String,
}

struct State {
    client: Option<reqwest::Client>,
    client_valid: bool,
}

/// Sends sample batches over Remote Write, rebuilding its cached mTLS
/// client whenever the host certificate has changed since the last send.
pub struct Notifier {
    config: NotifierConfig,
    state: Mutex<State>,
}

impl Notifier {
    pub fn new(config: NotifierConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State {
                client: None,
                client_valid: false,
            }),
        }
    }

    /// Invalidates the cached client so the next [`Self::notify`] rebuilds
    /// it from the current cert files. Called after the host cert changes
    /// or host info is reloaded.
    pub fn host_changed(&self) {
        self.state.lock().client_valid = false;
    }

    pub async fn notify(
        &self,
        samples: &[Sample],
        host_info: &HostInfo,
    ) -> Result<(), NotifyError> {
        let client = self.client_for_send()?;
        let body = request::build_body(host_info, samples)
            .map_err(|e| NotifyError::Fatal(e.to_string()))?;
        writer::send(
            &client,
            &self.config.write_url,
            &self.config.user_agent,
            body,
            &self.config.retry_schedule,
        )
        .await?;
        Ok(())
    }

    fn client_for_send(&self) -> Result<reqwest::Client, ClientError> {
        let mut state = self.state.lock();
        if state.client_valid {
            if let Some(client) = &state.client {
                return Ok(client.clone());
            }
        }
        let client = client::build_mtls_client(
            &self.config.host_cert_path,
            &self.config.host_cert_key_path,
            self.config.write_timeout,
        )?;
        state.client = Some(client.clone());
        state.client_valid = true;
        Ok(client)
    }
}
