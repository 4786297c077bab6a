// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! POSTs a Remote Write body and implements the retry/backoff contract.

use std::time::Duration;

use reqwest::StatusCode;

pub const CONTENT_ENCODING: &str = "snappy";
pub const CONTENT_TYPE: &str = "application/x-protobuf";
pub const REMOTE_WRITE_VERSION_HEADER: &str = "X-Prometheus-Remote-Write-Version";
pub const REMOTE_WRITE_VERSION: &str = "0.1.0";

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("transport error sending remote-write request: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote-write request rejected with status {status}")]
    Fatal { status: u16 },
    #[error("remote-write retries exhausted, last status {last_status:?}")]
    RetryExhausted { last_status: Option<u16> },
}

pub struct RetrySchedule {
    pub attempts: u32,
    pub min_interval: Duration,
    pub max_interval: Duration,
}

/// Sends `body` to `url`, retrying on `429`/`5xx` per `schedule`: a `2xx`
/// returns immediately, a `4xx` other than `429` is fatal on the first
/// response, and a transport error is propagated without retrying (the
/// caller treats it as recoverable).
pub async fn send(
    client: &reqwest::Client,
    url: &str,
    user_agent: &str,
    body: Vec<u8>,
    schedule: &RetrySchedule,
) -> Result<(), WriteError> {
    let mut wait = schedule.min_interval;
    let mut last_status: Option<u16> = None;

    for attempt in 1..=schedule.attempts.max(1) {
        let response = client
            .post(url)
            .header("Content-Encoding", CONTENT_ENCODING)
            .header("Content-Type", CONTENT_TYPE)
            .header(REMOTE_WRITE_VERSION_HEADER, REMOTE_WRITE_VERSION)
            .header(reqwest::header::USER_AGENT, user_agent)
            .body(body.clone())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            last_status = Some(status.as_u16());
            if attempt == schedule.attempts.max(1) {
                tracing::warn!(status = status.as_u16(), attempt, "remote-write retries exhausted");
                return Err(WriteError::RetryExhausted { last_status });
            }
            tracing::debug!(status = status.as_u16(), attempt, wait_ms = wait.as_millis() as u64, "remote-write retrying");
            tokio::time::sleep(wait).await;
            wait = std::cmp::min(wait * 2, schedule.max_interval);
            continue;
        }
        tracing::warn!(status = status.as_u16(), "remote-write request rejected, not retrying");
        return Err(WriteError::Fatal {
            status: status.as_u16(),
        });
    }

    Err(WriteError::RetryExhausted { last_status })
}
