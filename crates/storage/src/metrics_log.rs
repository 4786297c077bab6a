// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sample-level protocol layered on the [`Wal`]: batching plus the
//! checkpoint-marker handshake that lets the daemon hand off a batch for
//! delivery without losing or double-sending samples across a crash.

use std::path::Path;
use std::sync::Arc;

use hm_core::{Clock, Sample, SystemClock};
use parking_lot::Mutex;
use prost::Message;

use crate::wal::{Wal, WalError};
use crate::wire::SampleProto;

#[derive(Debug, thiserror::Error)]
pub enum MetricsLogError {
    #[error("metrics log path must not be empty")]
    PathEmpty,
    #[error("metrics log is corrupt: {0}")]
    Corrupt(String),
    #[error("metrics log is closed")]
    Closed,
    #[error("index {index} out of range [{first}, {last}]")]
    OutOfRange { index: u64, first: u64, last: u64 },
}

impl From<WalError> for MetricsLogError {
    fn from(err: WalError) -> Self {
        match err {
            WalError::Corrupt(reason) => Self::Corrupt(reason),
            WalError::Closed => Self::Closed,
            WalError::OutOfRange { index, first, last } => {
                Self::OutOfRange { index, first, last }
            }
            WalError::Io(e) => Self::Corrupt(e.to_string()),
        }
    }
}

struct Inner {
    wal: Wal,
    clock: Arc<dyn Clock>,
}

pub struct MetricsLog(Mutex<Inner>);

impl MetricsLog {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MetricsLogError> {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(
        path: impl AsRef<Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MetricsLogError> {
        if path.as_ref().as_os_str().is_empty() {
            return Err(MetricsLogError::PathEmpty);
        }
        let wal = Wal::open(path)?;
        Ok(Self(Mutex::new(Inner { wal, clock })))
    }

    pub fn write_sample(&self, value: f64, timestamp_ms: i64) -> Result<(), MetricsLogError> {
        let mut inner = self.0.lock();
        let payload = SampleProto {
            value,
            timestamp: timestamp_ms,
        }
        .encode_to_vec();
        let index = inner.wal.last_index() + 1;
        inner.wal.write(index, &payload)?;
        Ok(())
    }

    pub fn write_sample_now(&self, value: f64) -> Result<(), MetricsLogError> {
        let now_ms = self.0.lock().clock.now_ms();
        self.write_sample(value, now_ms)
    }

    /// Returns every sample not yet offered for delivery, plus the index
    /// that [`Self::remove_samples`] should be called with once that batch
    /// has been handled. Calling this twice with no intervening writes
    /// returns the same pair both times.
    pub fn get_samples(&self) -> Result<(Vec<Sample>, u64), MetricsLogError> {
        let mut inner = self.0.lock();
        let last = inner.wal.last_index();
        let checkpoint = if last > 0 && inner.wal.read(last)?.is_empty() {
            last
        } else {
            let next = last + 1;
            inner.wal.write(next, &[])?;
            next
        };

        let first = inner.wal.first_index();
        let mut samples = Vec::new();
        for index in first..checkpoint {
            let payload = inner.wal.read(index)?;
            if payload.is_empty() {
                continue;
            }
            let proto = SampleProto::decode(payload.as_slice())
                .map_err(|e| MetricsLogError::Corrupt(e.to_string()))?;
            samples.push(Sample::from(proto));
        }
        Ok((samples, checkpoint))
    }

    /// Drops every entry before `checkpoint`; the checkpoint marker itself
    /// remains as the log's new lower bound.
    pub fn remove_samples(&self, checkpoint: u64) -> Result<(), MetricsLogError> {
        let mut inner = self.0.lock();
        inner.wal.truncate_front(checkpoint)?;
        Ok(())
    }

    /// Drops the oldest `n` data entries (checkpoint markers don't count),
    /// without disturbing anything after them.
    pub fn remove_oldest_samples(&self, n: usize) -> Result<(), MetricsLogError> {
        if n == 0 {
            return Ok(());
        }
        let mut inner = self.0.lock();
        let first = inner.wal.first_index();
        let last = inner.wal.last_index();
        if first == 0 {
            return Ok(());
        }

        let mut removed = 0usize;
        let mut cut = first;
        for index in first..=last {
            if removed == n {
                cut = index;
                break;
            }
            let payload = inner.wal.read(index)?;
            if !payload.is_empty() {
                removed += 1;
            }
            cut = index + 1;
        }
        inner.wal.truncate_front(cut)?;
        Ok(())
    }

    pub fn close(&self) {
        self.0.lock().wal.close();
    }
}
