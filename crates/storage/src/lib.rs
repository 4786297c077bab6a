// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable storage for collected samples: a segment-file write-ahead log
//! and the checkpoint-marker protocol layered on top of it.

mod metrics_log;
mod wal;
mod wire;

pub use metrics_log::{MetricsLog, MetricsLogError};
pub use wal::{Wal, WalError};
