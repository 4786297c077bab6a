// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Concrete implementations of the daemon's external collaborators: the
//! host certificate watcher and the host-info provider.

mod cert_watcher;
mod host_info;

pub use cert_watcher::{CertEvent, CertWatcher, CertWatcherError};
pub use host_info::{HostInfoError, HostInfoProvider, SystemHostInfoProvider};

#[cfg(any(test, feature = "test-support"))]
pub use host_info::fake::FakeHostInfoProvider;
