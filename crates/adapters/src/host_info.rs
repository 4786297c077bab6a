// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete [`HostInfoProvider`] implementations. The core's HostInfo data
//! model (spec'd in `hm-core`) is populated here from the host's consumer
//! certificate and `/proc/cpuinfo`; this sits outside the core's tested
//! contract, which only depends on the trait.

use std::path::PathBuf;

use async_trait::async_trait;
use hm_core::HostInfo;

#[derive(Debug, thiserror::Error)]
pub enum HostInfoError {
    #[error("failed to read consumer certificate {path}: {source}")]
    ReadCert {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse consumer certificate: {0}")]
    ParseCert(String),
    #[error("consumer certificate has no CommonName")]
    MissingCommonName,
}

/// Supplies host identity and refreshes the measured CPU count. Out of the
/// daemon's tested core; the daemon only depends on this trait.
#[async_trait]
pub trait HostInfoProvider: Send + Sync {
    async fn load(&self) -> Result<HostInfo, HostInfoError>;
    async fn refresh_cpu_count(&self, host_info: &mut HostInfo) -> Result<(), HostInfoError>;
}

/// Reads host identity from the consumer certificate's CommonName and logical
/// CPU count from `/proc/cpuinfo` via `num_cpus`.
pub struct SystemHostInfoProvider {
    cert_path: PathBuf,
}

impl SystemHostInfoProvider {
    pub fn new(cert_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
        }
    }

    fn host_id_from_cert(&self) -> Result<String, HostInfoError> {
        let pem = std::fs::read(&self.cert_path).map_err(|source| HostInfoError::ReadCert {
            path: self.cert_path.display().to_string(),
            source,
        })?;
        let (_, pem) = x509_parser::pem::parse_x509_pem(&pem)
            .map_err(|e| HostInfoError::ParseCert(e.to_string()))?;
        let cert = pem
            .parse_x509()
            .map_err(|e| HostInfoError::ParseCert(e.to_string()))?;
        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string)
            .ok_or(HostInfoError::MissingCommonName);
        common_name
    }
}

#[async_trait]
impl HostInfoProvider for SystemHostInfoProvider {
    async fn load(&self) -> Result<HostInfo, HostInfoError> {
        let host_id = self.host_id_from_cert().inspect_err(|e| {
            tracing::warn!(path = %self.cert_path.display(), error = %e, "failed to load host identity from certificate");
        })?;
        tracing::debug!(host_id, "loaded host identity");
        Ok(HostInfo {
            host_id,
            cpu_count: num_cpus::get() as u64,
            ..HostInfo::default()
        })
    }

    async fn refresh_cpu_count(&self, host_info: &mut HostInfo) -> Result<(), HostInfoError> {
        host_info.cpu_count = num_cpus::get() as u64;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use parking_lot::Mutex;

    /// Hands back a fixed `HostInfo`, counting `load()` calls so tests can
    /// assert a cert/reload event triggered exactly one reload.
    pub struct FakeHostInfoProvider {
        host_info: Mutex<HostInfo>,
        load_calls: AtomicU64,
    }

    impl FakeHostInfoProvider {
        pub fn new(host_info: HostInfo) -> Self {
            Self {
                host_info: Mutex::new(host_info),
                load_calls: AtomicU64::new(0),
            }
        }

        pub fn load_call_count(&self) -> u64 {
            self.load_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HostInfoProvider for FakeHostInfoProvider {
        async fn load(&self) -> Result<HostInfo, HostInfoError> {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.host_info.lock().clone())
        }

        async fn refresh_cpu_count(&self, host_info: &mut HostInfo) -> Result<(), HostInfoError> {
            host_info.cpu_count = self.host_info.lock().cpu_count;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeHostInfoProvider;
    use super::*;

    #[tokio::test]
    async fn fake_provider_counts_loads() {
        let provider = FakeHostInfoProvider::new(HostInfo {
            host_id: "host-1".to_string(),
            ..Default::default()
        });
        assert_eq!(provider.load_call_count(), 0);
        let loaded = provider.load().await.expect("load");
        assert_eq!(loaded.host_id, "host-1");
        assert_eq!(provider.load_call_count(), 1);
    }
}
