// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the mutual-TLS HTTP client used for every remote-write request.

use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to read client certificate {path}: {source}")]
    ReadCert {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read client key {path}: {source}")]
    ReadKey {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build mTLS client: {0}")]
    Build(#[source] reqwest::Error),
}

/// Builds an HTTP client presenting `cert_path`/`key_path` as its client
/// certificate. Honors the ambient proxy environment (reqwest's default);
/// no custom root CA is configured, matching the system's trust store.
pub fn build_mtls_client(
    cert_path: &Path,
    key_path: &Path,
    timeout: Duration,
) -> Result<reqwest::Client, ClientError> {
    let cert_pem = std::fs::read(cert_path).map_err(|source| ClientError::ReadCert {
        path: cert_path.display().to_string(),
        source,
    })?;
    let key_pem = std::fs::read(key_path).map_err(|source| ClientError::ReadKey {
        path: key_path.display().to_string(),
        source,
    })?;

    let mut combined = cert_pem;
    combined.extend_from_slice(b"\n");
    combined.extend_from_slice(&key_pem);

    let identity = reqwest::Identity::from_pem(&combined).map_err(ClientError::Build)?;

    reqwest::Client::builder()
        .identity(identity)
        .timeout(timeout)
        .build()
        .map_err(ClientError::Build)
}
