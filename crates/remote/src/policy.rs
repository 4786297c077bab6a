// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gate the daemon runs before handing a batch to the notifier.

use hm_core::{HostInfo, Sample};

/// Rejects a batch the notifier should never see: empty, no host info, or
/// a host info missing the identity fields a time series must carry.
pub fn should_notify(samples: &[Sample], host_info: Option<&HostInfo>) -> bool {
    if samples.is_empty() {
        return false;
    }
    let Some(host_info) = host_info else {
        return false;
    };
    if host_info.host_id.is_empty() || host_info.external_org.is_empty() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use hm_core::Billing;

    fn host() -> HostInfo {
        HostInfo {
            host_id: "host-1".to_string(),
            external_org: "org-1".to_string(),
            billing: Billing::default(),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_empty_batch() {
        assert!(!should_notify(&[], Some(&host())));
    }

    #[test]
    fn rejects_missing_host_info() {
        assert!(!should_notify(&[Sample::new(1.0, 1)], None));
    }

    #[yare::parameterized(
        host_id = { true, false },
        external_org = { false, true },
    )]
    fn rejects_host_info_missing_an_identity_field(clear_host_id: bool, clear_external_org: bool) {
        let mut host = host();
        if clear_host_id {
            host.host_id.clear();
        }
        if clear_external_org {
            host.external_org.clear();
        }
        assert!(!should_notify(&[Sample::new(1.0, 1)], Some(&host)));
    }

    #[test]
    fn accepts_a_well_formed_batch() {
        assert!(should_notify(&[Sample::new(1.0, 1)], Some(&host())));
    }
}
