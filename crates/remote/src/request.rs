// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the Snappy-compressed protobuf body of a Remote Write request
//! from a sample batch and a host's identity/billing labels.

use hm_core::HostInfo;
use prost::Message;

use crate::wire::{Label, Sample, TimeSeries, WriteRequest};

const METRIC_NAME: &str = "system_cpu_logical_count";

/// Builds the labels for a time series, sorted lexicographically by name
/// with empty-valued labels dropped, per the Remote Write label ordering
/// contract.
pub fn build_labels(host: &HostInfo) -> Vec<Label> {
    let candidates = [
        ("__name__", METRIC_NAME.to_string()),
        ("_id", host.host_id.clone()),
        ("billing_marketplace", host.billing.marketplace.clone()),
        (
            "billing_marketplace_account",
            host.billing.marketplace_account.clone(),
        ),
        (
            "billing_marketplace_instance_id",
            host.billing.marketplace_instance_id.clone(),
        ),
        ("billing_model", host.billing.model.clone()),
        ("conversions_success", host.conversions_success.clone()),
        ("external_organization", host.external_org.clone()),
        ("product", host.product_ids.clone()),
        ("socket_count", host.socket_count.clone()),
        ("support", host.support.clone()),
        ("usage", host.usage.clone()),
    ];

    let mut labels: Vec<Label> = candidates
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(name, value)| Label {
            name: name.to_string(),
            value,
        })
        .collect();
    labels.sort_by(|a, b| a.name.cmp(&b.name));
    labels
}

/// Builds the Snappy-compressed protobuf body for a single `WriteRequest`
/// carrying one time series. `samples` must already be in timestamp order.
pub fn build_body(
    host: &HostInfo,
    samples: &[hm_core::Sample],
) -> Result<Vec<u8>, std::io::Error> {
    let labels = build_labels(host);
    let proto_samples = samples
        .iter()
        .map(|s| Sample {
            value: s.value,
            timestamp: s.timestamp_ms,
        })
        .collect();

    let request = WriteRequest {
        timeseries: vec![TimeSeries {
            labels,
            samples: proto_samples,
        }],
    };
    let encoded = request.encode_to_vec();

    let mut encoder = snap::raw::Encoder::new();
    encoder
        .compress_vec(&encoded)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hm_core::Billing;

    fn host() -> HostInfo {
        HostInfo {
            host_id: "host-1".to_string(),
            external_org: "org-1".to_string(),
            socket_count: "2".to_string(),
            product_ids: "69".to_string(),
            support: "".to_string(),
            usage: "Production".to_string(),
            conversions_success: "".to_string(),
            billing: Billing {
                model: "marketplace".to_string(),
                marketplace: "aws".to_string(),
                marketplace_account: "acct-1".to_string(),
                marketplace_instance_id: "".to_string(),
            },
            cpu_count: 4,
        }
    }

    #[test]
    fn labels_are_sorted_non_empty_and_include_name() {
        let labels = build_labels(&host());
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"__name__"));
        assert!(labels.iter().all(|l| !l.value.is_empty()));
    }

    #[test]
    fn empty_value_labels_are_dropped() {
        let labels = build_labels(&host());
        assert!(!labels.iter().any(|l| l.name == "support"));
        assert!(!labels.iter().any(|l| l.name == "conversions_success"));
        assert!(!labels.iter().any(|l| l.name == "billing_marketplace_instance_id"));
    }

    #[test]
    fn names_are_unique() {
        let labels = build_labels(&host());
        let mut names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn body_round_trips_through_decompression() {
        let samples = vec![hm_core::Sample::new(4.0, 1_000)];
        let body = build_body(&host(), &samples).expect("build body");
        let mut decoder = snap::raw::Decoder::new();
        let decompressed = decoder.decompress_vec(&body).expect("decompress");
        let decoded = WriteRequest::decode(decompressed.as_slice()).expect("decode");
        assert_eq!(decoded.timeseries.len(), 1);
        assert_eq!(decoded.timeseries[0].samples.len(), 1);
    }
}
