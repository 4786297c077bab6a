// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk wire shape of a sample record. Mirrors the Prometheus sample
//! fields (`double value`, `int64 timestamp`) so a WAL record is byte-for-byte
//! the same shape whether it's read back by this crate or re-encoded for
//! remote write.

#[derive(Clone, PartialEq, prost::Message)]
pub struct SampleProto {
    #[prost(double, tag = "1")]
    pub value: f64,
    #[prost(int64, tag = "2")]
    pub timestamp: i64,
}

impl From<hm_core::Sample> for SampleProto {
    fn from(s: hm_core::Sample) -> Self {
        Self {
            value: s.value,
            timestamp: s.timestamp_ms,
        }
    }
}

impl From<SampleProto> for hm_core::Sample {
    fn from(p: SampleProto) -> Self {
        hm_core::Sample::new(p.value, p.timestamp)
    }
}
