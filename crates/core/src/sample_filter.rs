// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::Sample;

/// Return the suffix of `samples` whose timestamp is within `max_age_ms` of
/// `now_ms`. `samples` is assumed sorted by timestamp; the returned slice
/// preserves order. `max_age_ms == 0` always returns an empty slice.
pub fn filter_by_age(samples: &[Sample], now_ms: i64, max_age_ms: i64) -> &[Sample] {
    if max_age_ms == 0 {
        return &[];
    }
    let threshold = now_ms - max_age_ms;
    let cut = samples
        .iter()
        .position(|s| s.timestamp_ms >= threshold)
        .unwrap_or(samples.len());
    &samples[cut..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(now: i64, ages_ms: &[i64]) -> Vec<Sample> {
        ages_ms
            .iter()
            .enumerate()
            .map(|(i, age)| Sample::new((i + 1) as f64, now - age))
            .collect()
    }

    #[test]
    fn keeps_suffix_within_max_age() {
        let now = 10_000;
        let data = samples(now, &[10_000, 8_000, 6_000, 4_000, 2_000, 1]);
        let filtered = filter_by_age(&data, now, 5_000);
        let values: Vec<f64> = filtered.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn keeps_everything_when_max_age_covers_all() {
        let now = 10_000;
        let data = samples(now, &[10_000, 8_000, 6_000]);
        assert_eq!(filter_by_age(&data, now, 11_000).len(), 3);
    }

    #[yare::parameterized(
        zero_max_age = { 0, 0 },
        empty_input = { 5_000, 0 },
    )]
    fn returns_empty(max_age_ms: i64, expected_len: usize) {
        let now = 10_000;
        let data = samples(now, &[10_000, 8_000, 6_000]);
        let input: &[Sample] = if max_age_ms == 0 { &data } else { &[] };
        assert_eq!(filter_by_age(input, now, max_age_ms).len(), expected_len);
    }

    #[test]
    fn preserves_order_of_kept_samples() {
        let now = 10_000;
        let data = samples(now, &[3_000, 2_000, 1_000]);
        let filtered = filter_by_age(&data, now, 10_000);
        assert!(filtered.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }
}
