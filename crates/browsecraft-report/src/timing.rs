//! Duration statistics shared by the aggregator and its formatters.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Timing {
    pub min: u64,
    pub max: u64,
    pub avg: u64,
    pub median: u64,
    pub p95: u64,
    pub total: u64,
}

pub fn percentile_duration_ms(values: &[u64], percentile_numerator: u64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let len = sorted.len() as u64;
    let rank = len.saturating_mul(percentile_numerator).saturating_add(99) / 100;
    let index = rank.saturating_sub(1).min(len.saturating_sub(1)) as usize;
    sorted[index]
}

pub fn compute_timing(durations_ms: &[u64]) -> Timing {
    if durations_ms.is_empty() {
        return Timing::default();
    }
    let total: u64 = durations_ms.iter().sum();
    let min = *durations_ms.iter().min().expect("non-empty");
    let max = *durations_ms.iter().max().expect("non-empty");
    let avg = total / durations_ms.len() as u64;
    Timing {
        min,
        max,
        avg,
        median: percentile_duration_ms(durations_ms, 50),
        p95: percentile_duration_ms(durations_ms, 95),
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_of_empty_is_zero() {
        assert_eq!(percentile_duration_ms(&[], 95), 0);
    }

    #[test]
    fn percentile_matches_known_distribution() {
        let values = vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        assert_eq!(percentile_duration_ms(&values, 50), 50);
        assert_eq!(percentile_duration_ms(&values, 95), 100);
    }

    #[test]
    fn compute_timing_of_empty_is_default() {
        let timing = compute_timing(&[]);
        assert_eq!(timing.total, 0);
        assert_eq!(timing.max, 0);
    }

    #[test]
    fn compute_timing_averages_and_totals() {
        let timing = compute_timing(&[100, 200, 300]);
        assert_eq!(timing.total, 600);
        assert_eq!(timing.avg, 200);
        assert_eq!(timing.min, 100);
        assert_eq!(timing.max, 300);
    }
}
