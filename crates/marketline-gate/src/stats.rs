//! Window statistics over request metric samples.

use marketline_core::models::metric::MetricSample;
use serde::Serialize;

/// Aggregates for one scope over the alerting window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub total: u64,
    /// Requests that ended with a 5xx status.
    pub errors: u64,
    /// `100` for an empty window, otherwise rounded to two decimals.
    pub crash_free_pct: f64,
    pub avg_ms: f64,
    pub p95_ms: u64,
}

impl WindowStats {
    pub fn from_samples(samples: &[MetricSample]) -> Self {
        let total = samples.len() as u64;
        if total == 0 {
            return Self {
                total: 0,
                errors: 0,
                crash_free_pct: 100.0,
                avg_ms: 0.0,
                p95_ms: 0,
            };
        }

        let errors = samples.iter().filter(|s| s.status_code >= 500).count() as u64;
        let crash_free = (total - errors) as f64 / total as f64 * 100.0;
        let sum: u64 = samples.iter().map(|s| s.duration_ms).sum();

        let mut durations: Vec<u64> = samples.iter().map(|s| s.duration_ms).collect();
        durations.sort_unstable();

        Self {
            total,
            errors,
            crash_free_pct: round2(crash_free),
            avg_ms: sum as f64 / total as f64,
            p95_ms: percentile(&durations, 0.95),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Linear-interpolation percentile of an ascending slice; `0` when empty.
pub fn percentile(sorted: &[u64], q: f64) -> u64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0;
    };
    let pos = last as f64 * q.clamp(0.0, 1.0);
    let lower = pos.floor() as usize;
    let base = sorted[lower] as f64;
    let next = sorted[(lower + 1).min(last)] as f64;
    (base + (next - base) * (pos - lower as f64)).round() as u64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(durations: &[u64], errors: usize) -> Vec<MetricSample> {
        durations
            .iter()
            .enumerate()
            .map(|(i, &duration_ms)| MetricSample {
                status_code: if i < errors { 500 } else { 200 },
                duration_ms,
            })
            .collect()
    }

    #[test]
    fn p95_interpolates_between_neighbours() {
        assert_eq!(percentile(&[100, 200, 300, 400, 500], 0.95), 480);
        assert_eq!(percentile(&[700], 0.95), 700);
        assert_eq!(percentile(&[], 0.95), 0);
    }

    #[test]
    fn p95_is_order_independent() {
        let stats = WindowStats::from_samples(&samples(&[500, 100, 400, 200, 300], 0));
        assert_eq!(stats.p95_ms, 480);
    }

    #[test]
    fn empty_window() {
        let stats = WindowStats::from_samples(&[]);
        assert!(stats.is_empty());
        assert_eq!(stats.crash_free_pct, 100.0);
        assert_eq!(stats.avg_ms, 0.0);
        assert_eq!(stats.p95_ms, 0);
    }

    #[test]
    fn crash_free_rounds_to_two_decimals() {
        let stats = WindowStats::from_samples(&samples(&[10, 10, 10], 1));
        assert_eq!(stats.total, 3);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.crash_free_pct, 66.67);
        assert_eq!(stats.avg_ms, 10.0);
    }

    #[test]
    fn client_errors_are_not_crashes() {
        let mut window = samples(&[10, 10], 0);
        window[0].status_code = 404;
        window[1].status_code = 429;
        assert_eq!(WindowStats::from_samples(&window).crash_free_pct, 100.0);
    }
}
