//! Fixed-size exponential latency histogram.
//!
//! Input values arrive as integer ticks of 100 ns; dividing by ten yields
//! microseconds, which are binned into exponentially spaced buckets plus
//! an overflow slot. Percentile queries walk the buckets and report the
//! crossed bucket's upper bound.

use serde::{Deserialize, Serialize};

/// Bucket upper bounds in microseconds.
pub const BUCKET_BOUNDS_US: [u64; 8] = [
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
];

const BUCKETS: usize = BUCKET_BOUNDS_US.len() + 1; // + overflow

/// Summary statistics derived from a histogram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: f64,
    pub min_us: u64,
    pub max_us: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
}

/// Allocation-free latency histogram.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencyHistogram {
    counts: [u64; BUCKETS],
    count: u64,
    sum_us: u64,
    min_us: u64,
    max_us: u64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self {
            counts: [0; BUCKETS],
            count: 0,
            sum_us: 0,
            min_us: u64::MAX,
            max_us: 0,
        }
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an elapsed duration given in 100 ns ticks.
    pub fn record_ticks(&mut self, ticks: u64) {
        self.record_us(ticks / 10);
    }

    /// Record an elapsed duration in microseconds.
    pub fn record_us(&mut self, us: u64) {
        let idx = BUCKET_BOUNDS_US.partition_point(|&bound| us > bound);
        self.counts[idx] += 1;
        self.count += 1;
        self.sum_us += us;
        self.min_us = self.min_us.min(us);
        self.max_us = self.max_us.max(us);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean_us(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum_us as f64 / self.count as f64
    }

    pub fn min_us(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.min_us
        }
    }

    pub fn max_us(&self) -> u64 {
        self.max_us
    }

    /// Upper bound of the bucket containing the `p`-quantile
    /// (`0 < p <= 1`). Saturated histograms report ten times the last
    /// bound.
    pub fn percentile(&self, p: f64) -> u64 {
        if self.count == 0 {
            return 0;
        }
        let threshold = ((p * self.count as f64).ceil() as u64).max(1);
        let mut cumulative = 0u64;
        for (idx, &bucket_count) in self.counts.iter().enumerate() {
            cumulative += bucket_count;
            if cumulative >= threshold {
                return if idx < BUCKET_BOUNDS_US.len() {
                    BUCKET_BOUNDS_US[idx]
                } else {
                    BUCKET_BOUNDS_US[BUCKET_BOUNDS_US.len() - 1] * 10
                };
            }
        }
        BUCKET_BOUNDS_US[BUCKET_BOUNDS_US.len() - 1] * 10
    }

    pub fn stats(&self) -> LatencyStats {
        LatencyStats {
            count: self.count,
            mean_us: self.mean_us(),
            min_us: self.min_us(),
            max_us: self.max_us(),
            p50: self.percentile(0.50),
            p90: self.percentile(0.90),
            p99: self.percentile(0.99),
            p999: self.percentile(0.999),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        let mut hist = LatencyHistogram::new();
        hist.record_us(10); // first bucket (<= 10)
        hist.record_us(11); // second bucket
        hist.record_us(100); // second bucket
        hist.record_us(101); // third bucket
        assert_eq!(hist.counts[0], 1);
        assert_eq!(hist.counts[1], 2);
        assert_eq!(hist.counts[2], 1);
    }

    #[test]
    fn test_tick_conversion() {
        let mut hist = LatencyHistogram::new();
        hist.record_ticks(95); // 9 us
        assert_eq!(hist.counts[0], 1);
        assert_eq!(hist.max_us(), 9);
    }

    #[test]
    fn test_scalars() {
        let mut hist = LatencyHistogram::new();
        for us in [5, 50, 500] {
            hist.record_us(us);
        }
        assert_eq!(hist.count(), 3);
        assert_eq!(hist.min_us(), 5);
        assert_eq!(hist.max_us(), 500);
        assert!((hist.mean_us() - 185.0).abs() < 1e-9);
    }

    #[test]
    fn test_percentiles_walk_buckets() {
        let mut hist = LatencyHistogram::new();
        for _ in 0..90 {
            hist.record_us(5); // bucket 0 (bound 10)
        }
        for _ in 0..10 {
            hist.record_us(50_000); // bucket 4 (bound 100_000)
        }
        assert_eq!(hist.percentile(0.50), 10);
        assert_eq!(hist.percentile(0.90), 10);
        assert_eq!(hist.percentile(0.99), 100_000);
    }

    #[test]
    fn test_overflow_saturates() {
        let mut hist = LatencyHistogram::new();
        hist.record_us(200_000_000); // beyond the last bound
        assert_eq!(hist.counts[BUCKETS - 1], 1);
        assert_eq!(hist.percentile(0.5), 1_000_000_000);
    }

    #[test]
    fn test_empty_histogram() {
        let hist = LatencyHistogram::new();
        let stats = hist.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.mean_us, 0.0);
        assert_eq!(stats.min_us, 0);
        assert_eq!(stats.p50, 0);
    }
}
