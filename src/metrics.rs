//! Observability metrics: search latency, operation counts, row throughput.

use std::collections::VecDeque;
use std::time::Duration;

/// Latency samples kept for percentile estimates.
const LATENCY_WINDOW: usize = 10_000;

/// Collects runtime metrics for the HTTP service.
#[derive(Debug)]
pub struct MetricsCollector {
    search_latencies_us: VecDeque<f64>,
    total_searches: u64,
    total_queries: u64,
    rows_inserted: u64,
    rows_deleted: u64,
    errors: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            search_latencies_us: VecDeque::new(),
            total_searches: 0,
            total_queries: 0,
            rows_inserted: 0,
            rows_deleted: 0,
            errors: 0,
        }
    }

    /// Record a search with its duration.
    pub fn record_search(&mut self, duration: Duration) {
        self.total_searches += 1;
        if self.search_latencies_us.len() == LATENCY_WINDOW {
            self.search_latencies_us.pop_front();
        }
        self.search_latencies_us.push_back(duration.as_micros() as f64);
    }

    /// Record a scalar query or point lookup.
    pub fn record_query(&mut self) {
        self.total_queries += 1;
    }

    pub fn record_insert(&mut self, rows: usize) {
        self.rows_inserted += rows as u64;
    }

    pub fn record_delete(&mut self, rows: usize) {
        self.rows_deleted += rows as u64;
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn total_searches(&self) -> u64 {
        self.total_searches
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    pub fn rows_inserted(&self) -> u64 {
        self.rows_inserted
    }

    pub fn rows_deleted(&self) -> u64 {
        self.rows_deleted
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Average search latency in microseconds.
    pub fn avg_search_latency_us(&self) -> f64 {
        if self.search_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.search_latencies_us.iter().sum();
        sum / self.search_latencies_us.len() as f64
    }

    /// Get a percentile of search latency (e.g., 50.0, 95.0, 99.0).
    pub fn percentile_search_latency_us(&self, percentile: f64) -> f64 {
        if self.search_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted: Vec<f64> = self.search_latencies_us.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_metrics_basic() {
        let mut m = MetricsCollector::new();
        m.record_insert(3);
        m.record_insert(3);
        m.record_delete(2);
        m.record_query();
        m.record_error();

        assert_eq!(m.rows_inserted(), 6);
        assert_eq!(m.rows_deleted(), 2);
        assert_eq!(m.total_queries(), 1);
        assert_eq!(m.total_searches(), 0);
        assert_eq!(m.errors(), 1);
    }

    #[test]
    fn test_metrics_latency() {
        let mut m = MetricsCollector::new();
        m.record_search(Duration::from_micros(100));
        m.record_search(Duration::from_micros(200));
        m.record_search(Duration::from_micros(300));

        assert_eq!(m.total_searches(), 3);
        assert_relative_eq!(m.avg_search_latency_us(), 200.0);
        assert_relative_eq!(m.percentile_search_latency_us(50.0), 200.0);
        assert_relative_eq!(m.percentile_search_latency_us(99.0), 300.0);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let mut m = MetricsCollector::new();
        for _ in 0..LATENCY_WINDOW {
            m.record_search(Duration::from_micros(1_000));
        }
        for _ in 0..LATENCY_WINDOW {
            m.record_search(Duration::from_micros(10));
        }
        assert_eq!(m.total_searches(), 2 * LATENCY_WINDOW as u64);
        assert_relative_eq!(m.avg_search_latency_us(), 10.0);
    }

    #[test]
    fn test_metrics_empty() {
        let m = MetricsCollector::new();
        assert_eq!(m.avg_search_latency_us(), 0.0);
        assert_eq!(m.percentile_search_latency_us(99.0), 0.0);
    }
}
