//! Observability hooks for cache and transport activity.
//!
//! The proxy layer reports every cache lookup, cache write, eviction and
//! HTTP round trip through the [`ProxyMetrics`] trait. The default
//! implementation logs via the `log` crate; plug in your own
//! implementation to feed a metrics backend.
//!
//! ```ignore
//! use proxy_kit::metrics::ProxyMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl ProxyMetrics for PrometheusMetrics {
//!     fn record_request(&self, method: &str, url: &str, status: u16, duration: Duration) {
//!         // counter!("proxy_requests").inc();
//!         // histogram!("proxy_latency").record(duration);
//!     }
//!     // ... other methods keep their logging defaults
//! }
//! ```
//!
//! Metrics are best-effort and never mask an error from the caller.

use std::time::Duration;

/// Trait for proxy metrics collection.
pub trait ProxyMetrics: Send + Sync {
    /// Record a response cache hit.
    fn record_hit(&self, key: &str) {
        debug!("Cache HIT: {}", key);
    }

    /// Record a response cache miss.
    fn record_miss(&self, key: &str) {
        debug!("Cache MISS: {}", key);
    }

    /// Record a response cache write.
    fn record_set(&self, key: &str) {
        debug!("Cache SET: {}", key);
    }

    /// Record a response cache eviction.
    fn record_evict(&self, key: &str) {
        debug!("Cache EVICT: {}", key);
    }

    /// Record a completed HTTP round trip.
    fn record_request(&self, method: &str, url: &str, status: u16, duration: Duration) {
        debug!("{} {} -> {} in {:?}", method, url, status, duration);
    }

    /// Record an error.
    fn record_error(&self, context: &str, error: &str) {
        warn!("Proxy ERROR ({}): {}", context, error);
    }
}

/// Default metrics implementation, backed by the `log` crate.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl ProxyMetrics for LogMetrics {}

/// Metrics implementation that records nothing.
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl ProxyMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str) {}
    fn record_miss(&self, _key: &str) {}
    fn record_set(&self, _key: &str) {}
    fn record_evict(&self, _key: &str) {}
    fn record_request(&self, _method: &str, _url: &str, _status: u16, _duration: Duration) {}
    fn record_error(&self, _context: &str, _error: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_metrics_defaults() {
        let metrics = LogMetrics;
        metrics.record_hit("http://h/api/v1/item/1/");
        metrics.record_miss("http://h/api/v1/item/2/");
        metrics.record_request("GET", "http://h/api/v1/item/", 200, Duration::from_millis(3));
    }

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_evict("key");
        metrics.record_error("request", "boom");
    }
}
