//! Delivery metrics shared by every delivery loop
//!
//! One [`MetricsRegistry`] is built per process and handed to each engine as
//! an `Arc`. Every operation takes the single lock for its whole duration,
//! so a snapshot always reflects a point between two operations.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Counters kept both globally and per destination.
#[derive(Debug, Default, Clone)]
struct Counters {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    retries: u64,
    response_time_total: Duration,
    response_time_count: u64,
    status_codes: BTreeMap<u16, u64>,
}

impl Counters {
    fn record_success(&mut self, status_code: u16, duration: Duration) {
        self.successful_requests += 1;
        self.response_time_total += duration;
        self.response_time_count += 1;
        *self.status_codes.entry(status_code).or_insert(0) += 1;
    }

    fn record_failure(&mut self, is_retry: bool) {
        self.failed_requests += 1;
        if is_retry {
            self.retries += 1;
        }
    }

    fn avg_response_time_ms(&self) -> f64 {
        if self.response_time_count == 0 {
            return 0.0;
        }
        self.response_time_total.as_secs_f64() * 1000.0 / self.response_time_count as f64
    }
}

#[derive(Debug, Default)]
struct DestinationCounters {
    counters: Counters,
    last_error: Option<String>,
    last_error_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    global: Counters,
    destinations: HashMap<String, DestinationCounters>,
}

/// Thread-safe registry of delivery counters.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    inner: RwLock<Inner>,
}

/// Point-in-time copy of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retries: u64,
    pub avg_response_time_ms: f64,
    pub status_codes: BTreeMap<u16, u64>,
    pub destinations: BTreeMap<String, DestinationSnapshot>,
}

/// Per-destination part of a [`MetricsSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DestinationSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retries: u64,
    pub avg_response_time_ms: f64,
    pub status_codes: BTreeMap<u16, u64>,
    pub last_error: Option<String>,
    pub last_error_time: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    /// Successful share of started deliveries, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64 * 100.0
    }

    pub fn destination(&self, url: &str) -> Option<&DestinationSnapshot> {
        self.destinations.get(url)
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a delivery loop starting for `destination`.
    pub fn record_request(&self, destination: &str) {
        let mut inner = self.inner.write();

        inner.global.total_requests += 1;
        inner
            .destinations
            .entry(destination.to_string())
            .or_default()
            .counters
            .total_requests += 1;
    }

    /// Counts a 2xx attempt and its latency.
    pub fn record_success(&self, destination: &str, status_code: u16, duration: Duration) {
        let mut inner = self.inner.write();

        inner.global.record_success(status_code, duration);
        if let Some(dest) = inner.destinations.get_mut(destination) {
            dest.counters.record_success(status_code, duration);
        }
    }

    /// Counts a failed attempt; `is_retry` marks attempts after the first.
    pub fn record_failure(&self, destination: &str, error: &str, is_retry: bool) {
        let mut inner = self.inner.write();

        inner.global.record_failure(is_retry);
        if let Some(dest) = inner.destinations.get_mut(destination) {
            dest.counters.record_failure(is_retry);
            dest.last_error = Some(error.to_string());
            dest.last_error_time = Some(Utc::now());
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read();

        let destinations = inner
            .destinations
            .iter()
            .map(|(url, dest)| {
                let c = &dest.counters;
                let snapshot = DestinationSnapshot {
                    total_requests: c.total_requests,
                    successful_requests: c.successful_requests,
                    failed_requests: c.failed_requests,
                    retries: c.retries,
                    avg_response_time_ms: c.avg_response_time_ms(),
                    status_codes: c.status_codes.clone(),
                    last_error: dest.last_error.clone(),
                    last_error_time: dest.last_error_time,
                };
                (url.clone(), snapshot)
            })
            .collect();

        let g = &inner.global;
        MetricsSnapshot {
            total_requests: g.total_requests,
            successful_requests: g.successful_requests,
            failed_requests: g.failed_requests,
            retries: g.retries,
            avg_response_time_ms: g.avg_response_time_ms(),
            status_codes: g.status_codes.clone(),
            destinations,
        }
    }

    /// Zeroes every counter and forgets all destinations.
    pub fn reset(&self) {
        *self.inner.write() = Inner::default();
    }
}
