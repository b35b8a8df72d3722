//! Fan-out of one received payload to every destination of an endpoint
//!
//! `forward` spawns one task per destination and returns at once. Each task
//! runs its own attempt/retry loop, so a slow or dead destination only ever
//! delays itself. The only shared state is the metrics registry.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::proxy::attempt::{self, DeliveryOutcome};
use crate::proxy::destination::Destination;
use crate::proxy::metrics::MetricsRegistry;
use crate::proxy::retry::{RetryDecision, RetryPolicy};

/// Forwards payloads received on one endpoint.
#[derive(Debug)]
pub struct ForwardingEngine {
    path: String,
    destinations: Arc<[Destination]>,
    client: reqwest::Client,
    metrics: Arc<MetricsRegistry>,
}

/// Handles of the delivery loops started by one `forward` call.
///
/// Dropping it leaves the loops running.
#[derive(Debug)]
#[must_use = "drop the dispatch explicitly to forward without waiting"]
pub struct Dispatch {
    handles: Vec<JoinHandle<()>>,
}

impl Dispatch {
    /// Number of delivery loops started.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// True once every loop has returned.
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|h| h.is_finished())
    }

    /// Waits for every delivery loop to end.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Delivery task aborted");
            }
        }
    }
}

/// Everything one delivery loop needs, owned so the task can outlive the
/// request that triggered it.
struct DeliveryJob {
    path: String,
    destination: Destination,
    client: reqwest::Client,
    metrics: Arc<MetricsRegistry>,
    payload: Bytes,
    headers: Arc<HashMap<String, String>>,
}

impl ForwardingEngine {
    pub fn new(
        path: impl Into<String>,
        destinations: Arc<[Destination]>,
        client: reqwest::Client,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            path: path.into(),
            destinations,
            client,
            metrics,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Starts one delivery loop per destination and returns without waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn forward(&self, payload: Bytes, headers: HashMap<String, String>) -> Dispatch {
        let headers = Arc::new(headers);

        let handles = self
            .destinations
            .iter()
            .map(|destination| {
                let span = tracing::info_span!(
                    "webhook.forward",
                    path = %self.path,
                    destination = destination.display_name(),
                    body_size = payload.len(),
                );
                let job = DeliveryJob {
                    path: self.path.clone(),
                    destination: destination.clone(),
                    client: self.client.clone(),
                    metrics: Arc::clone(&self.metrics),
                    payload: payload.clone(),
                    headers: Arc::clone(&headers),
                };
                tokio::spawn(job.run().instrument(span))
            })
            .collect();

        Dispatch { handles }
    }
}

impl DeliveryJob {
    async fn run(self) {
        let dest = &self.destination;
        let url = dest.display_name();
        let policy = RetryPolicy::for_destination(dest);

        self.metrics.record_request(url);

        let mut attempt = 1;
        loop {
            let outcome =
                attempt::deliver(&self.client, dest, self.payload.clone(), &self.headers).await;

            match policy.decide(attempt, &outcome) {
                RetryDecision::Delivered => {
                    self.metrics
                        .record_success(url, outcome.status_code, outcome.duration);
                    tracing::info!(
                        destination = url,
                        status_code = outcome.status_code,
                        duration_ms = outcome.duration.as_millis() as u64,
                        attempt,
                        response_size = outcome.response_body.len(),
                        "Webhook forwarded successfully"
                    );
                    return;
                }
                RetryDecision::RetryAfter(delay) => {
                    self.record_failed_attempt(&outcome, attempt, policy.max_attempts);
                    tracing::info!(
                        destination = url,
                        attempt,
                        max_attempts = policy.max_attempts,
                        retry_delay_ms = delay.as_millis() as u64,
                        "Retrying webhook forwarding"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Exhausted => {
                    let error = self.record_failed_attempt(&outcome, attempt, policy.max_attempts);
                    tracing::error!(
                        path = %self.path,
                        destination = url,
                        error = %error,
                        attempts = policy.max_attempts,
                        "Webhook forwarding failed after all retry attempts"
                    );
                    return;
                }
            }
        }
    }

    fn record_failed_attempt(
        &self,
        outcome: &DeliveryOutcome,
        attempt: u32,
        max_attempts: u32,
    ) -> String {
        let url = self.destination.display_name();
        let error = outcome.failure_message();

        self.metrics.record_failure(url, &error, attempt > 1);
        tracing::warn!(
            destination = url,
            status_code = outcome.status_code,
            error = %error,
            attempt,
            max_attempts,
            "Webhook forwarding failed"
        );

        error
    }
}
