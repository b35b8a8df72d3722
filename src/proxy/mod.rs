//! Webhook forwarding
//!
//! Everything between "a payload arrived on an endpoint" and "each
//! destination got it (or we gave up)": the destination model, single
//! delivery attempts, the retry policy, the per-endpoint fan-out engine, the
//! path registrar and the shared metrics registry.

pub mod attempt;
pub mod destination;
pub mod engine;
pub mod metrics;
pub mod registrar;
pub mod retry;

pub use attempt::{deliver, DeliveryOutcome};
pub use destination::{Destination, Endpoint};
pub use engine::{Dispatch, ForwardingEngine};
pub use metrics::{DestinationSnapshot, MetricsRegistry, MetricsSnapshot};
pub use registrar::EndpointRegistrar;
pub use retry::{RetryDecision, RetryPolicy};

/// Builds the HTTP client shared by every engine.
///
/// Per-destination deadlines are applied per attempt, so the client itself
/// carries no timeout.
pub fn build_client() -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("webhook-proxy/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
