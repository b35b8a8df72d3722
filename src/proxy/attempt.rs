//! A single delivery attempt
//!
//! Sends one request to one destination and reports what happened. Retry
//! decisions, metrics and logging belong to the caller.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::proxy::destination::Destination;

/// Longest slice of a response body quoted in a failure message.
const MAX_ERROR_BODY: usize = 1024;

/// Result of one attempt.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Response status, 0 when no response arrived
    pub status_code: u16,
    pub response_body: Bytes,
    pub duration: Duration,
    /// Transport-level failure description
    pub error: Option<String>,
}

impl DeliveryOutcome {
    fn transport_error(duration: Duration, error: String) -> Self {
        Self {
            status_code: 0,
            response_body: Bytes::new(),
            duration,
            error: Some(error),
        }
    }

    /// True for any 2xx response.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..300).contains(&self.status_code)
    }

    /// Text recorded as the destination's last error, `None` on success.
    pub fn failure_reason(&self) -> Option<String> {
        (!self.is_success()).then(|| self.failure_message())
    }

    /// Describes this outcome as a failure: the transport error, or the
    /// status and the start of the response body.
    pub fn failure_message(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }

        let end = self.response_body.len().min(MAX_ERROR_BODY);
        format!(
            "received non-2xx status code: {}, body: {}",
            self.status_code,
            String::from_utf8_lossy(&self.response_body[..end])
        )
    }
}

/// Checks if a header is managed by the transport and must not be copied
/// from the inbound request.
pub fn is_hop_by_hop(name: &str) -> bool {
    const MANAGED: [&str; 9] = [
        "host",
        "content-length",
        "connection",
        "keep-alive",
        "proxy-connection",
        "transfer-encoding",
        "upgrade",
        "te",
        "trailer",
    ];
    MANAGED.iter().any(|m| name.eq_ignore_ascii_case(m))
}

/// Merges inbound headers with the destination's own headers.
///
/// Destination headers replace inbound ones with the same name, compared
/// without regard to case. Names or values that are not valid HTTP are dropped.
pub fn merge_headers(inbound: &HashMap<String, String>, destination: &Destination) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let inbound = inbound.iter().filter(|(k, _)| !is_hop_by_hop(k));
    for (key, value) in inbound.chain(destination.headers.iter()) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!(header = %key, "Skipping invalid header");
            continue;
        };
        headers.insert(name, value);
    }

    headers
}

/// Performs exactly one HTTP call to `destination`.
///
/// The destination timeout bounds the whole exchange, including reading the
/// response body. A zero timeout disables the deadline.
pub async fn deliver(
    client: &reqwest::Client,
    destination: &Destination,
    payload: Bytes,
    headers: &HashMap<String, String>,
) -> DeliveryOutcome {
    let start = Instant::now();

    let request = client
        .request(destination.method.into(), destination.url.clone())
        .headers(merge_headers(headers, destination))
        .body(payload);

    let exchange = async {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    };

    let result = if destination.timeout.is_zero() {
        Ok(exchange.await)
    } else {
        tokio::time::timeout(destination.timeout, exchange).await
    };
    let duration = start.elapsed();

    match result {
        Ok(Ok((status_code, response_body))) => {
            tracing::trace!(
                destination = destination.display_name(),
                status = status_code,
                "Received response"
            );
            DeliveryOutcome {
                status_code,
                response_body,
                duration,
                error: None,
            }
        }
        Ok(Err(e)) => DeliveryOutcome::transport_error(duration, describe(&e)),
        Err(_) => DeliveryOutcome::transport_error(
            duration,
            format!("request timed out after {:?}", destination.timeout),
        ),
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else if e.is_body() || e.is_decode() {
        format!("failed to read response body: {e}")
    } else {
        format!("request failed: {e}")
    }
}
