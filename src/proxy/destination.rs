//! Destination and endpoint model
//!
//! Validated, immutable views of the configured endpoints. The forwarding
//! engine only ever sees these, never the raw configuration.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::http::request::Method;

/// Per-attempt deadline used when the configuration leaves it unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait between attempts used when retries are enabled without a delay.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// One target a received webhook is forwarded to.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    /// Absolute http(s) URL
    pub url: Url,

    /// The URL exactly as configured, before normalization
    pub name: String,

    /// Method used for the outbound request
    pub method: Method,

    /// Extra headers; these win over headers copied from the inbound request
    pub headers: HashMap<String, String>,

    /// Deadline for one attempt (connect, send and full response read)
    pub timeout: Duration,

    /// Attempts made after the first one fails
    pub retries: u32,

    /// Wait between a failed attempt and the next one
    pub retry_delay: Duration,
}

impl Destination {
    /// Destination with `POST`, no extra headers, default timeout and no retries.
    pub fn new(url: Url) -> Self {
        Self {
            name: url.as_str().to_string(),
            url,
            method: Method::POST,
            headers: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    /// Parses `url` and keeps it verbatim as the destination's name.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        let mut destination = Self::new(Url::parse(url)?);
        destination.name = url.to_string();
        Ok(destination)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32, retry_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Key used for metrics and log events: the URL as configured.
    pub fn display_name(&self) -> &str {
        &self.name
    }

    /// Total number of attempts a delivery loop may make.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// An inbound path and the destinations its payloads fan out to.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Inbound path, always starting with `/`
    pub path: String,

    /// Ordered, never empty
    pub destinations: Arc<[Destination]>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, destinations: Vec<Destination>) -> Self {
        Self {
            path: path.into(),
            destinations: destinations.into(),
        }
    }
}
