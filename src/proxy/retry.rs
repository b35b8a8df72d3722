//! Fixed-delay retry policy for delivery loops.

use std::time::Duration;

use crate::proxy::attempt::DeliveryOutcome;
use crate::proxy::destination::{Destination, DEFAULT_RETRY_DELAY};

/// How many attempts a destination gets and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Original attempt plus retries, never less than 1
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

/// What a delivery loop does after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The attempt succeeded; stop.
    Delivered,
    /// Wait this long, then try again.
    RetryAfter(Duration),
    /// No attempts left; stop.
    Exhausted,
}

impl RetryPolicy {
    pub fn new(retries: u32, retry_delay: Duration) -> Self {
        let retry_delay = if retries > 0 && retry_delay.is_zero() {
            DEFAULT_RETRY_DELAY
        } else {
            retry_delay
        };

        Self {
            max_attempts: retries.saturating_add(1),
            retry_delay,
        }
    }

    pub fn for_destination(destination: &Destination) -> Self {
        Self::new(destination.retries, destination.retry_delay)
    }

    /// Decides the next step after attempt number `attempt` (1-based).
    pub fn decide(&self, attempt: u32, outcome: &DeliveryOutcome) -> RetryDecision {
        if outcome.is_success() {
            RetryDecision::Delivered
        } else if attempt >= self.max_attempts {
            RetryDecision::Exhausted
        } else {
            RetryDecision::RetryAfter(self.retry_delay)
        }
    }
}
