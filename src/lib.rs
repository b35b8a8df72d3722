//! webhook-proxy - webhook fan-out relay
//!
//! Receives webhooks on configured paths and forwards each payload to every
//! destination of that path, with per-destination timeouts, retries and
//! metrics.

pub mod config;
pub mod http;
pub mod logging;
pub mod proxy;
pub mod server;
