//! Maps inbound requests to webhook endpoints and the admin routes.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::proxy::metrics::{MetricsRegistry, MetricsSnapshot};
use crate::proxy::registrar::EndpointRegistrar;

pub const METRICS_PATH: &str = "/metrics";
pub const METRICS_RESET_PATH: &str = "/metrics/reset";
pub const HEALTH_PATH: &str = "/health";

pub struct Router {
    registrar: EndpointRegistrar,
    version: String,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

#[derive(Serialize)]
struct HealthBody<'a> {
    status: &'a str,
    timestamp: String,
    version: &'a str,
}

#[derive(Serialize)]
struct MetricsBody {
    timestamp: String,
    success_rate: f64,
    #[serde(flatten)]
    metrics: MetricsSnapshot,
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

impl Router {
    pub fn new(registrar: EndpointRegistrar, version: impl Into<String>) -> Self {
        Self {
            registrar,
            version: version.into(),
        }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        self.registrar.metrics()
    }

    /// Produces the response for `req`.
    ///
    /// Webhook deliveries are only started here; the response never waits
    /// for them.
    pub fn handle(&self, req: &Request, peer: SocketAddr) -> Response {
        let path = req.route_path();

        if self.registrar.contains(path) {
            return self.handle_webhook(req, path, peer);
        }

        match (req.method, path) {
            (Method::GET, METRICS_PATH) => self.metrics_response(),
            (Method::POST, METRICS_RESET_PATH) => self.reset_metrics(),
            (Method::GET, HEALTH_PATH) => self.health_response(),
            (_, METRICS_PATH) | (_, HEALTH_PATH) => Response::method_not_allowed("GET"),
            (_, METRICS_RESET_PATH) => Response::method_not_allowed("POST"),
            _ => Response::not_found(),
        }
    }

    fn handle_webhook(&self, req: &Request, path: &str, peer: SocketAddr) -> Response {
        if req.method != Method::POST {
            return Response::method_not_allowed("POST");
        }

        let Some(engine) = self.registrar.engine(path) else {
            return Response::not_found();
        };

        let span = tracing::info_span!(
            "webhook.handle",
            webhook.path = path,
            webhook.destinations = engine.destinations().len(),
            webhook.body_size = req.body.len(),
        );
        let _entered = span.enter();

        tracing::info!(
            path,
            method = %req.method,
            remote_addr = %peer,
            content_length = req.content_length(),
            "Webhook received"
        );

        // Detached: delivery continues after the response is written.
        drop(engine.forward(Bytes::copy_from_slice(&req.body), req.forwarded_headers()));

        Response::json(
            StatusCode::Accepted,
            &StatusBody {
                status: "accepted",
                message: None,
            },
        )
    }

    fn metrics_response(&self) -> Response {
        let metrics = self.metrics().snapshot();
        let _entered = tracing::info_span!(
            "metrics.get",
            metrics.total_requests = metrics.total_requests,
            metrics.successful_requests = metrics.successful_requests,
            metrics.failed_requests = metrics.failed_requests,
            metrics.retries = metrics.retries,
            metrics.success_rate = metrics.success_rate(),
            metrics.destination_count = metrics.destinations.len(),
        )
        .entered();

        let body = MetricsBody {
            timestamp: now_rfc3339(),
            success_rate: metrics.success_rate(),
            metrics,
        };
        Response::json(StatusCode::Ok, &body)
    }

    fn reset_metrics(&self) -> Response {
        let _entered = tracing::info_span!(
            "metrics.reset",
            metrics.endpoint_count = self.registrar.paths().len(),
        )
        .entered();

        self.metrics().reset();
        tracing::info!("Metrics reset");

        Response::json(
            StatusCode::Ok,
            &StatusBody {
                status: "ok",
                message: Some("Metrics reset successfully"),
            },
        )
    }

    fn health_response(&self) -> Response {
        let _entered =
            tracing::info_span!("health.check", health.version = %self.version).entered();

        Response::json(
            StatusCode::Ok,
            &HealthBody {
                status: "ok",
                timestamp: now_rfc3339(),
                version: &self.version,
            },
        )
    }
}
