//! Binds inbound paths to forwarding engines.

use std::collections::HashMap;
use std::sync::Arc;

use crate::proxy::destination::Endpoint;
use crate::proxy::engine::ForwardingEngine;
use crate::proxy::metrics::MetricsRegistry;

/// Path → engine table, built once at startup.
#[derive(Debug)]
pub struct EndpointRegistrar {
    engines: HashMap<String, Arc<ForwardingEngine>>,
    metrics: Arc<MetricsRegistry>,
}

impl EndpointRegistrar {
    /// Creates one engine per endpoint. All engines share `client` and `metrics`.
    ///
    /// A later endpoint with the same path replaces an earlier one; the
    /// configuration loader rejects duplicates before this point.
    pub fn new(
        endpoints: &[Endpoint],
        client: reqwest::Client,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        let mut engines = HashMap::with_capacity(endpoints.len());

        for endpoint in endpoints {
            tracing::info!(
                path = %endpoint.path,
                destinations = endpoint.destinations.len(),
                "Registering webhook endpoint"
            );

            let engine = ForwardingEngine::new(
                endpoint.path.clone(),
                Arc::clone(&endpoint.destinations),
                client.clone(),
                Arc::clone(&metrics),
            );
            engines.insert(endpoint.path.clone(), Arc::new(engine));
        }

        Self { engines, metrics }
    }

    pub fn engine(&self, path: &str) -> Option<Arc<ForwardingEngine>> {
        self.engines.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.engines.contains_key(path)
    }

    /// Registered paths, sorted.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }
}
