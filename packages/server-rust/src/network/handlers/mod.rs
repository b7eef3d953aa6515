//! Axum handlers for the metadata listener and the state they share.

pub mod health;
pub mod metadata;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use metadata::{mex_handler, wsdl_handler};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use http::Uri;

use super::lifecycle::HostLifecycle;
use crate::host::OpenedServiceHost;
use crate::mex::MetadataExchangeService;

/// State carried through axum extractors. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<MetadataExchangeService>,
    pub lifecycle: Arc<HostLifecycle>,
    /// Request path → listen URI of the endpoint served there.
    pub listen_uris: Arc<BTreeMap<String, Uri>>,
    /// Path of the metadata exchange endpoint, if the host has one.
    pub mex_path: Option<String>,
    /// Process start time, for uptime.
    pub start_time: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(host: OpenedServiceHost, lifecycle: Arc<HostLifecycle>) -> Self {
        let mut listen_uris = BTreeMap::new();
        for endpoint in host.application_endpoints() {
            let uri = endpoint.listen_uri();
            listen_uris
                .entry(uri.path().to_string())
                .or_insert_with(|| uri.clone());
        }
        if let Some(url) = host
            .metadata_extension()
            .and_then(|e| e.settings().http_get_url.clone())
        {
            listen_uris.entry(url.path().to_string()).or_insert(url);
        }
        let mex_path = host.metadata_endpoints().next().map(|endpoint| {
            let uri = endpoint.listen_uri();
            listen_uris.insert(uri.path().to_string(), uri.clone());
            uri.path().to_string()
        });

        Self {
            exchange: Arc::new(MetadataExchangeService::new(host)),
            lifecycle,
            listen_uris: Arc::new(listen_uris),
            mex_path,
            start_time: Instant::now(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &OpenedServiceHost {
        self.exchange.host()
    }

    /// Listen URI for a request path; falls back to any endpoint of the host.
    #[must_use]
    pub fn listen_uri_for(&self, path: &str) -> Option<&Uri> {
        self.listen_uris
            .get(path)
            .or_else(|| self.listen_uris.values().next())
    }
}
