//! Network module with deferred startup lifecycle.
//!
//! `new()` creates shared state, `start()` binds the TCP listener and
//! `serve()` accepts connections. The host lifecycle can be handed to other
//! tasks between `start()` and `serve()`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, mex_handler, readiness_handler, wsdl_handler, AppState,
};
use super::lifecycle::HostLifecycle;
use super::middleware::apply_http_layers;
use crate::host::OpenedServiceHost;

/// Serves one opened host over HTTP.
///
/// 1. `new()` allocates the lifecycle and handler state
/// 2. `start()` binds the listener
/// 3. `serve()` accepts requests until the shutdown future resolves
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    lifecycle: Arc<HostLifecycle>,
    state: AppState,
}

impl NetworkModule {
    #[must_use]
    pub fn new(config: NetworkConfig, host: OpenedServiceHost) -> Self {
        let lifecycle = Arc::new(HostLifecycle::new());
        let state = AppState::new(host, Arc::clone(&lifecycle));
        Self {
            config,
            listener: None,
            lifecycle,
            state,
        }
    }

    #[must_use]
    pub fn lifecycle(&self) -> Arc<HostLifecycle> {
        Arc::clone(&self.lifecycle)
    }

    /// Routes:
    /// - `GET /health`, `GET /health/live`, `GET /health/ready`
    /// - `POST {mex path}` for the metadata exchange endpoint
    /// - `GET {endpoint path}?wsdl` for every application endpoint and the
    ///   configured HTTP GET url
    pub fn build_router(&self) -> Router {
        let mut routes: BTreeMap<&str, MethodRouter<AppState>> = BTreeMap::new();
        for path in self.state.listen_uris.keys() {
            routes.insert(path.as_str(), get(wsdl_handler));
        }
        if let Some(mex_path) = &self.state.mex_path {
            let route = match routes.remove(mex_path.as_str()) {
                Some(route) => route.post(mex_handler),
                None => post(mex_handler),
            };
            routes.insert(mex_path.as_str(), route);
        }

        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler));
        for (path, route) in routes {
            if path.starts_with("/health") {
                warn!(path, "endpoint path shadows a health route and is not served");
                continue;
            }
            router = router.route(path, route);
        }
        apply_http_layers(router, &self.config).with_state(self.state.clone())
    }

    /// Binds the configured host and port and returns the bound port, which
    /// differs from the configured one when that is 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then closes the host and waits for
    /// in-flight metadata exchanges.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .context("start() must be called before serve()")?;
        let router = self.build_router();
        let lifecycle = self.lifecycle;

        lifecycle.mark_opened();
        info!(service = %self.state.host().description().name(), "serving metadata");

        let signal = {
            let lifecycle = Arc::clone(&lifecycle);
            async move {
                tokio::select! {
                    () = shutdown => {}
                    () = lifecycle.closed() => {}
                }
                lifecycle.begin_close();
            }
        };
        if let Err(err) = axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
        {
            lifecycle.mark_faulted();
            return Err(err.into());
        }

        if lifecycle.drain(self.config.drain_timeout()).await {
            info!("host closed");
        } else {
            warn!(
                in_flight = lifecycle.in_flight_count(),
                "drain timeout expired with metadata exchanges still in flight"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::network::handlers::metadata::tests::opened_host;
    use crate::network::lifecycle::CommunicationState;

    fn module() -> NetworkModule {
        NetworkModule::new(NetworkConfig::default(), opened_host(true))
    }

    #[test]
    fn new_creates_module_without_binding() {
        let module = module();
        assert!(module.listener.is_none());
        assert_eq!(module.lifecycle().state(), CommunicationState::Created);
    }

    #[test]
    fn lifecycle_returns_shared_arc() {
        let module = module();
        assert!(Arc::ptr_eq(&module.lifecycle(), &module.lifecycle()));
    }

    #[tokio::test]
    async fn router_serves_health_and_wsdl() {
        let module = module();
        module.lifecycle().mark_opened();
        let router = module.build_router();

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/orders?wsdl")
                    .header("host", "public.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("http://public.example:9000/orders"));

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mex")
                    .header("soapaction", servicemodel_core::metadata::GET_ACTION)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            opened_host(false),
        );
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let err = module().serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start()"));
    }

    #[tokio::test]
    async fn serve_closes_on_shutdown_signal() {
        let mut module = NetworkModule::new(
            NetworkConfig {
                host: "127.0.0.1".to_string(),
                ..NetworkConfig::default()
            },
            opened_host(false),
        );
        module.start().await.unwrap();
        let lifecycle = module.lifecycle();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(module.serve(async move {
            let _ = rx.await;
        }));

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while lifecycle.state() != CommunicationState::Opened {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
        assert_eq!(lifecycle.state(), CommunicationState::Closed);
    }
}
