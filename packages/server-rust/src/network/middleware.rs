//! HTTP middleware stack for the metadata listener.
//!
//! Layers are listed outer-to-inner: the first one sees the request first
//! and the response last.

use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{Method, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

/// SOAP 1.1 carries the action in this header.
pub const SOAP_ACTION: &str = "soapaction";

const REQUEST_ID: &str = "x-request-id";

/// Wraps `router` in the transport middleware.
///
/// 1. `SetRequestId` assigns a UUID v4 `X-Request-Id`
/// 2. `Trace` opens a span per request
/// 3. `Compression` gzips responses (WSDL documents compress well)
/// 4. `CORS` from the configured origins
/// 5. `Timeout` answers 408 after `request_timeout`
/// 6. `PropagateRequestId` copies the id onto the response
#[must_use]
pub fn apply_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID);
    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout(),
        ))
        .layer(PropagateRequestIdLayer::new(request_id));
    router.layer(layers)
}

/// `"*"` allows any origin; anything else is an explicit allowlist and
/// unparsable entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(SOAP_ACTION)])
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;

    fn router(config: &NetworkConfig) -> Router {
        apply_http_layers(Router::new().route("/", get(|| async { "ok" })), config)
    }

    #[tokio::test]
    async fn request_id_is_propagated() {
        let response = router(&NetworkConfig::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn preflight_allows_soap_action() {
        let config = NetworkConfig {
            cors_origins: vec!["https://tools.example".to_string()],
            ..NetworkConfig::default()
        };
        let response = router(&config)
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/")
                    .header("origin", "https://tools.example")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "soapaction")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let allowed = response
            .headers()
            .get("access-control-allow-headers")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allowed.contains("soapaction"));
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://tools.example"
        );
    }
}
