//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::lifecycle::CommunicationState;

/// Detailed health as JSON.
///
/// Always 200; the `state` field carries the host's communication state so
/// monitoring can tell "closing" from "down".
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let host = state.host();
    Json(json!({
        "state": state.lifecycle.state().as_str(),
        "service": host.description().name().decoded(),
        "endpoints": host.application_endpoints().count(),
        "metadata_endpoints": host.metadata_endpoints().count(),
        "in_flight": state.lifecycle.in_flight_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: 200 while the process answers at all.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only while the host is `Opened`.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.lifecycle.state() == CommunicationState::Opened {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
