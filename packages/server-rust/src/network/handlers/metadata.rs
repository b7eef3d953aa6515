//! Metadata over HTTP: the SOAP `Get` endpoint and `?wsdl` downloads.

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use servicemodel_core::metadata::{
    dialect, ExchangeError, GetRequest, MetadataContent, MetadataExchange, RequestContext,
};
use tracing::{debug, warn};

use super::AppState;
use crate::network::lifecycle::CommunicationState;
use crate::network::middleware::SOAP_ACTION;

const SOAP12_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";
const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const MAX_REQUEST_BYTES: usize = 1 << 20;

/// Action named by the transport: the SOAP 1.1 `SOAPAction` header, else the
/// SOAP 1.2 `action` parameter of the content type. Quotes are stripped and
/// an empty value counts as absent.
pub(crate) fn transport_action(headers: &HeaderMap) -> Option<String> {
    let unquote = |value: &str| {
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    };
    if let Some(action) = headers.get(SOAP_ACTION).and_then(|v| v.to_str().ok()) {
        return unquote(action);
    }
    let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim().eq_ignore_ascii_case("action").then(|| unquote(value))?
    })
}

fn exchange_error_response(err: &ExchangeError) -> Response {
    let status = match err {
        ExchangeError::UnsupportedAction { .. } | ExchangeError::MalformedRequest(_) => {
            StatusCode::BAD_REQUEST
        }
        ExchangeError::Export(_) | ExchangeError::Address(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "metadata exchange failed");
    } else {
        debug!(error = %err, "metadata request rejected");
    }
    (status, err.to_string()).into_response()
}

fn not_open(state: &AppState) -> Option<Response> {
    let current = state.lifecycle.state();
    (current != CommunicationState::Opened).then(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("service host is {}", current.as_str()),
        )
            .into_response()
    })
}

/// `POST {mex path}`: answers a metadata `Get` with a SOAP 1.2 envelope.
///
/// The action comes from the envelope's addressing header or, failing that,
/// from the transport. A blank body is accepted when the transport names
/// the action.
pub async fn mex_handler(State(state): State<AppState>, request: Request) -> Response {
    if let Some(response) = not_open(&state) {
        return response;
    }
    let _guard = state.lifecycle.exchange_guard();

    let (parts, body) = request.into_parts();
    let Some(listen_uri) = state.listen_uri_for(parts.uri.path()).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let body = match to_bytes(body, MAX_REQUEST_BYTES).await {
        Ok(body) => body,
        Err(err) => return (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()).into_response(),
    };
    let Ok(envelope) = std::str::from_utf8(&body) else {
        return exchange_error_response(&ExchangeError::MalformedRequest(
            "request body is not UTF-8".into(),
        ));
    };

    let action = transport_action(&parts.headers);
    let context = RequestContext::from_parts(&parts, listen_uri);
    let parsed = if envelope.trim().is_empty() {
        action
            .map(|action| {
                let mut request = GetRequest::new(context);
                request.action = action;
                request
            })
            .ok_or_else(|| ExchangeError::MalformedRequest("request carries no action".into()))
    } else {
        GetRequest::from_envelope(envelope, action.as_deref(), context)
    };

    let reply = match parsed {
        Ok(request) => state.exchange.get_async(&request).await,
        Err(err) => Err(err),
    };
    match reply.and_then(|message| Ok(message.write_envelope()?)) {
        Ok(envelope) => ([(CONTENT_TYPE, SOAP12_CONTENT_TYPE)], envelope).into_response(),
        Err(err) => exchange_error_response(&err),
    }
}

/// `GET {path}?wsdl`: the WSDL document, when HTTP(S) GET publishing is
/// enabled for the request's scheme. Anything else is 404.
pub async fn wsdl_handler(State(state): State<AppState>, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    let wants_wsdl = parts
        .uri
        .query()
        .is_some_and(|query| query.eq_ignore_ascii_case("wsdl"));
    let Some(extension) = state.host().metadata_extension() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(listen_uri) = state.listen_uri_for(parts.uri.path()).cloned() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if !wants_wsdl {
        return StatusCode::NOT_FOUND.into_response();
    }

    let context = RequestContext::from_parts(&parts, listen_uri);
    let settings = extension.settings();
    let enabled = if context.scheme == "https" {
        settings.https_get_enabled
    } else {
        settings.http_get_enabled
    };
    if !enabled {
        debug!(scheme = %context.scheme, "metadata GET publishing is disabled");
        return StatusCode::NOT_FOUND.into_response();
    }
    if let Some(response) = not_open(&state) {
        return response;
    }
    let _guard = state.lifecycle.exchange_guard();

    let metadata = match state.exchange.export(&context) {
        Ok(metadata) => metadata,
        Err(err) => return exchange_error_response(&err),
    };
    let wsdl = metadata
        .sections_with_dialect(dialect::WSDL)
        .find_map(|section| match &section.content {
            MetadataContent::Document(document) => Some(document.clone()),
            _ => None,
        });
    match wsdl {
        Some(document) => ([(CONTENT_TYPE, XML_CONTENT_TYPE)], document).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
