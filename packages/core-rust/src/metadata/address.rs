//! Resolving the endpoint address advertised in metadata.
//!
//! Behind a reverse proxy the address a service listens on is not the address
//! clients use. A [`MetadataEndpointAddressProvider`] derives the public base
//! address from the inbound request; the caller rebases the endpoint's listen
//! URI onto it. Providers are consulted per request and hold no per-request
//! state.

use std::collections::BTreeMap;
use std::fmt;

use http::header::HOST;
use http::uri::{Authority, PathAndQuery, Scheme};
use http::Uri;
use serde::{Deserialize, Serialize};

use crate::error::DescriptionError;

/// What the hosting layer knows about an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub scheme: String,
    pub host_header: Option<String>,
    pub listen_uri: Uri,
}

impl RequestContext {
    #[must_use]
    pub fn new(scheme: impl Into<String>, host_header: Option<String>, listen_uri: Uri) -> Self {
        Self {
            scheme: scheme.into(),
            host_header,
            listen_uri,
        }
    }

    /// Builds the context from request head parts. The scheme comes from the
    /// request URI when absolute, otherwise from the listen URI.
    #[must_use]
    pub fn from_parts(parts: &http::request::Parts, listen_uri: Uri) -> Self {
        let scheme = parts
            .uri
            .scheme_str()
            .or_else(|| listen_uri.scheme_str())
            .unwrap_or("http")
            .to_ascii_lowercase();
        let host_header = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Self {
            scheme,
            host_header,
            listen_uri,
        }
    }
}

/// Scheme, host and optional port of an externally visible address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseAddress {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl BaseAddress {
    /// Takes scheme, host and port from `uri`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::InvalidAddress`] if `uri` is not absolute.
    pub fn from_uri(uri: &Uri) -> Result<Self, DescriptionError> {
        match (uri.scheme_str(), uri.host()) {
            (Some(scheme), Some(host)) => Ok(Self {
                scheme: scheme.to_string(),
                host: host.to_string(),
                port: uri.port_u16(),
            }),
            _ => Err(DescriptionError::InvalidAddress {
                address: uri.to_string(),
            }),
        }
    }

    fn authority(&self) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }

    /// Replaces scheme and authority of `uri`, keeping its path and query.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::InvalidAddress`] if the result is not a valid URI.
    pub fn rebase(&self, uri: &Uri) -> Result<Uri, DescriptionError> {
        let invalid = || DescriptionError::InvalidAddress {
            address: format!("{self}{}", uri.path()),
        };
        let scheme: Scheme = self.scheme.parse().map_err(|_| invalid())?;
        let authority: Authority = self.authority().parse().map_err(|_| invalid())?;
        let path = uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        Uri::builder()
            .scheme(scheme)
            .authority(authority)
            .path_and_query(path)
            .build()
            .map_err(|_| invalid())
    }
}

impl fmt::Display for BaseAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}

/// Derives the address to advertise for one request.
pub trait MetadataEndpointAddressProvider: Send + Sync + fmt::Debug {
    /// `None` means "no override": the listen URI is advertised unchanged.
    fn resolve(&self, request: &RequestContext, listen_uri: &Uri) -> Option<BaseAddress>;
}

/// Always advertises one configured address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAddressProvider {
    address: BaseAddress,
}

impl StaticAddressProvider {
    #[must_use]
    pub fn new(address: BaseAddress) -> Self {
        Self { address }
    }

    /// # Errors
    ///
    /// Returns [`DescriptionError::InvalidAddress`] if `uri` is not absolute.
    pub fn from_uri(uri: &Uri) -> Result<Self, DescriptionError> {
        Ok(Self::new(BaseAddress::from_uri(uri)?))
    }
}

impl MetadataEndpointAddressProvider for StaticAddressProvider {
    fn resolve(&self, _request: &RequestContext, _listen_uri: &Uri) -> Option<BaseAddress> {
        Some(self.address.clone())
    }
}

/// Port to assume per scheme when a `Host` header carries none.
///
/// Owned by the service that configures it; nothing is shared process-wide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u16>", into = "BTreeMap<String, u16>")]
pub struct DefaultPortTable {
    ports: BTreeMap<String, u16>,
}

impl From<BTreeMap<String, u16>> for DefaultPortTable {
    fn from(ports: BTreeMap<String, u16>) -> Self {
        let mut table = Self::new();
        for (scheme, port) in ports {
            table.insert(&scheme, port);
        }
        table
    }
}

impl From<DefaultPortTable> for BTreeMap<String, u16> {
    fn from(table: DefaultPortTable) -> Self {
        table.ports
    }
}

impl DefaultPortTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `http` → 80, `https` → 443.
    #[must_use]
    pub fn with_standard_ports() -> Self {
        let mut table = Self::new();
        table.insert("http", 80);
        table.insert("https", 443);
        table
    }

    pub fn insert(&mut self, scheme: &str, port: u16) {
        self.ports.insert(scheme.to_ascii_lowercase(), port);
    }

    #[must_use]
    pub fn get(&self, scheme: &str) -> Option<u16> {
        self.ports.get(&scheme.to_ascii_lowercase()).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Advertises the host the client addressed, taken from the `Host` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostHeaderAddressProvider {
    default_ports: DefaultPortTable,
}

impl HostHeaderAddressProvider {
    #[must_use]
    pub fn new(default_ports: DefaultPortTable) -> Self {
        Self { default_ports }
    }

    #[must_use]
    pub fn default_ports(&self) -> &DefaultPortTable {
        &self.default_ports
    }
}

/// Splits a `Host` header value into host and explicit port. Returns `None`
/// for an empty or malformed value.
fn split_host_header(value: &str) -> Option<(String, Option<u16>)> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(rest) = value.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        return match after.strip_prefix(':') {
            Some(port) => Some((host.to_string(), Some(port.parse().ok()?))),
            None if after.is_empty() => Some((host.to_string(), None)),
            None => None,
        };
    }
    match value.split_once(':') {
        Some((host, port)) if !host.is_empty() => {
            Some((host.to_string(), Some(port.parse().ok()?)))
        }
        Some(_) => None,
        None => Some((value.to_string(), None)),
    }
}

impl MetadataEndpointAddressProvider for HostHeaderAddressProvider {
    fn resolve(&self, request: &RequestContext, listen_uri: &Uri) -> Option<BaseAddress> {
        let (host, explicit_port) = split_host_header(request.host_header.as_deref()?)?;
        let scheme = request.scheme.to_ascii_lowercase();
        let port = explicit_port
            .or_else(|| self.default_ports.get(&scheme))
            .or_else(|| listen_uri.port_u16());
        Some(BaseAddress { scheme, host, port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listen() -> Uri {
        "http://10.0.0.5:8080/orders?wsdl".parse().unwrap()
    }

    fn request(host: Option<&str>) -> RequestContext {
        RequestContext::new("http", host.map(str::to_string), listen())
    }

    fn provider() -> HostHeaderAddressProvider {
        let mut ports = DefaultPortTable::new();
        ports.insert("http", 8000);
        HostHeaderAddressProvider::new(ports)
    }

    #[test]
    fn explicit_port_is_used_verbatim() {
        let resolved = provider().resolve(&request(Some("example.com:9090")), &listen()).unwrap();
        assert_eq!(resolved.to_string(), "http://example.com:9090");
    }

    #[test]
    fn missing_port_uses_default_table() {
        let resolved = provider().resolve(&request(Some("example.com")), &listen()).unwrap();
        assert_eq!(resolved.port, Some(8000));
        let rebased = resolved.rebase(&listen()).unwrap();
        assert_eq!(rebased.to_string(), "http://example.com:8000/orders?wsdl");
    }

    #[test]
    fn missing_header_means_no_override() {
        assert!(provider().resolve(&request(None), &listen()).is_none());
        assert!(provider().resolve(&request(Some("  ")), &listen()).is_none());
    }

    #[test]
    fn scheme_missing_from_table_falls_back_to_listen_port() {
        let provider = HostHeaderAddressProvider::new(DefaultPortTable::new());
        let resolved = provider.resolve(&request(Some("example.com")), &listen()).unwrap();
        assert_eq!(resolved.port, Some(8080));
    }

    #[test]
    fn ipv6_hosts_keep_brackets() {
        let resolved = provider().resolve(&request(Some("[::1]:9443")), &listen()).unwrap();
        assert_eq!(resolved.host, "::1");
        assert_eq!(resolved.port, Some(9443));
        assert_eq!(
            resolved.rebase(&listen()).unwrap().to_string(),
            "http://[::1]:9443/orders?wsdl"
        );
    }

    #[test]
    fn wildcard_listener_is_rebased_onto_host_header() {
        let listen: Uri = "http://0.0.0.0:8080/svc".parse().unwrap();
        let mut ports = DefaultPortTable::new();
        ports.insert("http", 80);
        let provider = HostHeaderAddressProvider::new(ports);
        let context = |host: Option<&str>| {
            RequestContext::new("http", host.map(str::to_string), listen.clone())
        };

        let resolved = provider.resolve(&context(Some("example.com")), &listen).unwrap();
        assert_eq!(resolved.to_string(), "http://example.com:80");
        assert_eq!(resolved.rebase(&listen).unwrap().to_string(), "http://example.com:80/svc");

        let resolved = provider.resolve(&context(Some("example.com:9000")), &listen).unwrap();
        assert_eq!(resolved.to_string(), "http://example.com:9000");

        assert!(provider.resolve(&context(None), &listen).is_none());

        let resolved = provider.resolve(&context(Some("[::1]:81")), &listen).unwrap();
        assert_eq!(resolved.rebase(&listen).unwrap().to_string(), "http://[::1]:81/svc");
    }

    #[test]
    fn malformed_port_is_no_override() {
        assert!(provider().resolve(&request(Some("example.com:http")), &listen()).is_none());
    }

    #[test]
    fn static_provider_ignores_request() {
        let provider =
            StaticAddressProvider::from_uri(&"https://public.example".parse().unwrap()).unwrap();
        let resolved = provider.resolve(&request(Some("other:1")), &listen()).unwrap();
        assert_eq!(
            resolved.rebase(&listen()).unwrap().to_string(),
            "https://public.example/orders?wsdl"
        );
    }

    #[test]
    fn context_from_request_parts() {
        let (parts, ()) = http::Request::builder()
            .uri("/orders")
            .header(HOST, "shop.example:81")
            .body(())
            .unwrap()
            .into_parts();
        let context = RequestContext::from_parts(&parts, listen());
        assert_eq!(context.scheme, "http");
        assert_eq!(context.host_header.as_deref(), Some("shop.example:81"));
    }

    #[test]
    fn default_port_table_normalizes_schemes() {
        let table: DefaultPortTable = serde_json::from_str(r#"{"HTTP": 8081}"#).unwrap();
        assert_eq!(table.get("http"), Some(8081));
        let standard = DefaultPortTable::with_standard_ports();
        assert_eq!(standard.get("HTTPS"), Some(443));
    }
}
