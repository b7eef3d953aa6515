//! Host configuration loaded from JSON, plus the contract and binding
//! registries that configuration names are resolved against.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use http::Uri;
use serde::{Deserialize, Serialize};
use servicemodel_core::metadata::exchange::{metadata_exchange_contract, METADATA_EXCHANGE_CONTRACT};
use servicemodel_core::metadata::DefaultPortTable;
use servicemodel_core::runtime::PrincipalPermissionMode;
use servicemodel_core::{
    Binding, ContractDescription, DescriptionError, EndpointAddress, DEFAULT_NAMESPACE,
};
use thiserror::Error;

use crate::network::NetworkConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("contract '{contract}' referenced by service '{service}' is not registered")]
    ContractNotFound { contract: String, service: String },

    #[error("binding '{binding}' referenced by service '{service}' is not registered")]
    BindingNotFound { binding: String, service: String },

    #[error("{field} '{url}' must use the {expected} scheme")]
    InvalidUrlScheme {
        field: &'static str,
        url: String,
        expected: String,
    },

    #[error("{field} '{value}' is not a valid address")]
    InvalidAddress { field: &'static str, value: String },

    #[error(transparent)]
    Description(#[from] DescriptionError),
}

/// Root of a host configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub service: ServiceConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub namespace: String,
    /// Absolute base that relative endpoint addresses are resolved against.
    pub base_address: String,
    pub endpoints: Vec<EndpointConfig>,
    pub metadata: Option<MetadataConfig>,
    pub debug: Option<DebugConfig>,
    pub authorization: Option<AuthorizationConfig>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "Service".to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            base_address: "http://localhost:8080".to_string(),
            endpoints: Vec::new(),
            metadata: None,
            debug: None,
            authorization: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Overrides the generated `{binding}_{contract}` name.
    pub name: Option<String>,
    /// Absolute, or relative to the service base address.
    pub address: String,
    pub binding: String,
    pub contract: String,
    pub listen_uri: Option<String>,
    /// Fixed address advertised in metadata for this endpoint.
    pub metadata_address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub http_get_enabled: bool,
    pub http_get_url: Option<String>,
    pub https_get_enabled: bool,
    pub https_get_url: Option<String>,
    pub external_metadata_location: Option<String>,
    /// Address of the metadata exchange endpoint, relative to the base address.
    pub mex_address: Option<String>,
    /// Advertise the host named in each request's `Host` header.
    pub use_request_headers: bool,
    pub default_ports: DefaultPortTable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub include_exception_detail_in_faults: bool,
    pub http_help_page_enabled: bool,
    pub http_help_page_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    pub principal_permission_mode: PrincipalPermissionMode,
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

/// Contracts known to the host, keyed by configuration name.
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, ContractDescription>,
}

impl ContractRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `contract` under its configuration name, replacing any
    /// earlier registration.
    pub fn register(&mut self, contract: ContractDescription) {
        self.contracts
            .insert(contract.configuration_name().to_string(), contract);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ContractDescription> {
        self.contracts.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// Bindings known to the host, keyed by configuration name.
#[derive(Debug, Clone, Default)]
pub struct BindingRegistry {
    bindings: HashMap<String, Arc<Binding>>,
}

impl BindingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `basicHttpBinding`, `basicHttpsBinding`, `wsHttpBinding` and `mexHttpBinding`.
    ///
    /// # Errors
    ///
    /// Propagates [`DescriptionError`] from the stock binding constructors.
    pub fn with_defaults() -> Result<Self, DescriptionError> {
        let mut registry = Self::new();
        registry.register("basicHttpBinding", Binding::basic_http()?);
        registry.register("basicHttpsBinding", Binding::basic_https()?);
        registry.register("wsHttpBinding", Binding::ws_http()?);
        registry.register("mexHttpBinding", Binding::mex_http()?);
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, binding: Binding) {
        self.bindings.insert(name.to_string(), Arc::new(binding));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Binding>> {
        self.bindings.get(name).cloned()
    }
}

// ---------------------------------------------------------------------------
// ConfigLoader
// ---------------------------------------------------------------------------

pub struct ConfigLoader;

impl ConfigLoader {
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_path(path: &Path) -> Result<HostConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or mistyped fields.
    pub fn parse(text: &str) -> Result<HostConfig, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Resolves a contract by configuration name. The metadata exchange
    /// contract is always available.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ContractNotFound`] naming the contract and service.
    pub fn lookup_contract(
        registry: &ContractRegistry,
        name: &str,
        service: &str,
    ) -> Result<ContractDescription, ConfigError> {
        if let Some(contract) = registry.get(name) {
            return Ok(contract.clone());
        }
        if name == METADATA_EXCHANGE_CONTRACT {
            return Ok(metadata_exchange_contract()?);
        }
        Err(ConfigError::ContractNotFound {
            contract: name.to_string(),
            service: service.to_string(),
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::BindingNotFound`] naming the binding and service.
    pub fn lookup_binding(
        registry: &BindingRegistry,
        name: &str,
        service: &str,
    ) -> Result<Arc<Binding>, ConfigError> {
        registry.get(name).ok_or_else(|| ConfigError::BindingNotFound {
            binding: name.to_string(),
            service: service.to_string(),
        })
    }

    /// Parses `url` as an absolute URI whose scheme is one of `expected`
    /// (compared case-insensitively).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `url` is not absolute, or
    /// [`ConfigError::InvalidUrlScheme`] if its scheme is not accepted.
    pub fn validate_url(
        field: &'static str,
        url: &str,
        expected: &'static [&'static str],
    ) -> Result<Uri, ConfigError> {
        let invalid = || ConfigError::InvalidAddress {
            field,
            value: url.to_string(),
        };
        let uri: Uri = url.parse().map_err(|_| invalid())?;
        let scheme = uri.scheme_str().ok_or_else(invalid)?;
        if expected.iter().any(|e| e.eq_ignore_ascii_case(scheme)) {
            Ok(uri)
        } else {
            Err(ConfigError::InvalidUrlScheme {
                field,
                url: url.to_string(),
                expected: expected.join("|"),
            })
        }
    }

    /// Resolves an endpoint address against the service base address.
    /// Absolute addresses are used as given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Description`] if the result is not an absolute URI.
    pub fn resolve_address(base: &str, address: &str) -> Result<EndpointAddress, ConfigError> {
        if servicemodel_core::uri::is_absolute_uri(address) {
            return Ok(EndpointAddress::new(address)?);
        }
        let joined = match (base.trim_end_matches('/'), address.trim_start_matches('/')) {
            (base, "") => format!("{base}/"),
            (base, relative) => format!("{base}/{relative}"),
        };
        Ok(EndpointAddress::new(&joined)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use servicemodel_core::{ContractBuilder, OperationBuilder};

    use super::*;

    const SAMPLE: &str = r#"{
        "service": {
            "name": "OrderService",
            "namespace": "urn:shop",
            "base_address": "http://localhost:9000",
            "endpoints": [
                { "address": "orders", "binding": "basicHttpBinding", "contract": "IOrderService" }
            ],
            "metadata": {
                "http_get_enabled": true,
                "mex_address": "mex",
                "use_request_headers": true,
                "default_ports": { "http": 8080 }
            }
        },
        "network": { "port": 9000 }
    }"#;

    fn registry() -> ContractRegistry {
        let mut registry = ContractRegistry::new();
        registry.register(
            ContractBuilder::new("IOrderService")
                .operation(OperationBuilder::new("GetOrder").input("id", "int").output("Order"))
                .build()
                .unwrap(),
        );
        registry
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ConfigLoader::from_path(file.path()).unwrap();
        assert_eq!(config.service.name, "OrderService");
        assert_eq!(config.service.endpoints.len(), 1);
        let metadata = config.service.metadata.unwrap();
        assert!(metadata.http_get_enabled);
        assert!(metadata.use_request_headers);
        assert_eq!(metadata.default_ports.get("http"), Some(8080));
        assert_eq!(config.network.port, 9000);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = ConfigLoader::from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { path: p, .. } if p == path));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            ConfigLoader::parse(r#"{"service": {"endpoints": 3}}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = ConfigLoader::parse("{}").unwrap();
        assert_eq!(config.service.namespace, DEFAULT_NAMESPACE);
        assert!(config.service.metadata.is_none());
    }

    #[test]
    fn unknown_contract_names_contract_and_service() {
        let err =
            ConfigLoader::lookup_contract(&registry(), "IMissing", "OrderService").unwrap_err();
        match err {
            ConfigError::ContractNotFound { contract, service } => {
                assert_eq!(contract, "IMissing");
                assert_eq!(service, "OrderService");
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn mex_contract_is_always_known() {
        let registry = ContractRegistry::new();
        let contract = ConfigLoader::lookup_contract(&registry, "IMetadataExchange", "S").unwrap();
        assert!(contract.operations.find("Get").is_some());
    }

    #[test]
    fn default_bindings_are_registered() {
        let bindings = BindingRegistry::with_defaults().unwrap();
        let ws = ConfigLoader::lookup_binding(&bindings, "wsHttpBinding", "S").unwrap();
        assert_eq!(ws.name().decoded(), "WSHttpBinding");
        assert!(matches!(
            ConfigLoader::lookup_binding(&bindings, "netTcpBinding", "S"),
            Err(ConfigError::BindingNotFound { .. })
        ));
    }

    #[test]
    fn url_scheme_is_checked() {
        assert!(ConfigLoader::validate_url("http_get_url", "http://h/wsdl", &["http"]).is_ok());
        assert!(ConfigLoader::validate_url("http_get_url", "HTTP://h/wsdl", &["http"]).is_ok());

        let err =
            ConfigLoader::validate_url("https_get_url", "http://h/wsdl", &["https"]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidUrlScheme { field: "https_get_url", ref expected, .. }
                if expected == "https"
        ));

        let err =
            ConfigLoader::validate_url("http_help_page_url", "ftp://h/help", &["http", "https"])
                .unwrap_err();
        assert!(err.to_string().contains("http|https"));

        assert!(matches!(
            ConfigLoader::validate_url("http_get_url", "/relative", &["http"]),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn relative_addresses_join_the_base() {
        let joined = ConfigLoader::resolve_address("http://localhost:9000/", "/orders").unwrap();
        assert_eq!(joined.to_string(), "http://localhost:9000/orders");
        let root = ConfigLoader::resolve_address("http://localhost:9000", "").unwrap();
        assert_eq!(root.path(), "/");
        let absolute =
            ConfigLoader::resolve_address("http://localhost:9000", "https://other/x").unwrap();
        assert_eq!(absolute.to_string(), "https://other/x");
    }
}
