//! Metadata publishing behaviors.

use std::sync::Arc;

use servicemodel_core::metadata::exchange::METADATA_EXCHANGE_CONTRACT;
use servicemodel_core::metadata::{
    DefaultPortTable, HostHeaderAddressProvider, MetadataLocation, MEX_NAMESPACE,
};
use servicemodel_core::{ServiceBehavior, ServiceDescription, ServiceHostRuntime};
use tracing::{debug, warn};

use crate::config::{ConfigError, ConfigLoader, MetadataConfig};
use crate::extension::{MetadataSettings, ServiceMetadataExtension};

/// Enables metadata publishing and installs the [`ServiceMetadataExtension`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceMetadataBehavior {
    pub http_get_enabled: bool,
    pub http_get_url: Option<String>,
    pub https_get_enabled: bool,
    pub https_get_url: Option<String>,
    pub external_metadata_location: Option<MetadataLocation>,
}

impl ServiceMetadataBehavior {
    /// # Errors
    ///
    /// Returns [`ConfigError::Description`] for a malformed external location.
    pub fn from_config(config: &MetadataConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http_get_enabled: config.http_get_enabled,
            http_get_url: config.http_get_url.clone(),
            https_get_enabled: config.https_get_enabled,
            https_get_url: config.https_get_url.clone(),
            external_metadata_location: config
                .external_metadata_location
                .as_deref()
                .map(MetadataLocation::new)
                .transpose()?,
        })
    }

    fn settings(&self) -> Result<MetadataSettings, ConfigError> {
        Ok(MetadataSettings {
            http_get_enabled: self.http_get_enabled,
            http_get_url: self
                .http_get_url
                .as_deref()
                .map(|url| ConfigLoader::validate_url("http_get_url", url, &["http"]))
                .transpose()?,
            https_get_enabled: self.https_get_enabled,
            https_get_url: self
                .https_get_url
                .as_deref()
                .map(|url| ConfigLoader::validate_url("https_get_url", url, &["https"]))
                .transpose()?,
            external_metadata_location: self.external_metadata_location.clone(),
        })
    }
}

fn is_metadata_contract(name: &str, namespace: &str) -> bool {
    name == METADATA_EXCHANGE_CONTRACT && namespace == MEX_NAMESPACE
}

impl ServiceBehavior for ServiceMetadataBehavior {
    fn name(&self) -> &'static str {
        "ServiceMetadataBehavior"
    }

    fn validate(&self, service: &ServiceDescription) -> anyhow::Result<()> {
        self.settings()?;
        let has_mex = service.endpoints.iter().any(|e| {
            is_metadata_contract(e.contract.name().decoded(), e.contract.namespace())
        });
        if !has_mex && !self.http_get_enabled && !self.https_get_enabled {
            warn!(
                service = %service.name(),
                "metadata behavior attached but nothing publishes metadata"
            );
        }
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        service: &ServiceDescription,
        host: &mut ServiceHostRuntime,
    ) -> anyhow::Result<()> {
        let extension = host
            .extensions
            .get_or_insert_with(ServiceMetadataExtension::new);
        extension.set_settings(self.settings()?);

        let mut marked = 0usize;
        for dispatcher in &mut host.endpoints {
            if is_metadata_contract(&dispatcher.contract_name, &dispatcher.contract_namespace) {
                dispatcher.is_system_endpoint = true;
                marked += 1;
            }
        }
        debug!(
            service = %service.name(),
            metadata_endpoints = marked,
            "installed metadata extension"
        );
        Ok(())
    }
}

/// Advertises the host each client addressed instead of the listen address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UseRequestHeadersForMetadataAddressBehavior {
    pub default_ports: DefaultPortTable,
}

impl UseRequestHeadersForMetadataAddressBehavior {
    #[must_use]
    pub fn new(default_ports: DefaultPortTable) -> Self {
        Self { default_ports }
    }
}

impl ServiceBehavior for UseRequestHeadersForMetadataAddressBehavior {
    fn name(&self) -> &'static str {
        "UseRequestHeadersForMetadataAddressBehavior"
    }

    fn apply_dispatch_behavior(
        &self,
        _service: &ServiceDescription,
        host: &mut ServiceHostRuntime,
    ) -> anyhow::Result<()> {
        let extension = host
            .extensions
            .get_or_insert_with(ServiceMetadataExtension::new);
        let provider = HostHeaderAddressProvider::new(self.default_ports.clone());
        if !extension.set_host_header_provider(Arc::new(provider)) {
            anyhow::bail!("a host-header address provider is already installed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use servicemodel_core::metadata::exchange::metadata_exchange_contract;
    use servicemodel_core::metadata::RequestContext;
    use servicemodel_core::{
        Binding, ContractBuilder, EndpointAddress, OperationBuilder, ServiceEndpoint,
    };

    use super::*;

    fn service() -> ServiceDescription {
        let mut service = ServiceDescription::new("Orders", "urn:shop").unwrap();
        let orders = ContractBuilder::new("IOrders")
            .operation(OperationBuilder::new("Get"))
            .build()
            .unwrap();
        service
            .add_endpoint(ServiceEndpoint::new(
                Arc::new(orders),
                Arc::new(Binding::basic_http().unwrap()),
                EndpointAddress::new("http://10.0.0.1:8080/orders").unwrap(),
            ))
            .unwrap();
        service
            .add_endpoint(ServiceEndpoint::new(
                Arc::new(metadata_exchange_contract().unwrap()),
                Arc::new(Binding::mex_http().unwrap()),
                EndpointAddress::new("http://10.0.0.1:8080/mex").unwrap(),
            ))
            .unwrap();
        service
    }

    #[test]
    fn installs_extension_and_marks_mex_endpoints() {
        let service = service();
        let mut host = ServiceHostRuntime::for_service(&service);
        let behavior = ServiceMetadataBehavior {
            http_get_enabled: true,
            http_get_url: Some("http://public/wsdl".into()),
            ..ServiceMetadataBehavior::default()
        };
        behavior.validate(&service).unwrap();
        behavior.apply_dispatch_behavior(&service, &mut host).unwrap();

        let extension = host.extensions.find::<ServiceMetadataExtension>().unwrap();
        let settings = extension.settings();
        assert!(settings.http_get_enabled);
        assert_eq!(settings.http_get_url.as_ref().unwrap().host(), Some("public"));
        assert!(!host.endpoints[0].is_system_endpoint);
        assert!(host.endpoints[1].is_system_endpoint);
    }

    #[test]
    fn get_url_schemes_are_validated() {
        let behavior = ServiceMetadataBehavior {
            https_get_url: Some("http://public/wsdl".into()),
            ..ServiceMetadataBehavior::default()
        };
        let err = behavior.validate(&service()).unwrap_err();
        let config = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(config, ConfigError::InvalidUrlScheme { field: "https_get_url", .. }));
    }

    #[test]
    fn external_location_comes_from_config() {
        let config = MetadataConfig {
            external_metadata_location: Some("/static/service.wsdl".into()),
            ..MetadataConfig::default()
        };
        let behavior = ServiceMetadataBehavior::from_config(&config).unwrap();
        assert_eq!(
            behavior.external_metadata_location.unwrap().location(),
            "/static/service.wsdl"
        );

        let bad = MetadataConfig {
            external_metadata_location: Some("not a uri".into()),
            ..MetadataConfig::default()
        };
        assert!(ServiceMetadataBehavior::from_config(&bad).is_err());
    }

    #[test]
    fn request_headers_behavior_installs_provider() {
        let service = service();
        let mut host = ServiceHostRuntime::for_service(&service);
        let ports = DefaultPortTable::with_standard_ports();
        let behavior = UseRequestHeadersForMetadataAddressBehavior::new(ports);
        behavior.apply_dispatch_behavior(&service, &mut host).unwrap();

        let extension = host.extensions.find::<ServiceMetadataExtension>().unwrap();
        assert!(extension.has_host_header_provider());
        let context = RequestContext::new(
            "http",
            Some("shop.example".into()),
            "http://10.0.0.1:8080/mex".parse().unwrap(),
        );
        let resolved = extension
            .resolve_endpoint_address(&service.endpoints[0], &context)
            .unwrap();
        assert_eq!(resolved.to_string(), "http://shop.example:80/orders");

        // A second installation on the same host is rejected.
        assert!(behavior.apply_dispatch_behavior(&service, &mut host).is_err());
    }
}
