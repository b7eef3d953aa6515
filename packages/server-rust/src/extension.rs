//! Host extension that publishes metadata and resolves advertised addresses.

use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use http::Uri;
use servicemodel_core::metadata::{
    MetadataEndpointAddressProvider, MetadataLocation, RequestContext,
};
use servicemodel_core::{DescriptionError, ServiceEndpoint};
use tracing::debug;

/// Metadata publishing switches installed by the metadata behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSettings {
    pub http_get_enabled: bool,
    pub http_get_url: Option<Uri>,
    pub https_get_enabled: bool,
    pub https_get_url: Option<Uri>,
    pub external_metadata_location: Option<MetadataLocation>,
}

/// Installed once per host into [`HostExtensions`](servicemodel_core::HostExtensions).
///
/// Providers are registered while the pipeline runs and only read afterwards.
/// Address resolution consults, in order: the provider registered for the
/// endpoint's address path, the service-wide host-header provider, and finally
/// the endpoint's listen URI. Nothing is cached between requests.
#[derive(Debug, Default)]
pub struct ServiceMetadataExtension {
    providers: DashMap<String, Arc<dyn MetadataEndpointAddressProvider>>,
    host_header_provider: OnceLock<Arc<dyn MetadataEndpointAddressProvider>>,
    settings: ArcSwap<MetadataSettings>,
}

impl ServiceMetadataExtension {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` for endpoints whose address path is `path`.
    /// The first registration for a path wins; returns `false` if one existed.
    pub fn register_provider(
        &self,
        path: &str,
        provider: Arc<dyn MetadataEndpointAddressProvider>,
    ) -> bool {
        let mut inserted = false;
        self.providers.entry(path.to_string()).or_insert_with(|| {
            inserted = true;
            provider
        });
        if inserted {
            debug!(path, "registered metadata address provider");
        }
        inserted
    }

    #[must_use]
    pub fn provider_for(&self, path: &str) -> Option<Arc<dyn MetadataEndpointAddressProvider>> {
        self.providers.get(path).map(|p| Arc::clone(p.value()))
    }

    /// Installs the service-wide provider. Returns `false` if one was already set.
    pub fn set_host_header_provider(
        &self,
        provider: Arc<dyn MetadataEndpointAddressProvider>,
    ) -> bool {
        self.host_header_provider.set(provider).is_ok()
    }

    #[must_use]
    pub fn has_host_header_provider(&self) -> bool {
        self.host_header_provider.get().is_some()
    }

    #[must_use]
    pub fn settings(&self) -> Arc<MetadataSettings> {
        self.settings.load_full()
    }

    pub fn set_settings(&self, settings: MetadataSettings) {
        self.settings.store(Arc::new(settings));
    }

    /// The address to advertise for `endpoint` to the client behind `request`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::InvalidAddress`] if a provider produces a base
    /// address that cannot be combined with the listen URI.
    pub fn resolve_endpoint_address(
        &self,
        endpoint: &ServiceEndpoint,
        request: &RequestContext,
    ) -> Result<Uri, DescriptionError> {
        let listen_uri = endpoint.listen_uri();
        let explicit = self
            .provider_for(endpoint.address.path())
            .and_then(|p| p.resolve(request, listen_uri));
        let resolved = explicit.or_else(|| {
            self.host_header_provider
                .get()
                .and_then(|p| p.resolve(request, listen_uri))
        });
        match resolved {
            Some(base) => base.rebase(listen_uri),
            None => Ok(listen_uri.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use servicemodel_core::metadata::{
        BaseAddress, DefaultPortTable, HostHeaderAddressProvider, StaticAddressProvider,
    };
    use servicemodel_core::{Binding, ContractBuilder, EndpointAddress, OperationBuilder};

    use super::*;

    fn endpoint() -> ServiceEndpoint {
        let contract = ContractBuilder::new("IOrders")
            .operation(OperationBuilder::new("Get"))
            .build()
            .unwrap();
        ServiceEndpoint::new(
            Arc::new(contract),
            Arc::new(Binding::basic_http().unwrap()),
            EndpointAddress::new("http://10.0.0.5:8080/orders").unwrap(),
        )
    }

    fn request(host: Option<&str>) -> RequestContext {
        RequestContext::new(
            "http",
            host.map(str::to_string),
            "http://10.0.0.5:8080/mex".parse().unwrap(),
        )
    }

    fn host_header_provider() -> Arc<dyn MetadataEndpointAddressProvider> {
        Arc::new(HostHeaderAddressProvider::new(DefaultPortTable::with_standard_ports()))
    }

    fn static_provider(uri: &str) -> Arc<dyn MetadataEndpointAddressProvider> {
        Arc::new(StaticAddressProvider::from_uri(&uri.parse().unwrap()).unwrap())
    }

    #[test]
    fn listen_uri_without_providers() {
        let extension = ServiceMetadataExtension::new();
        let resolved = extension
            .resolve_endpoint_address(&endpoint(), &request(Some("public.example")))
            .unwrap();
        assert_eq!(resolved.to_string(), "http://10.0.0.5:8080/orders");
    }

    #[test]
    fn host_header_overrides_listen_uri() {
        let extension = ServiceMetadataExtension::new();
        assert!(extension.set_host_header_provider(host_header_provider()));
        assert!(!extension.set_host_header_provider(host_header_provider()));

        let resolved = extension
            .resolve_endpoint_address(&endpoint(), &request(Some("public.example")))
            .unwrap();
        assert_eq!(resolved.to_string(), "http://public.example:80/orders");

        let no_header = extension
            .resolve_endpoint_address(&endpoint(), &request(None))
            .unwrap();
        assert_eq!(no_header.to_string(), "http://10.0.0.5:8080/orders");
    }

    #[test]
    fn explicit_provider_wins() {
        let extension = ServiceMetadataExtension::new();
        extension.set_host_header_provider(host_header_provider());
        assert!(extension.register_provider("/orders", static_provider("https://api.example")));
        assert!(!extension.register_provider("/orders", static_provider("https://other.example")));

        let resolved = extension
            .resolve_endpoint_address(&endpoint(), &request(Some("public.example:81")))
            .unwrap();
        assert_eq!(resolved.to_string(), "https://api.example/orders");
    }

    #[test]
    fn resolution_is_per_request() {
        let extension = ServiceMetadataExtension::new();
        extension.set_host_header_provider(host_header_provider());
        let ep = endpoint();
        let a = extension
            .resolve_endpoint_address(&ep, &request(Some("a.example")))
            .unwrap();
        let b = extension
            .resolve_endpoint_address(&ep, &request(Some("b.example:9000")))
            .unwrap();
        assert_eq!(a.host(), Some("a.example"));
        assert_eq!(b.port_u16(), Some(9000));
    }

    #[test]
    fn settings_are_replaced_whole() {
        let extension = ServiceMetadataExtension::new();
        assert!(!extension.settings().http_get_enabled);
        extension.set_settings(MetadataSettings {
            http_get_enabled: true,
            ..MetadataSettings::default()
        });
        assert!(extension.settings().http_get_enabled);
    }

    proptest! {
        #[test]
        fn explicit_port_in_host_header_is_kept(host in "[a-z]{1,12}\\.example", port in 1u16..) {
            let extension = ServiceMetadataExtension::new();
            extension.set_host_header_provider(host_header_provider());
            let header = format!("{host}:{port}");
            let resolved = extension
                .resolve_endpoint_address(&endpoint(), &request(Some(&header)))
                .unwrap();
            prop_assert_eq!(resolved.port_u16(), Some(port));
            prop_assert_eq!(resolved.host(), Some(host.as_str()));
            prop_assert_eq!(resolved.path(), "/orders");
        }

        #[test]
        fn static_provider_ignores_host_header(host in "[a-z]{1,12}(:[0-9]{1,4})?") {
            let extension = ServiceMetadataExtension::new();
            extension.set_host_header_provider(host_header_provider());
            extension.register_provider(
                "/orders",
                Arc::new(StaticAddressProvider::new(BaseAddress {
                    scheme: "https".into(),
                    host: "fixed.example".into(),
                    port: Some(8443),
                })),
            );
            let resolved = extension
                .resolve_endpoint_address(&endpoint(), &request(Some(&host)))
                .unwrap();
            prop_assert_eq!(resolved.to_string(), "https://fixed.example:8443/orders");
        }
    }
}
