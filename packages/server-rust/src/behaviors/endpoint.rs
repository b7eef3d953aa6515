//! Endpoint-level behaviors.

use std::sync::Arc;

use http::Uri;
use servicemodel_core::metadata::{MetadataEndpointAddressProvider, StaticAddressProvider};
use servicemodel_core::{
    BindingParameterCollection, EndpointBehavior, EndpointDispatcher, SecurityCapabilities,
    ServiceEndpoint,
};
use tracing::debug;

use crate::extension::ServiceMetadataExtension;

fn register(
    endpoint: &ServiceEndpoint,
    dispatcher: &EndpointDispatcher,
    provider: Arc<dyn MetadataEndpointAddressProvider>,
) -> anyhow::Result<()> {
    let extension = dispatcher
        .extensions
        .get_or_insert_with(ServiceMetadataExtension::new);
    if !extension.register_provider(endpoint.address.path(), provider) {
        anyhow::bail!(
            "an address provider is already registered for path {}",
            endpoint.address.path()
        );
    }
    Ok(())
}

/// Advertises a fixed address for one endpoint.
#[derive(Debug, Clone)]
pub struct StaticMetadataAddressBehavior {
    address: Uri,
}

impl StaticMetadataAddressBehavior {
    #[must_use]
    pub fn new(address: Uri) -> Self {
        Self { address }
    }

    #[must_use]
    pub fn address(&self) -> &Uri {
        &self.address
    }
}

impl EndpointBehavior for StaticMetadataAddressBehavior {
    fn name(&self) -> &'static str {
        "StaticMetadataAddressBehavior"
    }

    fn validate(&self, _endpoint: &ServiceEndpoint) -> anyhow::Result<()> {
        StaticAddressProvider::from_uri(&self.address)?;
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        endpoint: &ServiceEndpoint,
        dispatcher: &mut EndpointDispatcher,
    ) -> anyhow::Result<()> {
        let provider = StaticAddressProvider::from_uri(&self.address)?;
        register(endpoint, dispatcher, Arc::new(provider))
    }
}

/// Registers any address provider for the endpoint's address path.
#[derive(Debug, Clone)]
pub struct MetadataAddressProviderBehavior {
    provider: Arc<dyn MetadataEndpointAddressProvider>,
}

impl MetadataAddressProviderBehavior {
    #[must_use]
    pub fn new(provider: Arc<dyn MetadataEndpointAddressProvider>) -> Self {
        Self { provider }
    }
}

impl EndpointBehavior for MetadataAddressProviderBehavior {
    fn name(&self) -> &'static str {
        "MetadataAddressProviderBehavior"
    }

    fn apply_dispatch_behavior(
        &self,
        endpoint: &ServiceEndpoint,
        dispatcher: &mut EndpointDispatcher,
    ) -> anyhow::Result<()> {
        register(endpoint, dispatcher, Arc::clone(&self.provider))
    }
}

/// Binding parameter telling the security layer to build a claims principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimsPrincipalParameter {
    pub requires_client_authentication: bool,
}

/// Propagates the caller's claims principal on bindings that carry security.
/// On bindings without [`SecurityCapabilities`] it does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClaimsPrincipalEndpointBehavior;

impl ClaimsPrincipalEndpointBehavior {
    fn capabilities(endpoint: &ServiceEndpoint) -> Option<Arc<SecurityCapabilities>> {
        let parameters = BindingParameterCollection::seeded_with(Arc::clone(&endpoint.binding));
        endpoint
            .binding
            .get_property::<SecurityCapabilities>(&parameters)
    }
}

impl EndpointBehavior for ClaimsPrincipalEndpointBehavior {
    fn name(&self) -> &'static str {
        "ClaimsPrincipalEndpointBehavior"
    }

    fn add_binding_parameters(
        &self,
        endpoint: &ServiceEndpoint,
        parameters: &mut BindingParameterCollection,
    ) -> anyhow::Result<()> {
        let Some(capabilities) = endpoint
            .binding
            .get_property::<SecurityCapabilities>(parameters)
        else {
            return Ok(());
        };
        parameters.add_once(ClaimsPrincipalParameter {
            requires_client_authentication: capabilities.supports_client_authentication,
        });
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        endpoint: &ServiceEndpoint,
        dispatcher: &mut EndpointDispatcher,
    ) -> anyhow::Result<()> {
        if Self::capabilities(endpoint).is_some() {
            dispatcher.dispatch_runtime.propagate_claims_principal = true;
            debug!(endpoint = endpoint.name(), "claims principal propagation enabled");
        }
        Ok(())
    }
}
