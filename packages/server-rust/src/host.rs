//! Building a service description from configuration and opening it.

use std::collections::HashMap;
use std::sync::Arc;

use servicemodel_core::behavior::IntoBehavior;
use servicemodel_core::metadata::exchange::METADATA_EXCHANGE_CONTRACT;
use servicemodel_core::metadata::MEX_NAMESPACE;
use servicemodel_core::{
    BindingParameterCollection, ContractDescription, DescriptionError, ServiceBehavior,
    ServiceDescription, ServiceEndpoint, ServiceHostRuntime,
};
use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::behaviors::{
    ServiceAuthorizationBehavior, ServiceDebugBehavior, ServiceMetadataBehavior,
    SessionContractBehavior, StaticMetadataAddressBehavior,
    UseRequestHeadersForMetadataAddressBehavior,
};
use crate::config::{BindingRegistry, ConfigError, ConfigLoader, ContractRegistry, ServiceConfig};
use crate::dispatcher::{DispatcherBuilder, EndpointParameters, PipelineError};
use crate::extension::ServiceMetadataExtension;

const MEX_BINDING: &str = "mexHttpBinding";

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Description(#[from] DescriptionError),

    #[error("failed to open service host: {0}")]
    Pipeline(#[from] PipelineError),
}

fn is_metadata_contract(contract: &ContractDescription) -> bool {
    contract.name().decoded() == METADATA_EXCHANGE_CONTRACT && contract.namespace() == MEX_NAMESPACE
}

/// Turns a [`ServiceConfig`] into a [`ServiceHost`] ready to open.
pub struct ServiceHostBuilder {
    config: ServiceConfig,
    contracts: ContractRegistry,
    bindings: BindingRegistry,
}

impl ServiceHostBuilder {
    #[must_use]
    pub fn new(
        config: ServiceConfig,
        contracts: ContractRegistry,
        bindings: BindingRegistry,
    ) -> Self {
        Self {
            config,
            contracts,
            bindings,
        }
    }

    /// Resolves every configured contract and binding, creates the endpoints
    /// and attaches the behaviors the configuration asks for.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Config`] naming the missing contract or binding or
    /// the malformed address, or [`HostError::Description`] for duplicate
    /// endpoint names.
    pub fn build(self) -> Result<ServiceHost, HostError> {
        let config = &self.config;
        let mut service = ServiceDescription::new(&config.name, &config.namespace)?;
        let mut contracts: HashMap<String, Arc<ContractDescription>> = HashMap::new();

        for endpoint_config in &config.endpoints {
            let contract = self.contract(&mut contracts, &endpoint_config.contract)?;
            let binding = ConfigLoader::lookup_binding(
                &self.bindings,
                &endpoint_config.binding,
                &config.name,
            )?;
            let address =
                ConfigLoader::resolve_address(&config.base_address, &endpoint_config.address)?;

            let mut endpoint = ServiceEndpoint::new(contract, binding, address);
            endpoint.is_system_endpoint = is_metadata_contract(&endpoint.contract);
            if let Some(name) = &endpoint_config.name {
                endpoint.set_name(name)?;
            }
            if let Some(listen_uri) = &endpoint_config.listen_uri {
                let listen = ConfigLoader::resolve_address(&config.base_address, listen_uri)?;
                endpoint.listen_uri = Some(listen.uri().clone());
            }
            if let Some(metadata_address) = &endpoint_config.metadata_address {
                let uri = ConfigLoader::validate_url(
                    "metadata_address",
                    metadata_address,
                    &["http", "https"],
                )?;
                endpoint.behaviors.add(StaticMetadataAddressBehavior::new(uri))?;
            }
            debug!(endpoint = endpoint.name(), address = %endpoint.address, "configured endpoint");
            service.add_endpoint(endpoint)?;
        }

        if let Some(metadata) = &config.metadata {
            service.behaviors.add(ServiceMetadataBehavior::from_config(metadata)?)?;
            if metadata.use_request_headers {
                service.behaviors.add(UseRequestHeadersForMetadataAddressBehavior::new(
                    metadata.default_ports.clone(),
                ))?;
            }
            if let Some(mex_address) = &metadata.mex_address {
                let contract = self.contract(&mut contracts, METADATA_EXCHANGE_CONTRACT)?;
                let binding =
                    ConfigLoader::lookup_binding(&self.bindings, MEX_BINDING, &config.name)?;
                let address = ConfigLoader::resolve_address(&config.base_address, mex_address)?;
                let mut endpoint = ServiceEndpoint::new(contract, binding, address);
                endpoint.is_system_endpoint = true;
                service.add_endpoint(endpoint)?;
            }
        }
        if let Some(debug) = &config.debug {
            service.behaviors.add(ServiceDebugBehavior::from(debug))?;
        }
        if let Some(authorization) = &config.authorization {
            service.behaviors.add(ServiceAuthorizationBehavior::from(authorization))?;
        }

        Ok(ServiceHost { description: service })
    }

    /// One shared contract per configuration name, with session checking attached.
    fn contract(
        &self,
        cache: &mut HashMap<String, Arc<ContractDescription>>,
        name: &str,
    ) -> Result<Arc<ContractDescription>, HostError> {
        if let Some(contract) = cache.get(name) {
            return Ok(Arc::clone(contract));
        }
        let mut contract = ConfigLoader::lookup_contract(&self.contracts, name, &self.config.name)?;
        if !contract.behaviors.contains::<SessionContractBehavior>() {
            contract.behaviors.add(SessionContractBehavior)?;
        }
        let contract = Arc::new(contract);
        cache.insert(name.to_string(), Arc::clone(&contract));
        Ok(contract)
    }
}

/// A service description that can still be changed before it is opened.
#[derive(Debug)]
pub struct ServiceHost {
    description: ServiceDescription,
}

impl ServiceHost {
    #[must_use]
    pub fn new(description: ServiceDescription) -> Self {
        Self { description }
    }

    #[must_use]
    pub fn description(&self) -> &ServiceDescription {
        &self.description
    }

    pub fn description_mut(&mut self) -> &mut ServiceDescription {
        &mut self.description
    }

    /// # Errors
    ///
    /// Returns [`DescriptionError::DuplicateBehavior`] if one of the same type is attached.
    pub fn add_service_behavior<T>(&mut self, behavior: T) -> Result<(), HostError>
    where
        T: IntoBehavior<dyn ServiceBehavior>,
    {
        self.description.behaviors.add(behavior)?;
        Ok(())
    }

    /// Runs the behavior pipeline and freezes the description.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Pipeline`] for the first failing behavior.
    pub fn open(self) -> Result<OpenedServiceHost, HostError> {
        let span = info_span!("open_service_host", service = %self.description.name());
        let _enter = span.enter();

        let initialized = DispatcherBuilder::initialize_service_host(&self.description)?;
        info!(
            endpoints = self.description.endpoints.len(),
            behaviors = self.description.behaviors.len(),
            "service host opened"
        );
        Ok(OpenedServiceHost {
            description: Arc::new(self.description),
            runtime: Arc::new(initialized.runtime),
            binding_parameters: Arc::new(initialized.binding_parameters),
        })
    }
}

/// An opened host: description and runtime are read-only from here on and
/// may be shared across request tasks.
#[derive(Debug, Clone)]
pub struct OpenedServiceHost {
    description: Arc<ServiceDescription>,
    runtime: Arc<ServiceHostRuntime>,
    binding_parameters: Arc<Vec<EndpointParameters>>,
}

impl OpenedServiceHost {
    #[must_use]
    pub fn description(&self) -> &Arc<ServiceDescription> {
        &self.description
    }

    #[must_use]
    pub fn runtime(&self) -> &Arc<ServiceHostRuntime> {
        &self.runtime
    }

    #[must_use]
    pub fn binding_parameters(&self, endpoint_name: &str) -> Option<&BindingParameterCollection> {
        self.binding_parameters
            .iter()
            .find(|p| p.endpoint_name == endpoint_name)
            .map(|p| &p.parameters)
    }

    /// Present when a metadata behavior ran during open.
    #[must_use]
    pub fn metadata_extension(&self) -> Option<Arc<ServiceMetadataExtension>> {
        self.runtime.extensions.find::<ServiceMetadataExtension>()
    }

    /// Endpoints serving the metadata exchange contract.
    pub fn metadata_endpoints(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.description
            .endpoints
            .iter()
            .filter(|e| is_metadata_contract(&e.contract))
    }

    /// Endpoints other than system endpoints.
    pub fn application_endpoints(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.description
            .endpoints
            .iter()
            .filter(|e| !e.is_system_endpoint)
    }
}
