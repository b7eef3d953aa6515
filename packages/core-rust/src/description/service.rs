use std::sync::Arc;

use crate::behavior::{BehaviorCollection, ServiceBehavior};
use crate::error::DescriptionError;
use crate::naming::{QualifiedName, XmlName};

use super::contract::ContractDescription;
use super::endpoint::ServiceEndpoint;

/// Root of the description graph.
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    key: QualifiedName,
    configuration_name: String,
    pub behaviors: BehaviorCollection<dyn ServiceBehavior>,
    pub endpoints: Vec<ServiceEndpoint>,
}

impl ServiceDescription {
    /// # Errors
    ///
    /// Fails on an empty name or a malformed namespace.
    pub fn new(name: &str, namespace: &str) -> Result<Self, DescriptionError> {
        Ok(Self {
            key: QualifiedName::new(XmlName::new(name)?, namespace)?,
            configuration_name: name.to_string(),
            behaviors: BehaviorCollection::new(),
            endpoints: Vec::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &XmlName {
        &self.key.name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    #[must_use]
    pub fn configuration_name(&self) -> &str {
        &self.configuration_name
    }

    /// # Errors
    ///
    /// Fails on an empty name.
    pub fn set_configuration_name(&mut self, name: &str) -> Result<(), DescriptionError> {
        if name.is_empty() {
            return Err(DescriptionError::EmptyName {
                field: "configuration_name",
            });
        }
        self.configuration_name = name.to_string();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`DescriptionError::DuplicateKey`] when an endpoint with the same
    /// name exists.
    pub fn add_endpoint(&mut self, endpoint: ServiceEndpoint) -> Result<(), DescriptionError> {
        if self.find_endpoint(endpoint.name()).is_some() {
            return Err(DescriptionError::DuplicateKey {
                collection: "endpoints",
                key: endpoint.name().to_string(),
            });
        }
        self.endpoints.push(endpoint);
        Ok(())
    }

    #[must_use]
    pub fn find_endpoint(&self, name: &str) -> Option<&ServiceEndpoint> {
        self.endpoints.iter().find(|e| e.name() == name)
    }

    /// Distinct contracts exposed by the endpoints, in endpoint order.
    #[must_use]
    pub fn contracts(&self) -> Vec<Arc<ContractDescription>> {
        let mut seen: Vec<Arc<ContractDescription>> = Vec::new();
        for endpoint in &self.endpoints {
            if !seen.iter().any(|c| c.key() == endpoint.contract.key()) {
                seen.push(Arc::clone(&endpoint.contract));
            }
        }
        seen
    }
}
