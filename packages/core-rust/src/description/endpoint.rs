use std::fmt;
use std::sync::Arc;

use http::Uri;

use crate::behavior::{BehaviorCollection, EndpointBehavior};
use crate::binding::Binding;
use crate::error::DescriptionError;
use crate::uri::is_absolute_uri;

use super::contract::ContractDescription;

/// Absolute address an endpoint is reachable at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
    uri: Uri,
}

impl EndpointAddress {
    /// # Errors
    ///
    /// Returns [`DescriptionError::InvalidAddress`] unless `address` is an
    /// absolute URI with an authority.
    pub fn new(address: &str) -> Result<Self, DescriptionError> {
        let invalid = || DescriptionError::InvalidAddress {
            address: address.to_string(),
        };
        if !is_absolute_uri(address) {
            return Err(invalid());
        }
        let uri: Uri = address.parse().map_err(|_| invalid())?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(invalid());
        }
        Ok(Self { uri })
    }

    #[must_use]
    pub fn from_uri(uri: Uri) -> Self {
        Self { uri }
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri)
    }
}

/// Address + binding + contract.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    name: String,
    pub address: EndpointAddress,
    pub listen_uri: Option<Uri>,
    pub binding: Arc<Binding>,
    pub contract: Arc<ContractDescription>,
    pub behaviors: BehaviorCollection<dyn EndpointBehavior>,
    pub is_system_endpoint: bool,
}

impl ServiceEndpoint {
    /// The endpoint name defaults to `{binding}_{contract}`.
    #[must_use]
    pub fn new(
        contract: Arc<ContractDescription>,
        binding: Arc<Binding>,
        address: EndpointAddress,
    ) -> Self {
        Self {
            name: format!("{}_{}", binding.name().decoded(), contract.name().decoded()),
            address,
            listen_uri: None,
            binding,
            contract,
            behaviors: BehaviorCollection::new(),
            is_system_endpoint: false,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// # Errors
    ///
    /// Fails on an empty name.
    pub fn set_name(&mut self, name: &str) -> Result<(), DescriptionError> {
        if name.is_empty() {
            return Err(DescriptionError::EmptyName { field: "endpoint name" });
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Physical address the transport listens on; the logical address unless
    /// overridden.
    #[must_use]
    pub fn listen_uri(&self) -> &Uri {
        self.listen_uri.as_ref().unwrap_or_else(|| self.address.uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_must_be_absolute() {
        assert!(EndpointAddress::new("http://localhost:8080/orders").is_ok());
        assert!(matches!(
            EndpointAddress::new("/orders"),
            Err(DescriptionError::InvalidAddress { .. })
        ));
        assert!(EndpointAddress::new("urn:no-authority").is_err());
    }

    #[test]
    fn endpoint_defaults() {
        let contract = Arc::new(ContractDescription::new("IOrders", "urn:shop").unwrap());
        let binding = Arc::new(Binding::basic_http().unwrap());
        let address = EndpointAddress::new("http://localhost:8080/orders").unwrap();
        let mut endpoint = ServiceEndpoint::new(contract, binding, address);

        assert_eq!(endpoint.name(), "BasicHttpBinding_IOrders");
        assert_eq!(endpoint.listen_uri().path(), "/orders");

        endpoint.listen_uri = Some("http://0.0.0.0:9000/orders".parse().unwrap());
        assert_eq!(endpoint.listen_uri().port_u16(), Some(9000));
        assert!(endpoint.set_name("").is_err());
    }
}
