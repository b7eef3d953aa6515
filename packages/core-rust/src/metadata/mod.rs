//! Metadata exchange: published metadata types, policy conversion, the export
//! hooks, the `Get` protocol and dynamic endpoint address resolution.

pub mod address;
pub mod exchange;
pub mod export;
pub mod location;
pub mod policy;
pub mod set;
pub(crate) mod xml;

pub use address::{
    BaseAddress, DefaultPortTable, HostHeaderAddressProvider, MetadataEndpointAddressProvider,
    RequestContext, StaticAddressProvider,
};
pub use exchange::{
    metadata_exchange_contract, ExchangeError, GetRequest, GetResponse, Message, MetadataExchange,
};
pub use export::{
    ExportError, MetadataExporter, PolicyExportExtension, Port, PortType, PortTypeOperation,
    WsdlContractConversionContext, WsdlEndpointConversionContext, WsdlExportExtension,
};
pub use location::{AddressingVersion, MetadataLocation, MetadataReference};
pub use policy::{PolicyAssertion, PolicyAssertionCollection, PolicyConversionContext};
pub use set::{MetadataContent, MetadataSection, MetadataSet};

/// WS-MetadataExchange namespace.
pub const MEX_NAMESPACE: &str = "http://schemas.xmlsoap.org/ws/2004/09/mex";

/// WS-Transfer namespace.
pub const TRANSFER_NAMESPACE: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer";

pub const GET_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/09/mex/Get";
pub const GET_RESPONSE_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/09/mex/GetResponse";

/// WS-Transfer `Get`, accepted as an alias of [`GET_ACTION`].
pub const TRANSFER_GET_ACTION: &str = "http://schemas.xmlsoap.org/ws/2004/09/transfer/Get";

/// Whether `action` asks for metadata: [`GET_ACTION`] or the WS-Transfer alias.
#[must_use]
pub fn is_get_action(action: &str) -> bool {
    action == GET_ACTION || action == TRANSFER_GET_ACTION
}

/// Name of the single body element of a `GetResponse`.
pub const METADATA_ELEMENT: &str = "Metadata";

pub const WSDL_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const WSDL_SOAP12_NAMESPACE: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
pub const WS_POLICY_NAMESPACE: &str = "http://schemas.xmlsoap.org/ws/2004/09/policy";
pub const WS_SECURITY_UTILITY_NAMESPACE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
pub const WS_ADDRESSING_WSDL_NAMESPACE: &str = "http://www.w3.org/2006/05/addressing/wsdl";
pub const SOAP12_ENVELOPE_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Section dialects.
pub mod dialect {
    pub const WSDL: &str = "http://schemas.xmlsoap.org/wsdl/";
    pub const XML_SCHEMA: &str = "http://www.w3.org/2001/XMLSchema";
    pub const POLICY: &str = "http://schemas.xmlsoap.org/ws/2004/09/policy";
    pub const MEX: &str = "http://schemas.xmlsoap.org/ws/2004/09/mex";
}
