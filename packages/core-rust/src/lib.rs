//! Service model core: description graph, behavior contracts, binding
//! parameters, runtime state and metadata exchange types.

pub mod behavior;
pub mod binding;
pub mod description;
pub mod error;
pub mod metadata;
pub mod naming;
pub mod runtime;
pub mod uri;

pub use behavior::{
    BehaviorCollection, BehaviorLevel, ContractBehavior, EndpointBehavior, OperationBehavior,
    ServiceBehavior,
};
pub use binding::{
    Binding, BindingElement, BindingParameterCollection, SecurityCapabilities, SessionCapabilities,
};
pub use description::{
    ContractBuilder, ContractDescription, EndpointAddress, OperationBuilder, OperationDescription,
    ProtectionLevel, ServiceDescription, ServiceEndpoint, SessionMode,
};
pub use error::DescriptionError;
pub use naming::{QualifiedName, XmlName, DEFAULT_NAMESPACE};
pub use runtime::{
    ClientOperation, ClientRuntime, DispatchOperation, DispatchRuntime, EndpointDispatcher,
    HostExtensions, ServiceHostRuntime,
};

