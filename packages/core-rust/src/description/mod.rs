//! The service description graph.
//!
//! A [`ServiceDescription`] owns endpoints; each [`ServiceEndpoint`] pairs an
//! address and a [`Binding`](crate::binding::Binding) with a shared
//! [`ContractDescription`], which owns operations, messages, parts and faults.
//! The graph is built top-down, mutated only by behaviors while the pipeline
//! runs, and read-only afterwards.

mod builder;
mod collection;
mod contract;
mod endpoint;
mod fault;
mod message;
mod operation;
mod part;
mod service;

pub use builder::{ContractBuilder, OperationBuilder};
pub use collection::{
    KeyedCollection, MessageHeaderDescriptionCollection, MessagePartDescriptionCollection,
    MessagePropertyDescriptionCollection,
};
pub use contract::{ContractDescription, SessionMode};
pub use endpoint::{EndpointAddress, ServiceEndpoint};
pub use fault::{FaultDescription, FaultDescriptionCollection};
pub use message::{
    MessageBodyDescription, MessageDescription, MessageDescriptionCollection, MessageDirection,
};
pub use operation::{OperationDescription, OperationDescriptionCollection};
pub use part::{
    Keyed, MemberBinding, MessageHeaderDescription, MessagePartDescription,
    MessagePropertyDescription, ProtectionLevel,
};
pub use service::ServiceDescription;
