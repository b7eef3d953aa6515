//! Built-in behaviors, one module per concern.

pub mod authorization;
pub mod debug;
pub mod endpoint;
pub mod metadata;
pub mod operation;
pub mod session;

pub use authorization::ServiceAuthorizationBehavior;
pub use debug::ServiceDebugBehavior;
pub use endpoint::{
    ClaimsPrincipalEndpointBehavior, ClaimsPrincipalParameter, MetadataAddressProviderBehavior,
    StaticMetadataAddressBehavior,
};
pub use metadata::{ServiceMetadataBehavior, UseRequestHeadersForMetadataAddressBehavior};
pub use operation::OperationSettingsBehavior;
pub use session::SessionContractBehavior;
