//! Service model server: configuration, built-in behaviors, the behavior
//! pipeline, the service host and a metadata exchange endpoint over HTTP.

pub mod behaviors;
pub mod config;
pub mod dispatcher;
pub mod extension;
pub mod host;
pub mod mex;
pub mod network;

pub use config::{BindingRegistry, ConfigError, ConfigLoader, ContractRegistry, HostConfig};
pub use dispatcher::{DispatcherBuilder, InitializedClient, InitializedHost, Phase, PipelineError};
pub use extension::{MetadataSettings, ServiceMetadataExtension};
pub use host::{HostError, OpenedServiceHost, ServiceHost, ServiceHostBuilder};
pub use mex::MetadataExchangeService;
pub use network::{NetworkConfig, NetworkModule};
