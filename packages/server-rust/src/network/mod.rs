//! HTTP hosting for an opened service: configuration, middleware, handlers
//! and the host's communication lifecycle.

pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod module;

pub use config::NetworkConfig;
pub use handlers::AppState;
pub use lifecycle::{CommunicationState, ExchangeGuard, HostLifecycle};
pub use middleware::apply_http_layers;
pub use module::NetworkModule;
