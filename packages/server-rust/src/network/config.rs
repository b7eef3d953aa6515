//! Listener configuration for the metadata HTTP surface.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where and how the HTTP listener serves metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Bind address.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
    /// Maximum time a request may take before the listener answers 408.
    pub request_timeout_ms: u64,
    /// How long closing waits for in-flight metadata exchanges.
    pub drain_timeout_ms: u64,
}

impl NetworkConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout_ms: 30_000,
            drain_timeout_ms: 30_000,
        }
    }
}
