use servicemodel_core::{ServiceBehavior, ServiceDescription, ServiceHostRuntime};
use tracing::debug;

use crate::config::{ConfigLoader, DebugConfig};

/// Exception detail in faults and the HTTP help page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceDebugBehavior {
    pub include_exception_detail_in_faults: bool,
    pub http_help_page_enabled: bool,
    pub http_help_page_url: Option<String>,
}

impl From<&DebugConfig> for ServiceDebugBehavior {
    fn from(config: &DebugConfig) -> Self {
        Self {
            include_exception_detail_in_faults: config.include_exception_detail_in_faults,
            http_help_page_enabled: config.http_help_page_enabled,
            http_help_page_url: config.http_help_page_url.clone(),
        }
    }
}

impl ServiceBehavior for ServiceDebugBehavior {
    fn name(&self) -> &'static str {
        "ServiceDebugBehavior"
    }

    fn validate(&self, _service: &ServiceDescription) -> anyhow::Result<()> {
        if let Some(url) = &self.http_help_page_url {
            ConfigLoader::validate_url("http_help_page_url", url, &["http", "https"])?;
        }
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        service: &ServiceDescription,
        host: &mut ServiceHostRuntime,
    ) -> anyhow::Result<()> {
        for dispatcher in host.endpoints.iter_mut().filter(|d| !d.is_system_endpoint) {
            dispatcher.dispatch_runtime.include_exception_detail_in_faults =
                self.include_exception_detail_in_faults;
        }
        debug!(
            service = %service.name(),
            include_detail = self.include_exception_detail_in_faults,
            "applied debug settings"
        );
        Ok(())
    }
}
