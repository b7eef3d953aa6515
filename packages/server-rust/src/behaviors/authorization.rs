use servicemodel_core::runtime::PrincipalPermissionMode;
use servicemodel_core::{ServiceBehavior, ServiceDescription, ServiceHostRuntime};

use crate::config::AuthorizationConfig;

/// Chooses how the caller's principal is attached to operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceAuthorizationBehavior {
    pub principal_permission_mode: PrincipalPermissionMode,
}

impl From<&AuthorizationConfig> for ServiceAuthorizationBehavior {
    fn from(config: &AuthorizationConfig) -> Self {
        Self {
            principal_permission_mode: config.principal_permission_mode,
        }
    }
}

impl ServiceBehavior for ServiceAuthorizationBehavior {
    fn name(&self) -> &'static str {
        "ServiceAuthorizationBehavior"
    }

    fn apply_dispatch_behavior(
        &self,
        _service: &ServiceDescription,
        host: &mut ServiceHostRuntime,
    ) -> anyhow::Result<()> {
        for dispatcher in host.endpoints.iter_mut().filter(|d| !d.is_system_endpoint) {
            dispatcher.dispatch_runtime.principal_permission_mode = self.principal_permission_mode;
        }
        Ok(())
    }
}
