use servicemodel_core::runtime::ReleaseInstanceMode;
use servicemodel_core::{DispatchOperation, OperationBehavior, OperationDescription};

/// Per-operation instancing and transaction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationSettingsBehavior {
    pub auto_dispose_parameters: bool,
    pub release_instance_mode: ReleaseInstanceMode,
    pub transaction_scope_required: bool,
    pub transaction_auto_complete: bool,
}

impl Default for OperationSettingsBehavior {
    fn default() -> Self {
        Self {
            auto_dispose_parameters: true,
            release_instance_mode: ReleaseInstanceMode::None,
            transaction_scope_required: false,
            transaction_auto_complete: true,
        }
    }
}

impl OperationBehavior for OperationSettingsBehavior {
    fn name(&self) -> &'static str {
        "OperationSettingsBehavior"
    }

    fn validate(&self, operation: &OperationDescription) -> anyhow::Result<()> {
        // Manual completion only makes sense inside a transaction scope.
        if !self.transaction_auto_complete && !self.transaction_scope_required {
            anyhow::bail!(
                "operation {} disables transaction auto-complete \
                 without requiring a transaction scope",
                operation.name()
            );
        }
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        _operation: &OperationDescription,
        dispatch: &mut DispatchOperation,
    ) -> anyhow::Result<()> {
        dispatch.auto_dispose_parameters = self.auto_dispose_parameters;
        dispatch.release_instance_mode = self.release_instance_mode;
        dispatch.transaction_scope_required = self.transaction_scope_required;
        dispatch.transaction_auto_complete = self.transaction_auto_complete;
        Ok(())
    }
}
