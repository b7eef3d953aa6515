use std::sync::Arc;

use servicemodel_core::{
    BindingParameterCollection, ClientRuntime, ContractBehavior, ContractDescription,
    DispatchRuntime, ServiceEndpoint, SessionCapabilities, SessionMode,
};

/// Checks a contract's [`SessionMode`] against the session support of each
/// binding that exposes it, and turns sessions on where both agree.
///
/// The host attaches one to every application contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionContractBehavior;

fn binding_supports_sessions(endpoint: &ServiceEndpoint) -> bool {
    let parameters = BindingParameterCollection::seeded_with(Arc::clone(&endpoint.binding));
    endpoint
        .binding
        .get_property::<SessionCapabilities>(&parameters)
        .is_some_and(|c| c.supports_sessions)
}

fn sessions_enabled(contract: &ContractDescription, endpoint: &ServiceEndpoint) -> bool {
    contract.session_mode != SessionMode::NotAllowed && binding_supports_sessions(endpoint)
}

impl ContractBehavior for SessionContractBehavior {
    fn name(&self) -> &'static str {
        "SessionContractBehavior"
    }

    fn validate(
        &self,
        contract: &ContractDescription,
        endpoint: &ServiceEndpoint,
    ) -> anyhow::Result<()> {
        let supported = binding_supports_sessions(endpoint);
        match contract.session_mode {
            SessionMode::Required if !supported => anyhow::bail!(
                "contract {} requires a session but binding {} does not support sessions",
                contract.name(),
                endpoint.binding.name()
            ),
            SessionMode::NotAllowed if supported => anyhow::bail!(
                "contract {} does not allow sessions but binding {} establishes one",
                contract.name(),
                endpoint.binding.name()
            ),
            _ => Ok(()),
        }
    }

    fn apply_dispatch_behavior(
        &self,
        contract: &ContractDescription,
        endpoint: &ServiceEndpoint,
        dispatch: &mut DispatchRuntime,
    ) -> anyhow::Result<()> {
        dispatch.session_enabled = sessions_enabled(contract, endpoint);
        Ok(())
    }

    fn apply_client_behavior(
        &self,
        contract: &ContractDescription,
        endpoint: &ServiceEndpoint,
        client: &mut ClientRuntime,
    ) -> anyhow::Result<()> {
        client.session_enabled = sessions_enabled(contract, endpoint);
        Ok(())
    }
}
