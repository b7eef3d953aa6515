//! The behavior pipeline.
//!
//! Opening a host runs three phases over the whole description:
//!
//! 1. **Validate**: every behavior at every level checks the description.
//! 2. **AddBindingParameters**: one accumulator per endpoint, seeded with the
//!    endpoint's binding, collects contributions.
//! 3. **ApplyDispatchBehavior**: behaviors configure the runtime state.
//!
//! A phase finishes for all endpoints before the next begins. Within a phase,
//! levels run service, then endpoint, then contract, then operation, so later
//! behaviors observe what earlier ones did. The first failure aborts the run;
//! nothing is retried or partially kept.

use std::fmt;

use servicemodel_core::{
    BehaviorLevel, BindingParameterCollection, ClientRuntime, ServiceDescription,
    ServiceEndpoint, ServiceHostRuntime,
};
use thiserror::Error;
use tracing::{debug, info_span};

/// Which pipeline phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validate,
    AddBindingParameters,
    ApplyDispatch,
    ApplyClient,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validate => "validate",
            Self::AddBindingParameters => "add binding parameters",
            Self::ApplyDispatch => "apply dispatch behavior",
            Self::ApplyClient => "apply client behavior",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{level} behavior {behavior} failed validation for {target}: {source}")]
    Validate {
        behavior: String,
        level: BehaviorLevel,
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{level} behavior {behavior} failed to add binding parameters for {target}: {source}")]
    BindingParameters {
        behavior: String,
        level: BehaviorLevel,
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{level} behavior {behavior} failed to {phase} for {target}: {source}")]
    Apply {
        phase: Phase,
        behavior: String,
        level: BehaviorLevel,
        target: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    #[must_use]
    pub fn behavior(&self) -> &str {
        match self {
            Self::Validate { behavior, .. }
            | Self::BindingParameters { behavior, .. }
            | Self::Apply { behavior, .. } => behavior,
        }
    }

    #[must_use]
    pub fn level(&self) -> BehaviorLevel {
        match self {
            Self::Validate { level, .. }
            | Self::BindingParameters { level, .. }
            | Self::Apply { level, .. } => *level,
        }
    }
}

/// Builds the `map_err` closure for one behavior call.
fn fail(
    phase: Phase,
    behavior: &str,
    level: BehaviorLevel,
    target: String,
) -> impl FnOnce(anyhow::Error) -> PipelineError {
    let behavior = behavior.to_string();
    move |source| match phase {
        Phase::Validate => PipelineError::Validate {
            behavior,
            level,
            target,
            source,
        },
        Phase::AddBindingParameters => PipelineError::BindingParameters {
            behavior,
            level,
            target,
            source,
        },
        Phase::ApplyDispatch | Phase::ApplyClient => PipelineError::Apply {
            phase,
            behavior,
            level,
            target,
            source,
        },
    }
}

fn service_target(service: &ServiceDescription) -> String {
    format!("service {}", service.name())
}

fn endpoint_target(endpoint: &ServiceEndpoint) -> String {
    format!("endpoint {}", endpoint.name())
}

fn contract_target(endpoint: &ServiceEndpoint) -> String {
    format!("contract {} on endpoint {}", endpoint.contract.key(), endpoint.name())
}

fn operation_target(endpoint: &ServiceEndpoint, operation: &str) -> String {
    format!("operation {operation} on endpoint {}", endpoint.name())
}

/// Binding parameters accumulated for one endpoint.
#[derive(Debug)]
pub struct EndpointParameters {
    pub endpoint_name: String,
    pub parameters: BindingParameterCollection,
}

/// Result of running the pipeline for a host.
#[derive(Debug)]
pub struct InitializedHost {
    pub runtime: ServiceHostRuntime,
    pub binding_parameters: Vec<EndpointParameters>,
}

impl InitializedHost {
    #[must_use]
    pub fn parameters_for(&self, endpoint_name: &str) -> Option<&BindingParameterCollection> {
        self.binding_parameters
            .iter()
            .find(|p| p.endpoint_name == endpoint_name)
            .map(|p| &p.parameters)
    }
}

/// Result of running the pipeline for one client endpoint.
#[derive(Debug)]
pub struct InitializedClient {
    pub runtime: ClientRuntime,
    pub binding_parameters: BindingParameterCollection,
}

pub struct DispatcherBuilder;

impl DispatcherBuilder {
    /// Runs all three phases for `service`.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`], naming behavior, level and target.
    pub fn initialize_service_host(
        service: &ServiceDescription,
    ) -> Result<InitializedHost, PipelineError> {
        let span = info_span!("initialize_service_host", service = %service.name());
        let _enter = span.enter();

        Self::validate(service)?;
        let binding_parameters = Self::add_binding_parameters(service)?;
        let runtime = Self::apply_dispatch(service)?;

        debug!(endpoints = runtime.endpoints.len(), "service host initialized");
        Ok(InitializedHost {
            runtime,
            binding_parameters,
        })
    }

    /// Runs the client-side pipeline for `endpoint`. Service behaviors take
    /// part only when `service` is supplied.
    ///
    /// # Errors
    ///
    /// Returns the first [`PipelineError`].
    pub fn build_client_runtime(
        service: Option<&ServiceDescription>,
        endpoint: &ServiceEndpoint,
    ) -> Result<InitializedClient, PipelineError> {
        let span = info_span!("build_client_runtime", endpoint = endpoint.name());
        let _enter = span.enter();

        if let Some(service) = service {
            for behavior in service.behaviors.iter() {
                behavior
                    .validate(service)
                    .map_err(fail(
                        Phase::Validate,
                        behavior.name(),
                        BehaviorLevel::Service,
                        service_target(service),
                    ))?;
            }
        }
        Self::validate_endpoint(endpoint)?;

        let binding_parameters = Self::endpoint_parameters(service, endpoint)?;

        let mut runtime = ClientRuntime::for_endpoint(endpoint);
        let phase = Phase::ApplyClient;
        if let Some(service) = service {
            for behavior in service.behaviors.iter() {
                behavior
                    .apply_client_behavior(service, &mut runtime)
                    .map_err(fail(
                        phase,
                        behavior.name(),
                        BehaviorLevel::Service,
                        service_target(service),
                    ))?;
            }
        }
        for behavior in endpoint.behaviors.iter() {
            behavior
                .apply_client_behavior(endpoint, &mut runtime)
                .map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Endpoint,
                    endpoint_target(endpoint),
                ))?;
        }
        let contract = &endpoint.contract;
        for behavior in contract.behaviors.iter() {
            behavior
                .apply_client_behavior(contract, endpoint, &mut runtime)
                .map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Contract,
                    contract_target(endpoint),
                ))?;
        }
        for operation in contract.operations.iter() {
            let name = operation.name().decoded();
            let Some(client_operation) = runtime.operation_mut(name) else {
                continue;
            };
            for behavior in operation.behaviors.iter() {
                behavior
                    .apply_client_behavior(operation, client_operation)
                    .map_err(fail(
                        phase,
                        behavior.name(),
                        BehaviorLevel::Operation,
                        operation_target(endpoint, name),
                    ))?;
            }
        }

        debug!(operations = runtime.operations.len(), "client runtime built");
        Ok(InitializedClient {
            runtime,
            binding_parameters,
        })
    }

    fn validate(service: &ServiceDescription) -> Result<(), PipelineError> {
        let _phase = info_span!("phase", name = "validate").entered();
        for behavior in service.behaviors.iter() {
            behavior
                .validate(service)
                .map_err(fail(
                    Phase::Validate,
                    behavior.name(),
                    BehaviorLevel::Service,
                    service_target(service),
                ))?;
        }
        for endpoint in &service.endpoints {
            Self::validate_endpoint(endpoint)?;
        }
        Ok(())
    }

    fn validate_endpoint(endpoint: &ServiceEndpoint) -> Result<(), PipelineError> {
        let phase = Phase::Validate;
        for behavior in endpoint.behaviors.iter() {
            behavior
                .validate(endpoint)
                .map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Endpoint,
                    endpoint_target(endpoint),
                ))?;
        }
        let contract = &endpoint.contract;
        for behavior in contract.behaviors.iter() {
            behavior
                .validate(contract, endpoint)
                .map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Contract,
                    contract_target(endpoint),
                ))?;
        }
        for operation in contract.operations.iter() {
            for behavior in operation.behaviors.iter() {
                behavior.validate(operation).map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Operation,
                    operation_target(endpoint, operation.name().decoded()),
                ))?;
            }
        }
        Ok(())
    }

    fn add_binding_parameters(
        service: &ServiceDescription,
    ) -> Result<Vec<EndpointParameters>, PipelineError> {
        let _phase = info_span!("phase", name = "add_binding_parameters").entered();
        service
            .endpoints
            .iter()
            .map(|endpoint| {
                Ok(EndpointParameters {
                    endpoint_name: endpoint.name().to_string(),
                    parameters: Self::endpoint_parameters(Some(service), endpoint)?,
                })
            })
            .collect()
    }

    fn endpoint_parameters(
        service: Option<&ServiceDescription>,
        endpoint: &ServiceEndpoint,
    ) -> Result<BindingParameterCollection, PipelineError> {
        let phase = Phase::AddBindingParameters;
        let mut parameters = BindingParameterCollection::seeded_with(endpoint.binding.clone());
        if let Some(service) = service {
            for behavior in service.behaviors.iter() {
                behavior
                    .add_binding_parameters(service, endpoint, &mut parameters)
                    .map_err(fail(
                        phase,
                        behavior.name(),
                        BehaviorLevel::Service,
                        service_target(service),
                    ))?;
            }
        }
        for behavior in endpoint.behaviors.iter() {
            behavior
                .add_binding_parameters(endpoint, &mut parameters)
                .map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Endpoint,
                    endpoint_target(endpoint),
                ))?;
        }
        let contract = &endpoint.contract;
        for behavior in contract.behaviors.iter() {
            behavior
                .add_binding_parameters(contract, endpoint, &mut parameters)
                .map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Contract,
                    contract_target(endpoint),
                ))?;
        }
        for operation in contract.operations.iter() {
            for behavior in operation.behaviors.iter() {
                behavior.add_binding_parameters(operation, &mut parameters).map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Operation,
                    operation_target(endpoint, operation.name().decoded()),
                ))?;
            }
        }
        debug!(
            endpoint = endpoint.name(),
            parameters = parameters.len(),
            "binding parameters collected"
        );
        Ok(parameters)
    }

    fn apply_dispatch(service: &ServiceDescription) -> Result<ServiceHostRuntime, PipelineError> {
        let _phase = info_span!("phase", name = "apply_dispatch").entered();
        let phase = Phase::ApplyDispatch;
        let mut runtime = ServiceHostRuntime::for_service(service);

        for behavior in service.behaviors.iter() {
            behavior
                .apply_dispatch_behavior(service, &mut runtime)
                .map_err(fail(
                    phase,
                    behavior.name(),
                    BehaviorLevel::Service,
                    service_target(service),
                ))?;
        }

        for (endpoint, dispatcher) in service.endpoints.iter().zip(runtime.endpoints.iter_mut()) {
            for behavior in endpoint.behaviors.iter() {
                behavior
                    .apply_dispatch_behavior(endpoint, dispatcher)
                    .map_err(fail(
                        phase,
                        behavior.name(),
                        BehaviorLevel::Endpoint,
                        endpoint_target(endpoint),
                    ))?;
            }
            let contract = &endpoint.contract;
            for behavior in contract.behaviors.iter() {
                behavior
                    .apply_dispatch_behavior(contract, endpoint, &mut dispatcher.dispatch_runtime)
                    .map_err(fail(
                        phase,
                        behavior.name(),
                        BehaviorLevel::Contract,
                        contract_target(endpoint),
                    ))?;
            }
            for operation in contract.operations.iter() {
                let name = operation.name().decoded();
                let Some(dispatch_operation) = dispatcher.dispatch_runtime.operation_mut(name)
                else {
                    continue;
                };
                for behavior in operation.behaviors.iter() {
                    behavior
                        .apply_dispatch_behavior(operation, dispatch_operation)
                        .map_err(fail(
                            phase,
                            behavior.name(),
                            BehaviorLevel::Operation,
                            operation_target(endpoint, name),
                        ))?;
                }
            }
        }
        Ok(runtime)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use servicemodel_core::{
        Binding, ClientOperation, ContractBehavior, ContractBuilder, ContractDescription,
        DispatchOperation, DispatchRuntime, EndpointAddress, EndpointBehavior, EndpointDispatcher,
        OperationBehavior, OperationBuilder, OperationDescription, ServiceBehavior,
    };

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        log: Log,
    }

    impl Recorder {
        fn record(&self, phase: &str) {
            self.log.lock().push(format!("{phase}:{}", self.label));
        }
    }

    struct ServiceRecorder(Recorder);
    struct EndpointRecorder(Recorder);
    struct ContractRecorder(Recorder);
    struct OperationRecorder(Recorder);

    impl ServiceBehavior for ServiceRecorder {
        fn name(&self) -> &'static str {
            "service-recorder"
        }
        fn validate(&self, _: &ServiceDescription) -> anyhow::Result<()> {
            self.0.record("validate");
            Ok(())
        }
        fn add_binding_parameters(
            &self,
            _: &ServiceDescription,
            _: &ServiceEndpoint,
            _: &mut BindingParameterCollection,
        ) -> anyhow::Result<()> {
            self.0.record("params");
            Ok(())
        }
        fn apply_dispatch_behavior(
            &self,
            _: &ServiceDescription,
            _: &mut ServiceHostRuntime,
        ) -> anyhow::Result<()> {
            self.0.record("apply");
            Ok(())
        }
        fn apply_client_behavior(
            &self,
            _: &ServiceDescription,
            _: &mut ClientRuntime,
        ) -> anyhow::Result<()> {
            self.0.record("client");
            Ok(())
        }
    }

    impl EndpointBehavior for EndpointRecorder {
        fn validate(&self, _: &ServiceEndpoint) -> anyhow::Result<()> {
            self.0.record("validate");
            Ok(())
        }
        fn add_binding_parameters(
            &self,
            _: &ServiceEndpoint,
            p: &mut BindingParameterCollection,
        ) -> anyhow::Result<()> {
            self.0.record("params");
            p.add(self.0.label);
            Ok(())
        }
        fn apply_dispatch_behavior(
            &self,
            _: &ServiceEndpoint,
            _: &mut EndpointDispatcher,
        ) -> anyhow::Result<()> {
            self.0.record("apply");
            Ok(())
        }
        fn apply_client_behavior(
            &self,
            _: &ServiceEndpoint,
            _: &mut ClientRuntime,
        ) -> anyhow::Result<()> {
            self.0.record("client");
            Ok(())
        }
    }

    impl ContractBehavior for ContractRecorder {
        fn validate(&self, _: &ContractDescription, _: &ServiceEndpoint) -> anyhow::Result<()> {
            self.0.record("validate");
            Ok(())
        }
        fn add_binding_parameters(
            &self,
            _: &ContractDescription,
            _: &ServiceEndpoint,
            _: &mut BindingParameterCollection,
        ) -> anyhow::Result<()> {
            self.0.record("params");
            Ok(())
        }
        fn apply_dispatch_behavior(
            &self,
            _: &ContractDescription,
            _: &ServiceEndpoint,
            _: &mut DispatchRuntime,
        ) -> anyhow::Result<()> {
            self.0.record("apply");
            Ok(())
        }
        fn apply_client_behavior(
            &self,
            _: &ContractDescription,
            _: &ServiceEndpoint,
            _: &mut ClientRuntime,
        ) -> anyhow::Result<()> {
            self.0.record("client");
            Ok(())
        }
    }

    impl OperationBehavior for OperationRecorder {
        fn validate(&self, _: &OperationDescription) -> anyhow::Result<()> {
            self.0.record("validate");
            Ok(())
        }
        fn add_binding_parameters(
            &self,
            _: &OperationDescription,
            _: &mut BindingParameterCollection,
        ) -> anyhow::Result<()> {
            self.0.record("params");
            Ok(())
        }
        fn apply_dispatch_behavior(
            &self,
            _: &OperationDescription,
            d: &mut DispatchOperation,
        ) -> anyhow::Result<()> {
            self.0.record("apply");
            d.auto_dispose_parameters = false;
            Ok(())
        }
        fn apply_client_behavior(
            &self,
            _: &OperationDescription,
            c: &mut ClientOperation,
        ) -> anyhow::Result<()> {
            self.0.record("client");
            c.serialize_request = false;
            Ok(())
        }
    }

    struct Rejecting;
    impl EndpointBehavior for Rejecting {
        fn name(&self) -> &'static str {
            "rejecting"
        }
        fn validate(&self, _: &ServiceEndpoint) -> anyhow::Result<()> {
            anyhow::bail!("endpoint not allowed")
        }
    }

    fn recorder(label: &'static str, log: &Log) -> Recorder {
        Recorder {
            label,
            log: Arc::clone(log),
        }
    }

    fn contract(log: &Log) -> Arc<ContractDescription> {
        let mut contract = ContractBuilder::new("IOrders")
            .operation(OperationBuilder::new("Get").output("Order"))
            .build()
            .unwrap();
        contract
            .behaviors
            .add(ContractRecorder(recorder("contract", log)))
            .unwrap();
        contract
            .operations
            .find_mut("Get")
            .unwrap()
            .behaviors
            .add(OperationRecorder(recorder("operation", log)))
            .unwrap();
        Arc::new(contract)
    }

    fn endpoint(
        contract: &Arc<ContractDescription>,
        log: &Log,
        binding: Binding,
        url: &str,
    ) -> ServiceEndpoint {
        let mut endpoint = ServiceEndpoint::new(
            Arc::clone(contract),
            Arc::new(binding),
            EndpointAddress::new(url).unwrap(),
        );
        endpoint
            .behaviors
            .add(EndpointRecorder(recorder("endpoint", log)))
            .unwrap();
        endpoint
    }

    fn service(log: &Log) -> ServiceDescription {
        let contract = contract(log);
        let mut service = ServiceDescription::new("Orders", "urn:shop").unwrap();
        service
            .behaviors
            .add(ServiceRecorder(recorder("service", log)))
            .unwrap();
        service
            .add_endpoint(endpoint(&contract, log, Binding::basic_http().unwrap(), "http://h/a"))
            .unwrap();
        service
            .add_endpoint(endpoint(&contract, log, Binding::ws_http().unwrap(), "http://h/b"))
            .unwrap();
        service
    }

    fn phase_entries(log: &Log, phase: &str) -> Vec<String> {
        log.lock()
            .iter()
            .filter(|e| e.starts_with(phase))
            .map(|e| e.split_once(':').map(|(_, l)| l.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn phases_run_in_order_across_all_endpoints() {
        let log = Log::default();
        let service = service(&log);
        DispatcherBuilder::initialize_service_host(&service).unwrap();

        let entries = log.lock().clone();
        let last_validate = entries.iter().rposition(|e| e.starts_with("validate")).unwrap();
        let first_params = entries.iter().position(|e| e.starts_with("params")).unwrap();
        let last_params = entries.iter().rposition(|e| e.starts_with("params")).unwrap();
        let first_apply = entries.iter().position(|e| e.starts_with("apply")).unwrap();
        assert!(last_validate < first_params);
        assert!(last_params < first_apply);
    }

    #[test]
    fn levels_run_service_endpoint_contract_operation() {
        let log = Log::default();
        let service = service(&log);
        DispatcherBuilder::initialize_service_host(&service).unwrap();

        assert_eq!(
            phase_entries(&log, "validate"),
            ["service", "endpoint", "contract", "operation", "endpoint", "contract", "operation"]
        );
        assert_eq!(
            phase_entries(&log, "params"),
            [
                "service", "endpoint", "contract", "operation",
                "service", "endpoint", "contract", "operation",
            ]
        );
        assert_eq!(
            phase_entries(&log, "apply"),
            ["service", "endpoint", "contract", "operation", "endpoint", "contract", "operation"]
        );
    }

    #[test]
    fn each_endpoint_gets_its_own_seeded_accumulator() {
        let log = Log::default();
        let service = service(&log);
        let host = DispatcherBuilder::initialize_service_host(&service).unwrap();

        assert_eq!(host.binding_parameters.len(), 2);
        for endpoint in &service.endpoints {
            let parameters = host.parameters_for(endpoint.name()).unwrap();
            let binding = parameters.find::<Binding>().unwrap();
            assert!(Arc::ptr_eq(&binding, &endpoint.binding));
            assert_eq!(parameters.find_all::<&'static str>().len(), 1);
        }
        let dispatch = host.runtime.endpoints[0].dispatch_runtime.operation("Get").unwrap();
        assert!(!dispatch.auto_dispose_parameters);
    }

    #[test]
    fn validation_failure_names_behavior_and_stops_pipeline() {
        let log = Log::default();
        let mut service = service(&log);
        service.endpoints[1].behaviors.add(Rejecting).unwrap();

        let err = DispatcherBuilder::initialize_service_host(&service).unwrap_err();
        assert_eq!(err.behavior(), "rejecting");
        assert_eq!(err.level(), BehaviorLevel::Endpoint);
        assert!(matches!(
            &err,
            PipelineError::Validate { target, .. } if target.contains("WSHttpBinding_IOrders")
        ));
        assert!(phase_entries(&log, "params").is_empty());
        assert!(phase_entries(&log, "apply").is_empty());
    }

    #[test]
    fn client_runtime_without_service_skips_service_behaviors() {
        let log = Log::default();
        let service = service(&log);
        let endpoint = &service.endpoints[0];

        let client = DispatcherBuilder::build_client_runtime(None, endpoint).unwrap();
        assert_eq!(phase_entries(&log, "client"), ["endpoint", "contract", "operation"]);
        assert!(!client.runtime.operations[0].serialize_request);
        assert!(client.binding_parameters.contains::<Binding>());

        log.lock().clear();
        DispatcherBuilder::build_client_runtime(Some(&service), endpoint).unwrap();
        assert_eq!(
            phase_entries(&log, "client"),
            ["service", "endpoint", "contract", "operation"]
        );
    }
}
