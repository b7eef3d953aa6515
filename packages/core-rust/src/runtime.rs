//! Mutable dispatch and client runtime state that behaviors configure.
//!
//! These objects are owned by the dispatcher collaborator. Only the fields that
//! built-in behaviors touch are modelled; the pipeline creates them from the
//! description, behaviors mutate them, and the host freezes them once open.

use std::any::{Any, TypeId};
use std::sync::Arc;

use http::Uri;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::description::{OperationDescription, ServiceDescription, ServiceEndpoint};

/// How the caller's principal is attached to the executing operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalPermissionMode {
    None,
    #[default]
    Custom,
    Always,
}

/// When the service instance is recycled around an operation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseInstanceMode {
    #[default]
    None,
    BeforeCall,
    AfterCall,
    BeforeAndAfterCall,
}

// ---------------------------------------------------------------------------
// HostExtensions
// ---------------------------------------------------------------------------

struct Extension {
    type_id: TypeId,
    value: Arc<dyn Any + Send + Sync>,
}

/// Type-keyed extension objects shared by the host and all its endpoint
/// dispatchers. Cloning shares the same registry.
///
/// Extensions are installed while the pipeline runs and only read afterwards.
#[derive(Clone, Default)]
pub struct HostExtensions {
    inner: Arc<RwLock<Vec<Extension>>>,
}

impl HostExtensions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn find<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner
            .read()
            .iter()
            .find(|e| e.type_id == TypeId::of::<T>())
            .and_then(|e| Arc::clone(&e.value).downcast::<T>().ok())
    }

    /// Returns the installed `T`, installing `init()` first if absent.
    pub fn get_or_insert_with<T, F>(&self, init: F) -> Arc<T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        let mut guard = self.inner.write();
        if let Some(existing) = guard
            .iter()
            .find(|e| e.type_id == TypeId::of::<T>())
            .and_then(|e| Arc::clone(&e.value).downcast::<T>().ok())
        {
            return existing;
        }
        let value = Arc::new(init());
        guard.push(Extension {
            type_id: TypeId::of::<T>(),
            value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
        });
        value
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl std::fmt::Debug for HostExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostExtensions")
            .field("len", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Dispatch side
// ---------------------------------------------------------------------------

/// Per-operation dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOperation {
    pub name: String,
    pub action: String,
    pub reply_action: Option<String>,
    pub is_one_way: bool,
    pub auto_dispose_parameters: bool,
    pub release_instance_mode: ReleaseInstanceMode,
    pub transaction_scope_required: bool,
    pub transaction_auto_complete: bool,
}

impl DispatchOperation {
    #[must_use]
    pub fn for_operation(operation: &OperationDescription) -> Self {
        Self {
            name: operation.name().decoded().to_string(),
            action: operation
                .input_message()
                .map(|m| m.action.clone())
                .unwrap_or_default(),
            reply_action: operation.output_message().map(|m| m.action.clone()),
            is_one_way: operation.is_one_way(),
            auto_dispose_parameters: true,
            release_instance_mode: ReleaseInstanceMode::None,
            transaction_scope_required: false,
            transaction_auto_complete: true,
        }
    }
}

/// Dispatch settings for one endpoint's contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRuntime {
    pub principal_permission_mode: PrincipalPermissionMode,
    pub propagate_claims_principal: bool,
    pub include_exception_detail_in_faults: bool,
    pub session_enabled: bool,
    pub operations: Vec<DispatchOperation>,
}

impl DispatchRuntime {
    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&DispatchOperation> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn operation_mut(&mut self, name: &str) -> Option<&mut DispatchOperation> {
        self.operations.iter_mut().find(|op| op.name == name)
    }
}

/// Server-side state for one endpoint.
#[derive(Debug, Clone)]
pub struct EndpointDispatcher {
    pub endpoint_name: String,
    pub address: Uri,
    pub contract_name: String,
    pub contract_namespace: String,
    pub is_system_endpoint: bool,
    pub dispatch_runtime: DispatchRuntime,
    pub extensions: HostExtensions,
}

impl EndpointDispatcher {
    #[must_use]
    pub fn for_endpoint(endpoint: &ServiceEndpoint, extensions: HostExtensions) -> Self {
        let contract = &endpoint.contract;
        Self {
            endpoint_name: endpoint.name().to_string(),
            address: endpoint.address.uri().clone(),
            contract_name: contract.name().decoded().to_string(),
            contract_namespace: contract.namespace().to_string(),
            is_system_endpoint: endpoint.is_system_endpoint,
            dispatch_runtime: DispatchRuntime {
                principal_permission_mode: PrincipalPermissionMode::default(),
                propagate_claims_principal: false,
                include_exception_detail_in_faults: false,
                session_enabled: false,
                operations: contract
                    .operations
                    .iter()
                    .map(DispatchOperation::for_operation)
                    .collect(),
            },
            extensions,
        }
    }
}

/// Server-side state for a whole service host.
#[derive(Debug, Clone)]
pub struct ServiceHostRuntime {
    pub service_name: String,
    pub extensions: HostExtensions,
    pub endpoints: Vec<EndpointDispatcher>,
}

impl ServiceHostRuntime {
    /// Creates one dispatcher per endpoint, all sharing one extension registry.
    #[must_use]
    pub fn for_service(service: &ServiceDescription) -> Self {
        let extensions = HostExtensions::new();
        Self {
            service_name: service.name().decoded().to_string(),
            endpoints: service
                .endpoints
                .iter()
                .map(|e| EndpointDispatcher::for_endpoint(e, extensions.clone()))
                .collect(),
            extensions,
        }
    }

    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&EndpointDispatcher> {
        self.endpoints.iter().find(|e| e.endpoint_name == name)
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// Per-operation proxy settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOperation {
    pub name: String,
    pub action: String,
    pub reply_action: Option<String>,
    pub is_one_way: bool,
    pub serialize_request: bool,
    pub deserialize_reply: bool,
}

impl ClientOperation {
    #[must_use]
    pub fn for_operation(operation: &OperationDescription) -> Self {
        Self {
            name: operation.name().decoded().to_string(),
            action: operation
                .input_message()
                .map(|m| m.action.clone())
                .unwrap_or_default(),
            reply_action: operation.output_message().map(|m| m.action.clone()),
            is_one_way: operation.is_one_way(),
            serialize_request: true,
            deserialize_reply: !operation.is_one_way(),
        }
    }
}

/// Outbound proxy state for one endpoint.
#[derive(Debug, Clone)]
pub struct ClientRuntime {
    pub contract_name: String,
    pub contract_namespace: String,
    pub client_class_name: String,
    pub via: Uri,
    pub manual_addressing: bool,
    pub session_enabled: bool,
    pub operations: Vec<ClientOperation>,
}

impl ClientRuntime {
    #[must_use]
    pub fn for_endpoint(endpoint: &ServiceEndpoint) -> Self {
        let contract = &endpoint.contract;
        Self {
            contract_name: contract.name().decoded().to_string(),
            contract_namespace: contract.namespace().to_string(),
            client_class_name: contract.client_class_name(),
            via: endpoint.address.uri().clone(),
            manual_addressing: false,
            session_enabled: false,
            operations: contract
                .operations
                .iter()
                .map(ClientOperation::for_operation)
                .collect(),
        }
    }

    pub fn operation_mut(&mut self, name: &str) -> Option<&mut ClientOperation> {
        self.operations.iter_mut().find(|op| op.name == name)
    }
}
