//! Behavior extension points for the four description levels.
//!
//! Every level exposes the same lifecycle: `validate`, `add_binding_parameters`,
//! `apply_dispatch_behavior` and `apply_client_behavior`. Behaviors attach to a
//! description through a [`BehaviorCollection`], which holds at most one
//! instance per concrete type and keeps insertion order. The pipeline that calls
//! these methods lives with the service host; the ordering rules it enforces are
//! documented there.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::binding::BindingParameterCollection;
use crate::description::{
    ContractDescription, OperationDescription, ServiceDescription, ServiceEndpoint,
};
use crate::error::DescriptionError;
use crate::metadata::export::{PolicyExportExtension, WsdlExportExtension};
use crate::runtime::{
    ClientOperation, ClientRuntime, DispatchOperation, DispatchRuntime, EndpointDispatcher,
    ServiceHostRuntime,
};

/// Description level a behavior is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorLevel {
    Service,
    Endpoint,
    Contract,
    Operation,
}

impl BehaviorLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Endpoint => "endpoint",
            Self::Contract => "contract",
            Self::Operation => "operation",
        }
    }
}

impl fmt::Display for BehaviorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Behavior traits
// ---------------------------------------------------------------------------

/// Behavior attached to a whole service.
pub trait ServiceBehavior: Send + Sync + 'static {
    /// Name reported in pipeline errors and logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Read-only check run before any mutation.
    fn validate(&self, _service: &ServiceDescription) -> anyhow::Result<()> {
        Ok(())
    }

    /// Contributes binding inputs for one of the service's endpoints.
    fn add_binding_parameters(
        &self,
        _service: &ServiceDescription,
        _endpoint: &ServiceEndpoint,
        _parameters: &mut BindingParameterCollection,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        _service: &ServiceDescription,
        _host: &mut ServiceHostRuntime,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Only called when a client runtime is built from a hosted service description.
    fn apply_client_behavior(
        &self,
        _service: &ServiceDescription,
        _client: &mut ClientRuntime,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Behavior attached to a single endpoint.
pub trait EndpointBehavior: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn validate(&self, _endpoint: &ServiceEndpoint) -> anyhow::Result<()> {
        Ok(())
    }

    fn add_binding_parameters(
        &self,
        _endpoint: &ServiceEndpoint,
        _parameters: &mut BindingParameterCollection,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        _endpoint: &ServiceEndpoint,
        _dispatcher: &mut EndpointDispatcher,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_client_behavior(
        &self,
        _endpoint: &ServiceEndpoint,
        _client: &mut ClientRuntime,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn wsdl_exporter(&self) -> Option<&dyn WsdlExportExtension> {
        None
    }

    fn policy_exporter(&self) -> Option<&dyn PolicyExportExtension> {
        None
    }
}

/// Behavior attached to a contract; invoked once per endpoint exposing it.
pub trait ContractBehavior: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn validate(
        &self,
        _contract: &ContractDescription,
        _endpoint: &ServiceEndpoint,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn add_binding_parameters(
        &self,
        _contract: &ContractDescription,
        _endpoint: &ServiceEndpoint,
        _parameters: &mut BindingParameterCollection,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        _contract: &ContractDescription,
        _endpoint: &ServiceEndpoint,
        _dispatch: &mut DispatchRuntime,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_client_behavior(
        &self,
        _contract: &ContractDescription,
        _endpoint: &ServiceEndpoint,
        _client: &mut ClientRuntime,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn wsdl_exporter(&self) -> Option<&dyn WsdlExportExtension> {
        None
    }
}

/// Behavior attached to one operation of a contract.
pub trait OperationBehavior: Send + Sync + 'static {
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn validate(&self, _operation: &OperationDescription) -> anyhow::Result<()> {
        Ok(())
    }

    fn add_binding_parameters(
        &self,
        _operation: &OperationDescription,
        _parameters: &mut BindingParameterCollection,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_dispatch_behavior(
        &self,
        _operation: &OperationDescription,
        _dispatch: &mut DispatchOperation,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn apply_client_behavior(
        &self,
        _operation: &OperationDescription,
        _client: &mut ClientOperation,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn wsdl_exporter(&self) -> Option<&dyn WsdlExportExtension> {
        None
    }
}

// ---------------------------------------------------------------------------
// BehaviorCollection
// ---------------------------------------------------------------------------

/// Conversion from a concrete behavior into the trait object stored by a
/// [`BehaviorCollection`]. Implemented for every type of the matching level.
pub trait IntoBehavior<B: ?Sized>: Any + Send + Sync + Sized {
    fn into_behavior(self: Arc<Self>) -> Arc<B>;
}

impl<T: ServiceBehavior> IntoBehavior<dyn ServiceBehavior> for T {
    fn into_behavior(self: Arc<Self>) -> Arc<dyn ServiceBehavior> {
        self
    }
}

impl<T: EndpointBehavior> IntoBehavior<dyn EndpointBehavior> for T {
    fn into_behavior(self: Arc<Self>) -> Arc<dyn EndpointBehavior> {
        self
    }
}

impl<T: ContractBehavior> IntoBehavior<dyn ContractBehavior> for T {
    fn into_behavior(self: Arc<Self>) -> Arc<dyn ContractBehavior> {
        self
    }
}

impl<T: OperationBehavior> IntoBehavior<dyn OperationBehavior> for T {
    fn into_behavior(self: Arc<Self>) -> Arc<dyn OperationBehavior> {
        self
    }
}

struct Entry<B: ?Sized> {
    type_id: TypeId,
    type_name: &'static str,
    behavior: Arc<B>,
    /// Same allocation as `behavior`, kept for typed lookup.
    any: Arc<dyn Any + Send + Sync>,
}

impl<B: ?Sized> Clone for Entry<B> {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            behavior: Arc::clone(&self.behavior),
            any: Arc::clone(&self.any),
        }
    }
}

/// Behaviors attached at one level, keyed by concrete type, in insertion order.
pub struct BehaviorCollection<B: ?Sized> {
    entries: Vec<Entry<B>>,
}

impl<B: ?Sized> BehaviorCollection<B> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Attaches `behavior`.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptionError::DuplicateBehavior`] if a behavior of the same
    /// type is already attached.
    pub fn add<T: IntoBehavior<B>>(&mut self, behavior: T) -> Result<(), DescriptionError> {
        let type_name = std::any::type_name::<T>();
        if self.contains::<T>() {
            return Err(DescriptionError::DuplicateBehavior { type_name });
        }
        let shared = Arc::new(behavior);
        let any: Arc<dyn Any + Send + Sync> = Arc::clone(&shared) as Arc<dyn Any + Send + Sync>;
        self.entries.push(Entry {
            type_id: TypeId::of::<T>(),
            type_name,
            behavior: IntoBehavior::<B>::into_behavior(shared),
            any,
        });
        Ok(())
    }

    /// The attached behavior of type `T`, if any.
    #[must_use]
    pub fn find<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.entries
            .iter()
            .find(|e| e.type_id == TypeId::of::<T>())
            .and_then(|e| Arc::clone(&e.any).downcast::<T>().ok())
    }

    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        self.entries.iter().any(|e| e.type_id == TypeId::of::<T>())
    }

    /// Detaches the behavior of type `T`. Returns `true` if one was attached.
    pub fn remove<T: Any>(&mut self) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.type_id != TypeId::of::<T>());
        before != self.entries.len()
    }

    /// Attached behaviors in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<B>> {
        self.entries.iter().map(|e| &e.behavior)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<B: ?Sized> Default for BehaviorCollection<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ?Sized> Clone for BehaviorCollection<B> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<B: ?Sized> fmt::Debug for BehaviorCollection<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| e.type_name))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Audit;
    impl ServiceBehavior for Audit {}

    struct Throttle {
        max_calls: u32,
    }
    impl ServiceBehavior for Throttle {
        fn name(&self) -> &'static str {
            "throttle"
        }
    }

    #[test]
    fn add_find_and_remove() {
        let mut behaviors: BehaviorCollection<dyn ServiceBehavior> = BehaviorCollection::new();
        behaviors.add(Audit).unwrap();
        behaviors.add(Throttle { max_calls: 16 }).unwrap();

        assert_eq!(behaviors.len(), 2);
        assert_eq!(behaviors.find::<Throttle>().unwrap().max_calls, 16);
        assert!(behaviors.contains::<Audit>());

        assert!(behaviors.remove::<Audit>());
        assert!(!behaviors.remove::<Audit>());
        assert_eq!(behaviors.len(), 1);
    }

    #[test]
    fn duplicate_type_is_rejected() {
        let mut behaviors: BehaviorCollection<dyn ServiceBehavior> = BehaviorCollection::new();
        behaviors.add(Throttle { max_calls: 1 }).unwrap();
        let err = behaviors.add(Throttle { max_calls: 2 }).unwrap_err();
        assert!(matches!(err, DescriptionError::DuplicateBehavior { .. }));
        assert_eq!(behaviors.find::<Throttle>().unwrap().max_calls, 1);
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut behaviors: BehaviorCollection<dyn ServiceBehavior> = BehaviorCollection::new();
        behaviors.add(Throttle { max_calls: 1 }).unwrap();
        behaviors.add(Audit).unwrap();
        let names: Vec<_> = behaviors.iter().map(|b| b.name()).collect();
        assert_eq!(names[0], "throttle");
        assert!(names[1].ends_with("Audit"));
    }

    #[test]
    fn level_display() {
        assert_eq!(BehaviorLevel::Contract.to_string(), "contract");
    }
}
