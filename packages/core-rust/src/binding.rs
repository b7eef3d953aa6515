//! Bindings, binding elements and the binding parameter capability bag.
//!
//! A binding is an ordered stack of elements ending in a transport. The channel
//! layer that turns the stack into channels lives outside this crate; what it
//! needs from here is the aggregated [`BindingParameterCollection`] and the
//! ability to ask the stack whether it supports a capability.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::description::ProtectionLevel;
use crate::error::DescriptionError;
use crate::metadata::export::{PolicyExportExtension, WsdlExportExtension};
use crate::metadata::policy::{PolicyAssertion, PolicyConversionContext};
use crate::naming::{validate_namespace, XmlName, DEFAULT_NAMESPACE};

// ---------------------------------------------------------------------------
// BindingParameterCollection
// ---------------------------------------------------------------------------

struct Parameter {
    type_id: TypeId,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Ordered heterogeneous registry of binding inputs, queried by type.
///
/// Contributions are append-only. Behaviors that may run more than once for
/// the same collection use [`add_once`](Self::add_once) so repeated application
/// leaves a single entry.
#[derive(Default)]
pub struct BindingParameterCollection {
    items: Vec<Parameter>,
}

impl BindingParameterCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collection whose first entry is the binding itself.
    #[must_use]
    pub fn seeded_with(binding: Arc<Binding>) -> Self {
        let mut params = Self::new();
        params.add_shared(binding);
        params
    }

    /// Appends a value.
    pub fn add<T: Any + Send + Sync>(&mut self, value: T) {
        self.add_shared(Arc::new(value));
    }

    /// Appends an already shared value.
    pub fn add_shared<T: Any + Send + Sync>(&mut self, value: Arc<T>) {
        self.items.push(Parameter {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value,
        });
    }

    /// Appends `value` unless an entry of the same type is present.
    /// Returns `true` when the value was inserted.
    pub fn add_once<T: Any + Send + Sync>(&mut self, value: T) -> bool {
        if self.contains::<T>() {
            return false;
        }
        self.add(value);
        true
    }

    /// First entry of type `T`, in insertion order.
    #[must_use]
    pub fn find<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.items
            .iter()
            .find(|p| p.type_id == TypeId::of::<T>())
            .and_then(|p| Arc::clone(&p.value).downcast::<T>().ok())
    }

    /// Every entry of type `T`, in insertion order.
    #[must_use]
    pub fn find_all<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        self.items
            .iter()
            .filter(|p| p.type_id == TypeId::of::<T>())
            .filter_map(|p| Arc::clone(&p.value).downcast::<T>().ok())
            .collect()
    }

    /// Removes and returns the first entry of type `T`.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> Option<Arc<T>> {
        let pos = self
            .items
            .iter()
            .position(|p| p.type_id == TypeId::of::<T>())?;
        self.items.remove(pos).value.downcast::<T>().ok()
    }

    #[must_use]
    pub fn contains<T: Any>(&self) -> bool {
        self.items.iter().any(|p| p.type_id == TypeId::of::<T>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Type names of the entries, for diagnostics.
    #[must_use]
    pub fn type_names(&self) -> Vec<&'static str> {
        self.items.iter().map(|p| p.type_name).collect()
    }
}

impl fmt::Debug for BindingParameterCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Security features a binding stack provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityCapabilities {
    pub supports_client_authentication: bool,
    pub supports_server_authentication: bool,
    pub supported_request_protection: ProtectionLevel,
    pub supported_response_protection: ProtectionLevel,
}

/// Whether a binding stack can carry a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCapabilities {
    pub supports_sessions: bool,
}

// ---------------------------------------------------------------------------
// BindingElement
// ---------------------------------------------------------------------------

/// One layer of a binding stack.
pub trait BindingElement: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// URI scheme for transport elements; `None` for every other layer.
    fn scheme(&self) -> Option<&str> {
        None
    }

    /// Returns the capability object for `capability` if this element provides it.
    fn capability(
        &self,
        _capability: TypeId,
        _parameters: &BindingParameterCollection,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    fn policy_exporter(&self) -> Option<&dyn PolicyExportExtension> {
        None
    }

    fn wsdl_exporter(&self) -> Option<&dyn WsdlExportExtension> {
        None
    }
}

/// HTTP(S) transport, always the last element of a stack.
#[derive(Debug, Clone)]
pub struct HttpTransportElement {
    scheme: &'static str,
}

impl HttpTransportElement {
    #[must_use]
    pub fn http() -> Self {
        Self { scheme: "http" }
    }

    #[must_use]
    pub fn https() -> Self {
        Self { scheme: "https" }
    }
}

impl BindingElement for HttpTransportElement {
    fn name(&self) -> &str {
        if self.scheme == "https" {
            "HttpsTransport"
        } else {
            "HttpTransport"
        }
    }

    fn scheme(&self) -> Option<&str> {
        Some(self.scheme)
    }

    fn capability(
        &self,
        capability: TypeId,
        _parameters: &BindingParameterCollection,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        // TLS authenticates the server and protects the stream.
        if self.scheme == "https" && capability == TypeId::of::<SecurityCapabilities>() {
            return Some(Arc::new(SecurityCapabilities {
                supports_client_authentication: false,
                supports_server_authentication: true,
                supported_request_protection: ProtectionLevel::EncryptAndSign,
                supported_response_protection: ProtectionLevel::EncryptAndSign,
            }));
        }
        None
    }
}

/// Message-level security layer.
#[derive(Debug, Clone)]
pub struct SecurityElement {
    pub client_authentication: bool,
    pub protection: ProtectionLevel,
}

pub const SECURITY_POLICY_NAMESPACE: &str =
    "http://docs.oasis-open.org/ws-sx/ws-securitypolicy/200702";

impl BindingElement for SecurityElement {
    fn name(&self) -> &str {
        "Security"
    }

    fn capability(
        &self,
        capability: TypeId,
        _parameters: &BindingParameterCollection,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        (capability == TypeId::of::<SecurityCapabilities>()).then(|| {
            Arc::new(SecurityCapabilities {
                supports_client_authentication: self.client_authentication,
                supports_server_authentication: true,
                supported_request_protection: self.protection,
                supported_response_protection: self.protection,
            }) as Arc<dyn Any + Send + Sync>
        })
    }

    fn policy_exporter(&self) -> Option<&dyn PolicyExportExtension> {
        Some(self)
    }
}

impl PolicyExportExtension for SecurityElement {
    fn export_policy(&self, context: &mut PolicyConversionContext) -> anyhow::Result<()> {
        let mut assertion = PolicyAssertion::new("SymmetricBinding", SECURITY_POLICY_NAMESPACE);
        if self.protection == ProtectionLevel::EncryptAndSign {
            assertion
                .children
                .push(PolicyAssertion::new("EncryptSignature", SECURITY_POLICY_NAMESPACE));
        }
        context.binding_assertions().add(assertion);
        Ok(())
    }
}

pub const RELIABLE_MESSAGING_NAMESPACE: &str =
    "http://schemas.xmlsoap.org/ws/2005/02/rm/policy";

/// Reliable session layer; gives the stack session support.
#[derive(Debug, Clone)]
pub struct ReliableSessionElement {
    pub ordered: bool,
}

impl BindingElement for ReliableSessionElement {
    fn name(&self) -> &str {
        "ReliableSession"
    }

    fn capability(
        &self,
        capability: TypeId,
        _parameters: &BindingParameterCollection,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        (capability == TypeId::of::<SessionCapabilities>()).then(|| {
            Arc::new(SessionCapabilities {
                supports_sessions: true,
            }) as Arc<dyn Any + Send + Sync>
        })
    }

    fn policy_exporter(&self) -> Option<&dyn PolicyExportExtension> {
        Some(self)
    }
}

impl PolicyExportExtension for ReliableSessionElement {
    fn export_policy(&self, context: &mut PolicyConversionContext) -> anyhow::Result<()> {
        let mut assertion = PolicyAssertion::new("RMAssertion", RELIABLE_MESSAGING_NAMESPACE);
        if self.ordered {
            assertion
                .attributes
                .push(("Ordered".to_string(), "true".to_string()));
        }
        context.binding_assertions().add(assertion);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

/// A named, ordered binding element stack.
#[derive(Debug, Clone)]
pub struct Binding {
    name: XmlName,
    namespace: String,
    scheme: String,
    elements: Vec<Arc<dyn BindingElement>>,
}

impl Binding {
    /// # Errors
    ///
    /// Fails on an empty name, a malformed namespace, or a stack without a
    /// transport element.
    pub fn new(
        name: &str,
        namespace: &str,
        elements: Vec<Arc<dyn BindingElement>>,
    ) -> Result<Self, DescriptionError> {
        let name = XmlName::new(name)?;
        validate_namespace(namespace)?;
        let scheme = elements
            .iter()
            .rev()
            .find_map(|e| e.scheme())
            .ok_or_else(|| DescriptionError::MissingTransport {
                binding: name.decoded().to_string(),
            })?
            .to_string();
        Ok(Self {
            name,
            namespace: namespace.to_string(),
            scheme,
            elements,
        })
    }

    /// Plain HTTP transport, no message security or sessions.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in names; the `Result` mirrors [`Binding::new`].
    pub fn basic_http() -> Result<Self, DescriptionError> {
        Self::new(
            "BasicHttpBinding",
            DEFAULT_NAMESPACE,
            vec![Arc::new(HttpTransportElement::http())],
        )
    }

    /// HTTPS transport, server-authenticated.
    ///
    /// # Errors
    ///
    /// See [`Binding::basic_http`].
    pub fn basic_https() -> Result<Self, DescriptionError> {
        Self::new(
            "BasicHttpsBinding",
            DEFAULT_NAMESPACE,
            vec![Arc::new(HttpTransportElement::https())],
        )
    }

    /// Message security with client authentication over a reliable session.
    ///
    /// # Errors
    ///
    /// See [`Binding::basic_http`].
    pub fn ws_http() -> Result<Self, DescriptionError> {
        Self::new(
            "WSHttpBinding",
            DEFAULT_NAMESPACE,
            vec![
                Arc::new(ReliableSessionElement { ordered: true }),
                Arc::new(SecurityElement {
                    client_authentication: true,
                    protection: ProtectionLevel::EncryptAndSign,
                }),
                Arc::new(HttpTransportElement::http()),
            ],
        )
    }

    /// Binding used by metadata-exchange system endpoints.
    ///
    /// # Errors
    ///
    /// See [`Binding::basic_http`].
    pub fn mex_http() -> Result<Self, DescriptionError> {
        Self::new(
            "MetadataExchangeHttpBinding",
            DEFAULT_NAMESPACE,
            vec![Arc::new(HttpTransportElement::http())],
        )
    }

    #[must_use]
    pub fn name(&self) -> &XmlName {
        &self.name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Scheme of the transport element.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    #[must_use]
    pub fn elements(&self) -> &[Arc<dyn BindingElement>] {
        &self.elements
    }

    /// Asks each element, top of the stack first, for capability `T`.
    #[must_use]
    pub fn get_property<T: Any + Send + Sync>(
        &self,
        parameters: &BindingParameterCollection,
    ) -> Option<Arc<T>> {
        self.elements.iter().find_map(|element| {
            element
                .capability(TypeId::of::<T>(), parameters)
                .and_then(|c| c.downcast::<T>().ok())
        })
    }
}
