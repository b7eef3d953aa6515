//! Policy assertions gathered while exporting an endpoint.
//!
//! Assertions are plain XML element trees. Binding elements and behaviors add
//! them to a [`PolicyConversionContext`] at one of four scopes (binding,
//! operation, message, fault); the exporter renders each non-empty scope as a
//! `wsp:Policy` document. Policy algebra (normalization, intersection) is not
//! modelled.

use std::sync::Arc;

use crate::binding::BindingElement;
use crate::description::{
    ContractDescription, FaultDescription, MessageDirection, OperationDescription, ServiceEndpoint,
};

use super::export::ExportError;
use super::xml::{self, XmlWriter};
use super::{WS_POLICY_NAMESPACE, WS_SECURITY_UTILITY_NAMESPACE};

/// An XML element asserting a capability or requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyAssertion {
    pub local_name: String,
    pub namespace: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<PolicyAssertion>,
}

impl PolicyAssertion {
    #[must_use]
    pub fn new(local_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            local_name: local_name.into(),
            namespace: namespace.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Matches on local name, and on namespace when one is given.
    #[must_use]
    pub fn matches(&self, local_name: &str, namespace: Option<&str>) -> bool {
        self.local_name == local_name && namespace.map_or(true, |ns| self.namespace == ns)
    }

    fn write_xml(&self, writer: &mut XmlWriter) -> Result<(), ExportError> {
        let mut attributes: Vec<(&str, &str)> = Vec::with_capacity(self.attributes.len() + 1);
        if !self.namespace.is_empty() {
            attributes.push(("xmlns", self.namespace.as_str()));
        }
        attributes.extend(self.attributes.iter().map(|(n, v)| (n.as_str(), v.as_str())));
        if self.children.is_empty() {
            return xml::empty(writer, &self.local_name, &attributes);
        }
        xml::start(writer, &self.local_name, &attributes)?;
        xml::start(writer, "wsp:Policy", &[])?;
        for child in &self.children {
            child.write_xml(writer)?;
        }
        xml::end(writer, "wsp:Policy")?;
        xml::end(writer, &self.local_name)
    }
}

/// Ordered, non-unique list of assertions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyAssertionCollection {
    items: Vec<PolicyAssertion>,
}

impl PolicyAssertionCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, assertion: PolicyAssertion) {
        self.items.push(assertion);
    }

    #[must_use]
    pub fn find(&self, local_name: &str, namespace: Option<&str>) -> Option<&PolicyAssertion> {
        self.items.iter().find(|a| a.matches(local_name, namespace))
    }

    #[must_use]
    pub fn find_all(&self, local_name: &str, namespace: Option<&str>) -> Vec<&PolicyAssertion> {
        self.items
            .iter()
            .filter(|a| a.matches(local_name, namespace))
            .collect()
    }

    /// Removes and returns the first match.
    pub fn remove(&mut self, local_name: &str, namespace: Option<&str>) -> Option<PolicyAssertion> {
        let pos = self
            .items
            .iter()
            .position(|a| a.matches(local_name, namespace))?;
        Some(self.items.remove(pos))
    }

    #[must_use]
    pub fn contains(&self, local_name: &str, namespace: Option<&str>) -> bool {
        self.find(local_name, namespace).is_some()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PolicyAssertion> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Scope an assertion list is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    Operation(String),
    Message(String, MessageDirection),
    Fault(String, String),
}

/// Assertions collected for one endpoint during policy export.
#[derive(Debug)]
pub struct PolicyConversionContext {
    contract: Arc<ContractDescription>,
    endpoint_name: String,
    binding_elements: Vec<Arc<dyn BindingElement>>,
    binding_assertions: PolicyAssertionCollection,
    scoped: Vec<(Scope, PolicyAssertionCollection)>,
}

impl PolicyConversionContext {
    #[must_use]
    pub fn new(endpoint: &ServiceEndpoint) -> Self {
        Self {
            contract: Arc::clone(&endpoint.contract),
            endpoint_name: endpoint.name().to_string(),
            binding_elements: endpoint.binding.elements().to_vec(),
            binding_assertions: PolicyAssertionCollection::new(),
            scoped: Vec::new(),
        }
    }

    #[must_use]
    pub fn contract(&self) -> &ContractDescription {
        &self.contract
    }

    #[must_use]
    pub fn contract_handle(&self) -> Arc<ContractDescription> {
        Arc::clone(&self.contract)
    }

    #[must_use]
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }

    #[must_use]
    pub fn binding_elements(&self) -> &[Arc<dyn BindingElement>] {
        &self.binding_elements
    }

    /// Assertions that apply to the whole binding.
    pub fn binding_assertions(&mut self) -> &mut PolicyAssertionCollection {
        &mut self.binding_assertions
    }

    pub fn operation_binding_assertions(
        &mut self,
        operation: &OperationDescription,
    ) -> &mut PolicyAssertionCollection {
        self.scope(Scope::Operation(operation.name().encoded().to_string()))
    }

    pub fn message_binding_assertions(
        &mut self,
        operation: &OperationDescription,
        direction: MessageDirection,
    ) -> &mut PolicyAssertionCollection {
        self.scope(Scope::Message(
            operation.name().encoded().to_string(),
            direction,
        ))
    }

    pub fn fault_binding_assertions(
        &mut self,
        operation: &OperationDescription,
        fault: &FaultDescription,
    ) -> &mut PolicyAssertionCollection {
        self.scope(Scope::Fault(
            operation.name().encoded().to_string(),
            fault.name().encoded().to_string(),
        ))
    }

    fn scope(&mut self, scope: Scope) -> &mut PolicyAssertionCollection {
        let pos = match self.scoped.iter().position(|(s, _)| *s == scope) {
            Some(pos) => pos,
            None => {
                self.scoped.push((scope, PolicyAssertionCollection::new()));
                self.scoped.len() - 1
            }
        };
        &mut self.scoped[pos].1
    }

    /// First assertion matching `local_name` (and `namespace` when given), in
    /// scan order. With `remove`, the match is taken out of `assertions`; a miss
    /// leaves the collection unchanged.
    pub fn find_assertion(
        assertions: &mut PolicyAssertionCollection,
        local_name: &str,
        namespace: Option<&str>,
        remove: bool,
    ) -> Option<PolicyAssertion> {
        if remove {
            assertions.remove(local_name, namespace)
        } else {
            assertions.find(local_name, namespace).cloned()
        }
    }

    /// Renders every non-empty scope as a `(policy id, wsp:Policy document)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Xml`] if the writer fails.
    pub fn render_policies(&self) -> Result<Vec<(String, String)>, ExportError> {
        let mut documents = Vec::new();
        if !self.binding_assertions.is_empty() {
            let id = format!("{}_policy", self.endpoint_name);
            documents.push((id.clone(), render_policy(&id, &self.binding_assertions)?));
        }
        for (scope, assertions) in &self.scoped {
            if assertions.is_empty() {
                continue;
            }
            let id = match scope {
                Scope::Operation(op) => format!("{}_{op}_policy", self.endpoint_name),
                Scope::Message(op, MessageDirection::Input) => {
                    format!("{}_{op}_Input_policy", self.endpoint_name)
                }
                Scope::Message(op, MessageDirection::Output) => {
                    format!("{}_{op}_output_policy", self.endpoint_name)
                }
                Scope::Fault(op, fault) => format!("{}_{op}_{fault}_Fault", self.endpoint_name),
            };
            documents.push((id.clone(), render_policy(&id, assertions)?));
        }
        Ok(documents)
    }
}

fn render_policy(id: &str, assertions: &PolicyAssertionCollection) -> Result<String, ExportError> {
    let mut writer = xml::writer();
    xml::start(
        &mut writer,
        "wsp:Policy",
        &[
            ("wsu:Id", id),
            ("xmlns:wsp", WS_POLICY_NAMESPACE),
            ("xmlns:wsu", WS_SECURITY_UTILITY_NAMESPACE),
        ],
    )?;
    xml::start(&mut writer, "wsp:ExactlyOne", &[])?;
    xml::start(&mut writer, "wsp:All", &[])?;
    for assertion in assertions.iter() {
        assertion.write_xml(&mut writer)?;
    }
    xml::end(&mut writer, "wsp:All")?;
    xml::end(&mut writer, "wsp:ExactlyOne")?;
    xml::end(&mut writer, "wsp:Policy")?;
    xml::finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Binding;
    use crate::description::{ContractBuilder, EndpointAddress, OperationBuilder};

    const NS: &str = "urn:policy";

    fn sample() -> PolicyAssertionCollection {
        let mut assertions = PolicyAssertionCollection::new();
        assertions.add(PolicyAssertion::new("A", NS).with_attribute("n", "1"));
        assertions.add(PolicyAssertion::new("B", NS));
        assertions.add(PolicyAssertion::new("A", "urn:other").with_attribute("n", "2"));
        assertions
    }

    fn endpoint() -> ServiceEndpoint {
        let contract = ContractBuilder::new("IOrders")
            .namespace("urn:shop")
            .operation(OperationBuilder::new("Get").fault("NotFound", "Detail"))
            .build()
            .unwrap();
        ServiceEndpoint::new(
            Arc::new(contract),
            Arc::new(Binding::ws_http().unwrap()),
            EndpointAddress::new("http://localhost/orders").unwrap(),
        )
    }

    #[test]
    fn find_without_remove_leaves_collection() {
        let mut assertions = sample();
        let found = PolicyConversionContext::find_assertion(&mut assertions, "A", None, false);
        assert_eq!(found.unwrap().attributes[0].1, "1");
        assert_eq!(assertions.len(), 3);
    }

    #[test]
    fn find_with_remove_takes_first_match_only() {
        let mut assertions = sample();
        let found =
            PolicyConversionContext::find_assertion(&mut assertions, "A", None, true).unwrap();
        assert_eq!(found.attributes[0].1, "1");
        assert_eq!(assertions.len(), 2);
        assert_eq!(assertions.find("A", None).unwrap().namespace, "urn:other");
    }

    #[test]
    fn namespace_filter_applies() {
        let mut assertions = sample();
        let found =
            PolicyConversionContext::find_assertion(&mut assertions, "A", Some("urn:other"), true)
                .unwrap();
        assert_eq!(found.attributes[0].1, "2");
        assert!(assertions.contains("A", Some(NS)));
    }

    #[test]
    fn miss_leaves_collection_unchanged() {
        let mut assertions = sample();
        let before = assertions.clone();
        assert!(
            PolicyConversionContext::find_assertion(&mut assertions, "Z", None, true).is_none()
        );
        assert_eq!(assertions, before);
    }

    #[test]
    fn scoped_collections_are_created_on_demand() {
        let endpoint = endpoint();
        let mut context = PolicyConversionContext::new(&endpoint);
        let contract = context.contract_handle();
        let op = contract.operations.find("Get").unwrap();
        let fault = op.faults.iter().next().unwrap();

        context
            .operation_binding_assertions(op)
            .add(PolicyAssertion::new("OpLevel", NS));
        context
            .message_binding_assertions(op, MessageDirection::Input)
            .add(PolicyAssertion::new("MsgLevel", NS));
        context
            .fault_binding_assertions(op, fault)
            .add(PolicyAssertion::new("FaultLevel", NS));

        assert_eq!(context.operation_binding_assertions(op).len(), 1);
        assert!(context
            .message_binding_assertions(op, MessageDirection::Output)
            .is_empty());

        let ids: Vec<_> = context
            .render_policies()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(
            ids,
            [
                "WSHttpBinding_IOrders_Get_policy",
                "WSHttpBinding_IOrders_Get_Input_policy",
                "WSHttpBinding_IOrders_Get_NotFound_Fault",
            ]
        );
    }

    #[test]
    fn binding_policy_renders_nested_assertions() {
        let endpoint = endpoint();
        let mut context = PolicyConversionContext::new(&endpoint);
        let mut outer = PolicyAssertion::new("SymmetricBinding", NS);
        outer.children.push(PolicyAssertion::new("EncryptSignature", NS));
        context.binding_assertions().add(outer);

        let (id, document) = context.render_policies().unwrap().remove(0);
        assert_eq!(id, "WSHttpBinding_IOrders_policy");
        assert!(document.contains("wsu:Id=\"WSHttpBinding_IOrders_policy\""));
        assert!(document.contains(concat!(
            "<SymmetricBinding xmlns=\"urn:policy\"><wsp:Policy>",
            "<EncryptSignature xmlns=\"urn:policy\"/>",
            "</wsp:Policy></SymmetricBinding>"
        )));
    }
}
