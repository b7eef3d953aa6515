//! Export hooks and the exporter that drives them.
//!
//! The exporter never knows which behaviors or binding elements contribute:
//! it asks every contract, operation and endpoint behavior and every binding
//! element for its exporter and calls whatever it gets back. The WSDL it
//! renders is a skeleton (port types, bindings by reference, ports); full WSDL
//! and schema emission belong to the document writer collaborator.

use std::collections::HashSet;
use std::sync::Arc;

use http::Uri;
use thiserror::Error;
use tracing::debug;

use crate::description::{ContractDescription, ServiceDescription, ServiceEndpoint};
use crate::naming::QualifiedName;

use super::policy::PolicyConversionContext;
use super::set::{MetadataSection, MetadataSet};
use super::xml::{self, XmlWriter};
use super::{dialect, WSDL_NAMESPACE, WSDL_SOAP12_NAMESPACE, WS_ADDRESSING_WSDL_NAMESPACE};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export extension {extension} failed for {scope}: {source}")]
    Extension {
        extension: String,
        scope: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write metadata XML: {0}")]
    Xml(String),
}

/// Hook that contributes to the exported WSDL.
pub trait WsdlExportExtension: Send + Sync {
    fn export_contract(&self, _context: &mut WsdlContractConversionContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn export_endpoint(&self, _context: &mut WsdlEndpointConversionContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Hook that contributes policy assertions for an endpoint.
pub trait PolicyExportExtension: Send + Sync {
    fn export_policy(&self, context: &mut PolicyConversionContext) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// WSDL fragments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTypeOperation {
    pub name: String,
    pub input_action: Option<String>,
    pub output_action: Option<String>,
    pub fault_names: Vec<String>,
    pub documentation: Option<String>,
}

/// `wsdl:portType` for one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortType {
    pub name: String,
    pub namespace: String,
    pub operations: Vec<PortTypeOperation>,
    pub documentation: Option<String>,
}

impl PortType {
    fn for_contract(contract: &ContractDescription) -> Self {
        Self {
            name: contract.name().encoded().to_string(),
            namespace: contract.namespace().to_string(),
            operations: contract
                .operations
                .iter()
                .map(|op| PortTypeOperation {
                    name: op.name().encoded().to_string(),
                    input_action: op.input_message().map(|m| m.action.clone()),
                    output_action: op.output_message().map(|m| m.action.clone()),
                    fault_names: op.faults.iter().map(|f| f.name().encoded().to_string()).collect(),
                    documentation: None,
                })
                .collect(),
            documentation: None,
        }
    }

    fn write_xml(&self, writer: &mut XmlWriter) -> Result<(), ExportError> {
        xml::start(writer, "wsdl:portType", &[("name", self.name.as_str())])?;
        if let Some(doc) = &self.documentation {
            xml::text_element(writer, "wsdl:documentation", &[], doc)?;
        }
        for op in &self.operations {
            xml::start(writer, "wsdl:operation", &[("name", op.name.as_str())])?;
            if let Some(doc) = &op.documentation {
                xml::text_element(writer, "wsdl:documentation", &[], doc)?;
            }
            if let Some(action) = &op.input_action {
                xml::empty(writer, "wsdl:input", &[("wsaw:Action", action.as_str())])?;
            }
            if let Some(action) = &op.output_action {
                xml::empty(writer, "wsdl:output", &[("wsaw:Action", action.as_str())])?;
            }
            for fault in &op.fault_names {
                xml::empty(writer, "wsdl:fault", &[("name", fault.as_str())])?;
            }
            xml::end(writer, "wsdl:operation")?;
        }
        xml::end(writer, "wsdl:portType")
    }
}

/// `wsdl:port` for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    pub binding_name: String,
    pub binding_namespace: String,
    pub address: String,
    pub policy_reference: Option<String>,
    pub documentation: Option<String>,
}

impl Port {
    fn write_xml(&self, writer: &mut XmlWriter) -> Result<(), ExportError> {
        let binding = format!("tns:{}", self.binding_name);
        xml::start(
            writer,
            "wsdl:port",
            &[("name", self.name.as_str()), ("binding", binding.as_str())],
        )?;
        if let Some(doc) = &self.documentation {
            xml::text_element(writer, "wsdl:documentation", &[], doc)?;
        }
        if let Some(policy) = &self.policy_reference {
            let uri = format!("#{policy}");
            xml::empty(writer, "wsp:PolicyReference", &[("URI", uri.as_str())])?;
        }
        xml::empty(writer, "soap12:address", &[("location", self.address.as_str())])?;
        xml::end(writer, "wsdl:port")
    }
}

/// State handed to [`WsdlExportExtension::export_contract`].
#[derive(Debug)]
pub struct WsdlContractConversionContext {
    contract: Arc<ContractDescription>,
    pub port_type: PortType,
    pub client_class_name: String,
}

impl WsdlContractConversionContext {
    fn new(contract: Arc<ContractDescription>) -> Self {
        Self {
            port_type: PortType::for_contract(&contract),
            client_class_name: contract.client_class_name(),
            contract,
        }
    }

    #[must_use]
    pub fn contract(&self) -> &ContractDescription {
        &self.contract
    }

    /// The port-type operation for `name` (encoded operation name).
    pub fn operation_mut(&mut self, name: &str) -> Option<&mut PortTypeOperation> {
        self.port_type.operations.iter_mut().find(|op| op.name == name)
    }
}

/// State handed to [`WsdlExportExtension::export_endpoint`].
#[derive(Debug)]
pub struct WsdlEndpointConversionContext {
    contract: Arc<ContractDescription>,
    endpoint_name: String,
    pub port: Port,
}

impl WsdlEndpointConversionContext {
    #[must_use]
    pub fn contract(&self) -> &ContractDescription {
        &self.contract
    }

    #[must_use]
    pub fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }
}

// ---------------------------------------------------------------------------
// MetadataExporter
// ---------------------------------------------------------------------------

fn extension_error(
    extension: &str,
    scope: String) -> impl FnOnce(anyhow::Error,
) -> ExportError + '_ {
    move |source| ExportError::Extension {
        extension: extension.to_string(),
        scope,
        source,
    }
}

/// Collects WSDL fragments and policy documents for one service.
#[derive(Debug)]
pub struct MetadataExporter {
    service_name: String,
    target_namespace: String,
    exported_contracts: HashSet<QualifiedName>,
    port_types: Vec<PortType>,
    ports: Vec<Port>,
    policies: Vec<(String, String)>,
}

impl MetadataExporter {
    #[must_use]
    pub fn for_service(service: &ServiceDescription) -> Self {
        Self {
            service_name: service.name().encoded().to_string(),
            target_namespace: service.namespace().to_string(),
            exported_contracts: HashSet::new(),
            port_types: Vec::new(),
            ports: Vec::new(),
            policies: Vec::new(),
        }
    }

    /// Exports `contract` unless a contract with the same key was already exported.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Extension`] naming the failing extension.
    pub fn export_contract(
        &mut self,
        contract: &Arc<ContractDescription>,
    ) -> Result<(), ExportError> {
        if !self.exported_contracts.insert(contract.key().clone()) {
            return Ok(());
        }
        let scope = format!("contract {}", contract.key());
        let mut context = WsdlContractConversionContext::new(Arc::clone(contract));

        for behavior in contract.behaviors.iter() {
            if let Some(exporter) = behavior.wsdl_exporter() {
                exporter
                    .export_contract(&mut context)
                    .map_err(extension_error(behavior.name(), scope.clone()))?;
            }
        }
        for operation in contract.operations.iter() {
            for behavior in operation.behaviors.iter() {
                if let Some(exporter) = behavior.wsdl_exporter() {
                    exporter.export_contract(&mut context).map_err(extension_error(
                        behavior.name(),
                        format!("operation {}", operation.name()),
                    ))?;
                }
            }
        }
        debug!(contract = %contract.key(), "exported contract");
        self.port_types.push(context.port_type);
        Ok(())
    }

    /// Exports `endpoint` (and its contract, once), advertising `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Extension`] naming the failing extension, or
    /// [`ExportError::Xml`] if a policy document cannot be rendered.
    pub fn export_endpoint(
        &mut self,
        endpoint: &ServiceEndpoint,
        address: &Uri,
    ) -> Result<(), ExportError> {
        self.export_contract(&endpoint.contract)?;
        let scope = format!("endpoint {}", endpoint.name());

        let mut policy = PolicyConversionContext::new(endpoint);
        for element in endpoint.binding.elements() {
            if let Some(exporter) = element.policy_exporter() {
                exporter
                    .export_policy(&mut policy)
                    .map_err(extension_error(element.name(), scope.clone()))?;
            }
        }
        for behavior in endpoint.behaviors.iter() {
            if let Some(exporter) = behavior.policy_exporter() {
                exporter
                    .export_policy(&mut policy)
                    .map_err(extension_error(behavior.name(), scope.clone()))?;
            }
        }
        let documents = policy.render_policies()?;
        let binding_policy = format!("{}_policy", endpoint.name());

        let mut context = WsdlEndpointConversionContext {
            contract: Arc::clone(&endpoint.contract),
            endpoint_name: endpoint.name().to_string(),
            port: Port {
                name: endpoint.name().to_string(),
                binding_name: endpoint.name().to_string(),
                binding_namespace: endpoint.binding.namespace().to_string(),
                address: address.to_string(),
                policy_reference: documents
                    .iter()
                    .any(|(id, _)| *id == binding_policy)
                    .then_some(binding_policy),
                documentation: None,
            },
        };
        for element in endpoint.binding.elements() {
            if let Some(exporter) = element.wsdl_exporter() {
                exporter
                    .export_endpoint(&mut context)
                    .map_err(extension_error(element.name(), scope.clone()))?;
            }
        }
        for behavior in endpoint.contract.behaviors.iter() {
            if let Some(exporter) = behavior.wsdl_exporter() {
                exporter
                    .export_endpoint(&mut context)
                    .map_err(extension_error(behavior.name(), scope.clone()))?;
            }
        }
        for behavior in endpoint.behaviors.iter() {
            if let Some(exporter) = behavior.wsdl_exporter() {
                exporter
                    .export_endpoint(&mut context)
                    .map_err(extension_error(behavior.name(), scope.clone()))?;
            }
        }

        debug!(
            endpoint = endpoint.name(),
            %address,
            policies = documents.len(),
            "exported endpoint"
        );
        self.policies.extend(documents);
        self.ports.push(context.port);
        Ok(())
    }

    #[must_use]
    pub fn port_types(&self) -> &[PortType] {
        &self.port_types
    }

    #[must_use]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    /// Renders the collected fragments: one WSDL section, then one policy
    /// section per policy document.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Xml`] if the writer fails.
    pub fn into_metadata_set(self) -> Result<MetadataSet, ExportError> {
        let mut set = MetadataSet::new();
        set.push(MetadataSection::document(
            dialect::WSDL,
            Some(self.target_namespace.clone()),
            self.render_wsdl()?,
        ));
        for (id, document) in self.policies {
            set.push(MetadataSection::document(dialect::POLICY, Some(id), document));
        }
        Ok(set)
    }

    fn render_wsdl(&self) -> Result<String, ExportError> {
        let mut writer = xml::writer();
        xml::start(
            &mut writer,
            "wsdl:definitions",
            &[
                ("name", self.service_name.as_str()),
                ("targetNamespace", self.target_namespace.as_str()),
                ("xmlns:tns", self.target_namespace.as_str()),
                ("xmlns:wsdl", WSDL_NAMESPACE),
                ("xmlns:soap12", WSDL_SOAP12_NAMESPACE),
                ("xmlns:wsaw", WS_ADDRESSING_WSDL_NAMESPACE),
                ("xmlns:wsp", super::WS_POLICY_NAMESPACE),
            ],
        )?;
        for port_type in &self.port_types {
            port_type.write_xml(&mut writer)?;
        }
        if !self.ports.is_empty() {
            xml::start(&mut writer, "wsdl:service", &[("name", self.service_name.as_str())])?;
            for port in &self.ports {
                port.write_xml(&mut writer)?;
            }
            xml::end(&mut writer, "wsdl:service")?;
        }
        xml::end(&mut writer, "wsdl:definitions")?;
        xml::finish(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{ContractBehavior, EndpointBehavior, OperationBehavior};
    use crate::binding::Binding;
    use crate::description::{ContractBuilder, EndpointAddress, OperationBuilder};
    use crate::metadata::policy::PolicyAssertion;

    struct Documented;
    impl ContractBehavior for Documented {
        fn name(&self) -> &'static str {
            "documented"
        }
        fn wsdl_exporter(&self) -> Option<&dyn WsdlExportExtension> {
            Some(self)
        }
    }
    impl WsdlExportExtension for Documented {
        fn export_contract(
            &self,
            context: &mut WsdlContractConversionContext,
        ) -> anyhow::Result<()> {
            context.port_type.documentation = Some("Order operations".into());
            if let Some(op) = context.operation_mut("Get") {
                op.documentation = Some("Fetch one order".into());
            }
            Ok(())
        }
    }

    struct Broken;
    impl OperationBehavior for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn wsdl_exporter(&self) -> Option<&dyn WsdlExportExtension> {
            Some(self)
        }
    }
    impl WsdlExportExtension for Broken {
        fn export_contract(
            &self,
            _context: &mut WsdlContractConversionContext,
        ) -> anyhow::Result<()> {
            anyhow::bail!("cannot describe operation")
        }
    }

    struct Tagged;
    impl EndpointBehavior for Tagged {
        fn policy_exporter(&self) -> Option<&dyn PolicyExportExtension> {
            Some(self)
        }
    }
    impl PolicyExportExtension for Tagged {
        fn export_policy(&self, context: &mut PolicyConversionContext) -> anyhow::Result<()> {
            context.binding_assertions().add(PolicyAssertion::new("Tagged", "urn:tags"));
            Ok(())
        }
    }

    fn contract() -> ContractDescription {
        ContractBuilder::new("IOrders")
            .namespace("urn:shop")
            .operation(OperationBuilder::new("Get").output("Order"))
            .build()
            .unwrap()
    }

    fn endpoint(
        contract: Arc<ContractDescription>,
        binding: Binding,
        url: &str,
    ) -> ServiceEndpoint {
        ServiceEndpoint::new(contract, Arc::new(binding), EndpointAddress::new(url).unwrap())
    }

    #[test]
    fn contracts_are_exported_once() {
        let mut contract = contract();
        contract.behaviors.add(Documented).unwrap();
        let contract = Arc::new(contract);
        let service = ServiceDescription::new("Orders", "urn:shop").unwrap();
        let mut exporter = MetadataExporter::for_service(&service);

        let a = endpoint(Arc::clone(&contract), Binding::basic_http().unwrap(), "http://h/a");
        let b = endpoint(Arc::clone(&contract), Binding::ws_http().unwrap(), "http://h/b");
        exporter.export_endpoint(&a, a.address.uri()).unwrap();
        exporter.export_endpoint(&b, b.address.uri()).unwrap();

        assert_eq!(exporter.port_types().len(), 1);
        assert_eq!(exporter.ports().len(), 2);
        let port_type = &exporter.port_types()[0];
        assert_eq!(port_type.documentation.as_deref(), Some("Order operations"));
        assert_eq!(port_type.operations[0].documentation.as_deref(), Some("Fetch one order"));
    }

    #[test]
    fn policy_comes_from_binding_elements_and_behaviors() {
        let contract = Arc::new(contract());
        let service = ServiceDescription::new("Orders", "urn:shop").unwrap();
        let mut exporter = MetadataExporter::for_service(&service);
        let mut ws = endpoint(contract, Binding::ws_http().unwrap(), "http://h/ws");
        ws.behaviors.add(Tagged).unwrap();
        exporter.export_endpoint(&ws, &"http://public:8080/ws".parse().unwrap()).unwrap();

        assert_eq!(
            exporter.ports()[0].policy_reference.as_deref(),
            Some("WSHttpBinding_IOrders_policy")
        );
        let set = exporter.into_metadata_set().unwrap();
        let policies: Vec<_> = set.sections_with_dialect(dialect::POLICY).collect();
        assert_eq!(policies.len(), 1);
        let crate::metadata::MetadataContent::Document(policy) = &policies[0].content else {
            panic!("policy section should be inline");
        };
        assert!(policy.contains("RMAssertion"));
        assert!(policy.contains("SymmetricBinding"));
        assert!(policy.contains("<Tagged xmlns=\"urn:tags\"/>"));

        let crate::metadata::MetadataContent::Document(wsdl) = &set.sections[0].content else {
            panic!("wsdl section should be inline");
        };
        assert!(wsdl.contains("<soap12:address location=\"http://public:8080/ws\"/>"));
    }

    #[test]
    fn extension_failure_names_the_extension() {
        let mut contract = contract();
        contract
            .operations
            .find_mut("Get")
            .unwrap()
            .behaviors
            .add(Broken)
            .unwrap();
        let service = ServiceDescription::new("Orders", "urn:shop").unwrap();
        let mut exporter = MetadataExporter::for_service(&service);
        let err = exporter.export_contract(&Arc::new(contract)).unwrap_err();
        match err {
            ExportError::Extension { extension, scope, .. } => {
                assert_eq!(extension, "broken");
                assert_eq!(scope, "operation Get");
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
