//! Explicit construction of contract descriptions.
//!
//! Builders collect raw strings and validate everything in `build()`, so a
//! contract is either produced whole or not at all. The resulting graph uses
//! the default naming rules from [`crate::naming`]:
//!
//! - request action `{ns}/{Contract}/{Operation}`, reply action `...Response`
//! - wrapped request element `{Operation}`, wrapped reply element `{Operation}Response`
//! - return value part `{Operation}Result`
//! - fault action `{ns}/{Contract}/{Operation}{Fault}Fault`

use crate::error::DescriptionError;
use crate::naming::{default_action, default_fault_action, DEFAULT_NAMESPACE};

use super::contract::{ContractDescription, SessionMode};
use super::fault::FaultDescription;
use super::message::{MessageDescription, MessageDirection};
use super::operation::OperationDescription;
use super::part::{MessageHeaderDescription, MessagePartDescription, ProtectionLevel};

#[derive(Debug, Clone)]
struct PartSpec {
    name: String,
    namespace: Option<String>,
    type_name: String,
}

#[derive(Debug, Clone)]
struct HeaderSpec {
    name: String,
    type_name: String,
    must_understand: bool,
}

/// Builder for one operation; added to a [`ContractBuilder`].
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    name: String,
    one_way: bool,
    bare: bool,
    action: Option<String>,
    reply_action: Option<String>,
    inputs: Vec<PartSpec>,
    return_type: Option<String>,
    output_element: Option<PartSpec>,
    headers: Vec<HeaderSpec>,
    faults: Vec<(String, String)>,
    known_types: Vec<String>,
    is_initiating: bool,
    is_terminating: bool,
    protection_level: Option<ProtectionLevel>,
}

impl OperationBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            one_way: false,
            bare: false,
            action: None,
            reply_action: None,
            inputs: Vec::new(),
            return_type: None,
            output_element: None,
            headers: Vec::new(),
            faults: Vec::new(),
            known_types: Vec::new(),
            is_initiating: true,
            is_terminating: false,
            protection_level: None,
        }
    }

    /// Request only; no reply message is created.
    #[must_use]
    pub fn one_way(mut self) -> Self {
        self.one_way = true;
        self
    }

    /// Bodies are not wrapped in an operation element.
    #[must_use]
    pub fn bare(mut self) -> Self {
        self.bare = true;
        self
    }

    #[must_use]
    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[must_use]
    pub fn reply_action(mut self, action: impl Into<String>) -> Self {
        self.reply_action = Some(action.into());
        self
    }

    /// Adds a request body part in the contract namespace.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.inputs.push(PartSpec {
            name: name.into(),
            namespace: None,
            type_name: type_name.into(),
        });
        self
    }

    /// Declares a return value, named `{Operation}Result`.
    #[must_use]
    pub fn output(mut self, type_name: impl Into<String>) -> Self {
        self.return_type = Some(type_name.into());
        self
    }

    /// Declares the reply body as a single element with a fixed name and namespace.
    #[must_use]
    pub fn output_element(
        mut self,
        name: impl Into<String>,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        self.output_element = Some(PartSpec {
            name: name.into(),
            namespace: Some(namespace.into()),
            type_name: type_name.into(),
        });
        self
    }

    /// Adds a request header in the contract namespace.
    #[must_use]
    pub fn header(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        must_understand: bool,
    ) -> Self {
        self.headers.push(HeaderSpec {
            name: name.into(),
            type_name: type_name.into(),
            must_understand,
        });
        self
    }

    #[must_use]
    pub fn fault(mut self, name: impl Into<String>, detail_type: impl Into<String>) -> Self {
        self.faults.push((name.into(), detail_type.into()));
        self
    }

    #[must_use]
    pub fn known_type(mut self, type_name: impl Into<String>) -> Self {
        self.known_types.push(type_name.into());
        self
    }

    #[must_use]
    pub fn non_initiating(mut self) -> Self {
        self.is_initiating = false;
        self
    }

    #[must_use]
    pub fn terminating(mut self) -> Self {
        self.is_terminating = true;
        self
    }

    #[must_use]
    pub fn protection_level(mut self, level: ProtectionLevel) -> Self {
        self.protection_level = Some(level);
        self
    }

    fn build(
        self,
        contract_name: &str,
        namespace: &str,
    ) -> Result<OperationDescription, DescriptionError> {
        let mut operation = OperationDescription::new(&self.name)?;
        let has_reply = self.return_type.is_some()
            || self.output_element.is_some()
            || self.reply_action.is_some()
            || !self.faults.is_empty();
        if self.one_way && has_reply {
            return Err(DescriptionError::OneWayWithReply {
                operation: self.name,
            });
        }

        let action = self
            .action
            .unwrap_or_else(|| default_action(namespace, contract_name, &self.name, false));
        let mut request = MessageDescription::new(action, MessageDirection::Input);
        if !self.bare {
            request.body.set_wrapper(&self.name, namespace)?;
        }
        for (index, spec) in self.inputs.into_iter().enumerate() {
            let part_ns = spec.namespace.as_deref().unwrap_or(namespace);
            let mut part = MessagePartDescription::new(&spec.name, part_ns)?;
            part.index = index;
            part.type_name = Some(spec.type_name);
            request.body.parts.add(part)?;
        }
        for spec in self.headers {
            let mut header = MessageHeaderDescription::new(&spec.name, namespace)?;
            header.must_understand = spec.must_understand;
            header.typed_header = true;
            header.part_mut().type_name = Some(spec.type_name);
            request.headers.add(header)?;
        }
        operation.messages.push(request);

        if !self.one_way {
            let reply_action = self
                .reply_action
                .unwrap_or_else(|| default_action(namespace, contract_name, &self.name, true));
            let mut reply = MessageDescription::new(reply_action, MessageDirection::Output);
            if !self.bare {
                reply
                    .body
                    .set_wrapper(&format!("{}Response", self.name), namespace)?;
            }
            if let Some(spec) = self.output_element {
                let part_ns = spec.namespace.as_deref().unwrap_or(namespace);
                let mut part = MessagePartDescription::new(&spec.name, part_ns)?;
                part.type_name = Some(spec.type_name);
                reply.body.parts.add(part)?;
            }
            if let Some(type_name) = self.return_type {
                let mut result =
                    MessagePartDescription::new(&format!("{}Result", self.name), namespace)?;
                result.type_name = Some(type_name);
                reply.body.return_value = Some(result);
            }
            operation.messages.push(reply);
        }

        for (fault_name, detail_type) in self.faults {
            let action = default_fault_action(namespace, contract_name, &self.name, &fault_name);
            let mut fault = FaultDescription::new(action, &fault_name, namespace)?;
            fault.detail_type = Some(detail_type);
            operation.faults.push(fault);
        }

        operation.known_types = self.known_types;
        operation.is_initiating = self.is_initiating;
        operation.is_terminating = self.is_terminating;
        if let Some(level) = self.protection_level {
            operation.set_protection_level(level);
        }
        Ok(operation)
    }
}

/// Builder for a [`ContractDescription`].
#[derive(Debug, Clone)]
pub struct ContractBuilder {
    name: String,
    namespace: String,
    configuration_name: Option<String>,
    session_mode: SessionMode,
    protection_level: Option<ProtectionLevel>,
    operations: Vec<OperationBuilder>,
}

impl ContractBuilder {
    /// Starts a contract in the default namespace.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            configuration_name: None,
            session_mode: SessionMode::default(),
            protection_level: None,
            operations: Vec::new(),
        }
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn configuration_name(mut self, name: impl Into<String>) -> Self {
        self.configuration_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    #[must_use]
    pub fn protection_level(mut self, level: ProtectionLevel) -> Self {
        self.protection_level = Some(level);
        self
    }

    #[must_use]
    pub fn operation(mut self, operation: OperationBuilder) -> Self {
        self.operations.push(operation);
        self
    }

    /// # Errors
    ///
    /// Fails on any invalid name or namespace, a duplicate operation name, a
    /// duplicate part or header within a message, or a one-way operation that
    /// declares a reply or faults.
    pub fn build(self) -> Result<ContractDescription, DescriptionError> {
        let mut contract = ContractDescription::new(&self.name, &self.namespace)?;
        if let Some(name) = &self.configuration_name {
            contract.set_configuration_name(name)?;
        }
        contract.session_mode = self.session_mode;
        if let Some(level) = self.protection_level {
            contract.set_protection_level(level);
        }
        for builder in self.operations {
            let operation = builder.build(&self.name, &self.namespace)?;
            if contract.operations.find(operation.name().decoded()).is_some() {
                return Err(DescriptionError::DuplicateKey {
                    collection: "operations",
                    key: operation.name().to_string(),
                });
            }
            contract.operations.push(operation);
        }
        Ok(contract)
    }
}
