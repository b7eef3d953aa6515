use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorCollection, ContractBehavior};
use crate::error::DescriptionError;
use crate::naming::{get_client_class_name, QualifiedName, XmlName};

use super::operation::OperationDescriptionCollection;
use super::part::ProtectionLevel;

/// Whether endpoints exposing a contract must, may or must not carry a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    #[default]
    Allowed,
    Required,
    NotAllowed,
}

/// A named set of operations.
#[derive(Debug, Clone)]
pub struct ContractDescription {
    key: QualifiedName,
    configuration_name: String,
    pub session_mode: SessionMode,
    protection_level: Option<ProtectionLevel>,
    pub operations: OperationDescriptionCollection,
    pub behaviors: BehaviorCollection<dyn ContractBehavior>,
}

impl ContractDescription {
    /// The configuration name defaults to the contract name.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or a malformed namespace.
    pub fn new(name: &str, namespace: &str) -> Result<Self, DescriptionError> {
        let key = QualifiedName::new(XmlName::new(name)?, namespace)?;
        Ok(Self {
            configuration_name: name.to_string(),
            key,
            session_mode: SessionMode::default(),
            protection_level: None,
            operations: OperationDescriptionCollection::new(),
            behaviors: BehaviorCollection::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &XmlName {
        &self.key.name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.key.namespace
    }

    #[must_use]
    pub fn key(&self) -> &QualifiedName {
        &self.key
    }

    /// Name used to look the contract up from configuration.
    #[must_use]
    pub fn configuration_name(&self) -> &str {
        &self.configuration_name
    }

    /// # Errors
    ///
    /// Fails on an empty name.
    pub fn set_configuration_name(&mut self, name: &str) -> Result<(), DescriptionError> {
        if name.is_empty() {
            return Err(DescriptionError::EmptyName {
                field: "configuration_name",
            });
        }
        self.configuration_name = name.to_string();
        Ok(())
    }

    #[must_use]
    pub fn protection_level(&self) -> Option<ProtectionLevel> {
        self.protection_level
    }

    pub fn set_protection_level(&mut self, level: ProtectionLevel) {
        self.protection_level = Some(level);
    }

    #[must_use]
    pub fn has_protection_level(&self) -> bool {
        self.protection_level.is_some()
    }

    /// Suggested proxy type name for generated clients.
    #[must_use]
    pub fn client_class_name(&self) -> String {
        get_client_class_name(self.key.name.decoded())
    }
}
