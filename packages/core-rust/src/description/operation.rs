use crate::behavior::{BehaviorCollection, OperationBehavior};
use crate::error::DescriptionError;
use crate::naming::XmlName;

use super::fault::FaultDescriptionCollection;
use super::message::{MessageDescription, MessageDescriptionCollection, MessageDirection};
use super::part::ProtectionLevel;

/// One operation of a contract.
#[derive(Debug, Clone)]
pub struct OperationDescription {
    name: XmlName,
    pub messages: MessageDescriptionCollection,
    pub faults: FaultDescriptionCollection,
    /// Extra types the serializer must know about, by type name.
    pub known_types: Vec<String>,
    pub is_initiating: bool,
    pub is_terminating: bool,
    protection_level: Option<ProtectionLevel>,
    pub behaviors: BehaviorCollection<dyn OperationBehavior>,
}

impl OperationDescription {
    /// # Errors
    ///
    /// Fails on an empty name.
    pub fn new(name: &str) -> Result<Self, DescriptionError> {
        Ok(Self {
            name: XmlName::new(name)?,
            messages: MessageDescriptionCollection::new(),
            faults: FaultDescriptionCollection::new(),
            known_types: Vec::new(),
            is_initiating: true,
            is_terminating: false,
            protection_level: None,
            behaviors: BehaviorCollection::new(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &XmlName {
        &self.name
    }

    /// An operation with only a request message has no reply.
    #[must_use]
    pub fn is_one_way(&self) -> bool {
        self.messages.len() == 1
    }

    #[must_use]
    pub fn input_message(&self) -> Option<&MessageDescription> {
        self.messages.by_direction(MessageDirection::Input)
    }

    #[must_use]
    pub fn output_message(&self) -> Option<&MessageDescription> {
        self.messages.by_direction(MessageDirection::Output)
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
}

/// Ordered operations of a contract, searchable by name.
#[derive(Debug, Clone, Default)]
pub struct OperationDescriptionCollection {
    items: Vec<OperationDescription>,
}

impl OperationDescriptionCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: OperationDescription) {
        self.items.push(operation);
    }

    /// First operation with the given (decoded) name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&OperationDescription> {
        self.items.iter().find(|op| op.name.decoded() == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut OperationDescription> {
        self.items.iter_mut().find(|op| op.name.decoded() == name)
    }

    #[must_use]
    pub fn find_all(&self, name: &str) -> Vec<&OperationDescription> {
        self.items
            .iter()
            .filter(|op| op.name.decoded() == name)
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OperationDescription> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, OperationDescription> {
        self.items.iter_mut()
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

impl<'a> IntoIterator for &'a OperationDescriptionCollection {
    type Item = &'a OperationDescription;
    type IntoIter = std::slice::Iter<'a, OperationDescription>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
