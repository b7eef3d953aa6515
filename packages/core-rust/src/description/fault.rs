use crate::error::DescriptionError;
use crate::naming::{validate_namespace, XmlName};

use super::part::ProtectionLevel;

/// A declared fault of an operation.
#[derive(Debug, Clone)]
pub struct FaultDescription {
    pub action: String,
    pub detail_type: Option<String>,
    name: XmlName,
    namespace: String,
    protection_level: Option<ProtectionLevel>,
}

impl FaultDescription {
    /// # Errors
    ///
    /// Fails on an empty name or a malformed namespace.
    pub fn new(
        action: impl Into<String>,
        name: &str,
        namespace: &str,
    ) -> Result<Self, DescriptionError> {
        let name = XmlName::new(name)?;
        validate_namespace(namespace)?;
        Ok(Self {
            action: action.into(),
            detail_type: None,
            name,
            namespace: namespace.to_string(),
            protection_level: None,
        })
    }

    #[must_use]
    pub fn name(&self) -> &XmlName {
        &self.name
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Renames the fault detail element. Both values are validated before
    /// either is applied.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or a malformed namespace; the fault is unchanged.
    pub fn set_name_and_element(
        &mut self,
        name: &str,
        namespace: &str,
    ) -> Result<(), DescriptionError> {
        let name = XmlName::new(name)?;
        validate_namespace(namespace)?;
        self.name = name;
        self.namespace = namespace.to_string();
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
}

/// Ordered faults of an operation, searchable by action.
#[derive(Debug, Clone, Default)]
pub struct FaultDescriptionCollection {
    items: Vec<FaultDescription>,
}

impl FaultDescriptionCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fault: FaultDescription) {
        self.items.push(fault);
    }

    #[must_use]
    pub fn find(&self, action: &str) -> Option<&FaultDescription> {
        self.items.iter().find(|f| f.action == action)
    }

    #[must_use]
    pub fn find_all(&self, action: &str) -> Vec<&FaultDescription> {
        self.items.iter().filter(|f| f.action == action).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FaultDescription> {
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
