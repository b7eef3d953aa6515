//! Message parts, headers and properties.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DescriptionError;
use crate::naming::{QualifiedName, XmlName};

/// Required signing/encryption for a message, part or fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtectionLevel {
    None,
    Sign,
    EncryptAndSign,
}

impl ProtectionLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Sign => "Sign",
            Self::EncryptAndSign => "EncryptAndSign",
        }
    }
}

impl FromStr for ProtectionLevel {
    type Err = DescriptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "sign" => Ok(Self::Sign),
            "encryptandsign" => Ok(Self::EncryptAndSign),
            _ => Err(DescriptionError::InvalidProtectionLevel {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProtectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque reference to the member (field, parameter or property) a part
/// serializes from. Shared, never copied, when a part is cloned.
#[derive(Debug, PartialEq, Eq)]
pub struct MemberBinding {
    pub member_name: String,
    pub declaring_type: String,
}

/// Implemented by every item stored in a [`KeyedCollection`](super::KeyedCollection).
pub trait Keyed {
    /// Collection name used in duplicate-key errors.
    const COLLECTION: &'static str;

    fn key(&self) -> &QualifiedName;
}

// ---------------------------------------------------------------------------
// MessagePartDescription
// ---------------------------------------------------------------------------

/// One body part of a message.
#[derive(Debug, Clone)]
pub struct MessagePartDescription {
    key: QualifiedName,
    pub type_name: Option<String>,
    pub index: usize,
    pub multiple: bool,
    protection_level: Option<ProtectionLevel>,
    pub member_binding: Option<Arc<MemberBinding>>,
    unique_part_name: Option<String>,
}

impl MessagePartDescription {
    /// # Errors
    ///
    /// Fails on an empty name or a malformed namespace.
    pub fn new(name: &str, namespace: &str) -> Result<Self, DescriptionError> {
        let key = QualifiedName::new(XmlName::new(name)?, namespace)?;
        Ok(Self::with_key(key))
    }

    pub(crate) fn with_key(key: QualifiedName) -> Self {
        Self {
            key,
            type_name: None,
            index: 0,
            multiple: false,
            protection_level: None,
            member_binding: None,
            unique_part_name: None,
        }
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

    /// The explicit protection level, if one was set.
    #[must_use]
    pub fn protection_level(&self) -> Option<ProtectionLevel> {
        self.protection_level
    }

    pub fn set_protection_level(&mut self, level: ProtectionLevel) {
        self.protection_level = Some(level);
    }

    pub fn reset_protection_level(&mut self) {
        self.protection_level = None;
    }

    #[must_use]
    pub fn has_protection_level(&self) -> bool {
        self.protection_level.is_some()
    }

    /// Name used for the part in generated documents; defaults to the encoded name.
    #[must_use]
    pub fn unique_part_name(&self) -> &str {
        self.unique_part_name
            .as_deref()
            .unwrap_or_else(|| self.key.name.encoded())
    }

    pub fn set_unique_part_name(&mut self, name: impl Into<String>) {
        self.unique_part_name = Some(name.into());
    }
}

impl Keyed for MessagePartDescription {
    const COLLECTION: &'static str = "message parts";

    fn key(&self) -> &QualifiedName {
        &self.key
    }
}

// ---------------------------------------------------------------------------
// Headers and properties
// ---------------------------------------------------------------------------

/// A message header: a part plus SOAP header attributes.
#[derive(Debug, Clone)]
pub struct MessageHeaderDescription {
    part: MessagePartDescription,
    pub must_understand: bool,
    pub relay: bool,
    pub actor: Option<String>,
    pub typed_header: bool,
    pub is_unknown_header_collection: bool,
}

impl MessageHeaderDescription {
    /// # Errors
    ///
    /// Fails on an empty name or a malformed namespace.
    pub fn new(name: &str, namespace: &str) -> Result<Self, DescriptionError> {
        Ok(Self {
            part: MessagePartDescription::new(name, namespace)?,
            must_understand: false,
            relay: false,
            actor: None,
            typed_header: false,
            is_unknown_header_collection: false,
        })
    }

    #[must_use]
    pub fn part(&self) -> &MessagePartDescription {
        &self.part
    }

    pub fn part_mut(&mut self) -> &mut MessagePartDescription {
        &mut self.part
    }
}

impl Keyed for MessageHeaderDescription {
    const COLLECTION: &'static str = "message headers";

    fn key(&self) -> &QualifiedName {
        self.part.key()
    }
}

/// An out-of-band message property. Properties carry no namespace.
#[derive(Debug, Clone)]
pub struct MessagePropertyDescription {
    part: MessagePartDescription,
}

impl MessagePropertyDescription {
    /// # Errors
    ///
    /// Fails on an empty name.
    pub fn new(name: &str) -> Result<Self, DescriptionError> {
        Ok(Self {
            part: MessagePartDescription::with_key(QualifiedName::local(XmlName::new(name)?)),
        })
    }

    #[must_use]
    pub fn part(&self) -> &MessagePartDescription {
        &self.part
    }

    pub fn part_mut(&mut self) -> &mut MessagePartDescription {
        &mut self.part
    }
}

impl Keyed for MessagePropertyDescription {
    const COLLECTION: &'static str = "message properties";

    fn key(&self) -> &QualifiedName {
        self.part.key()
    }
}
