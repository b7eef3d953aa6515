//! Message shapes: body, headers, properties and the message collection.

use crate::error::DescriptionError;
use crate::naming::{QualifiedName, XmlName};

use super::collection::{
    MessageHeaderDescriptionCollection, MessagePartDescriptionCollection,
    MessagePropertyDescriptionCollection,
};
use super::part::{MessagePartDescription, ProtectionLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageDirection {
    Input,
    Output,
}

/// Body of a message: an optional wrapper element around ordered parts, and an
/// optional return value.
#[derive(Debug, Clone, Default)]
pub struct MessageBodyDescription {
    wrapper: Option<QualifiedName>,
    pub parts: MessagePartDescriptionCollection,
    pub return_value: Option<MessagePartDescription>,
}

impl MessageBodyDescription {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the body in element `name` of `namespace`.
    ///
    /// # Errors
    ///
    /// Fails on an empty name or a malformed namespace.
    pub fn set_wrapper(&mut self, name: &str, namespace: &str) -> Result<(), DescriptionError> {
        self.wrapper = Some(QualifiedName::new(XmlName::new(name)?, namespace)?);
        Ok(())
    }

    pub fn clear_wrapper(&mut self) {
        self.wrapper = None;
    }

    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.wrapper.is_some()
    }

    #[must_use]
    pub fn wrapper_name(&self) -> Option<&XmlName> {
        self.wrapper.as_ref().map(|w| &w.name)
    }

    #[must_use]
    pub fn wrapper_namespace(&self) -> Option<&str> {
        self.wrapper.as_ref().map(|w| w.namespace.as_str())
    }
}

/// One request or reply message of an operation.
#[derive(Debug, Clone)]
pub struct MessageDescription {
    pub action: String,
    direction: MessageDirection,
    pub body: MessageBodyDescription,
    pub headers: MessageHeaderDescriptionCollection,
    pub properties: MessagePropertyDescriptionCollection,
    message_name: Option<XmlName>,
    protection_level: Option<ProtectionLevel>,
}

impl MessageDescription {
    #[must_use]
    pub fn new(action: impl Into<String>, direction: MessageDirection) -> Self {
        Self {
            action: action.into(),
            direction,
            body: MessageBodyDescription::new(),
            headers: MessageHeaderDescriptionCollection::new(),
            properties: MessagePropertyDescriptionCollection::new(),
            message_name: None,
            protection_level: None,
        }
    }

    #[must_use]
    pub fn direction(&self) -> MessageDirection {
        self.direction
    }

    /// Explicit message type name, when the message is typed.
    #[must_use]
    pub fn message_name(&self) -> Option<&XmlName> {
        self.message_name.as_ref()
    }

    /// # Errors
    ///
    /// Fails on an empty name.
    pub fn set_message_name(&mut self, name: &str) -> Result<(), DescriptionError> {
        self.message_name = Some(XmlName::new(name)?);
        Ok(())
    }

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
}

/// Ordered messages of an operation. Actions are not unique: several messages
/// may share one (for instance a wildcard `*`).
#[derive(Debug, Clone, Default)]
pub struct MessageDescriptionCollection {
    items: Vec<MessageDescription>,
}

impl MessageDescriptionCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: MessageDescription) {
        self.items.push(message);
    }

    /// First message whose action equals `action`.
    #[must_use]
    pub fn find(&self, action: &str) -> Option<&MessageDescription> {
        self.items.iter().find(|m| m.action == action)
    }

    /// All messages whose action equals `action`, in insertion order.
    #[must_use]
    pub fn find_all(&self, action: &str) -> Vec<&MessageDescription> {
        self.items.iter().filter(|m| m.action == action).collect()
    }

    /// First message flowing in `direction`.
    #[must_use]
    pub fn by_direction(&self, direction: MessageDirection) -> Option<&MessageDescription> {
        self.items.iter().find(|m| m.direction == direction)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MessageDescription> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, MessageDescription> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_returns_first_match_and_find_all_every_match() {
        let mut messages = MessageDescriptionCollection::new();
        let mut first = MessageDescription::new("*", MessageDirection::Input);
        first.set_message_name("First").unwrap();
        messages.push(first);
        messages.push(MessageDescription::new("urn:a/Get", MessageDirection::Input));
        let mut second = MessageDescription::new("*", MessageDirection::Output);
        second.set_message_name("Second").unwrap();
        messages.push(second);

        assert_eq!(
            messages.find("*").unwrap().message_name().unwrap().decoded(),
            "First"
        );
        let all = messages.find_all("*");
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].direction(), MessageDirection::Output);

        assert!(messages.find("urn:missing").is_none());
        assert!(messages.find_all("urn:missing").is_empty());
    }

    #[test]
    fn wrapper_is_optional() {
        let mut body = MessageBodyDescription::new();
        assert!(!body.is_wrapped());
        body.set_wrapper("GetOrder", "urn:shop").unwrap();
        assert_eq!(body.wrapper_name().unwrap().decoded(), "GetOrder");
        assert_eq!(body.wrapper_namespace(), Some("urn:shop"));
        body.clear_wrapper();
        assert!(body.wrapper_name().is_none());
        assert!(body.set_wrapper("", "urn:shop").is_err());
    }
}
