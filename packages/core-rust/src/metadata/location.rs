//! Pointers to metadata held elsewhere: a plain location URI, or an endpoint
//! reference that serves it.

use std::fmt;

use crate::description::EndpointAddress;
use crate::error::DescriptionError;
use crate::uri::is_uri_reference;

use super::export::ExportError;
use super::xml::{self, XmlWriter};

/// URI (absolute or relative) from which a metadata document can be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLocation {
    location: String,
}

impl MetadataLocation {
    /// # Errors
    ///
    /// See [`MetadataLocation::set_location`].
    pub fn new(location: &str) -> Result<Self, DescriptionError> {
        let mut value = Self {
            location: String::new(),
        };
        value.set_location(location)?;
        Ok(value)
    }

    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    /// # Errors
    ///
    /// Returns [`DescriptionError::InvalidMetadataLocation`] when `location` is
    /// not a well-formed relative or absolute URI. The old value is kept.
    pub fn set_location(&mut self, location: &str) -> Result<(), DescriptionError> {
        if !is_uri_reference(location) {
            return Err(DescriptionError::InvalidMetadataLocation {
                location: location.to_string(),
            });
        }
        self.location = location.to_string();
        Ok(())
    }
}

impl fmt::Display for MetadataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}

/// WS-Addressing flavour used to write an endpoint reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressingVersion {
    #[default]
    WsAddressing10,
    WsAddressingAugust2004,
    /// No addressing; the reference is the bare address text.
    None,
}

impl AddressingVersion {
    #[must_use]
    pub fn namespace(self) -> Option<&'static str> {
        match self {
            Self::WsAddressing10 => Some("http://www.w3.org/2005/08/addressing"),
            Self::WsAddressingAugust2004 => {
                Some("http://schemas.xmlsoap.org/ws/2004/08/addressing")
            }
            Self::None => None,
        }
    }

    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::WsAddressing10 => "wsa10",
            Self::WsAddressingAugust2004 | Self::None => "wsa",
        }
    }
}

impl EndpointAddress {
    /// Writes this address as an endpoint reference element named `element`.
    pub(crate) fn write_xml(
        &self,
        writer: &mut XmlWriter,
        element: &str,
        version: AddressingVersion,
    ) -> Result<(), ExportError> {
        let uri = self.to_string();
        let Some(namespace) = version.namespace() else {
            return xml::text_element(writer, element, &[], &uri);
        };
        let prefix = version.prefix();
        let xmlns = format!("xmlns:{prefix}");
        xml::start(writer, element, &[(xmlns.as_str(), namespace)])?;
        xml::text_element(writer, &format!("{prefix}:Address"), &[], &uri)?;
        xml::end(writer, element)
    }
}

/// Endpoint reference of a service that answers metadata requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataReference {
    pub address: EndpointAddress,
    pub addressing_version: AddressingVersion,
}

impl MetadataReference {
    #[must_use]
    pub fn new(address: EndpointAddress, addressing_version: AddressingVersion) -> Self {
        Self {
            address,
            addressing_version,
        }
    }

    pub(crate) fn write_xml(
        &self,
        writer: &mut XmlWriter,
        element: &str,
    ) -> Result<(), ExportError> {
        self.address
            .write_xml(writer, element, self.addressing_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_accepts_relative_and_absolute() {
        assert_eq!(MetadataLocation::new("/mex").unwrap().location(), "/mex");
        assert!(MetadataLocation::new("http://example.com/svc?wsdl").is_ok());
        assert!(MetadataLocation::new("docs/service.wsdl").is_ok());
    }

    #[test]
    fn malformed_location_fails_and_keeps_value() {
        let mut location = MetadataLocation::new("/mex").unwrap();
        let err = location.set_location("not a uri with spaces").unwrap_err();
        assert_eq!(
            err,
            DescriptionError::InvalidMetadataLocation {
                location: "not a uri with spaces".into()
            }
        );
        assert_eq!(location.location(), "/mex");
    }

    #[test]
    fn reference_xml_follows_addressing_version() {
        let address = EndpointAddress::new("http://localhost:8080/mex").unwrap();

        let mut writer = xml::writer();
        MetadataReference::new(address.clone(), AddressingVersion::WsAddressing10)
            .write_xml(&mut writer, "mex:MetadataReference")
            .unwrap();
        let rendered = xml::finish(writer).unwrap();
        assert!(rendered.contains("xmlns:wsa10=\"http://www.w3.org/2005/08/addressing\""));
        assert!(rendered.contains("<wsa10:Address>http://localhost:8080/mex</wsa10:Address>"));

        let mut writer = xml::writer();
        MetadataReference::new(address, AddressingVersion::None)
            .write_xml(&mut writer, "Ref")
            .unwrap();
        assert_eq!(
            xml::finish(writer).unwrap(),
            "<Ref>http://localhost:8080/mex</Ref>"
        );
    }
}
