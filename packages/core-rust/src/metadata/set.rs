use super::export::ExportError;
use super::location::{MetadataLocation, MetadataReference};
use super::xml::{self, XmlWriter};
use super::MEX_NAMESPACE;

/// Payload of a [`MetadataSection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataContent {
    /// An inline XML document, already rendered.
    Document(String),
    /// An endpoint that serves the document.
    Reference(MetadataReference),
    /// A URL the document can be downloaded from.
    Location(MetadataLocation),
}

/// One document (or pointer to one) of a given dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSection {
    pub dialect: String,
    pub identifier: Option<String>,
    pub content: MetadataContent,
}

impl MetadataSection {
    #[must_use]
    pub fn document(
        dialect: impl Into<String>,
        identifier: Option<String>,
        xml: impl Into<String>,
    ) -> Self {
        Self {
            dialect: dialect.into(),
            identifier,
            content: MetadataContent::Document(xml.into()),
        }
    }

    #[must_use]
    pub fn location(dialect: impl Into<String>, location: MetadataLocation) -> Self {
        Self {
            dialect: dialect.into(),
            identifier: None,
            content: MetadataContent::Location(location),
        }
    }

    #[must_use]
    pub fn reference(dialect: impl Into<String>, reference: MetadataReference) -> Self {
        Self {
            dialect: dialect.into(),
            identifier: None,
            content: MetadataContent::Reference(reference),
        }
    }

    fn write_xml(&self, writer: &mut XmlWriter) -> Result<(), ExportError> {
        let mut attributes = vec![("Dialect", self.dialect.as_str())];
        if let Some(identifier) = &self.identifier {
            attributes.push(("Identifier", identifier.as_str()));
        }
        xml::start(writer, "mex:MetadataSection", &attributes)?;
        match &self.content {
            MetadataContent::Document(document) => xml::raw(writer, document)?,
            MetadataContent::Reference(reference) => {
                reference.write_xml(writer, "mex:MetadataReference")?;
            }
            MetadataContent::Location(location) => {
                xml::text_element(writer, "mex:Location", &[], location.location())?;
            }
        }
        xml::end(writer, "mex:MetadataSection")
    }
}

/// The `mex:Metadata` body returned by a metadata `Get`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSet {
    pub sections: Vec<MetadataSection>,
    /// Extra attributes on the root element.
    pub attributes: Vec<(String, String)>,
}

impl MetadataSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, section: MetadataSection) {
        self.sections.push(section);
    }

    pub fn sections_with_dialect<'a>(
        &'a self,
        dialect: &'a str,
    ) -> impl Iterator<Item = &'a MetadataSection> + 'a {
        self.sections.iter().filter(move |s| s.dialect == dialect)
    }

    /// Renders the set as a `mex:Metadata` element.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Xml`] if the writer fails.
    pub fn write_xml(&self) -> Result<String, ExportError> {
        let mut writer = xml::writer();
        self.write_to(&mut writer)?;
        xml::finish(writer)
    }

    pub(crate) fn write_to(&self, writer: &mut XmlWriter) -> Result<(), ExportError> {
        let mut attributes = vec![("xmlns:mex", MEX_NAMESPACE)];
        attributes.extend(
            self.attributes
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        xml::start(writer, "mex:Metadata", &attributes)?;
        for section in &self.sections {
            section.write_xml(writer)?;
        }
        xml::end(writer, "mex:Metadata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::EndpointAddress;
    use crate::metadata::location::AddressingVersion;
    use crate::metadata::dialect;

    #[test]
    fn renders_every_content_kind() {
        let mut set = MetadataSet::new();
        set.push(MetadataSection::document(
            dialect::WSDL,
            Some("urn:shop".into()),
            "<wsdl:definitions/>",
        ));
        set.push(MetadataSection::location(
            dialect::XML_SCHEMA,
            MetadataLocation::new("/schemas/orders.xsd").unwrap(),
        ));
        set.push(MetadataSection::reference(
            dialect::MEX,
            MetadataReference::new(
                EndpointAddress::new("http://h:81/mex").unwrap(),
                AddressingVersion::WsAddressing10,
            ),
        ));

        let rendered = set.write_xml().unwrap();
        assert!(rendered.starts_with(
            "<mex:Metadata xmlns:mex=\"http://schemas.xmlsoap.org/ws/2004/09/mex\">"
        ));
        assert!(rendered.contains("Identifier=\"urn:shop\"><wsdl:definitions/>"));
        assert!(rendered.contains("<mex:Location>/schemas/orders.xsd</mex:Location>"));
        assert!(rendered.contains("<wsa10:Address>http://h:81/mex</wsa10:Address>"));
        assert!(rendered.ends_with("</mex:Metadata>"));
    }

    #[test]
    fn filters_by_dialect() {
        let mut set = MetadataSet::new();
        set.push(MetadataSection::document(dialect::WSDL, None, "<a/>"));
        set.push(MetadataSection::document(dialect::POLICY, None, "<b/>"));
        set.push(MetadataSection::document(dialect::POLICY, None, "<c/>"));
        assert_eq!(set.sections_with_dialect(dialect::POLICY).count(), 2);
    }
}
