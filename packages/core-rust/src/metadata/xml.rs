//! Thin helpers over `quick_xml::Writer` shared by the metadata renderers.

use std::fmt::Display;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::export::ExportError;

pub(crate) type XmlWriter = Writer<Vec<u8>>;

pub(crate) fn writer() -> XmlWriter {
    Writer::new(Vec::new())
}

pub(crate) fn finish(writer: XmlWriter) -> Result<String, ExportError> {
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

pub(crate) fn xml_error(err: impl Display) -> ExportError {
    ExportError::Xml(err.to_string())
}

pub(crate) fn start(
    writer: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
) -> Result<(), ExportError> {
    writer
        .write_event(Event::Start(
            BytesStart::new(name).with_attributes(attributes.iter().copied()),
        ))
        .map_err(xml_error)
}

pub(crate) fn end(writer: &mut XmlWriter, name: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

pub(crate) fn empty(
    writer: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
) -> Result<(), ExportError> {
    writer
        .write_event(Event::Empty(
            BytesStart::new(name).with_attributes(attributes.iter().copied()),
        ))
        .map_err(xml_error)
}

/// Writes `value` as escaped character data.
pub(crate) fn text(writer: &mut XmlWriter, value: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_error)
}

/// Writes an already rendered fragment without escaping.
pub(crate) fn raw(writer: &mut XmlWriter, fragment: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::Text(BytesText::from_escaped(fragment)))
        .map_err(xml_error)
}

/// `<name attrs>value</name>` in one call.
pub(crate) fn text_element(
    writer: &mut XmlWriter,
    name: &str,
    attributes: &[(&str, &str)],
    value: &str,
) -> Result<(), ExportError> {
    start(writer, name, attributes)?;
    text(writer, value)?;
    end(writer, name)
}
