//! The metadata exchange `Get` operation.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::description::{ContractBuilder, ContractDescription, OperationBuilder};
use crate::error::DescriptionError;

use super::address::RequestContext;
use super::export::ExportError;
use super::set::MetadataSet;
use super::xml;
use super::{
    GET_ACTION, GET_RESPONSE_ACTION, MEX_NAMESPACE, METADATA_ELEMENT, SOAP12_ENVELOPE_NAMESPACE,
};

const ADDRESSING_NAMESPACE: &str = "http://www.w3.org/2005/08/addressing";

/// Name of the metadata exchange contract.
pub const METADATA_EXCHANGE_CONTRACT: &str = "IMetadataExchange";

/// An inbound metadata request.
#[derive(Debug, Clone)]
pub struct GetRequest {
    pub action: String,
    pub message_id: Option<String>,
    pub to: Option<String>,
    pub context: RequestContext,
}

impl GetRequest {
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        Self {
            action: GET_ACTION.to_string(),
            message_id: None,
            to: None,
            context,
        }
    }

    /// Reads the WS-Addressing `Action`, `MessageID` and `To` headers of a
    /// SOAP envelope. `transport_action` (from the `SOAPAction` header or the
    /// content type) is used when the envelope carries no `Action`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::MalformedRequest`] if the XML cannot be read
    /// or no action is available from either source.
    pub fn from_envelope(
        envelope: &str,
        transport_action: Option<&str>,
        context: RequestContext,
    ) -> Result<Self, ExchangeError> {
        let mut reader = Reader::from_str(envelope);
        reader.config_mut().trim_text(true);

        let mut in_header = false;
        let mut current: Option<Vec<u8>> = None;
        let mut action = None;
        let mut message_id = None;
        let mut to = None;
        loop {
            match reader.read_event() {
                Ok(Event::Start(element)) => {
                    let name = element.local_name().as_ref().to_vec();
                    if name == b"Header" {
                        in_header = true;
                    } else if in_header {
                        current = Some(name);
                    }
                }
                Ok(Event::Text(text)) => {
                    let Some(name) = current.as_deref() else {
                        continue;
                    };
                    let value = text
                        .unescape()
                        .map_err(|e| ExchangeError::MalformedRequest(e.to_string()))?
                        .trim()
                        .to_string();
                    match name {
                        b"Action" => action = Some(value),
                        b"MessageID" => message_id = Some(value),
                        b"To" => to = Some(value),
                        _ => {}
                    }
                }
                Ok(Event::End(element)) => {
                    if element.local_name().as_ref() == b"Header" {
                        in_header = false;
                    }
                    current = None;
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(ExchangeError::MalformedRequest(e.to_string())),
            }
        }

        let action = action
            .or_else(|| transport_action.map(str::to_string))
            .ok_or_else(|| ExchangeError::MalformedRequest("request carries no action".into()))?;
        Ok(Self {
            action,
            message_id,
            to,
            context,
        })
    }
}

/// Reply to a `Get`: a bare body holding one `mex:Metadata` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub metadata: MetadataSet,
}

impl GetResponse {
    /// Wraps the response in a reply message correlated to `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Xml`] if the metadata cannot be rendered.
    pub fn into_message(self, request: &GetRequest) -> Result<Message, ExportError> {
        Ok(Message {
            action: GET_RESPONSE_ACTION.to_string(),
            message_id: None,
            relates_to: request.message_id.clone(),
            body: self.metadata.write_xml()?,
        })
    }
}

/// A rendered reply: action, identity, correlation and body XML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub action: String,
    pub message_id: Option<String>,
    pub relates_to: Option<String>,
    pub body: String,
}

impl Message {
    /// Renders a SOAP 1.2 envelope with WS-Addressing headers.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Xml`] if the writer fails.
    pub fn write_envelope(&self) -> Result<String, ExportError> {
        let mut writer = xml::writer();
        xml::start(
            &mut writer,
            "s:Envelope",
            &[
                ("xmlns:s", SOAP12_ENVELOPE_NAMESPACE),
                ("xmlns:a", ADDRESSING_NAMESPACE),
            ],
        )?;
        xml::start(&mut writer, "s:Header", &[])?;
        xml::text_element(&mut writer, "a:Action", &[("s:mustUnderstand", "1")], &self.action)?;
        if let Some(message_id) = &self.message_id {
            xml::text_element(&mut writer, "a:MessageID", &[], message_id)?;
        }
        if let Some(relates_to) = &self.relates_to {
            xml::text_element(&mut writer, "a:RelatesTo", &[], relates_to)?;
        }
        xml::end(&mut writer, "s:Header")?;
        xml::start(&mut writer, "s:Body", &[])?;
        xml::raw(&mut writer, &self.body)?;
        xml::end(&mut writer, "s:Body")?;
        xml::end(&mut writer, "s:Envelope")?;
        xml::finish(writer)
    }
}

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("action '{action}' is not supported by the metadata exchange endpoint")]
    UnsupportedAction { action: String },

    #[error("malformed metadata request: {0}")]
    MalformedRequest(String),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("cannot resolve advertised address: {0}")]
    Address(#[from] DescriptionError),
}

/// Answers metadata `Get` requests.
#[async_trait]
pub trait MetadataExchange: Send + Sync {
    /// # Errors
    ///
    /// Fails for any action other than [`GET_ACTION`] (or its WS-Transfer
    /// alias), or when export fails.
    fn get(&self, request: &GetRequest) -> Result<Message, ExchangeError>;

    /// Asynchronous form of [`get`](Self::get); same action, same result.
    async fn get_async(&self, request: &GetRequest) -> Result<Message, ExchangeError> {
        self.get(request)
    }
}

/// The `IMetadataExchange` contract: one `Get` operation with a bare reply
/// whose single body element is `mex:Metadata`.
///
/// # Errors
///
/// Never fails for the fixed names; the `Result` mirrors [`ContractBuilder::build`].
pub fn metadata_exchange_contract() -> Result<ContractDescription, DescriptionError> {
    ContractBuilder::new(METADATA_EXCHANGE_CONTRACT)
        .namespace(MEX_NAMESPACE)
        .operation(
            OperationBuilder::new("Get")
                .bare()
                .action(GET_ACTION)
                .reply_action(GET_RESPONSE_ACTION)
                .output_element(METADATA_ELEMENT, MEX_NAMESPACE, "MetadataSet"),
        )
        .build()
}
