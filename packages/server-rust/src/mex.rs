//! The metadata exchange service over an opened host.

use async_trait::async_trait;
use http::Uri;
use servicemodel_core::metadata::{
    dialect, is_get_action, ExchangeError, GetRequest, GetResponse, Message, MetadataExchange,
    MetadataExporter, MetadataSection, MetadataSet, RequestContext,
};
use servicemodel_core::ServiceEndpoint;
use tracing::{debug, info_span, warn};
use uuid::Uuid;

use crate::host::OpenedServiceHost;

/// Answers `Get` requests by exporting the host's application endpoints,
/// advertising for each the address resolved for the calling request.
#[derive(Debug, Clone)]
pub struct MetadataExchangeService {
    host: OpenedServiceHost,
}

impl MetadataExchangeService {
    #[must_use]
    pub fn new(host: OpenedServiceHost) -> Self {
        Self { host }
    }

    #[must_use]
    pub fn host(&self) -> &OpenedServiceHost {
        &self.host
    }

    /// The address each application endpoint is advertised at for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Address`] if a provider yields an unusable base.
    pub fn advertised_address(
        &self,
        endpoint: &ServiceEndpoint,
        context: &RequestContext,
    ) -> Result<Uri, ExchangeError> {
        match self.host.metadata_extension() {
            Some(extension) => Ok(extension.resolve_endpoint_address(endpoint, context)?),
            None => Ok(endpoint.listen_uri().clone()),
        }
    }

    /// Exports the metadata set as seen by the client behind `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Address`] or [`ExchangeError::Export`].
    pub fn export(&self, context: &RequestContext) -> Result<MetadataSet, ExchangeError> {
        let description = self.host.description();
        let mut exporter = MetadataExporter::for_service(description);
        for endpoint in self.host.application_endpoints() {
            let address = self.advertised_address(endpoint, context)?;
            exporter.export_endpoint(endpoint, &address)?;
        }
        let mut metadata = exporter.into_metadata_set()?;

        let external = self
            .host
            .metadata_extension()
            .and_then(|e| e.settings().external_metadata_location.clone());
        if let Some(location) = external {
            metadata.push(MetadataSection::location(dialect::WSDL, location));
        }
        Ok(metadata)
    }
}

#[async_trait]
impl MetadataExchange for MetadataExchangeService {
    fn get(&self, request: &GetRequest) -> Result<Message, ExchangeError> {
        let span = info_span!(
            "metadata_get",
            service = %self.host.description().name(),
            host_header = request.context.host_header.as_deref().unwrap_or("-"),
        );
        let _enter = span.enter();

        if !is_get_action(&request.action) {
            warn!(action = %request.action, "rejected metadata request with unsupported action");
            return Err(ExchangeError::UnsupportedAction {
                action: request.action.clone(),
            });
        }

        let metadata = self.export(&request.context)?;
        debug!(sections = metadata.sections.len(), "metadata exported");
        let mut message = GetResponse { metadata }.into_message(request)?;
        message.message_id = Some(format!("urn:uuid:{}", Uuid::new_v4()));
        Ok(message)
    }
}
