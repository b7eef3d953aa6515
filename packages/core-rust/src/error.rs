//! Construction-time errors raised while building or mutating a description.

use thiserror::Error;

/// Errors raised by the description graph, naming helpers and metadata wrappers.
///
/// Every variant carries the offending identifier so a failed service build can
/// be diagnosed from the message alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptionError {
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },

    #[error("'{name}' is not a valid encoded XML name")]
    InvalidEncodedName { name: String },

    #[error("namespace '{namespace}' is not an absolute URI")]
    InvalidNamespace { namespace: String },

    #[error("{collection} already contains an item keyed {key}")]
    DuplicateKey {
        collection: &'static str,
        key: String,
    },

    #[error("a behavior of type {type_name} is already attached")]
    DuplicateBehavior { type_name: &'static str },

    #[error("'{value}' is not a valid protection level")]
    InvalidProtectionLevel { value: String },

    #[error("'{location}' is not a valid relative or absolute URI")]
    InvalidMetadataLocation { location: String },

    #[error("endpoint address '{address}' is not an absolute URI")]
    InvalidAddress { address: String },

    #[error("binding '{binding}' has no transport element")]
    MissingTransport { binding: String },

    #[error("one-way operation '{operation}' cannot declare a reply or faults")]
    OneWayWithReply { operation: String },
}
