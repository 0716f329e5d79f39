//! SAML error types.
//!
//! Hard failures only. Rule violations found while validating a received
//! message (timing, audience, issuer, `InResponseTo`, destination, status)
//! are accumulated in a [`ValidationResult`] instead; a caller that wants to
//! turn a non-empty result into an error wraps it in [`SamlError::Rejected`].

use thiserror::Error;

use crate::{signature::SignatureFailure, validation::ValidationResult};

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Input is not a well-formed protocol message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Signature absent, or present but not verifiable.
    #[error("signature invalid ({kind}): {detail}")]
    SignatureInvalid {
        /// Which check failed.
        kind: SignatureFailure,
        /// Context for logs.
        detail: String,
    },

    /// Remote party advertises no endpoint for the requested service.
    #[error("no usable {service} endpoint for {entity_id}")]
    NoUsableEndpoint {
        /// Remote entity id.
        entity_id: String,
        /// Service that was looked up, e.g. `SingleLogoutService`.
        service: &'static str,
    },

    /// Binding is unknown or cannot be produced by this engine.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// No metadata is known for the entity id.
    #[error("unknown remote party: {0}")]
    UnknownRemoteParty(String),

    /// A received message failed validation.
    #[error("message rejected: {0}")]
    Rejected(ValidationResult),

    /// A request id was issued twice.
    #[error("replayed request id: {0}")]
    Replay(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(String),

    /// Deflate compression or decompression error.
    #[error("deflate error: {0}")]
    Deflate(String),

    /// Key material or signing failure.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Local configuration cannot serve the request.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SamlError {
    /// Returns the top-level SAML status code for reporting this error to the
    /// remote party.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::MalformedMessage(_)
            | Self::SignatureInvalid { .. }
            | Self::Rejected(_)
            | Self::Replay(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::UnknownRemoteParty(_) => "urn:oasis:names:tc:SAML:2.0:status:Requester",
            Self::UnsupportedBinding(_) => "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported",
            Self::NoUsableEndpoint { .. } | Self::Crypto(_) | Self::Config(_) => {
                "urn:oasis:names:tc:SAML:2.0:status:Responder"
            }
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::MalformedMessage(_)
            | Self::Base64Decode(_)
            | Self::Deflate(_)
            | Self::UnsupportedBinding(_) => 400,
            Self::SignatureInvalid { .. } | Self::Rejected(_) | Self::Replay(_) => 401,
            Self::UnknownRemoteParty(_) => 404,
            Self::NoUsableEndpoint { .. } | Self::Crypto(_) | Self::Config(_) => 500,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

impl From<base64::DecodeError> for SamlError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Base64Decode(err.to_string())
    }
}

impl From<std::io::Error> for SamlError {
    fn from(err: std::io::Error) -> Self {
        Self::Deflate(err.to_string())
    }
}

impl From<sp_crypto::CryptoError> for SamlError {
    fn from(err: sp_crypto::CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<sp_cache::CacheError> for SamlError {
    fn from(err: sp_cache::CacheError) -> Self {
        match err {
            sp_cache::CacheError::Duplicate(id) => Self::Replay(id),
            sp_cache::CacheError::NotFound(id) => {
                Self::MalformedMessage(format!("unknown request id {id}"))
            }
        }
    }
}

impl From<sp_core::Error> for SamlError {
    fn from(err: sp_core::Error) -> Self {
        Self::Config(err.to_string())
    }
}
