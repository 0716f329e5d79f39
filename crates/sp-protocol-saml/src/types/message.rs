//! Fields shared by every protocol message, and the closed set of message
//! kinds.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sp_crypto::{DigestAlgorithm, SignatureAlgorithm};

pub use sp_core::MessageKind;

use super::{Assertion, AuthnRequest, LogoutRequest, LogoutResponse, Response, SAML_VERSION};
use crate::xml::XmlElement;

/// Common header: id, issue instant, issuer, destination, version and
/// signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    /// Unique message id.
    pub id: String,

    /// When the message was issued (UTC, whole seconds).
    pub issue_instant: DateTime<Utc>,

    /// Entity id of the issuing party.
    pub issuer: String,

    /// URL the message is addressed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Protocol version, always "2.0" on outbound messages.
    pub version: String,

    /// Signature, if the message is signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl MessageHeader {
    /// Creates a header with a fresh random id carrying `id_prefix`.
    #[must_use]
    pub fn new(id_prefix: &str) -> Self {
        Self {
            id: sp_crypto::random::message_id(id_prefix),
            issue_instant: Utc::now().trunc_subsecs(0),
            issuer: String::new(),
            destination: None,
            version: SAML_VERSION.to_string(),
            signature: None,
        }
    }
}

/// Where a signature lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SignaturePlacement {
    /// Enveloped `ds:Signature` inside the message (HTTP-POST, metadata).
    Embedded {
        /// `Reference/@URI`, `#` followed by the message id.
        reference_uri: String,
        /// Digest method.
        digest_algorithm: DigestAlgorithm,
        /// Digest over the canonical message without its signature.
        digest_value: Vec<u8>,
        /// The `ds:SignedInfo` element the signature value covers.
        signed_info: XmlElement,
    },
    /// Signature over the HTTP-Redirect query string.
    Detached {
        /// Exact octets signed: `SAMLRequest=..&RelayState=..&SigAlg=..`.
        signed_octets: String,
    },
}

/// A message signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature method.
    pub algorithm: SignatureAlgorithm,

    /// Raw signature value.
    pub value: Vec<u8>,

    /// Base64 DER of the signing certificate carried in `KeyInfo`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,

    /// Embedded or detached.
    pub placement: SignaturePlacement,
}

impl Signature {
    /// Digest method for embedded signatures.
    #[must_use]
    pub const fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        match &self.placement {
            SignaturePlacement::Embedded {
                digest_algorithm, ..
            } => Some(*digest_algorithm),
            SignaturePlacement::Detached { .. } => None,
        }
    }

    /// Returns true for an enveloped signature.
    #[must_use]
    pub const fn is_embedded(&self) -> bool {
        matches!(self.placement, SignaturePlacement::Embedded { .. })
    }
}

/// Capability shared by every message kind.
///
/// The `with_*` setters consume and return the concrete type so calls chain.
pub trait SamlMessage {
    /// Kind of this message.
    const KIND: MessageKind;

    /// Shared header.
    fn header(&self) -> &MessageHeader;

    /// Shared header, mutable.
    fn header_mut(&mut self) -> &mut MessageHeader;

    /// Message id.
    fn id(&self) -> &str {
        &self.header().id
    }

    /// Issuing entity id.
    fn issuer(&self) -> &str {
        &self.header().issuer
    }

    /// Destination URL.
    fn destination(&self) -> Option<&str> {
        self.header().destination.as_deref()
    }

    /// Issue instant.
    fn issue_instant(&self) -> DateTime<Utc> {
        self.header().issue_instant
    }

    /// Signature, if present.
    fn signature(&self) -> Option<&Signature> {
        self.header().signature.as_ref()
    }

    /// Sets the id.
    #[must_use]
    fn with_id(mut self, id: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.header_mut().id = id.into();
        self
    }

    /// Sets the issuer.
    #[must_use]
    fn with_issuer(mut self, issuer: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.header_mut().issuer = issuer.into();
        self
    }

    /// Sets the destination.
    #[must_use]
    fn with_destination(mut self, destination: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.header_mut().destination = Some(destination.into());
        self
    }

    /// Sets the issue instant.
    #[must_use]
    fn with_issue_instant(mut self, instant: DateTime<Utc>) -> Self
    where
        Self: Sized,
    {
        self.header_mut().issue_instant = instant;
        self
    }

    /// Sets or clears the signature.
    #[must_use]
    fn with_signature(mut self, signature: Option<Signature>) -> Self
    where
        Self: Sized,
    {
        self.header_mut().signature = signature;
        self
    }
}

/// Any protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolMessage {
    /// `samlp:AuthnRequest`.
    AuthnRequest(AuthnRequest),
    /// `samlp:Response`.
    Response(Response),
    /// `saml:Assertion`.
    Assertion(Assertion),
    /// `samlp:LogoutRequest`.
    LogoutRequest(LogoutRequest),
    /// `samlp:LogoutResponse`.
    LogoutResponse(LogoutResponse),
}

impl ProtocolMessage {
    /// Kind of the wrapped message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::AuthnRequest(_) => MessageKind::AuthnRequest,
            Self::Response(_) => MessageKind::Response,
            Self::Assertion(_) => MessageKind::Assertion,
            Self::LogoutRequest(_) => MessageKind::LogoutRequest,
            Self::LogoutResponse(_) => MessageKind::LogoutResponse,
        }
    }

    /// Shared header.
    #[must_use]
    pub const fn header(&self) -> &MessageHeader {
        match self {
            Self::AuthnRequest(m) => &m.header,
            Self::Response(m) => &m.header,
            Self::Assertion(m) => &m.header,
            Self::LogoutRequest(m) => &m.header,
            Self::LogoutResponse(m) => &m.header,
        }
    }

    /// Shared header, mutable.
    pub fn header_mut(&mut self) -> &mut MessageHeader {
        match self {
            Self::AuthnRequest(m) => &mut m.header,
            Self::Response(m) => &mut m.header,
            Self::Assertion(m) => &mut m.header,
            Self::LogoutRequest(m) => &mut m.header,
            Self::LogoutResponse(m) => &mut m.header,
        }
    }

    /// Message id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.header().id
    }

    /// Issuing entity id.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.header().issuer
    }

    /// Destination URL.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.header().destination.as_deref()
    }

    /// Signature, if present.
    #[must_use]
    pub fn signature(&self) -> Option<&Signature> {
        self.header().signature.as_ref()
    }

    /// `InResponseTo`, for the kinds that carry one.
    #[must_use]
    pub fn in_response_to(&self) -> Option<&str> {
        match self {
            Self::Response(m) => m.in_response_to.as_deref(),
            Self::LogoutResponse(m) => m.in_response_to.as_deref(),
            Self::AuthnRequest(_) | Self::Assertion(_) | Self::LogoutRequest(_) => None,
        }
    }

    /// True for requests, which travel in `SAMLRequest`.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        matches!(self, Self::AuthnRequest(_) | Self::LogoutRequest(_))
    }
}

macro_rules! protocol_message_from {
    ($($variant:ident),+) => {
        $(
            impl From<$variant> for ProtocolMessage {
                fn from(message: $variant) -> Self {
                    Self::$variant(message)
                }
            }

            impl SamlMessage for $variant {
                const KIND: MessageKind = MessageKind::$variant;

                fn header(&self) -> &MessageHeader {
                    &self.header
                }

                fn header_mut(&mut self) -> &mut MessageHeader {
                    &mut self.header
                }
            }
        )+
    };
}

protocol_message_from!(AuthnRequest, Response, Assertion, LogoutRequest, LogoutResponse);
