//! What one inbound HTTP exchange carried.

use super::{DecodedMessage, HttpPostBinding, HttpRedirectBinding, MessageParam, PostForm};
use crate::{
    error::{SamlError, SamlResult},
    signature::DetachedSignature,
    types::{ProtocolMessage, SamlBinding, Signature, SignaturePlacement},
    xml::{parse, XmlCodec, XmlElement},
};

/// A parsed message with the element it was read from.
///
/// Embedded signatures are verified against `element`, never against a
/// re-serialization of `message`.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Typed message.
    pub message: ProtocolMessage,
    /// Element as received.
    pub element: XmlElement,
    /// Query signature, for HTTP-Redirect.
    pub detached_signature: Option<DetachedSignature>,
}

impl ReceivedMessage {
    /// Parses `xml`, attaching a detached signature taken from the query.
    pub fn parse(xml: &str, detached_signature: Option<DetachedSignature>) -> SamlResult<Self> {
        let element = parse(xml)?;
        let mut message = ProtocolMessage::from_element(&element)?;
        if let Some(detached) = &detached_signature {
            message.header_mut().signature = Some(Signature {
                algorithm: detached.algorithm,
                value: detached.value.clone(),
                certificate: None,
                placement: SignaturePlacement::Detached {
                    signed_octets: detached.signed_octets.clone(),
                },
            });
        }
        Ok(Self {
            message,
            element,
            detached_signature,
        })
    }

    /// Wraps a message already in the model, as when it never crossed a wire.
    #[must_use]
    pub fn from_message(message: impl Into<ProtocolMessage>) -> Self {
        let message = message.into();
        let element = message.to_element();
        let detached_signature = message.signature().and_then(|signature| match &signature.placement {
            SignaturePlacement::Detached { signed_octets } => Some(DetachedSignature {
                algorithm: signature.algorithm,
                value: signature.value.clone(),
                signed_octets: signed_octets.clone(),
            }),
            SignaturePlacement::Embedded { .. } => None,
        });
        Self {
            message,
            element,
            detached_signature,
        }
    }
}

/// One inbound HTTP exchange as seen by the engine.
#[derive(Debug, Clone, Default)]
pub struct InboundExchange {
    /// Binding the exchange used, when it carried a message.
    pub binding: Option<SamlBinding>,
    /// Location the exchange arrived on, without query.
    pub endpoint: Option<String>,
    /// Message taken off the wire.
    pub decoded: Option<DecodedMessage>,
}

impl InboundExchange {
    /// An exchange carrying no protocol message.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads an HTTP-Redirect exchange from the full request URL.
    ///
    /// A URL without `SAMLRequest` or `SAMLResponse` yields an exchange with
    /// no message.
    pub fn from_redirect_url(url: &str) -> SamlResult<Self> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::MalformedMessage(format!("invalid URL: {e}")))?;
        let mut endpoint = parsed.clone();
        endpoint.set_query(None);
        endpoint.set_fragment(None);

        let carries_message = parsed
            .query_pairs()
            .any(|(key, _)| key == "SAMLRequest" || key == "SAMLResponse");
        if !carries_message {
            return Ok(Self {
                binding: None,
                endpoint: Some(endpoint.to_string()),
                decoded: None,
            });
        }

        Ok(Self {
            binding: Some(SamlBinding::HttpRedirect),
            endpoint: Some(endpoint.to_string()),
            decoded: Some(HttpRedirectBinding::decode_query(
                parsed.query().unwrap_or_default(),
            )?),
        })
    }

    /// Reads an HTTP-POST exchange from its form fields.
    pub fn from_post(
        endpoint: &str,
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<Self> {
        Ok(Self {
            binding: Some(SamlBinding::HttpPost),
            endpoint: Some(endpoint.to_string()),
            decoded: Some(HttpPostBinding::decode(saml_request, saml_response, relay_state)?),
        })
    }

    /// Reads an HTTP-POST exchange from a submitted form.
    pub fn from_post_form(form: &PostForm) -> SamlResult<Self> {
        Ok(Self {
            binding: Some(SamlBinding::HttpPost),
            endpoint: Some(form.action.clone()),
            decoded: Some(HttpPostBinding::decode_form(form)?),
        })
    }

    /// `RelayState`, passed through unchanged.
    #[must_use]
    pub fn relay_state(&self) -> Option<&str> {
        self.decoded.as_ref().and_then(|d| d.relay_state.as_deref())
    }

    /// Parameter the message came in, if any.
    #[must_use]
    pub fn param(&self) -> Option<MessageParam> {
        self.decoded.as_ref().map(|d| d.param)
    }

    /// Parses the carried message.
    pub fn receive(&self) -> SamlResult<Option<ReceivedMessage>> {
        self.decoded
            .as_ref()
            .map(|d| ReceivedMessage::parse(&d.xml, d.detached_signature.clone()))
            .transpose()
    }
}
