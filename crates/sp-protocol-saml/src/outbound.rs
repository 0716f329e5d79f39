//! Outbound decisions handed to the transport layer.

use serde::Serialize;

use crate::{
    bindings::{HttpPostBinding, HttpRedirectBinding, MessageParam, PostForm},
    error::{SamlError, SamlResult},
    signature::{sign_element, SigningCredential},
    types::{Endpoint, ProtocolMessage, SamlBinding},
    xml::XmlCodec,
};

/// How the user agent carries the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Delivery {
    /// 302 to `location`.
    Redirect {
        /// Full URL including the encoded message.
        location: String,
    },
    /// Auto-submitting form.
    Post {
        /// The form to render.
        form: PostForm,
    },
}

/// A message ready to leave, with where and how it goes.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    /// The message as sent, signature included.
    pub message: ProtocolMessage,
    /// Chosen remote endpoint.
    pub endpoint: Endpoint,
    /// Echoed relay state.
    pub relay_state: Option<String>,
    /// Rendering instructions.
    pub delivery: Delivery,
}

impl OutboundMessage {
    /// Encodes `message` for `endpoint`'s binding.
    ///
    /// With a credential, HTTP-Redirect messages get a detached query
    /// signature and HTTP-POST messages an enveloped one. Artifact and SOAP
    /// endpoints cannot be served from the front channel.
    pub fn prepare(
        message: impl Into<ProtocolMessage>,
        endpoint: &Endpoint,
        relay_state: Option<&str>,
        credential: Option<&SigningCredential>,
    ) -> SamlResult<Self> {
        let mut message = message.into();
        message.header_mut().signature = None;
        let param = MessageParam::for_message(&message);

        let delivery = match endpoint.binding {
            SamlBinding::HttpRedirect => {
                let xml = message.to_xml();
                let location = match credential {
                    Some(credential) => {
                        let (location, signature) = HttpRedirectBinding::encode_signed(
                            &xml,
                            &endpoint.location,
                            param,
                            relay_state,
                            credential,
                        )?;
                        message.header_mut().signature = Some(signature);
                        location
                    }
                    None => HttpRedirectBinding::encode(&xml, &endpoint.location, param, relay_state)?,
                };
                Delivery::Redirect { location }
            }
            SamlBinding::HttpPost => {
                if let Some(credential) = credential {
                    let signature = sign_element(&message.to_element(), credential)?;
                    message.header_mut().signature = Some(signature);
                }
                let form = HttpPostBinding::encode(
                    &message.to_xml(),
                    &endpoint.location,
                    param,
                    relay_state,
                );
                Delivery::Post { form }
            }
            binding @ (SamlBinding::HttpArtifact | SamlBinding::Soap) => {
                return Err(SamlError::UnsupportedBinding(binding.uri().to_string()))
            }
        };

        Ok(Self {
            message,
            endpoint: endpoint.clone(),
            relay_state: relay_state.map(String::from),
            delivery,
        })
    }

    /// Binding used.
    #[must_use]
    pub const fn binding(&self) -> SamlBinding {
        self.endpoint.binding
    }

    /// True when the message carries a signature.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.message.signature().is_some()
    }
}
