//! SAML bindings.
//!
//! Transport codecs for front-channel messages:
//!
//! - **HTTP-POST Binding** - messages are base64-encoded and sent in HTML forms
//! - **HTTP-Redirect Binding** - messages are deflated, base64-encoded, and
//!   URL-encoded, with an optional detached signature over the query
//!
//! [`InboundExchange`] collects what one HTTP exchange carried so the
//! negotiators can classify it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sp_protocol_saml::bindings::{HttpRedirectBinding, InboundExchange, MessageParam};
//!
//! let url = HttpRedirectBinding::encode(&xml, "https://idp.example/sso", MessageParam::Request, Some("rs"))?;
//! let exchange = InboundExchange::from_redirect_url(&url)?;
//! ```

mod exchange;
mod post;
mod redirect;

pub use exchange::*;
pub use post::*;
pub use redirect::*;

use crate::{signature::DetachedSignature, types::ProtocolMessage};

/// Query or form parameter a message travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageParam {
    /// `SAMLRequest`.
    Request,
    /// `SAMLResponse`.
    Response,
}

impl MessageParam {
    /// Parameter name.
    #[must_use]
    pub const fn form_param(self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }

    /// Parameter `message` travels in.
    #[must_use]
    pub const fn for_message(message: &ProtocolMessage) -> Self {
        if message.is_request() {
            Self::Request
        } else {
            Self::Response
        }
    }
}

/// Message taken off the wire, before XML parsing.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The decoded XML.
    pub xml: String,
    /// Which parameter carried it.
    pub param: MessageParam,
    /// `RelayState`, if present.
    pub relay_state: Option<String>,
    /// Detached signature (HTTP-Redirect only).
    pub detached_signature: Option<DetachedSignature>,
}
