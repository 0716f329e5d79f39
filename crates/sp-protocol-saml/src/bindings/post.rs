//! HTTP-POST Binding implementation.
//!
//! Messages are base64 encoded into a hidden form field and delivered by an
//! auto-submitting HTML form.

use base64::{engine::general_purpose::STANDARD, Engine};
use html_escape::encode_double_quoted_attribute;
use serde::{Deserialize, Serialize};

use super::{DecodedMessage, MessageParam};
use crate::error::{SamlError, SamlResult};

/// A form the user agent posts to the remote party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostForm {
    /// Form action.
    pub action: String,
    /// Hidden fields in order.
    pub parameters: Vec<(String, String)>,
}

impl PostForm {
    /// Value of a hidden field.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Renders the auto-submitting page.
    #[must_use]
    pub fn to_html(&self) -> String {
        let inputs: String = self
            .parameters
            .iter()
            .map(|(name, value)| {
                format!(
                    "\n        <input type=\"hidden\" name=\"{}\" value=\"{}\"/>",
                    encode_double_quoted_attribute(name),
                    encode_double_quoted_attribute(value)
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>SAML POST Binding</title>
</head>
<body onload="document.forms[0].submit()">
    <noscript>
        <p>JavaScript is disabled. Click the button below to continue.</p>
    </noscript>
    <form method="post" action="{}">{}
        <noscript>
            <input type="submit" value="Continue"/>
        </noscript>
    </form>
</body>
</html>"#,
            encode_double_quoted_attribute(&self.action),
            inputs
        )
    }
}

/// HTTP-POST binding encoder/decoder.
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Encodes a message into a form posting to `destination`.
    #[must_use]
    pub fn encode(
        xml: &str,
        destination: &str,
        param: MessageParam,
        relay_state: Option<&str>,
    ) -> PostForm {
        let mut parameters = vec![(param.form_param().to_string(), STANDARD.encode(xml))];
        if let Some(rs) = relay_state {
            parameters.push(("RelayState".to_string(), rs.to_string()));
        }
        PostForm {
            action: destination.to_string(),
            parameters,
        }
    }

    /// Decodes a message from posted form fields.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, param) = match (saml_request, saml_response) {
            (Some(value), None) => (value, MessageParam::Request),
            (None, Some(value)) => (value, MessageParam::Response),
            (Some(_), Some(_)) => {
                return Err(SamlError::MalformedMessage(
                    "both SAMLRequest and SAMLResponse present".to_string(),
                ))
            }
            (None, None) => {
                return Err(SamlError::MalformedMessage(
                    "no SAMLRequest or SAMLResponse parameter".to_string(),
                ))
            }
        };

        // Some senders wrap base64 at 76 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let decoded = STANDARD.decode(compact.as_bytes())?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| SamlError::MalformedMessage(format!("invalid UTF-8 in message: {e}")))?;

        Ok(DecodedMessage {
            xml,
            param,
            relay_state: relay_state.map(String::from),
            detached_signature: None,
        })
    }

    /// Decodes a message from a submitted form.
    pub fn decode_form(form: &PostForm) -> SamlResult<DecodedMessage> {
        Self::decode(
            form.parameter("SAMLRequest"),
            form.parameter("SAMLResponse"),
            form.parameter("RelayState"),
        )
    }
}
