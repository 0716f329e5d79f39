//! HTTP-Redirect Binding implementation.
//!
//! Messages travel in URL query parameters, raw-DEFLATE compressed and
//! base64 encoded. A signed message carries `SigAlg` and `Signature`
//! parameters computed over the preceding query octets.

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use sp_crypto::SignatureAlgorithm;

use super::{DecodedMessage, MessageParam};
use crate::{
    error::{SamlError, SamlResult},
    signature::{redirect_signed_octets, sign_detached, DetachedSignature, SigningCredential},
    types::Signature,
};

/// Upper bound on an inflated message.
pub const MAX_INFLATED_SIZE: usize = 256 * 1024;

/// HTTP-Redirect binding encoder/decoder.
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Encodes an unsigned message.
    ///
    /// Returns `destination` with the encoded message appended to its query.
    pub fn encode(
        xml: &str,
        destination: &str,
        param: MessageParam,
        relay_state: Option<&str>,
    ) -> SamlResult<String> {
        let encoded = Self::deflate_and_encode(xml)?;
        let mut query = format!("{}={}", param.form_param(), urlencoding::encode(&encoded));
        if let Some(rs) = relay_state {
            query.push_str("&RelayState=");
            query.push_str(&urlencoding::encode(rs));
        }
        Ok(append_query(destination, &query))
    }

    /// Encodes and signs a message.
    ///
    /// The signature covers `param=..&RelayState=..&SigAlg=..` exactly as
    /// they appear in the returned URL.
    pub fn encode_signed(
        xml: &str,
        destination: &str,
        param: MessageParam,
        relay_state: Option<&str>,
        credential: &SigningCredential,
    ) -> SamlResult<(String, Signature)> {
        let encoded = Self::deflate_and_encode(xml)?;
        let octets = redirect_signed_octets(
            param.form_param(),
            &encoded,
            relay_state,
            credential.signature_algorithm(),
        );
        let signature = sign_detached(octets.clone(), credential)?;
        let query = format!(
            "{octets}&Signature={}",
            urlencoding::encode(&STANDARD.encode(&signature.value))
        );
        Ok((append_query(destination, &query), signature))
    }

    /// Deflates and base64-encodes `xml`, before URL encoding.
    pub fn deflate_and_encode(xml: &str) -> SamlResult<String> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(xml.as_bytes())?;
        Ok(STANDARD.encode(encoder.finish()?))
    }

    /// Reverses [`deflate_and_encode`](Self::deflate_and_encode).
    pub fn decode_and_inflate(encoded: &str) -> SamlResult<String> {
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let compressed = STANDARD.decode(compact.as_bytes())?;

        let mut inflated = Vec::new();
        DeflateDecoder::new(compressed.as_slice())
            .take(MAX_INFLATED_SIZE as u64 + 1)
            .read_to_end(&mut inflated)?;
        if inflated.len() > MAX_INFLATED_SIZE {
            return Err(SamlError::Deflate(format!(
                "inflated message exceeds {MAX_INFLATED_SIZE} bytes"
            )));
        }

        String::from_utf8(inflated)
            .map_err(|e| SamlError::MalformedMessage(format!("invalid UTF-8 in message: {e}")))
    }

    /// Decodes a message from a full URL.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::MalformedMessage(format!("invalid URL: {e}")))?;
        Self::decode_query(parsed.query().unwrap_or_default())
    }

    /// Decodes a message from a raw (still URL-encoded) query string.
    ///
    /// Signed octets are rebuilt from the raw parameter values so a signature
    /// made over a differently encoded query still verifies.
    pub fn decode_query(query: &str) -> SamlResult<DecodedMessage> {
        let raw = RawParams::parse(query);

        let (param, raw_message) = match (raw.request, raw.response) {
            (Some(value), None) => (MessageParam::Request, value),
            (None, Some(value)) => (MessageParam::Response, value),
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

        let xml = Self::decode_and_inflate(&percent_decode(raw_message)?)?;
        let relay_state = raw.relay_state.map(percent_decode).transpose()?;

        let detached_signature = match (raw.sig_alg, raw.signature) {
            (Some(sig_alg), Some(signature)) => {
                let algorithm = SignatureAlgorithm::from_uri(&percent_decode(sig_alg)?)
                    .map_err(|e| SamlError::MalformedMessage(e.to_string()))?;
                let value = STANDARD.decode(percent_decode(signature)?.as_bytes())?;

                let mut signed_octets = format!("{}={raw_message}", param.form_param());
                if let Some(rs) = raw.relay_state {
                    signed_octets.push_str("&RelayState=");
                    signed_octets.push_str(rs);
                }
                signed_octets.push_str("&SigAlg=");
                signed_octets.push_str(sig_alg);

                Some(DetachedSignature {
                    algorithm,
                    value,
                    signed_octets,
                })
            }
            (None, None) => None,
            _ => {
                return Err(SamlError::MalformedMessage(
                    "Signature and SigAlg must appear together".to_string(),
                ))
            }
        };

        Ok(DecodedMessage {
            xml,
            param,
            relay_state,
            detached_signature,
        })
    }
}

#[derive(Default)]
struct RawParams<'a> {
    request: Option<&'a str>,
    response: Option<&'a str>,
    relay_state: Option<&'a str>,
    sig_alg: Option<&'a str>,
    signature: Option<&'a str>,
}

impl<'a> RawParams<'a> {
    fn parse(query: &'a str) -> Self {
        let mut raw = Self::default();
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let slot = match key {
                "SAMLRequest" => &mut raw.request,
                "SAMLResponse" => &mut raw.response,
                "RelayState" => &mut raw.relay_state,
                "SigAlg" => &mut raw.sig_alg,
                "Signature" => &mut raw.signature,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        raw
    }
}

fn percent_decode(value: &str) -> SamlResult<String> {
    urlencoding::decode(value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| SamlError::MalformedMessage(format!("invalid URL encoding: {e}")))
}

fn append_query(destination: &str, query: &str) -> String {
    let separator = if destination.contains('?') { '&' } else { '?' };
    format!("{destination}{separator}{query}")
}
