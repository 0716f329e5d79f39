//! Signature creation.

use base64::{engine::general_purpose::STANDARD, Engine};
use sp_crypto::{hash, DigestAlgorithm, SignatureAlgorithm};

use super::SigningCredential;
use crate::{
    error::SamlResult,
    types::{
        SamlMessage, Signature, SignaturePlacement, SAML_NS, TRANSFORM_ENVELOPED,
        TRANSFORM_EXC_C14N, XMLDSIG_NS,
    },
    xml::{canonicalize, codec::signature_element, XmlCodec, XmlElement},
};

/// Builds the `ds:SignedInfo` for a single enveloped reference.
#[must_use]
pub fn signed_info_element(
    algorithm: SignatureAlgorithm,
    digest_algorithm: DigestAlgorithm,
    reference_uri: &str,
    digest_value: &[u8],
) -> XmlElement {
    XmlElement::ds("SignedInfo")
        .with_child(XmlElement::ds("CanonicalizationMethod").with_attr("Algorithm", TRANSFORM_EXC_C14N))
        .with_child(XmlElement::ds("SignatureMethod").with_attr("Algorithm", algorithm.uri()))
        .with_child(
            XmlElement::ds("Reference")
                .with_attr("URI", reference_uri)
                .with_child(
                    XmlElement::ds("Transforms")
                        .with_child(XmlElement::ds("Transform").with_attr("Algorithm", TRANSFORM_ENVELOPED))
                        .with_child(XmlElement::ds("Transform").with_attr("Algorithm", TRANSFORM_EXC_C14N)),
                )
                .with_child(XmlElement::ds("DigestMethod").with_attr("Algorithm", digest_algorithm.uri()))
                .with_child(XmlElement::ds("DigestValue").with_text(STANDARD.encode(digest_value))),
        )
}

/// Computes an enveloped signature over `element`, which must carry an `ID`.
///
/// Any signature already present on `element` is excluded from the digest.
/// The element itself is left untouched; see [`embed_signature`].
pub fn sign_element(element: &XmlElement, credential: &SigningCredential) -> SamlResult<Signature> {
    let id = element.required_attr("ID")?;
    let reference_uri = format!("#{id}");
    let digest_algorithm = credential.digest_algorithm();
    let algorithm = credential.signature_algorithm();

    let content = canonicalize(&element.without_child(XMLDSIG_NS, "Signature"));
    let digest_value = hash::digest(digest_algorithm, content.as_bytes());

    let signed_info = signed_info_element(algorithm, digest_algorithm, &reference_uri, &digest_value);
    let value = credential
        .key()
        .sign(algorithm, canonicalize(&signed_info).as_bytes())?;

    Ok(Signature {
        algorithm,
        value,
        certificate: credential.certificate().map(sp_crypto::Certificate::to_base64),
        placement: SignaturePlacement::Embedded {
            reference_uri,
            digest_algorithm,
            digest_value,
            signed_info,
        },
    })
}

/// Inserts the `ds:Signature` for `signature` after `Issuer`, or as the
/// first child when there is no `Issuer`. Detached signatures are ignored.
pub fn embed_signature(element: &mut XmlElement, signature: &Signature) {
    if let Some(signature_el) = signature_element(signature) {
        let stripped = element.without_child(XMLDSIG_NS, "Signature");
        *element = stripped;
        element.insert_after(SAML_NS, "Issuer", signature_el);
    }
}

/// Signs `message` with an enveloped signature, replacing any existing one.
pub fn sign_embedded<M>(message: M, credential: &SigningCredential) -> SamlResult<M>
where
    M: SamlMessage + XmlCodec,
{
    let unsigned = message.with_signature(None);
    let signature = sign_element(&unsigned.to_element(), credential)?;
    Ok(unsigned.with_signature(Some(signature)))
}

/// The octets an HTTP-Redirect signature covers.
///
/// `param` is `SAMLRequest` or `SAMLResponse`; `encoded_message` is the
/// deflated, base64-encoded message before URL encoding.
#[must_use]
pub fn redirect_signed_octets(
    param: &str,
    encoded_message: &str,
    relay_state: Option<&str>,
    algorithm: SignatureAlgorithm,
) -> String {
    let mut octets = format!("{param}={}", urlencoding::encode(encoded_message));
    if let Some(relay_state) = relay_state {
        octets.push_str("&RelayState=");
        octets.push_str(&urlencoding::encode(relay_state));
    }
    octets.push_str("&SigAlg=");
    octets.push_str(&urlencoding::encode(algorithm.uri()));
    octets
}

/// Signs HTTP-Redirect query octets.
pub fn sign_detached(signed_octets: String, credential: &SigningCredential) -> SamlResult<Signature> {
    let algorithm = credential.signature_algorithm();
    let value = credential.key().sign(algorithm, signed_octets.as_bytes())?;
    Ok(Signature {
        algorithm,
        value,
        certificate: None,
        placement: SignaturePlacement::Detached { signed_octets },
    })
}
