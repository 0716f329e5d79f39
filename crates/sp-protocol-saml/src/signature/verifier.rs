//! Signature verification.

use sp_crypto::{hash, SignatureAlgorithm, VerifyingKey};

use super::{DetachedSignature, SignatureFailure};
use crate::{
    error::{SamlError, SamlResult},
    types::{SamlMessage, Signature, SignaturePlacement, TRANSFORM_EXC_C14N, XMLDSIG_NS},
    xml::{canonicalize_with_prefixes, codec::signature_from_element, XmlCodec, XmlElement},
};

/// `PrefixList` of the `ec:InclusiveNamespaces` child of a transform or
/// canonicalization method.
fn inclusive_prefixes(method: Option<&XmlElement>) -> Vec<String> {
    method
        .and_then(|m| m.child(TRANSFORM_EXC_C14N, "InclusiveNamespaces"))
        .and_then(|ns| ns.attr("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn reference_prefixes(signed_info: &XmlElement) -> Vec<String> {
    let transform = signed_info
        .child(XMLDSIG_NS, "Reference")
        .and_then(|r| r.child(XMLDSIG_NS, "Transforms"))
        .and_then(|t| {
            t.children_named(XMLDSIG_NS, "Transform")
                .find(|t| t.attr("Algorithm") == Some(TRANSFORM_EXC_C14N))
        });
    inclusive_prefixes(transform)
}

fn invalid(kind: SignatureFailure, detail: impl Into<String>) -> SamlError {
    SamlError::SignatureInvalid {
        kind,
        detail: detail.into(),
    }
}

fn verify_with_any(
    keys: &[VerifyingKey],
    algorithm: SignatureAlgorithm,
    data: &[u8],
    value: &[u8],
) -> SamlResult<()> {
    if keys.is_empty() {
        return Err(invalid(
            SignatureFailure::SignatureMismatch,
            "no signing keys known for the issuer",
        ));
    }
    if keys.iter().any(|key| key.verify(algorithm, data, value)) {
        Ok(())
    } else {
        Err(invalid(
            SignatureFailure::SignatureMismatch,
            "signature value does not verify with any trusted key",
        ))
    }
}

/// Verifies the enveloped signature that is a direct child of `element`.
///
/// Checks, in order: a signature is present, its single reference points at
/// `element`'s own `ID`, the digest over the canonical element without its
/// signature matches, and the canonical `SignedInfo` verifies with one of
/// `keys`. Inclusive prefix lists on the reference transform and on the
/// canonicalization method are honoured.
pub fn verify_embedded(element: &XmlElement, keys: &[VerifyingKey]) -> SamlResult<Signature> {
    let signature_el = element
        .child(XMLDSIG_NS, "Signature")
        .ok_or_else(|| invalid(SignatureFailure::Missing, format!("{} is not signed", element.name)))?;
    let signature = signature_from_element(signature_el)?;

    let SignaturePlacement::Embedded {
        reference_uri,
        digest_algorithm,
        digest_value,
        signed_info,
    } = &signature.placement
    else {
        return Err(invalid(SignatureFailure::Missing, "no enveloped signature"));
    };

    let id = element.required_attr("ID")?;
    if reference_uri.strip_prefix('#') != Some(id) {
        return Err(invalid(
            SignatureFailure::DigestMismatch,
            format!("reference {reference_uri} does not point at {id}"),
        ));
    }

    let content = canonicalize_with_prefixes(
        &element.without_child(XMLDSIG_NS, "Signature"),
        &reference_prefixes(signed_info),
    );
    let computed = hash::digest(*digest_algorithm, content.as_bytes());
    if !hash::constant_time_eq(&computed, digest_value) {
        return Err(invalid(
            SignatureFailure::DigestMismatch,
            format!("digest of {id} does not match"),
        ));
    }

    verify_with_any(
        keys,
        signature.algorithm,
        canonicalize_with_prefixes(
            signed_info,
            &inclusive_prefixes(signed_info.child(XMLDSIG_NS, "CanonicalizationMethod")),
        )
        .as_bytes(),
        &signature.value,
    )?;
    Ok(signature)
}

/// Verifies an HTTP-Redirect signature over its query octets.
pub fn verify_detached(signature: &DetachedSignature, keys: &[VerifyingKey]) -> SamlResult<()> {
    verify_with_any(
        keys,
        signature.algorithm,
        signature.signed_octets.as_bytes(),
        &signature.value,
    )
}

/// Verifies the signature carried by a model message.
///
/// Embedded signatures are checked against the message's own element form,
/// so any field changed after signing shows up as a digest mismatch. For a
/// message read off the wire use [`verify_embedded`] on the element as
/// received.
pub fn verify_message<M>(message: &M, keys: &[VerifyingKey]) -> SamlResult<()>
where
    M: SamlMessage + XmlCodec,
{
    let signature = message.signature().ok_or_else(|| {
        invalid(
            SignatureFailure::Missing,
            format!("{} is not signed", M::KIND.element_name()),
        )
    })?;

    match &signature.placement {
        SignaturePlacement::Embedded { .. } => {
            verify_embedded(&message.to_element(), keys).map(|_| ())
        }
        SignaturePlacement::Detached { signed_octets } => verify_detached(
            &DetachedSignature {
                algorithm: signature.algorithm,
                value: signature.value.clone(),
                signed_octets: signed_octets.clone(),
            },
            keys,
        ),
    }
}
