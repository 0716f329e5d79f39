use base64::{engine::general_purpose::STANDARD, Engine};
use sp_crypto::{hash, Certificate, DigestAlgorithm, SignatureAlgorithm, SigningKey};
use sp_protocol_saml::{
    signature::{
        sign_element, sign_embedded, verify_embedded, verify_message, SignatureFailure,
        SigningCredential,
    },
    xml::{canonicalize, canonicalize_with_prefixes, parse, XmlCodec},
    LogoutRequest, NameId, SamlError, SamlMessage, Status, XMLDSIG_NS,
};

use crate::common::{idp_credential, idp_key, sp_key, EC_CERT, EC_KEY, IDP_ENTITY};

fn request() -> LogoutRequest {
    LogoutRequest::new(NameId::persistent("alice"))
        .with_issuer(IDP_ENTITY)
        .with_destination("https://sp.example/saml/slo")
        .with_session_index("s-1")
}

fn failure(err: &SamlError) -> Option<SignatureFailure> {
    match err {
        SamlError::SignatureInvalid { kind, .. } => Some(*kind),
        _ => None,
    }
}

#[test]
fn rsa_signature_survives_the_wire() -> anyhow::Result<()> {
    let signed = sign_embedded(request(), &idp_credential()?)?;
    let element = parse(&signed.to_xml())?;

    let signature = verify_embedded(&element, &[idp_key()?])?;
    assert_eq!(signature.algorithm, SignatureAlgorithm::RsaSha256);
    assert!(signature.certificate.is_some());

    let reparsed = LogoutRequest::from_element(&element)?;
    verify_message(&reparsed, &[idp_key()?])?;
    Ok(())
}

#[test]
fn ecdsa_signature_round_trip() -> anyhow::Result<()> {
    let credential = SigningCredential::new(SigningKey::from_pem(EC_KEY)?)
        .with_algorithms(SignatureAlgorithm::EcdsaSha256, DigestAlgorithm::Sha256);
    let key = Certificate::from_pem(EC_CERT)?.verifying_key().clone();

    let signed = sign_embedded(request(), &credential)?;
    let signature = verify_embedded(&parse(&signed.to_xml())?, &[key])?;
    assert_eq!(signature.algorithm, SignatureAlgorithm::EcdsaSha256);
    Ok(())
}

#[test]
fn stronger_digest_is_advertised() -> anyhow::Result<()> {
    let credential = idp_credential()?
        .with_algorithms(SignatureAlgorithm::RsaSha512, DigestAlgorithm::Sha512);
    let signed = sign_embedded(request(), &credential)?;
    let signature = verify_embedded(&parse(&signed.to_xml())?, &[idp_key()?])?;
    assert_eq!(signature.digest_algorithm(), Some(DigestAlgorithm::Sha512));
    Ok(())
}

#[test]
fn tampered_content_is_a_digest_mismatch() -> anyhow::Result<()> {
    let signed = sign_embedded(request(), &idp_credential()?)?;
    let tampered = signed
        .to_xml()
        .replace("<saml:NameID", "<saml:NameID SPNameQualifier=\"evil.example\"");
    assert_ne!(tampered, signed.to_xml());

    let err = verify_embedded(&parse(&tampered)?, &[idp_key()?]).unwrap_err();
    assert_eq!(failure(&err), Some(SignatureFailure::DigestMismatch));
    Ok(())
}

#[test]
fn model_change_after_signing_is_detected() -> anyhow::Result<()> {
    let mut signed = sign_embedded(request(), &idp_credential()?)?;
    signed.session_indexes = vec!["s-2".to_string()];

    let err = verify_message(&signed, &[idp_key()?]).unwrap_err();
    assert_eq!(failure(&err), Some(SignatureFailure::DigestMismatch));
    Ok(())
}

#[test]
fn untrusted_key_is_a_signature_mismatch() -> anyhow::Result<()> {
    let signed = sign_embedded(request(), &idp_credential()?)?;
    let err = verify_embedded(&parse(&signed.to_xml())?, &[sp_key()?]).unwrap_err();
    assert_eq!(failure(&err), Some(SignatureFailure::SignatureMismatch));

    let err = verify_embedded(&parse(&signed.to_xml())?, &[]).unwrap_err();
    assert_eq!(failure(&err), Some(SignatureFailure::SignatureMismatch));
    Ok(())
}

#[test]
fn unsigned_element_reports_missing() -> anyhow::Result<()> {
    let err = verify_embedded(&parse(&request().to_xml())?, &[idp_key()?]).unwrap_err();
    assert_eq!(failure(&err), Some(SignatureFailure::Missing));
    Ok(())
}

#[test]
fn signature_element_is_placed_after_issuer() -> anyhow::Result<()> {
    let response = sp_protocol_saml::LogoutResponse::new(Status::success())
        .with_issuer(IDP_ENTITY)
        .with_in_response_to("LRQ1");
    let signature = sign_element(&response.to_element(), &idp_credential()?)?;
    let signed = response.with_signature(Some(signature));

    let element = signed.to_element();
    let names: Vec<_> = element.elements().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Issuer", "Signature", "Status"]);
    assert!(element.child(XMLDSIG_NS, "Signature").is_some());
    Ok(())
}

const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// An indented LogoutResponse signed the way identity providers commonly
/// emit one: whitespace everywhere and an inclusive prefix list on the
/// reference transform.
fn pretty_signed_response(digest: &str, value: &str) -> String {
    let signature_method = SignatureAlgorithm::RsaSha256.uri();
    let digest_method = DigestAlgorithm::Sha256.uri();
    format!(
        r##"<samlp:LogoutResponse xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:xs="http://www.w3.org/2001/XMLSchema" ID="LRP1" Version="2.0" IssueInstant="2024-01-01T00:00:00Z">
  <saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">idp.example</saml:Issuer>
  <ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
    <ds:SignedInfo>
      <ds:CanonicalizationMethod Algorithm="{EXC_C14N}"/>
      <ds:SignatureMethod Algorithm="{signature_method}"/>
      <ds:Reference URI="#LRP1">
        <ds:Transforms>
          <ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>
          <ds:Transform Algorithm="{EXC_C14N}">
            <ec:InclusiveNamespaces xmlns:ec="{EXC_C14N}" PrefixList="xs"/>
          </ds:Transform>
        </ds:Transforms>
        <ds:DigestMethod Algorithm="{digest_method}"/>
        <ds:DigestValue>{digest}</ds:DigestValue>
      </ds:Reference>
    </ds:SignedInfo>
    <ds:SignatureValue>{value}</ds:SignatureValue>
  </ds:Signature>
  <samlp:Status>
    <samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/>
  </samlp:Status>
</samlp:LogoutResponse>"##
    )
}

#[test]
fn indented_signature_with_prefix_list_verifies() -> anyhow::Result<()> {
    // Exclusive C14N of the response without its signature: whitespace kept,
    // `xs` declared because the prefix list names it.
    let expected = "<samlp:LogoutResponse xmlns:samlp=\"urn:oasis:names:tc:SAML:2.0:protocol\" \
        xmlns:xs=\"http://www.w3.org/2001/XMLSchema\" ID=\"LRP1\" \
        IssueInstant=\"2024-01-01T00:00:00Z\" Version=\"2.0\">\n  \
        <saml:Issuer xmlns:saml=\"urn:oasis:names:tc:SAML:2.0:assertion\">idp.example</saml:Issuer>\n  \n  \
        <samlp:Status>\n    \
        <samlp:StatusCode Value=\"urn:oasis:names:tc:SAML:2.0:status:Success\"></samlp:StatusCode>\n  \
        </samlp:Status>\n</samlp:LogoutResponse>";

    let unsigned = parse(&pretty_signed_response("", ""))?;
    let content = canonicalize_with_prefixes(
        &unsigned.without_child(XMLDSIG_NS, "Signature"),
        &["xs".to_string()],
    );
    assert_eq!(content, expected);
    let digest = STANDARD.encode(hash::digest(DigestAlgorithm::Sha256, expected.as_bytes()));

    let with_digest = parse(&pretty_signed_response(&digest, ""))?;
    let signed_info = with_digest
        .child(XMLDSIG_NS, "Signature")
        .and_then(|s| s.child(XMLDSIG_NS, "SignedInfo"))
        .ok_or_else(|| anyhow::anyhow!("no SignedInfo"))?;
    let value = idp_credential()?
        .key()
        .sign(SignatureAlgorithm::RsaSha256, canonicalize(signed_info).as_bytes())?;

    let wire = pretty_signed_response(&digest, &STANDARD.encode(value));
    verify_embedded(&parse(&wire)?, &[idp_key()?])?;

    // Re-indenting the signed content breaks the digest.
    let reindented = wire.replace("<samlp:Status>\n    <samlp:StatusCode", "<samlp:Status><samlp:StatusCode");
    assert_ne!(reindented, wire);
    let err = verify_embedded(&parse(&reindented)?, &[idp_key()?]).unwrap_err();
    assert_eq!(failure(&err), Some(SignatureFailure::DigestMismatch));
    Ok(())
}
