use sp_protocol_saml::{
    xml::{canonicalize, parse, XmlCodec},
    LogoutRequest, NameId, SamlMessage,
};

const COMPACT: &str = r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="LRQ1" Version="2.0" IssueInstant="2026-01-01T00:00:00Z"><saml:Issuer>idp.example</saml:Issuer><saml:NameID>alice</saml:NameID></samlp:LogoutRequest>"#;

const PRETTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:LogoutRequest IssueInstant="2026-01-01T00:00:00Z"
    Version="2.0" ID="LRQ1"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol">
  <saml:Issuer>idp.example</saml:Issuer>
  <saml:NameID>alice</saml:NameID>
</samlp:LogoutRequest>"#;

#[test]
fn attribute_order_does_not_matter() -> anyhow::Result<()> {
    let reordered = COMPACT.replace(
        r#"ID="LRQ1" Version="2.0" IssueInstant="2026-01-01T00:00:00Z""#,
        r#"IssueInstant="2026-01-01T00:00:00Z" Version="2.0" ID="LRQ1""#,
    );
    let a = canonicalize(&parse(COMPACT)?);
    let b = canonicalize(&parse(&reordered)?);
    assert_eq!(a, b);
    assert!(a.starts_with(
        r#"<samlp:LogoutRequest xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="LRQ1" IssueInstant="#
    ));
    // The assertion namespace is declared where it is used.
    assert!(a.contains(r#"<saml:Issuer xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion">"#));
    Ok(())
}

#[test]
fn indentation_is_kept_on_the_wire_but_not_in_the_model() -> anyhow::Result<()> {
    let compact = canonicalize(&parse(COMPACT)?);
    let pretty = canonicalize(&parse(PRETTY)?);
    assert_ne!(compact, pretty);
    assert!(pretty.contains("</saml:Issuer>\n  <saml:NameID>"));

    let from_compact = LogoutRequest::from_xml(COMPACT)?;
    let from_pretty = LogoutRequest::from_xml(PRETTY)?;
    assert_eq!(from_compact.to_xml(), from_pretty.to_xml());
    Ok(())
}

#[test]
fn model_output_is_stable() -> anyhow::Result<()> {
    let request = LogoutRequest::new(NameId::persistent("alice"))
        .with_issuer("sp.example")
        .with_destination("https://idp.example/saml/slo")
        .with_session_index("s-1");

    let first = request.to_xml();
    let reparsed = LogoutRequest::from_xml(&first)?;
    assert_eq!(reparsed.to_xml(), first);
    assert_eq!(canonicalize(&parse(&first)?), first);
    Ok(())
}

#[test]
fn escaping_follows_c14n() -> anyhow::Result<()> {
    let element = parse(r#"<a b="x &amp; &quot;y&quot; &lt;">1 &lt; 2 &amp;&amp; 3 &gt; 2</a>"#)?;
    assert_eq!(
        canonicalize(&element),
        r#"<a b="x &amp; &quot;y&quot; &lt;">1 &lt; 2 &amp;&amp; 3 &gt; 2</a>"#
    );
    Ok(())
}

#[test]
fn doctype_is_refused() {
    let xml = r#"<!DOCTYPE a [<!ENTITY x "y">]><a>&x;</a>"#;
    assert!(parse(xml).is_err());
}
