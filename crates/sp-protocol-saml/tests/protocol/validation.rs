use chrono::{DateTime, Duration, Utc};
use sp_core::config::ValidationConfig;
use sp_protocol_saml::{
    bindings::ReceivedMessage,
    signature::{sign_embedded, SignatureFailure},
    validation::ValidationContext,
    xml::XmlCodec,
    Assertion, Conditions, Response, SamlMessage, Status, StatusCode, ValidationErrorKind,
};

use crate::common::{assertion, idp_credential, idp_metadata, IDP_ENTITY, SP_ACS, SP_ENTITY};

fn signed_response(assertion: Assertion) -> anyhow::Result<ReceivedMessage> {
    let response = Response::new(Status::success())
        .with_issuer(IDP_ENTITY)
        .with_destination(SP_ACS)
        .with_in_response_to("ARQ1")
        .with_assertion(assertion);
    let signed = sign_embedded(response, &idp_credential()?)?;
    Ok(ReceivedMessage::parse(&signed.to_xml(), None)?)
}

fn validate(
    received: &ReceivedMessage,
    policy: &ValidationConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<sp_protocol_saml::ValidationResult> {
    let idp = idp_metadata(true)?;
    Ok(ValidationContext::for_remote(SP_ENTITY, &idp, policy, now)
        .arrived_at(SP_ACS)
        .expecting("ARQ1")
        .validate(received))
}

#[test]
fn current_signed_response_is_valid() -> anyhow::Result<()> {
    let now = Utc::now();
    let received = signed_response(assertion(now, "ARQ1"))?;
    let result = validate(&received, &ValidationConfig::default(), now)?;
    assert!(result.is_valid(), "{result}");
    Ok(())
}

#[test]
fn expired_assertion_rejected_despite_valid_signature() -> anyhow::Result<()> {
    let now = Utc::now();
    let received = signed_response(assertion(now - Duration::hours(1), "ARQ1"))?;
    let result = validate(&received, &ValidationConfig::default(), now)?;

    assert!(!result.is_valid());
    assert!(result.has(ValidationErrorKind::Expired));
    assert!(!result.has(ValidationErrorKind::SignatureInvalid));
    assert_eq!(result.errors().len(), 1, "{result}");
    Ok(())
}

#[test]
fn foreign_audience_rejected_while_temporally_valid() -> anyhow::Result<()> {
    let now = Utc::now();
    let mut foreign = assertion(now, "ARQ1");
    foreign.conditions = Some(
        Conditions::window(now - Duration::minutes(1), now + Duration::minutes(5))
            .with_audience("other-sp.example"),
    );
    let received = signed_response(foreign)?;
    let result = validate(&received, &ValidationConfig::default(), now)?;

    assert!(result.has(ValidationErrorKind::AudienceMismatch));
    assert!(!result.has(ValidationErrorKind::Expired));
    assert!(!result.has(ValidationErrorKind::NotYetValid));
    Ok(())
}

#[test]
fn skew_tolerance_admits_slightly_early_assertion() -> anyhow::Result<()> {
    let now = Utc::now();
    let mut early = assertion(now, "ARQ1");
    early.conditions = Some(
        Conditions::window(now + Duration::seconds(20), now + Duration::minutes(5))
            .with_audience(SP_ENTITY),
    );
    let received = signed_response(early)?;

    let lenient = ValidationConfig {
        clock_skew_tolerance_seconds: 60,
        ..ValidationConfig::default()
    };
    assert!(validate(&received, &lenient, now)?.is_valid());

    let strict = ValidationConfig {
        clock_skew_tolerance_seconds: 0,
        ..ValidationConfig::default()
    };
    assert!(validate(&received, &strict, now)?.has(ValidationErrorKind::NotYetValid));
    Ok(())
}

#[test]
fn unsigned_response_rejected_when_enforced() -> anyhow::Result<()> {
    let now = Utc::now();
    let response = Response::new(Status::success())
        .with_issuer(IDP_ENTITY)
        .with_destination(SP_ACS)
        .with_in_response_to("ARQ1")
        .with_assertion(assertion(now, "ARQ1"));
    let received = ReceivedMessage::parse(&response.to_xml(), None)?;

    let result = validate(&received, &ValidationConfig::default(), now)?;
    assert_eq!(result.signature_failure(), Some(SignatureFailure::Missing));

    let relaxed = ValidationConfig {
        enforce_signature_on_receive: false,
        ..ValidationConfig::default()
    };
    assert!(validate(&received, &relaxed, now)?.is_valid());
    Ok(())
}

#[test]
fn remote_failure_status_is_surfaced() -> anyhow::Result<()> {
    let now = Utc::now();
    let response = Response::new(Status::responder_error("no such user"))
        .with_issuer(IDP_ENTITY)
        .with_destination(SP_ACS)
        .with_in_response_to("ARQ1");
    let signed = sign_embedded(response, &idp_credential()?)?;
    let received = ReceivedMessage::parse(&signed.to_xml(), None)?;

    let result = validate(&received, &ValidationConfig::default(), now)?;
    assert!(!result.is_valid());
    assert!(result.errors().is_empty(), "{result}");
    assert_eq!(result.remote_status_code(), Some(StatusCode::Responder));
    Ok(())
}

#[test]
fn several_failures_accumulate() -> anyhow::Result<()> {
    let now = Utc::now();
    let mut bad = assertion(now - Duration::hours(2), "ARQ9");
    bad.header.issuer = "impostor.example".to_string();
    bad.conditions = Some(
        Conditions::window(now - Duration::hours(3), now - Duration::hours(2))
            .with_audience("other-sp.example"),
    );
    let received = signed_response(bad)?;
    let result = validate(&received, &ValidationConfig::default(), now)?;

    for kind in [
        ValidationErrorKind::IssuerMismatch,
        ValidationErrorKind::Expired,
        ValidationErrorKind::AudienceMismatch,
        ValidationErrorKind::UnknownInResponseTo,
    ] {
        assert!(result.has(kind), "missing {kind} in {result}");
    }
    Ok(())
}
