use chrono::{Duration, Utc};
use sp_cache::InMemoryRequestRegistry;
use sp_protocol_saml::{
    bindings::{HttpPostBinding, HttpRedirectBinding, InboundExchange, MessageParam},
    signature::{sign_embedded, verify_detached},
    xml::XmlCodec,
    Authentication, Delivery, LogoutNegotiator, LogoutOutcome, LogoutRequest, LogoutResponse,
    NameId, ProtocolMessage, SamlError, SamlMessage, Status, StatusCode, ValidationErrorKind,
};

use crate::common::{
    idp_credential, remotes, sp, sp_key, IDP_ENTITY, IDP_SLO, SP_ENTITY, SP_SLO,
};

fn authentication() -> Authentication {
    Authentication::new(NameId::persistent("u-7"), SP_ENTITY, IDP_ENTITY).with_session_index("sess-7")
}

fn idp_logout_request() -> LogoutRequest {
    LogoutRequest::new(NameId::persistent("u-7"))
        .with_issuer(IDP_ENTITY)
        .with_destination(SP_SLO)
        .with_session_index("sess-7")
}

fn redirect_exchange(param: MessageParam, xml: &str, relay_state: Option<&str>) -> anyhow::Result<InboundExchange> {
    let (url, _) = HttpRedirectBinding::encode_signed(xml, SP_SLO, param, relay_state, &idp_credential()?)?;
    Ok(InboundExchange::from_redirect_url(&url)?)
}

#[test]
fn inbound_request_takes_precedence_over_session() -> anyhow::Result<()> {
    let sp = sp(true)?;
    let remotes = remotes(true)?;
    let request = idp_logout_request();
    let exchange = redirect_exchange(MessageParam::Request, &request.to_xml(), Some("back-to-app"))?;

    let outcome = LogoutNegotiator::new(&sp, &remotes).negotiate(&exchange, Some(&authentication()), Utc::now())?;
    let outbound = match outcome {
        LogoutOutcome::ReceivedLogoutRequest(outbound) => outbound,
        other => panic!("expected ReceivedLogoutRequest, got {other:?}"),
    };

    assert_eq!(outbound.message.in_response_to(), Some(request.id()));
    assert_eq!(outbound.message.destination(), Some(IDP_SLO));
    assert_eq!(outbound.relay_state.as_deref(), Some("back-to-app"));

    // The answer is signed over its redirect query with the SP key.
    let Delivery::Redirect { location } = &outbound.delivery else {
        panic!("expected redirect delivery");
    };
    let decoded = HttpRedirectBinding::decode_url(location)?;
    assert_eq!(decoded.param, MessageParam::Response);
    assert_eq!(decoded.relay_state.as_deref(), Some("back-to-app"));
    let signature = decoded.detached_signature.as_ref().ok_or_else(|| anyhow::anyhow!("unsigned"))?;
    verify_detached(signature, &[sp_key()?])?;
    assert!(LogoutResponse::from_xml(&decoded.xml)?.status.is_success());
    Ok(())
}

#[test]
fn posted_request_with_enveloped_signature() -> anyhow::Result<()> {
    let sp = sp(false)?;
    let remotes = remotes(true)?;
    let signed = sign_embedded(idp_logout_request(), &idp_credential()?)?;
    let form = HttpPostBinding::encode(&signed.to_xml(), SP_SLO, MessageParam::Request, None);
    let exchange = InboundExchange::from_post_form(&form)?;

    let outcome = LogoutNegotiator::new(&sp, &remotes).negotiate(&exchange, None, Utc::now())?;
    let outbound = outcome.outbound().ok_or_else(|| anyhow::anyhow!("no answer"))?;
    assert!(matches!(outbound.message, ProtocolMessage::LogoutResponse(_)));
    assert!(!outbound.is_signed());
    Ok(())
}

#[test]
fn expired_request_is_rejected() -> anyhow::Result<()> {
    let sp = sp(false)?;
    let remotes = remotes(true)?;
    let request = idp_logout_request().with_not_on_or_after(Utc::now() - Duration::minutes(10));
    let exchange = redirect_exchange(MessageParam::Request, &request.to_xml(), None)?;

    match LogoutNegotiator::new(&sp, &remotes).negotiate(&exchange, None, Utc::now()) {
        Err(SamlError::Rejected(result)) => assert!(result.has(ValidationErrorKind::Expired)),
        other => panic!("expected rejection, got {other:?}"),
    }
    Ok(())
}

#[test]
fn zero_slo_endpoints_is_fatal() -> anyhow::Result<()> {
    let sp = sp(true)?;
    let remotes = remotes(false)?;
    let err = LogoutNegotiator::new(&sp, &remotes)
        .negotiate(&InboundExchange::empty(), Some(&authentication()), Utc::now())
        .unwrap_err();
    assert!(matches!(err, SamlError::NoUsableEndpoint { ref entity_id, .. } if entity_id == IDP_ENTITY));
    Ok(())
}

#[test]
fn full_sp_initiated_round_trip() -> anyhow::Result<()> {
    let sp = sp(true)?;
    let remotes = remotes(true)?;
    let registry = InMemoryRequestRegistry::new(Duration::minutes(5));
    let negotiator = LogoutNegotiator::new(&sp, &remotes).with_issued_requests(&registry);

    let initiated = negotiator.negotiate(&InboundExchange::empty(), Some(&authentication()), Utc::now())?;
    let LogoutOutcome::SpInitiatedLogout(outbound) = &initiated else {
        panic!("expected SpInitiatedLogout, got {initiated:?}");
    };
    assert!(outbound.is_signed());
    assert_eq!(outbound.endpoint.location, IDP_SLO);
    let request_id = outbound.message.id().to_string();

    let answer = LogoutResponse::new(Status::success())
        .with_issuer(IDP_ENTITY)
        .with_destination(SP_SLO)
        .with_in_response_to(request_id.clone());
    let exchange = redirect_exchange(MessageParam::Response, &answer.to_xml(), None)?;

    let outcome = negotiator.negotiate(&exchange, Some(&authentication()), Utc::now())?;
    let LogoutOutcome::ReceivedLogoutResponse { response, validation } = &outcome else {
        panic!("expected ReceivedLogoutResponse, got {outcome:?}");
    };
    assert!(validation.is_valid(), "{validation}");
    assert_eq!(response.in_response_to.as_deref(), Some(request_id.as_str()));

    // A replayed answer no longer matches an outstanding request.
    let replay = negotiator.negotiate(&exchange, None, Utc::now())?;
    let LogoutOutcome::ReceivedLogoutResponse { validation, .. } = &replay else {
        panic!("expected ReceivedLogoutResponse, got {replay:?}");
    };
    assert!(validation.has(ValidationErrorKind::UnknownInResponseTo));
    Ok(())
}

#[test]
fn partial_logout_status_is_reported() -> anyhow::Result<()> {
    let sp = sp(false)?;
    let remotes = remotes(true)?;
    let answer = LogoutResponse::new(Status::new(StatusCode::Responder).with_sub_code(StatusCode::PartialLogout))
        .with_issuer(IDP_ENTITY)
        .with_destination(SP_SLO);
    let exchange = redirect_exchange(MessageParam::Response, &answer.to_xml(), None)?;

    let outcome = LogoutNegotiator::new(&sp, &remotes).negotiate(&exchange, None, Utc::now())?;
    let LogoutOutcome::ReceivedLogoutResponse { validation, .. } = &outcome else {
        panic!("expected ReceivedLogoutResponse, got {outcome:?}");
    };
    assert!(!validation.is_valid());
    assert_eq!(validation.remote_status_code(), Some(StatusCode::Responder));
    assert_eq!(
        validation.remote_error().and_then(|s| s.sub_code),
        Some(StatusCode::PartialLogout)
    );
    Ok(())
}

#[test]
fn no_message_and_no_session_is_a_no_op() -> anyhow::Result<()> {
    let sp = sp(true)?;
    let remotes = remotes(true)?;
    let exchange = InboundExchange::from_redirect_url("https://sp.example/saml/slo?foo=bar")?;
    let outcome = LogoutNegotiator::new(&sp, &remotes).negotiate(&exchange, None, Utc::now())?;
    assert!(matches!(outcome, LogoutOutcome::NoOp));
    Ok(())
}
