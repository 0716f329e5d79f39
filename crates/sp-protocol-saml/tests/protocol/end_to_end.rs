use chrono::{Duration, Utc};
use sp_cache::{InMemoryRequestRegistry, IssuedRequestRegistry, MetadataCache};
use sp_core::{config::ValidationConfig, ServiceProviderConfig, Telemetry};
use sp_protocol_saml::{
    bindings::{HttpPostBinding, InboundExchange, MessageParam},
    signature::{sign_embedded, verify_embedded, SignatureFailure},
    validation::ValidationContext,
    xml::{parse, XmlCodec},
    Delivery, HostedServiceProvider, IdentityProviderMetadata, LogoutNegotiator, LogoutOutcome,
    ProtocolMessage, Response, SamlBinding, SamlMessage, SsoRole, Status,
    ValidationErrorKind,
};

use crate::common::{
    assertion, idp_credential, idp_metadata, idp_metadata_xml, sp, sp_key, IDP_ENTITY, IDP_SLO,
    IDP_SSO, SP_ACS, SP_ENTITY,
};

#[test]
fn signed_authn_request_for_redirect_sso() -> anyhow::Result<()> {
    let sp = sp(true)?;
    let idp = idp_metadata(true)?;
    let outbound = sp.build_authn_request(&idp, Some(SamlBinding::HttpRedirect), Some("/app"), None)?;

    assert!(matches!(outbound.message, ProtocolMessage::AuthnRequest(_)));
    assert_eq!(outbound.message.issuer(), SP_ENTITY);
    assert_eq!(outbound.message.destination(), Some(IDP_SSO));
    let signature = outbound
        .message
        .signature()
        .ok_or_else(|| anyhow::anyhow!("request is not signed"))?;
    assert!(!signature.value.is_empty());

    // The identity provider accepts it with the key from our metadata.
    let Delivery::Redirect { location } = &outbound.delivery else {
        panic!("expected redirect delivery");
    };
    assert!(location.starts_with(IDP_SSO));
    let exchange = InboundExchange::from_redirect_url(location)?;
    assert_eq!(exchange.relay_state(), Some("/app"));
    let received = exchange
        .receive()?
        .ok_or_else(|| anyhow::anyhow!("no message in redirect"))?;

    let policy = ValidationConfig::default();
    let result = ValidationContext::new(IDP_ENTITY, SP_ENTITY, vec![sp_key()?], &policy, Utc::now())
        .arrived_at(IDP_SSO)
        .validate(&received);
    assert!(result.is_valid(), "{result}");
    Ok(())
}

#[test]
fn unsigned_authn_request_accepted_without_enforcement() -> anyhow::Result<()> {
    let sp = sp(false)?;
    let idp = idp_metadata(true)?;
    let outbound = sp.build_authn_request(&idp, Some(SamlBinding::HttpRedirect), None, None)?;

    assert_eq!(outbound.message.issuer(), SP_ENTITY);
    assert_eq!(outbound.message.destination(), Some(IDP_SSO));
    assert!(outbound.message.signature().is_none());

    let Delivery::Redirect { location } = &outbound.delivery else {
        panic!("expected redirect delivery");
    };
    assert!(!location.contains("Signature="));
    let received = InboundExchange::from_redirect_url(location)?
        .receive()?
        .ok_or_else(|| anyhow::anyhow!("no message in redirect"))?;

    let relaxed = ValidationConfig {
        enforce_signature_on_receive: false,
        ..ValidationConfig::default()
    };
    let result = ValidationContext::new(IDP_ENTITY, SP_ENTITY, Vec::new(), &relaxed, Utc::now())
        .arrived_at(IDP_SSO)
        .validate(&received);
    assert!(result.is_valid(), "{result}");

    let strict = ValidationConfig::default();
    let result = ValidationContext::new(IDP_ENTITY, SP_ENTITY, Vec::new(), &strict, Utc::now())
        .arrived_at(IDP_SSO)
        .validate(&received);
    assert!(result.has(ValidationErrorKind::SignatureInvalid));
    assert_eq!(result.signature_failure(), Some(SignatureFailure::Missing));
    Ok(())
}

#[test]
fn login_then_logout() -> anyhow::Result<()> {
    let sp = sp(true)?;
    let cache = MetadataCache::new(Duration::minutes(10));
    cache.replace(IDP_ENTITY, IdentityProviderMetadata::from_metadata_xml(&idp_metadata_xml(true)?)?);
    let registry = InMemoryRequestRegistry::new(Duration::minutes(5));

    let idp = cache
        .get(IDP_ENTITY)
        .ok_or_else(|| anyhow::anyhow!("metadata not cached"))?;
    let request = sp.build_authn_request(&idp, None, Some("/dashboard"), Some(&registry))?;
    let request_id = request.message.id().to_string();
    assert!(registry.contains(&request_id, Utc::now()));

    // Identity provider answers over HTTP-POST with a signed response.
    let now = Utc::now();
    let response = Response::new(Status::success())
        .with_issuer(IDP_ENTITY)
        .with_destination(SP_ACS)
        .with_in_response_to(request_id.clone())
        .with_assertion(assertion(now, &request_id));
    let signed = sign_embedded(response, &idp_credential()?)?;
    let form = HttpPostBinding::encode(&signed.to_xml(), SP_ACS, MessageParam::Response, Some("/dashboard"));
    assert!(form.to_html().contains(r#"name="SAMLResponse""#));

    let exchange = InboundExchange::from_post_form(&form)?;
    assert_eq!(exchange.binding, Some(SamlBinding::HttpPost));
    let received = exchange
        .receive()?
        .ok_or_else(|| anyhow::anyhow!("no message in form"))?;

    let authentication = sp.process_response(&received, &cache, Some(&registry), now)?;
    assert_eq!(authentication.saml_principal.value, "u-7");
    assert_eq!(authentication.asserting_entity_id, IDP_ENTITY);
    assert_eq!(authentication.holding_entity_id, SP_ENTITY);
    assert_eq!(authentication.session_index.as_deref(), Some("sess-7"));
    assert!(!registry.contains(&request_id, Utc::now()));

    // The session can then be ended from the SP side.
    let outcome = LogoutNegotiator::new(&sp, &cache)
        .with_issued_requests(&registry)
        .negotiate(&InboundExchange::empty(), Some(&authentication), Utc::now())?;
    let LogoutOutcome::SpInitiatedLogout(logout) = &outcome else {
        panic!("expected SpInitiatedLogout, got {outcome:?}");
    };
    assert_eq!(logout.message.destination(), Some(IDP_SLO));
    assert!(logout.is_signed());
    assert!(registry.contains(logout.message.id(), Utc::now()));
    Ok(())
}

#[test]
fn published_metadata_describes_the_sp() -> anyhow::Result<()> {
    let sp = sp(true)?;
    let xml = sp.metadata_xml()?;

    verify_embedded(&parse(&xml)?, &[sp_key()?])?;

    let parsed = IdentityProviderMetadata::from_metadata_xml(&xml)?;
    assert_eq!(parsed.entity_id, SP_ENTITY);
    let descriptor = &parsed.providers[0];
    assert_eq!(descriptor.role, SsoRole::ServiceProvider);
    assert_eq!(descriptor.assertion_consumer_services[0].location, SP_ACS);
    assert_eq!(descriptor.assertion_consumer_services[0].binding, SamlBinding::HttpPost);
    assert_eq!(descriptor.single_logout_services.len(), 2);
    assert_eq!(descriptor.keys.len(), 1);
    Ok(())
}

#[test]
fn provider_from_toml() -> anyhow::Result<()> {
    let config = ServiceProviderConfig::from_toml_str(
        r#"
entity_id = "sp.example"
base_url = "https://sp.example/saml/"

[signing]
sign_requests = false

[validation]
clock_skew_tolerance_seconds = 30
unsigned_message_kinds = ["logout-response"]
"#,
    )?;
    let sp = HostedServiceProvider::from_config(&config, Telemetry::disabled())?;
    assert_eq!(sp.assertion_consumer_service_url(), SP_ACS);
    assert!(sp.credential().is_none());
    assert_eq!(sp.validation_policy().clock_skew_tolerance_seconds, 30);

    let outbound = sp.build_authn_request(&idp_metadata(false)?, None, None, None)?;
    assert!(!outbound.is_signed());
    Ok(())
}
