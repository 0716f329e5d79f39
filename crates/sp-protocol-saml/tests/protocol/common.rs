//! Shared fixtures: a hosted `sp.example` and a remote `idp.example`.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use sp_core::{ServiceProviderConfig, Telemetry};
use sp_crypto::{Certificate, SigningKey, VerifyingKey};
use sp_protocol_saml::{
    signature::SigningCredential, Assertion, AuthnStatement, Conditions, HostedServiceProvider,
    IdentityProviderMetadata, NameId, SamlMessage, Subject, SubjectConfirmation,
    SubjectConfirmationData,
};

pub const SP_KEY: &str = include_str!("../../../../testdata/sp-signing.key");
pub const SP_CERT: &str = include_str!("../../../../testdata/sp-signing.crt");
pub const IDP_KEY: &str = include_str!("../../../../testdata/idp-signing.key");
pub const IDP_CERT: &str = include_str!("../../../../testdata/idp-signing.crt");
pub const EC_KEY: &str = include_str!("../../../../testdata/ec-signing.key");
pub const EC_CERT: &str = include_str!("../../../../testdata/ec-signing.crt");

pub const SP_ENTITY: &str = "sp.example";
pub const IDP_ENTITY: &str = "idp.example";
pub const SP_ACS: &str = "https://sp.example/saml/acs";
pub const SP_SLO: &str = "https://sp.example/saml/slo";
pub const IDP_SSO: &str = "https://idp.example/saml/sso";
pub const IDP_SLO: &str = "https://idp.example/saml/slo";

/// Installs a test-writer subscriber once per binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sp_protocol_saml=debug,sp_core=info")
        .with_test_writer()
        .try_init();
}

pub fn config(sign_requests: bool) -> ServiceProviderConfig {
    let mut config = ServiceProviderConfig::new(SP_ENTITY, "https://sp.example/saml");
    config.signing.sign_requests = sign_requests;
    config.signing.private_key_pem = Some(SP_KEY.to_string());
    config.signing.certificate_pem = Some(SP_CERT.to_string());
    config
}

pub fn sp(sign_requests: bool) -> anyhow::Result<HostedServiceProvider> {
    init_tracing();
    Ok(HostedServiceProvider::from_config(
        &config(sign_requests),
        Telemetry::for_entity(SP_ENTITY),
    )?)
}

pub fn sp_key() -> anyhow::Result<VerifyingKey> {
    Ok(Certificate::from_pem(SP_CERT)?.verifying_key().clone())
}

pub fn idp_key() -> anyhow::Result<VerifyingKey> {
    Ok(Certificate::from_pem(IDP_CERT)?.verifying_key().clone())
}

pub fn idp_credential() -> anyhow::Result<SigningCredential> {
    Ok(SigningCredential::new(SigningKey::from_pem(IDP_KEY)?)
        .with_certificate(Certificate::from_pem(IDP_CERT)?))
}

/// Identity provider metadata document as a remote party would publish it.
pub fn idp_metadata_xml(with_slo: bool) -> anyhow::Result<String> {
    let certificate = Certificate::from_pem(IDP_CERT)?.to_base64();
    let slo = if with_slo {
        format!(
            r#"<md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{IDP_SLO}"/>"#
        )
    } else {
        String::new()
    };
    Ok(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" xmlns:ds="http://www.w3.org/2000/09/xmldsig#" entityID="{IDP_ENTITY}">
  <md:IDPSSODescriptor WantAuthnRequestsSigned="true" protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:KeyDescriptor use="signing">
      <ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>
    </md:KeyDescriptor>
    {slo}
    <md:NameIDFormat>urn:oasis:names:tc:SAML:2.0:nameid-format:persistent</md:NameIDFormat>
    <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{IDP_SSO}"/>
  </md:IDPSSODescriptor>
</md:EntityDescriptor>"#
    ))
}

pub fn idp_metadata(with_slo: bool) -> anyhow::Result<IdentityProviderMetadata> {
    Ok(IdentityProviderMetadata::from_metadata_xml(&idp_metadata_xml(with_slo)?)?)
}

pub fn remotes(with_slo: bool) -> anyhow::Result<HashMap<String, Arc<IdentityProviderMetadata>>> {
    Ok(HashMap::from([(
        IDP_ENTITY.to_string(),
        Arc::new(idp_metadata(with_slo)?),
    )]))
}

/// A bearer assertion for `sp.example`, valid around `now`.
pub fn assertion(now: DateTime<Utc>, in_response_to: &str) -> Assertion {
    Assertion::new()
        .with_issuer(IDP_ENTITY)
        .with_subject(
            Subject::new(NameId::persistent("u-7")).with_confirmation(SubjectConfirmation::bearer(
                SubjectConfirmationData {
                    not_on_or_after: Some(now + Duration::minutes(5)),
                    recipient: Some(SP_ACS.to_string()),
                    in_response_to: Some(in_response_to.to_string()),
                    ..SubjectConfirmationData::default()
                },
            )),
        )
        .with_conditions(
            Conditions::window(now - Duration::minutes(1), now + Duration::minutes(5))
                .with_audience(SP_ENTITY),
        )
        .with_authn_statement(AuthnStatement {
            authn_instant: now,
            session_index: Some("sess-7".to_string()),
            session_not_on_or_after: None,
            authn_context_class_ref: None,
        })
}
