//! Single sign-on: outbound `AuthnRequest`, inbound `Response`.

use chrono::{DateTime, Utc};
use sp_cache::IssuedRequestRegistry;
use sp_core::{Event, EventType};

use crate::{
    bindings::ReceivedMessage,
    endpoint::resolve_required,
    error::{SamlError, SamlResult},
    outbound::OutboundMessage,
    provider::{HostedServiceProvider, RemoteProviders},
    types::{
        Authentication, AuthnRequest, IdentityProviderMetadata, NameIdPolicy, ProtocolMessage,
        SamlBinding, SamlMessage,
    },
    validation::ValidationContext,
};

impl HostedServiceProvider {
    /// Builds an `AuthnRequest` for `idp`.
    ///
    /// The destination is the identity provider's SSO endpoint chosen by
    /// [`resolve`](crate::endpoint::resolve) with `binding` as preference,
    /// HTTP-Redirect when none is given.
    /// The request is signed only when `sign_requests` is on. Its id is
    /// registered in `issued_requests` so the response can be matched.
    pub fn build_authn_request(
        &self,
        idp: &IdentityProviderMetadata,
        binding: Option<SamlBinding>,
        relay_state: Option<&str>,
        issued_requests: Option<&dyn IssuedRequestRegistry>,
    ) -> SamlResult<OutboundMessage> {
        let endpoint = resolve_required(
            idp.single_sign_on_services(),
            binding.or(Some(SamlBinding::HttpRedirect)),
            None,
            &idp.entity_id,
            "SingleSignOnService",
        )?;

        let sso = &self.config.sso;
        let mut request = AuthnRequest::new()
            .with_issuer(self.entity_id())
            .with_destination(endpoint.location.clone())
            .with_acs_url(self.assertion_consumer_service_url())
            .with_protocol_binding(SamlBinding::HttpPost);
        if sso.force_authn {
            request = request.with_force_authn(true);
        }
        if sso.is_passive {
            request = request.with_is_passive(true);
        }
        if sso.name_id_format.is_some() || sso.allow_create.is_some() {
            request = request.with_name_id_policy(NameIdPolicy {
                format: sso.name_id_format.clone(),
                sp_name_qualifier: None,
                allow_create: sso.allow_create,
            });
        }

        let outbound =
            OutboundMessage::prepare(request, endpoint, relay_state, self.outbound_credential())?;

        if let Some(registry) = issued_requests {
            registry.register(outbound.message.id(), outbound.message.header().issue_instant)?;
        }

        self.telemetry.record(
            &Event::builder(EventType::AuthnRequestIssued)
                .remote(idp.entity_id.clone())
                .message(outbound.message.id())
                .endpoint(endpoint.location.clone())
                .build(),
        );
        Ok(outbound)
    }

    /// Validates a received `Response` and derives the authentication it
    /// asserts.
    ///
    /// The issuer's metadata comes from `remotes`. A response answering a
    /// registered request consumes that request id, so a second delivery of
    /// the same response is rejected.
    pub fn process_response(
        &self,
        received: &ReceivedMessage,
        remotes: &dyn RemoteProviders,
        issued_requests: Option<&dyn IssuedRequestRegistry>,
        now: DateTime<Utc>,
    ) -> SamlResult<Authentication> {
        let ProtocolMessage::Response(response) = &received.message else {
            return Err(SamlError::MalformedMessage(format!(
                "expected Response, got {}",
                received.message.kind().element_name()
            )));
        };

        let issuer = response.issuer();
        let idp = remotes
            .identity_provider(issuer)
            .ok_or_else(|| SamlError::UnknownRemoteParty(issuer.to_string()))?;

        let acs = self.assertion_consumer_service_url();
        let mut context =
            ValidationContext::for_remote(self.entity_id(), &idp, self.validation_policy(), now)
                .arrived_at(&acs);
        if let Some(registry) = issued_requests {
            context = context.with_issued_requests(registry);
        }

        let result = context.validate(received);
        if !result.is_valid() {
            self.telemetry.record(
                &Event::builder(EventType::ResponseRejected)
                    .remote(issuer)
                    .message(response.id())
                    .in_response_to(response.in_response_to.as_deref())
                    .failure(result.to_string())
                    .build(),
            );
            return Err(SamlError::Rejected(result));
        }

        if let (Some(id), Some(registry)) = (response.in_response_to.as_deref(), issued_requests) {
            registry
                .consume(id, now)
                .map_err(|_| SamlError::Replay(id.to_string()))?;
        }

        let authentication = response
            .first_assertion()
            .and_then(|assertion| Authentication::from_assertion(assertion, self.entity_id()))
            .ok_or_else(|| SamlError::MalformedMessage("assertion names no subject".to_string()))?;

        self.telemetry.record(
            &Event::builder(EventType::ResponseAccepted)
                .remote(issuer)
                .message(response.id())
                .in_response_to(response.in_response_to.as_deref())
                .endpoint(acs)
                .build(),
        );
        Ok(authentication)
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use chrono::Duration;
    use sp_cache::InMemoryRequestRegistry;
    use sp_core::{ServiceProviderConfig, Telemetry};
    use sp_crypto::{Certificate, SigningKey};

    use super::*;
    use crate::{
        outbound::Delivery,
        signature::{sign_embedded, SignatureFailure, SigningCredential},
        types::{
            Assertion, AuthnStatement, Conditions, Endpoint, KeyUse, NameId, Response, SsoProvider,
            SsoRole, Status, Subject, SubjectConfirmation, SubjectConfirmationData,
        },
        validation::ValidationErrorKind,
        xml::XmlCodec,
    };

    const SP_KEY: &str = include_str!("../../../testdata/sp-signing.key");
    const SP_CERT: &str = include_str!("../../../testdata/sp-signing.crt");
    const IDP_KEY: &str = include_str!("../../../testdata/idp-signing.key");
    const IDP_CERT: &str = include_str!("../../../testdata/idp-signing.crt");

    fn sp() -> HostedServiceProvider {
        let mut config = ServiceProviderConfig::new("sp.example", "https://sp.example/saml");
        config.signing.private_key_pem = Some(SP_KEY.to_string());
        config.signing.certificate_pem = Some(SP_CERT.to_string());
        config.sso.name_id_format = Some("urn:oasis:names:tc:SAML:2.0:nameid-format:persistent".to_string());
        HostedServiceProvider::from_config(&config, Telemetry::disabled()).unwrap()
    }

    fn idp() -> IdentityProviderMetadata {
        IdentityProviderMetadata::new("idp.example").with_provider(
            SsoProvider::new(SsoRole::IdentityProvider)
                .with_single_sign_on_service(Endpoint::new(
                    "https://idp.example/sso",
                    SamlBinding::HttpRedirect,
                ))
                .with_key(Some(KeyUse::Signing), Certificate::from_pem(IDP_CERT).unwrap()),
        )
    }

    fn remotes() -> HashMap<String, Arc<IdentityProviderMetadata>> {
        HashMap::from([("idp.example".to_string(), Arc::new(idp()))])
    }

    fn idp_credential() -> SigningCredential {
        SigningCredential::new(SigningKey::from_pem(IDP_KEY).unwrap())
    }

    fn assertion(in_response_to: &str, now: DateTime<Utc>) -> Assertion {
        Assertion::new()
            .with_issuer("idp.example")
            .with_subject(Subject::new(NameId::persistent("u-42")).with_confirmation(
                SubjectConfirmation::bearer(SubjectConfirmationData {
                    not_on_or_after: Some(now + Duration::minutes(5)),
                    recipient: Some("https://sp.example/saml/acs".to_string()),
                    in_response_to: Some(in_response_to.to_string()),
                    ..SubjectConfirmationData::default()
                }),
            ))
            .with_conditions(
                Conditions::window(now - Duration::minutes(1), now + Duration::minutes(5))
                    .with_audience("sp.example"),
            )
            .with_authn_statement(AuthnStatement {
                authn_instant: now,
                session_index: Some("idx-1".to_string()),
                session_not_on_or_after: None,
                authn_context_class_ref: None,
            })
    }

    fn unsigned_response(in_response_to: &str) -> Response {
        Response::new(Status::success())
            .with_issuer("idp.example")
            .with_destination("https://sp.example/saml/acs")
            .with_in_response_to(in_response_to)
    }

    fn signed_response(in_response_to: &str, now: DateTime<Utc>) -> ReceivedMessage {
        let response = unsigned_response(in_response_to).with_assertion(assertion(in_response_to, now));
        let signed = sign_embedded(response, &idp_credential()).unwrap();
        ReceivedMessage::parse(&signed.to_xml(), None).unwrap()
    }

    #[test]
    fn authn_request_carries_policy_and_registers_id() {
        let registry = InMemoryRequestRegistry::new(Duration::minutes(5));
        let outbound = sp()
            .build_authn_request(&idp(), None, Some("rs"), Some(&registry))
            .unwrap();

        let ProtocolMessage::AuthnRequest(request) = &outbound.message else {
            panic!("expected AuthnRequest");
        };
        assert!(request.id().starts_with("ARQ"));
        assert_eq!(request.issuer(), "sp.example");
        assert_eq!(request.destination(), Some("https://idp.example/sso"));
        assert_eq!(
            request.assertion_consumer_service_url.as_deref(),
            Some("https://sp.example/saml/acs")
        );
        assert!(request.name_id_policy.is_some());
        assert!(outbound.is_signed());
        assert!(matches!(outbound.delivery, Delivery::Redirect { .. }));
        assert!(registry.contains(request.id(), Utc::now()));
    }

    #[test]
    fn back_channel_sso_endpoint_is_passed_over() {
        let idp = IdentityProviderMetadata::new("idp.example").with_provider(
            SsoProvider::new(SsoRole::IdentityProvider)
                .with_single_sign_on_service(Endpoint::new(
                    "https://idp.example/artifact",
                    SamlBinding::HttpArtifact,
                ))
                .with_single_sign_on_service(Endpoint::new(
                    "https://idp.example/sso",
                    SamlBinding::HttpRedirect,
                )),
        );
        let outbound = sp().build_authn_request(&idp, None, None, None).unwrap();
        assert_eq!(outbound.endpoint.location, "https://idp.example/sso");
        assert!(matches!(outbound.delivery, Delivery::Redirect { .. }));
    }

    #[test]
    fn no_sso_endpoint() {
        let bare = IdentityProviderMetadata::new("idp.example");
        let err = sp().build_authn_request(&bare, None, None, None).unwrap_err();
        assert!(matches!(err, SamlError::NoUsableEndpoint { .. }));
    }

    #[test]
    fn accepted_response_yields_authentication_once() {
        let sp = sp();
        let registry = InMemoryRequestRegistry::new(Duration::minutes(5));
        let now = Utc::now();
        registry.register("ARQ1", now).unwrap();
        let received = signed_response("ARQ1", now);

        let authentication = sp
            .process_response(&received, &remotes(), Some(&registry), now)
            .unwrap();
        assert_eq!(authentication.saml_principal.value, "u-42");
        assert_eq!(authentication.asserting_entity_id, "idp.example");
        assert_eq!(authentication.holding_entity_id, "sp.example");
        assert_eq!(authentication.session_index.as_deref(), Some("idx-1"));

        let err = sp
            .process_response(&received, &remotes(), Some(&registry), now)
            .unwrap_err();
        let SamlError::Rejected(result) = err else {
            panic!("expected rejection");
        };
        assert!(result.has(ValidationErrorKind::UnknownInResponseTo));
    }

    #[test]
    fn unsigned_assertion_smuggled_beside_signed_one_is_rejected() {
        let now = Utc::now();
        let signed_assertion = sign_embedded(assertion("ARQ1", now), &idp_credential()).unwrap();
        let mut smuggled = assertion("ARQ1", now);
        smuggled.subject = Some(Subject::new(NameId::persistent("admin")));
        let response = unsigned_response("ARQ1")
            .with_assertion(signed_assertion)
            .with_assertion(smuggled);
        let received = ReceivedMessage::parse(&response.to_xml(), None).unwrap();

        let registry = InMemoryRequestRegistry::new(Duration::minutes(5));
        registry.register("ARQ1", now).unwrap();
        let err = sp()
            .process_response(&received, &remotes(), Some(&registry), now)
            .unwrap_err();
        let SamlError::Rejected(result) = err else {
            panic!("expected rejection");
        };
        assert!(result.has(ValidationErrorKind::SignatureInvalid));
        assert_eq!(result.signature_failure(), Some(SignatureFailure::Missing));
        assert!(registry.contains("ARQ1", now));
    }

    #[test]
    fn unknown_issuer() {
        let received = signed_response("ARQ1", Utc::now());
        let empty: HashMap<String, Arc<IdentityProviderMetadata>> = HashMap::new();
        let err = sp().process_response(&received, &empty, None, Utc::now()).unwrap_err();
        assert!(matches!(err, SamlError::UnknownRemoteParty(id) if id == "idp.example"));
    }

    #[test]
    fn non_response_is_malformed() {
        let request = AuthnRequest::new().with_issuer("idp.example");
        let received = ReceivedMessage::from_message(request);
        let err = sp().process_response(&received, &remotes(), None, Utc::now()).unwrap_err();
        assert!(matches!(err, SamlError::MalformedMessage(_)));
    }
}
