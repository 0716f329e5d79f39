//! Rule battery applied to a received message.

use chrono::{DateTime, Duration, Utc};
use sp_cache::IssuedRequestRegistry;
use sp_core::config::ValidationConfig;
use sp_crypto::VerifyingKey;

use super::{ValidationErrorKind, ValidationResult};
use crate::{
    bindings::ReceivedMessage,
    error::SamlError,
    signature::{verify_detached, verify_embedded, SignatureFailure},
    types::{Assertion, IdentityProviderMetadata, ProtocolMessage, Status, SAML_NS, XMLDSIG_NS},
    xml::XmlElement,
};

/// Everything a check needs besides the message itself.
pub struct ValidationContext<'a> {
    local_entity_id: &'a str,
    expected_issuer: &'a str,
    trusted_keys: Vec<VerifyingKey>,
    policy: &'a ValidationConfig,
    endpoint: Option<&'a str>,
    expected_request_id: Option<&'a str>,
    issued_requests: Option<&'a dyn IssuedRequestRegistry>,
    now: DateTime<Utc>,
}

impl<'a> ValidationContext<'a> {
    /// Creates a context trusting `trusted_keys` for messages from
    /// `expected_issuer`.
    #[must_use]
    pub fn new(
        local_entity_id: &'a str,
        expected_issuer: &'a str,
        trusted_keys: Vec<VerifyingKey>,
        policy: &'a ValidationConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            local_entity_id,
            expected_issuer,
            trusted_keys,
            policy,
            endpoint: None,
            expected_request_id: None,
            issued_requests: None,
            now,
        }
    }

    /// Creates a context for messages sent by `remote`, trusting the signing
    /// keys in its metadata.
    #[must_use]
    pub fn for_remote(
        local_entity_id: &'a str,
        remote: &'a IdentityProviderMetadata,
        policy: &'a ValidationConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self::new(
            local_entity_id,
            &remote.entity_id,
            remote.signing_keys(),
            policy,
            now,
        )
    }

    /// Endpoint location the message arrived on.
    #[must_use]
    pub const fn arrived_at(mut self, endpoint: &'a str) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Id of the request this message is expected to answer.
    #[must_use]
    pub const fn expecting(mut self, request_id: &'a str) -> Self {
        self.expected_request_id = Some(request_id);
        self
    }

    /// Registry of ids the local party issued.
    #[must_use]
    pub fn with_issued_requests(mut self, registry: &'a dyn IssuedRequestRegistry) -> Self {
        self.issued_requests = Some(registry);
        self
    }

    fn skew(&self) -> Duration {
        Duration::seconds(i64::from(self.policy.clock_skew_tolerance_seconds))
    }

    /// Runs every rule against `received`.
    #[must_use]
    pub fn validate(&self, received: &ReceivedMessage) -> ValidationResult {
        let mut result = ValidationResult::new();
        let message = &received.message;

        self.check_issuer("message", message.issuer(), &mut result);
        self.check_signature(received, &mut result);
        self.check_destination(
            message.destination(),
            message.signature().is_some() || received.detached_signature.is_some(),
            &mut result,
        );

        if message.header().issue_instant > self.now + self.skew() {
            result.add(
                ValidationErrorKind::NotYetValid,
                format!("IssueInstant {} is in the future", message.header().issue_instant),
            );
        }

        match message {
            ProtocolMessage::Response(response) => {
                if response.status.is_success() && response.assertions.is_empty() {
                    result.add(
                        ValidationErrorKind::MissingAssertion,
                        "successful response without assertion",
                    );
                }
                for assertion in &response.assertions {
                    if assertion.header.issuer != response.header.issuer {
                        result.add(
                            ValidationErrorKind::IssuerMismatch,
                            format!(
                                "assertion issuer {} differs from response issuer {}",
                                assertion.header.issuer, response.header.issuer
                            ),
                        );
                    }
                    self.check_assertion(assertion, &mut result);
                }
                Self::check_status(&response.status, &mut result);
            }
            ProtocolMessage::Assertion(assertion) => self.check_assertion(assertion, &mut result),
            ProtocolMessage::LogoutRequest(request) => {
                if let Some(not_on_or_after) = request.not_on_or_after {
                    if self.now - self.skew() >= not_on_or_after {
                        result.add(
                            ValidationErrorKind::Expired,
                            format!("logout request expired at {not_on_or_after}"),
                        );
                    }
                }
            }
            ProtocolMessage::LogoutResponse(response) => {
                Self::check_status(&response.status, &mut result);
            }
            ProtocolMessage::AuthnRequest(_) => {}
        }

        if let Some(id) = message.in_response_to() {
            self.check_in_response_to(id, &mut result);
        }

        result
    }

    fn check_issuer(&self, what: &str, issuer: &str, result: &mut ValidationResult) {
        if issuer != self.expected_issuer {
            result.add(
                ValidationErrorKind::IssuerMismatch,
                format!("{what} issued by '{issuer}', expected '{}'", self.expected_issuer),
            );
        }
    }

    fn record_signature_error(err: SamlError, result: &mut ValidationResult) {
        match err {
            SamlError::SignatureInvalid { kind, detail } => {
                result.add_signature_failure(kind, detail);
            }
            other => result.add_signature_failure(SignatureFailure::SignatureMismatch, other.to_string()),
        }
    }

    fn check_signature(&self, received: &ReceivedMessage, result: &mut ValidationResult) {
        let kind = received.message.kind();
        let keys = &self.trusted_keys;

        if let Some(detached) = &received.detached_signature {
            if let Err(err) = verify_detached(detached, keys) {
                Self::record_signature_error(err, result);
            }
            return;
        }

        let element = &received.element;
        if is_signed(element) {
            if let Err(err) = verify_embedded(element, keys) {
                Self::record_signature_error(err, result);
            }
            return;
        }

        // An unsigned Response is acceptable when its assertions are signed;
        // once one is signed, all must be.
        if matches!(received.message, ProtocolMessage::Response(_)) {
            let assertions: Vec<&XmlElement> =
                element.children_named(SAML_NS, "Assertion").collect();
            if assertions.iter().any(|a| is_signed(a)) {
                for assertion in assertions {
                    if let Err(err) = verify_embedded(assertion, keys) {
                        Self::record_signature_error(err, result);
                    }
                }
                return;
            }
        }

        if self.policy.signature_required(kind) {
            result.add_signature_failure(
                SignatureFailure::Missing,
                format!("{} is not signed", kind.element_name()),
            );
        }
    }

    fn check_destination(
        &self,
        destination: Option<&str>,
        signed: bool,
        result: &mut ValidationResult,
    ) {
        match (destination, self.endpoint) {
            (Some(destination), Some(endpoint)) if destination != endpoint => result.add(
                ValidationErrorKind::DestinationMismatch,
                format!("Destination {destination} is not {endpoint}"),
            ),
            (None, _) if signed && self.policy.require_destination => result.add(
                ValidationErrorKind::DestinationMismatch,
                "signed message without Destination",
            ),
            _ => {}
        }
    }

    fn check_assertion(&self, assertion: &Assertion, result: &mut ValidationResult) {
        self.check_issuer("assertion", &assertion.header.issuer, result);

        let skew = self.skew();
        let conditions = assertion.conditions.as_ref();
        let window = conditions.map(|c| (c.not_before, c.not_on_or_after));

        match window {
            None | Some((None, None)) => result.add(
                ValidationErrorKind::MissingValidityWindow,
                format!("assertion {} has no validity window", assertion.header.id),
            ),
            Some((not_before, not_on_or_after)) => {
                if let Some(not_before) = not_before {
                    if self.now + skew < not_before {
                        result.add(
                            ValidationErrorKind::NotYetValid,
                            format!("assertion valid from {not_before}"),
                        );
                    }
                }
                if let Some(not_on_or_after) = not_on_or_after {
                    if self.now - skew >= not_on_or_after {
                        result.add(
                            ValidationErrorKind::Expired,
                            format!("assertion expired at {not_on_or_after}"),
                        );
                    }
                }
            }
        }

        let restrictions = conditions.map_or(&[][..], |c| c.audience_restrictions.as_slice());
        if restrictions.is_empty() {
            result.add(
                ValidationErrorKind::AudienceMismatch,
                "assertion has no audience restriction",
            );
        } else if let Some(restriction) = restrictions
            .iter()
            .find(|r| !r.audiences.iter().any(|a| a == self.local_entity_id))
        {
            result.add(
                ValidationErrorKind::AudienceMismatch,
                format!(
                    "{} is not among audiences [{}]",
                    self.local_entity_id,
                    restriction.audiences.join(", ")
                ),
            );
        }

        let confirmations = assertion
            .subject
            .iter()
            .flat_map(|s| s.confirmations.iter())
            .filter_map(|c| c.data.as_ref());
        for data in confirmations {
            if let Some(not_on_or_after) = data.not_on_or_after {
                if self.now - skew >= not_on_or_after {
                    result.add(
                        ValidationErrorKind::Expired,
                        format!("subject confirmation expired at {not_on_or_after}"),
                    );
                }
            }
            if let Some(not_before) = data.not_before {
                if self.now + skew < not_before {
                    result.add(
                        ValidationErrorKind::NotYetValid,
                        format!("subject confirmation valid from {not_before}"),
                    );
                }
            }
            if let (Some(recipient), Some(endpoint)) = (&data.recipient, self.endpoint) {
                if recipient != endpoint {
                    result.add(
                        ValidationErrorKind::DestinationMismatch,
                        format!("Recipient {recipient} is not {endpoint}"),
                    );
                }
            }
            if let Some(id) = &data.in_response_to {
                self.check_in_response_to(id, result);
            }
        }
    }

    fn check_in_response_to(&self, id: &str, result: &mut ValidationResult) {
        let known = self.expected_request_id == Some(id)
            || self
                .issued_requests
                .is_some_and(|registry| registry.contains(id, self.now));
        if !known {
            result.add(
                ValidationErrorKind::UnknownInResponseTo,
                format!("InResponseTo {id} was not issued here"),
            );
        }
    }

    fn check_status(status: &Status, result: &mut ValidationResult) {
        if !status.is_success() {
            result.set_remote_error(status.clone());
        }
    }
}

fn is_signed(element: &XmlElement) -> bool {
    element.child(XMLDSIG_NS, "Signature").is_some()
}
