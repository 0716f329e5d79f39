//! Single logout negotiation.
//!
//! One inbound exchange yields exactly one [`LogoutOutcome`], checked in
//! this order:
//!
//! 1. a `LogoutRequest` arrived: validate it and answer with a
//!    `LogoutResponse`
//! 2. a `LogoutResponse` arrived: the flow completes locally
//! 3. a local [`Authentication`] exists: send a `LogoutRequest` to the
//!    asserting party
//! 4. otherwise nothing to send; the caller logs out locally

use chrono::{DateTime, Utc};
use sp_cache::IssuedRequestRegistry;
use sp_core::{Event, EventType};

use crate::{
    bindings::{InboundExchange, MessageParam, ReceivedMessage},
    endpoint::resolve_required,
    error::{SamlError, SamlResult},
    outbound::OutboundMessage,
    provider::{HostedServiceProvider, RemoteProviders},
    types::{
        Authentication, Endpoint, IdentityProviderMetadata, LogoutRequest, LogoutResponse,
        ProtocolMessage, SamlBinding, SamlMessage, Status,
    },
    validation::{ValidationContext, ValidationResult},
};

const SINGLE_LOGOUT_SERVICE: &str = "SingleLogoutService";

/// Terminal state of one logout exchange.
#[derive(Debug, Clone)]
pub enum LogoutOutcome {
    /// A valid `LogoutRequest` arrived; send this response back.
    ReceivedLogoutRequest(OutboundMessage),
    /// A `LogoutResponse` arrived; nothing goes out.
    ReceivedLogoutResponse {
        /// The response as received.
        response: LogoutResponse,
        /// Outcome of validating it, remote status included.
        validation: ValidationResult,
    },
    /// Logout of the current authentication starts here; send this request.
    SpInitiatedLogout(OutboundMessage),
    /// No protocol action.
    NoOp,
}

impl LogoutOutcome {
    /// The message to deliver, if any.
    #[must_use]
    pub const fn outbound(&self) -> Option<&OutboundMessage> {
        match self {
            Self::ReceivedLogoutRequest(outbound) | Self::SpInitiatedLogout(outbound) => Some(outbound),
            Self::ReceivedLogoutResponse { .. } | Self::NoOp => None,
        }
    }
}

/// Decides what one exchange on the single logout endpoint means.
pub struct LogoutNegotiator<'a> {
    sp: &'a HostedServiceProvider,
    remotes: &'a dyn RemoteProviders,
    issued_requests: Option<&'a dyn IssuedRequestRegistry>,
}

impl<'a> LogoutNegotiator<'a> {
    /// Creates a negotiator for `sp`.
    #[must_use]
    pub fn new(sp: &'a HostedServiceProvider, remotes: &'a dyn RemoteProviders) -> Self {
        Self {
            sp,
            remotes,
            issued_requests: None,
        }
    }

    /// Registry where outbound logout request ids are recorded and inbound
    /// `InResponseTo` values are checked.
    #[must_use]
    pub fn with_issued_requests(mut self, registry: &'a dyn IssuedRequestRegistry) -> Self {
        self.issued_requests = Some(registry);
        self
    }

    /// Classifies `exchange` and produces its outcome.
    ///
    /// A `LogoutRequest` that fails validation is returned as
    /// [`SamlError::Rejected`]. An SP-initiated logout toward a party without
    /// a single logout endpoint fails with [`SamlError::NoUsableEndpoint`].
    pub fn negotiate(
        &self,
        exchange: &InboundExchange,
        authentication: Option<&Authentication>,
        now: DateTime<Utc>,
    ) -> SamlResult<LogoutOutcome> {
        match (exchange.param(), exchange.receive()?) {
            (Some(MessageParam::Request), Some(received)) => {
                self.received_request(&received, exchange, now)
            }
            (Some(MessageParam::Response), Some(received)) => {
                self.received_response(received, exchange, now)
            }
            _ => match authentication {
                Some(authentication) => self.initiate(authentication, exchange.relay_state(), now),
                None => {
                    self.sp
                        .telemetry
                        .record(&Event::builder(EventType::LocalLogout).build());
                    Ok(LogoutOutcome::NoOp)
                }
            },
        }
    }

    fn remote(&self, entity_id: &str) -> SamlResult<std::sync::Arc<IdentityProviderMetadata>> {
        self.remotes
            .identity_provider(entity_id)
            .ok_or_else(|| SamlError::UnknownRemoteParty(entity_id.to_string()))
    }

    fn context<'c>(
        &'c self,
        idp: &'c IdentityProviderMetadata,
        endpoint: &'c str,
        now: DateTime<Utc>,
    ) -> ValidationContext<'c> {
        let context =
            ValidationContext::for_remote(self.sp.entity_id(), idp, self.sp.validation_policy(), now)
                .arrived_at(endpoint);
        match self.issued_requests {
            Some(registry) => context.with_issued_requests(registry),
            None => context,
        }
    }

    fn received_request(
        &self,
        received: &ReceivedMessage,
        exchange: &InboundExchange,
        now: DateTime<Utc>,
    ) -> SamlResult<LogoutOutcome> {
        let ProtocolMessage::LogoutRequest(request) = &received.message else {
            return Err(SamlError::MalformedMessage(format!(
                "SAMLRequest carries {}, expected LogoutRequest",
                received.message.kind().element_name()
            )));
        };

        let idp = self.remote(request.issuer())?;
        let slo = self.sp.single_logout_service_url();
        let arrived_at = exchange.endpoint.as_deref().unwrap_or(&slo);

        let result = self.context(&idp, arrived_at, now).validate(received);
        if !result.is_valid() {
            self.sp.telemetry.record(
                &Event::builder(EventType::LogoutRequestRejected)
                    .remote(idp.entity_id.clone())
                    .message(request.id())
                    .failure(result.to_string())
                    .build(),
            );
            return Err(SamlError::Rejected(result));
        }
        self.sp.telemetry.record(
            &Event::builder(EventType::LogoutRequestReceived)
                .remote(idp.entity_id.clone())
                .message(request.id())
                .endpoint(arrived_at)
                .build(),
        );

        let endpoint = single_logout_endpoint(&idp)?;
        let response = LogoutResponse::new(Status::success())
            .with_issuer(self.sp.entity_id())
            .with_in_response_to(request.id())
            .with_destination(endpoint.location.clone());

        // The answer always goes back over HTTP-Redirect.
        let target = Endpoint {
            binding: SamlBinding::HttpRedirect,
            ..endpoint.clone()
        };
        let outbound = OutboundMessage::prepare(
            response,
            &target,
            exchange.relay_state(),
            self.sp.outbound_credential(),
        )?;
        Ok(LogoutOutcome::ReceivedLogoutRequest(outbound))
    }

    fn received_response(
        &self,
        received: ReceivedMessage,
        exchange: &InboundExchange,
        now: DateTime<Utc>,
    ) -> SamlResult<LogoutOutcome> {
        let ProtocolMessage::LogoutResponse(response) = &received.message else {
            return Err(SamlError::MalformedMessage(format!(
                "SAMLResponse carries {}, expected LogoutResponse",
                received.message.kind().element_name()
            )));
        };

        let idp = self.remote(response.issuer())?;
        let slo = self.sp.single_logout_service_url();
        let arrived_at = exchange.endpoint.as_deref().unwrap_or(&slo);
        let validation = self.context(&idp, arrived_at, now).validate(&received);

        if validation.is_valid() {
            if let (Some(id), Some(registry)) =
                (response.in_response_to.as_deref(), self.issued_requests)
            {
                registry
                    .consume(id, now)
                    .map_err(|_| SamlError::Replay(id.to_string()))?;
            }
        }

        let event = Event::builder(EventType::LogoutResponseReceived)
            .remote(idp.entity_id.clone())
            .message(response.id())
            .in_response_to(response.in_response_to.as_deref());
        let event = if validation.is_valid() {
            event
        } else {
            event.failure(validation.to_string())
        };
        self.sp.telemetry.record(&event.build());

        Ok(LogoutOutcome::ReceivedLogoutResponse {
            response: response.clone(),
            validation,
        })
    }

    fn initiate(
        &self,
        authentication: &Authentication,
        relay_state: Option<&str>,
        now: DateTime<Utc>,
    ) -> SamlResult<LogoutOutcome> {
        let idp = self.remote(&authentication.asserting_entity_id)?;
        let endpoint = single_logout_endpoint(&idp)?;

        let mut request = LogoutRequest::new(authentication.saml_principal.clone())
            .with_issuer(self.sp.entity_id())
            .with_destination(endpoint.location.clone())
            .with_reason(LogoutRequest::REASON_USER);
        if let Some(index) = &authentication.session_index {
            request = request.with_session_index(index.clone());
        }

        let outbound =
            OutboundMessage::prepare(request, endpoint, relay_state, self.sp.outbound_credential())?;
        if let Some(registry) = self.issued_requests {
            registry.register(outbound.message.id(), now)?;
        }

        self.sp.telemetry.record(
            &Event::builder(EventType::LogoutRequestIssued)
                .remote(idp.entity_id.clone())
                .message(outbound.message.id())
                .endpoint(endpoint.location.clone())
                .build(),
        );
        Ok(LogoutOutcome::SpInitiatedLogout(outbound))
    }
}

fn single_logout_endpoint(idp: &IdentityProviderMetadata) -> SamlResult<&Endpoint> {
    let endpoints = idp
        .first_with_single_logout()
        .map(|provider| provider.single_logout_services.as_slice())
        .unwrap_or_default();
    resolve_required(
        endpoints,
        Some(SamlBinding::HttpRedirect),
        None,
        &idp.entity_id,
        SINGLE_LOGOUT_SERVICE,
    )
}
