//! Protocol events.
//!
//! Each decision the engine takes on an exchange is described by an
//! [`Event`]. Events carry identifiers only: never key material, signature
//! values or assertion contents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Single sign-on
    /// An `AuthnRequest` was built for an identity provider.
    AuthnRequestIssued,
    /// A `Response` passed validation and yielded an authentication.
    ResponseAccepted,
    /// A `Response` failed validation.
    ResponseRejected,

    // Single logout
    /// A `LogoutRequest` was received and answered.
    LogoutRequestReceived,
    /// A received `LogoutRequest` failed validation.
    LogoutRequestRejected,
    /// A `LogoutResponse` was received.
    LogoutResponseReceived,
    /// An SP-initiated `LogoutRequest` was built.
    LogoutRequestIssued,
    /// No protocol action; local logout only.
    LocalLogout,

    // Metadata
    /// Local metadata document was produced.
    MetadataServed,
}

impl EventType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthnRequestIssued => "AUTHN_REQUEST_ISSUED",
            Self::ResponseAccepted => "RESPONSE_ACCEPTED",
            Self::ResponseRejected => "RESPONSE_REJECTED",
            Self::LogoutRequestReceived => "LOGOUT_REQUEST_RECEIVED",
            Self::LogoutRequestRejected => "LOGOUT_REQUEST_REJECTED",
            Self::LogoutResponseReceived => "LOGOUT_RESPONSE_RECEIVED",
            Self::LogoutRequestIssued => "LOGOUT_REQUEST_ISSUED",
            Self::LocalLogout => "LOCAL_LOGOUT",
            Self::MetadataServed => "METADATA_SERVED",
        }
    }
}

/// Outcome of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failure,
}

/// A protocol event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier.
    pub id: Uuid,

    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Type of event.
    pub event_type: EventType,

    /// Outcome of the event.
    pub outcome: EventOutcome,

    /// Entity id of the remote party involved.
    pub remote_entity_id: Option<String>,

    /// Id of the protocol message the event is about.
    pub message_id: Option<String>,

    /// `InResponseTo` of that message.
    pub in_response_to: Option<String>,

    /// Endpoint location involved.
    pub endpoint: Option<String>,

    /// Error summary (for failure events).
    pub error: Option<String>,
}

impl Event {
    /// Creates a new event builder.
    #[must_use]
    pub const fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }
}

/// Builder for creating events.
pub struct EventBuilder {
    event_type: EventType,
    outcome: EventOutcome,
    remote_entity_id: Option<String>,
    message_id: Option<String>,
    in_response_to: Option<String>,
    endpoint: Option<String>,
    error: Option<String>,
}

impl EventBuilder {
    /// Creates a new event builder.
    #[must_use]
    pub const fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            outcome: EventOutcome::Success,
            remote_entity_id: None,
            message_id: None,
            in_response_to: None,
            endpoint: None,
            error: None,
        }
    }

    /// Sets the outcome to failure with an error summary.
    #[must_use]
    pub fn failure(mut self, error: impl Into<String>) -> Self {
        self.outcome = EventOutcome::Failure;
        self.error = Some(error.into());
        self
    }

    /// Sets the remote entity id.
    #[must_use]
    pub fn remote(mut self, entity_id: impl Into<String>) -> Self {
        self.remote_entity_id = Some(entity_id.into());
        self
    }

    /// Sets the message id.
    #[must_use]
    pub fn message(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the `InResponseTo` value.
    #[must_use]
    pub fn in_response_to(mut self, id: Option<&str>) -> Self {
        self.in_response_to = id.map(str::to_string);
        self
    }

    /// Sets the endpoint location.
    #[must_use]
    pub fn endpoint(mut self, location: impl Into<String>) -> Self {
        self.endpoint = Some(location.into());
        self
    }

    /// Builds the event.
    #[must_use]
    pub fn build(self) -> Event {
        Event {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            event_type: self.event_type,
            outcome: self.outcome,
            remote_entity_id: self.remote_entity_id,
            message_id: self.message_id,
            in_response_to: self.in_response_to,
            endpoint: self.endpoint,
            error: self.error,
        }
    }
}
