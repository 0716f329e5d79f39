//! Single logout request and response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{id_prefixes, MessageHeader, NameId, Status};

/// SAML Logout Request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutRequest {
    /// Shared header.
    pub header: MessageHeader,

    /// Principal to log out.
    pub name_id: NameId,

    /// Session indexes to terminate; empty means all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_indexes: Vec<String>,

    /// Reason URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Time after which the request must not be honoured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_on_or_after: Option<DateTime<Utc>>,
}

impl LogoutRequest {
    /// User-initiated logout reason.
    pub const REASON_USER: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:user";

    /// Administrator-initiated logout reason.
    pub const REASON_ADMIN: &'static str = "urn:oasis:names:tc:SAML:2.0:logout:admin";

    /// Creates a logout request for `name_id`.
    #[must_use]
    pub fn new(name_id: NameId) -> Self {
        Self {
            header: MessageHeader::new(id_prefixes::LOGOUT_REQUEST),
            name_id,
            session_indexes: Vec::new(),
            reason: None,
            not_on_or_after: None,
        }
    }

    /// Adds a session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_indexes.push(index.into());
        self
    }

    /// Sets the reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Sets `NotOnOrAfter`.
    #[must_use]
    pub const fn with_not_on_or_after(mut self, instant: DateTime<Utc>) -> Self {
        self.not_on_or_after = Some(instant);
        self
    }
}

/// SAML Logout Response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutResponse {
    /// Shared header.
    pub header: MessageHeader,

    /// Id of the request being answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Outcome.
    pub status: Status,
}

impl LogoutResponse {
    /// Creates a logout response with `status`.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            header: MessageHeader::new(id_prefixes::LOGOUT_RESPONSE),
            in_response_to: None,
            status,
        }
    }

    /// Sets `InResponseTo`.
    #[must_use]
    pub fn with_in_response_to(mut self, id: impl Into<String>) -> Self {
        self.in_response_to = Some(id.into());
        self
    }
}
