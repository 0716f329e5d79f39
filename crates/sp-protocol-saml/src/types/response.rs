//! Authentication response received from an identity provider.

use serde::{Deserialize, Serialize};

use super::{Assertion, MessageHeader, Status};

/// SAML Response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Shared header.
    pub header: MessageHeader,

    /// Id of the `AuthnRequest` being answered; absent when unsolicited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_response_to: Option<String>,

    /// Outcome.
    pub status: Status,

    /// Assertions carried in the clear.
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl Response {
    /// Creates a response with `status` and a fresh id.
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            header: MessageHeader::new("_"),
            in_response_to: None,
            status,
            assertions: Vec::new(),
        }
    }

    /// Sets `InResponseTo`.
    #[must_use]
    pub fn with_in_response_to(mut self, id: impl Into<String>) -> Self {
        self.in_response_to = Some(id.into());
        self
    }

    /// Appends an assertion.
    #[must_use]
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// First assertion, which carries the authenticated subject.
    #[must_use]
    pub fn first_assertion(&self) -> Option<&Assertion> {
        self.assertions.first()
    }
}
