//! Status returned in protocol responses.

use serde::{Deserialize, Serialize};

/// Closed set of SAML status codes, top-level and second-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Request succeeded.
    Success,
    /// Request failed because of the requester.
    Requester,
    /// Request failed because of the responder.
    Responder,
    /// Protocol version mismatch.
    VersionMismatch,
    /// Authentication failed.
    AuthnFailed,
    /// Unexpected or invalid attribute content.
    InvalidAttrNameOrValue,
    /// Requested name ID policy cannot be satisfied.
    InvalidNameIdPolicy,
    /// Requested authentication context cannot be satisfied.
    NoAuthnContext,
    /// Passive authentication was not possible.
    NoPassive,
    /// Logout did not reach every session participant.
    PartialLogout,
    /// Request denied by policy.
    RequestDenied,
    /// Request not supported.
    RequestUnsupported,
    /// Principal not recognised.
    UnknownPrincipal,
    /// Binding not supported.
    UnsupportedBinding,
}

const PREFIX: &str = "urn:oasis:names:tc:SAML:2.0:status:";

impl StatusCode {
    /// Returns the short name used in the URI.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Requester => "Requester",
            Self::Responder => "Responder",
            Self::VersionMismatch => "VersionMismatch",
            Self::AuthnFailed => "AuthnFailed",
            Self::InvalidAttrNameOrValue => "InvalidAttrNameOrValue",
            Self::InvalidNameIdPolicy => "InvalidNameIDPolicy",
            Self::NoAuthnContext => "NoAuthnContext",
            Self::NoPassive => "NoPassive",
            Self::PartialLogout => "PartialLogout",
            Self::RequestDenied => "RequestDenied",
            Self::RequestUnsupported => "RequestUnsupported",
            Self::UnknownPrincipal => "UnknownPrincipal",
            Self::UnsupportedBinding => "UnsupportedBinding",
        }
    }

    /// Returns the full status URI.
    #[must_use]
    pub fn uri(self) -> String {
        format!("{PREFIX}{}", self.name())
    }

    /// Parses a status URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        let name = uri.strip_prefix(PREFIX)?;
        [
            Self::Success,
            Self::Requester,
            Self::Responder,
            Self::VersionMismatch,
            Self::AuthnFailed,
            Self::InvalidAttrNameOrValue,
            Self::InvalidNameIdPolicy,
            Self::NoAuthnContext,
            Self::NoPassive,
            Self::PartialLogout,
            Self::RequestDenied,
            Self::RequestUnsupported,
            Self::UnknownPrincipal,
            Self::UnsupportedBinding,
        ]
        .into_iter()
        .find(|code| code.name() == name)
    }
}

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Top-level code.
    pub code: StatusCode,

    /// Optional second-level code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_code: Option<StatusCode>,

    /// Optional human-readable message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Status {
    /// Creates a status with the given top-level code.
    #[must_use]
    pub const fn new(code: StatusCode) -> Self {
        Self {
            code,
            sub_code: None,
            message: None,
        }
    }

    /// Creates a success status.
    #[must_use]
    pub const fn success() -> Self {
        Self::new(StatusCode::Success)
    }

    /// Creates a requester error status.
    #[must_use]
    pub fn requester_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Requester).with_message(message)
    }

    /// Creates a responder error status.
    #[must_use]
    pub fn responder_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Responder).with_message(message)
    }

    /// Returns true if the top-level code is `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }

    /// Sets the second-level code.
    #[must_use]
    pub const fn with_sub_code(mut self, sub_code: StatusCode) -> Self {
        self.sub_code = Some(sub_code);
        self
    }

    /// Sets the status message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::success()
    }
}
