//! Validation of received messages.
//!
//! Every rule runs; failures accumulate in a [`ValidationResult`] keyed by
//! kind, at most one entry per kind. A non-success status from the remote
//! party is kept apart from rule failures.

mod validator;

use std::{collections::BTreeMap, fmt};

pub use validator::*;

use crate::{
    error::{SamlError, SamlResult},
    signature::SignatureFailure,
    types::{Status, StatusCode},
};

/// Kinds of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValidationErrorKind {
    /// `Issuer` is not the expected remote entity.
    IssuerMismatch,
    /// Signature missing or not verifiable. The first failure's subtype is
    /// kept on the result, see [`ValidationResult::signature_failure`].
    SignatureInvalid,
    /// Validity window not yet open.
    NotYetValid,
    /// Validity window closed.
    Expired,
    /// Assertion carries no validity window.
    MissingValidityWindow,
    /// Local entity id is not an allowed audience.
    AudienceMismatch,
    /// `InResponseTo` names no request the local party issued.
    UnknownInResponseTo,
    /// `Destination` or `Recipient` is not the endpoint the message came in on.
    DestinationMismatch,
    /// A successful response carries no assertion.
    MissingAssertion,
}

impl ValidationErrorKind {
    /// Stable name for logs and error text.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IssuerMismatch => "IssuerMismatch",
            Self::SignatureInvalid => "SignatureInvalid",
            Self::NotYetValid => "NotYetValid",
            Self::Expired => "Expired",
            Self::MissingValidityWindow => "MissingValidityWindow",
            Self::AudienceMismatch => "AudienceMismatch",
            Self::UnknownInResponseTo => "UnknownInResponseTo",
            Self::DestinationMismatch => "DestinationMismatch",
            Self::MissingAssertion => "MissingAssertion",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of validating one message. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    errors: BTreeMap<ValidationErrorKind, String>,
    signature_failure: Option<SignatureFailure>,
    remote_error: Option<Status>,
}

impl ValidationResult {
    /// Creates an empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure. A kind already recorded keeps its first detail.
    pub fn add(&mut self, kind: ValidationErrorKind, detail: impl Into<String>) {
        self.errors.entry(kind).or_insert_with(|| detail.into());
    }

    /// Records a signature failure under [`ValidationErrorKind::SignatureInvalid`].
    /// Only the first failure is kept.
    pub fn add_signature_failure(&mut self, failure: SignatureFailure, detail: impl Into<String>) {
        if self.signature_failure.is_none() {
            self.signature_failure = Some(failure);
        }
        self.add(ValidationErrorKind::SignatureInvalid, detail);
    }

    /// Records the remote party's non-success status.
    pub fn set_remote_error(&mut self, status: Status) {
        self.remote_error = Some(status);
    }

    /// True when no rule failed and the remote party reported success.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.remote_error.is_none()
    }

    /// True when `kind` was recorded.
    #[must_use]
    pub fn has(&self, kind: ValidationErrorKind) -> bool {
        self.errors.contains_key(&kind)
    }

    /// Subtype of the recorded signature failure.
    #[must_use]
    pub const fn signature_failure(&self) -> Option<SignatureFailure> {
        self.signature_failure
    }

    /// Rule failures, ordered by kind.
    #[must_use]
    pub const fn errors(&self) -> &BTreeMap<ValidationErrorKind, String> {
        &self.errors
    }

    /// Non-success status reported by the remote party.
    #[must_use]
    pub const fn remote_error(&self) -> Option<&Status> {
        self.remote_error.as_ref()
    }

    /// Top-level code of the remote error.
    #[must_use]
    pub fn remote_status_code(&self) -> Option<StatusCode> {
        self.remote_error.as_ref().map(|s| s.code)
    }

    /// `Ok` when valid, otherwise [`SamlError::Rejected`].
    pub fn into_result(self) -> SamlResult<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(SamlError::Rejected(self))
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return f.write_str("valid");
        }
        let mut first = true;
        for (kind, detail) in &self.errors {
            if !first {
                f.write_str("; ")?;
            }
            match (*kind, self.signature_failure) {
                (ValidationErrorKind::SignatureInvalid, Some(failure)) => {
                    write!(f, "{kind}({failure}): {detail}")?;
                }
                _ => write!(f, "{kind}: {detail}")?,
            }
            first = false;
        }
        if let Some(status) = &self.remote_error {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "RemoteError: {}", status.code.name())?;
            if let Some(message) = &status.message {
                write!(f, " ({message})")?;
            }
        }
        Ok(())
    }
}
