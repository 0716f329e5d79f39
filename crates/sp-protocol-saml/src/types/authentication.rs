//! Locally established identity after single sign-on.

use serde::{Deserialize, Serialize};

use super::{Assertion, NameId};

/// Identity held in the caller's session after a successful SSO exchange.
///
/// The engine reads it to build SP-initiated logout requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authentication {
    /// Subject name ID as asserted.
    pub saml_principal: NameId,

    /// Entity id of the local service provider.
    pub holding_entity_id: String,

    /// Entity id of the identity provider that asserted the principal.
    pub asserting_entity_id: String,

    /// Identity provider session index, sent back on logout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_index: Option<String>,
}

impl Authentication {
    /// Creates an authentication record.
    #[must_use]
    pub fn new(
        saml_principal: NameId,
        holding_entity_id: impl Into<String>,
        asserting_entity_id: impl Into<String>,
    ) -> Self {
        Self {
            saml_principal,
            holding_entity_id: holding_entity_id.into(),
            asserting_entity_id: asserting_entity_id.into(),
            session_index: None,
        }
    }

    /// Sets the session index.
    #[must_use]
    pub fn with_session_index(mut self, index: impl Into<String>) -> Self {
        self.session_index = Some(index.into());
        self
    }

    /// Derives the record from an assertion's subject. `None` when the
    /// assertion names no subject.
    #[must_use]
    pub fn from_assertion(assertion: &Assertion, holding_entity_id: &str) -> Option<Self> {
        let name_id = assertion.name_id()?.clone();
        Some(Self {
            saml_principal: name_id,
            holding_entity_id: holding_entity_id.to_string(),
            asserting_entity_id: assertion.header.issuer.clone(),
            session_index: assertion.session_index().map(str::to_string),
        })
    }
}
