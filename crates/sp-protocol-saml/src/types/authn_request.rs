//! Authentication request sent by the service provider.

use serde::{Deserialize, Serialize};

use super::{id_prefixes, MessageHeader, NameIdPolicy, SamlBinding};

/// SAML Authentication Request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// Shared header.
    pub header: MessageHeader,

    /// Where the identity provider should deliver the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Binding the response should use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<SamlBinding>,

    /// Name ID policy constraints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_policy: Option<NameIdPolicy>,

    /// Require fresh authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_authn: Option<bool>,

    /// Forbid user interaction at the identity provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_passive: Option<bool>,

    /// Human-readable requester name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

impl AuthnRequest {
    /// Creates an unsigned request with a fresh id and issue instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            header: MessageHeader::new(id_prefixes::AUTHN_REQUEST),
            assertion_consumer_service_url: None,
            protocol_binding: None,
            name_id_policy: None,
            force_authn: None,
            is_passive: None,
            provider_name: None,
        }
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the response binding.
    #[must_use]
    pub const fn with_protocol_binding(mut self, binding: SamlBinding) -> Self {
        self.protocol_binding = Some(binding);
        self
    }

    /// Sets the name ID policy.
    #[must_use]
    pub fn with_name_id_policy(mut self, policy: NameIdPolicy) -> Self {
        self.name_id_policy = Some(policy);
        self
    }

    /// Sets `ForceAuthn`.
    #[must_use]
    pub const fn with_force_authn(mut self, force: bool) -> Self {
        self.force_authn = Some(force);
        self
    }

    /// Sets `IsPassive`.
    #[must_use]
    pub const fn with_is_passive(mut self, passive: bool) -> Self {
        self.is_passive = Some(passive);
        self
    }

    /// Sets the provider name.
    #[must_use]
    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}

impl Default for AuthnRequest {
    fn default() -> Self {
        Self::new()
    }
}
