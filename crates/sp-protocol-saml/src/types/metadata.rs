//! Metadata documents, SSO role descriptors and endpoints.

use sp_crypto::{Certificate, VerifyingKey};

use super::SamlBinding;
use crate::signature::SigningCredential;

/// Default download filename for the hosted SP's metadata document.
pub const SP_METADATA_FILENAME: &str = "saml2-service-provider-metadata.xml";

/// An advertised service endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Service URL.
    pub location: String,
    /// Binding the endpoint accepts.
    pub binding: SamlBinding,
    /// Position for indexed endpoints (ACS).
    pub index: Option<u32>,
    /// `isDefault="true"`.
    pub is_default: bool,
}

impl Endpoint {
    /// Creates a non-indexed, non-default endpoint.
    #[must_use]
    pub fn new(location: impl Into<String>, binding: SamlBinding) -> Self {
        Self {
            location: location.into(),
            binding,
            index: None,
            is_default: false,
        }
    }

    /// Sets the index.
    #[must_use]
    pub const fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the default flag.
    #[must_use]
    pub const fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// Protocol role a descriptor describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsoRole {
    /// `IDPSSODescriptor`.
    IdentityProvider,
    /// `SPSSODescriptor`.
    ServiceProvider,
}

/// What a key may be used for. `None` in metadata means both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUse {
    /// `use="signing"`.
    Signing,
    /// `use="encryption"`.
    Encryption,
}

impl KeyUse {
    /// Value of the `use` attribute.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signing => "signing",
            Self::Encryption => "encryption",
        }
    }
}

/// A `KeyDescriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDescriptor {
    /// Declared usage.
    pub usage: Option<KeyUse>,
    /// The certificate.
    pub certificate: Certificate,
}

impl KeyDescriptor {
    /// Returns true if the key may verify signatures.
    #[must_use]
    pub fn is_signing(&self) -> bool {
        self.usage != Some(KeyUse::Encryption)
    }
}

/// Endpoints and keys for one protocol role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsoProvider {
    /// Role of this descriptor.
    pub role: SsoRole,
    /// `SingleSignOnService` (identity providers).
    pub single_sign_on_services: Vec<Endpoint>,
    /// `SingleLogoutService`.
    pub single_logout_services: Vec<Endpoint>,
    /// `AssertionConsumerService` (service providers).
    pub assertion_consumer_services: Vec<Endpoint>,
    /// Key material.
    pub keys: Vec<KeyDescriptor>,
    /// Supported `NameIDFormat` URIs.
    pub name_id_formats: Vec<String>,
}

impl SsoProvider {
    /// Creates an empty descriptor for `role`.
    #[must_use]
    pub const fn new(role: SsoRole) -> Self {
        Self {
            role,
            single_sign_on_services: Vec::new(),
            single_logout_services: Vec::new(),
            assertion_consumer_services: Vec::new(),
            keys: Vec::new(),
            name_id_formats: Vec::new(),
        }
    }

    /// Adds an SSO endpoint.
    #[must_use]
    pub fn with_single_sign_on_service(mut self, endpoint: Endpoint) -> Self {
        self.single_sign_on_services.push(endpoint);
        self
    }

    /// Adds an SLO endpoint.
    #[must_use]
    pub fn with_single_logout_service(mut self, endpoint: Endpoint) -> Self {
        self.single_logout_services.push(endpoint);
        self
    }

    /// Adds an ACS endpoint.
    #[must_use]
    pub fn with_assertion_consumer_service(mut self, endpoint: Endpoint) -> Self {
        self.assertion_consumer_services.push(endpoint);
        self
    }

    /// Adds a key.
    #[must_use]
    pub fn with_key(mut self, usage: Option<KeyUse>, certificate: Certificate) -> Self {
        self.keys.push(KeyDescriptor { usage, certificate });
        self
    }

    /// Adds a supported name ID format.
    #[must_use]
    pub fn with_name_id_format(mut self, format: impl Into<String>) -> Self {
        self.name_id_formats.push(format.into());
        self
    }
}

/// Metadata of a remote identity provider, keyed by `entity_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProviderMetadata {
    /// Entity id.
    pub entity_id: String,
    /// Role descriptors in document order.
    pub providers: Vec<SsoProvider>,
    /// `WantAuthnRequestsSigned` of the first IdP descriptor.
    pub want_authn_requests_signed: bool,
}

impl IdentityProviderMetadata {
    /// Creates metadata without descriptors.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            providers: Vec::new(),
            want_authn_requests_signed: false,
        }
    }

    /// Adds a role descriptor.
    #[must_use]
    pub fn with_provider(mut self, provider: SsoProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// SSO endpoints of the first identity provider descriptor.
    #[must_use]
    pub fn single_sign_on_services(&self) -> &[Endpoint] {
        self.providers
            .iter()
            .find(|p| p.role == SsoRole::IdentityProvider)
            .map_or(&[], |p| p.single_sign_on_services.as_slice())
    }

    /// First descriptor advertising at least one SLO endpoint.
    #[must_use]
    pub fn first_with_single_logout(&self) -> Option<&SsoProvider> {
        self.providers
            .iter()
            .find(|p| !p.single_logout_services.is_empty())
    }

    /// Keys usable for verifying this party's signatures.
    #[must_use]
    pub fn signing_keys(&self) -> Vec<VerifyingKey> {
        self.providers
            .iter()
            .flat_map(|p| p.keys.iter())
            .filter(|k| k.is_signing())
            .map(|k| k.certificate.verifying_key().clone())
            .collect()
    }
}

/// Metadata of the hosted service provider.
///
/// Built once from configuration; immutable while handling requests.
#[derive(Debug, Clone)]
pub struct ServiceProviderMetadata {
    /// Entity id, also the `Issuer` of every outbound message.
    pub entity_id: String,
    /// Role descriptors, normally a single `SPSSODescriptor`.
    pub providers: Vec<SsoProvider>,
    /// Key, algorithm and digest for outbound signatures.
    pub signing: Option<SigningCredential>,
    /// `AuthnRequestsSigned`.
    pub authn_requests_signed: bool,
    /// `WantAssertionsSigned`.
    pub want_assertions_signed: bool,
}

impl ServiceProviderMetadata {
    /// Creates metadata without descriptors or signing material.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            providers: Vec::new(),
            signing: None,
            authn_requests_signed: false,
            want_assertions_signed: true,
        }
    }

    /// Adds a role descriptor.
    #[must_use]
    pub fn with_provider(mut self, provider: SsoProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Sets the signing credential.
    #[must_use]
    pub fn with_signing(mut self, credential: SigningCredential) -> Self {
        self.signing = Some(credential);
        self
    }

    /// Sets `AuthnRequestsSigned`.
    #[must_use]
    pub const fn with_authn_requests_signed(mut self, signed: bool) -> Self {
        self.authn_requests_signed = signed;
        self
    }

    /// First service provider descriptor.
    #[must_use]
    pub fn sp_provider(&self) -> Option<&SsoProvider> {
        self.providers
            .iter()
            .find(|p| p.role == SsoRole::ServiceProvider)
    }
}
