//! Service provider configuration.
//!
//! Loaded from TOML. Every section has defaults so a minimal file only needs
//! `entity_id` and `base_url`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sp_crypto::{Certificate, DigestAlgorithm, SignatureAlgorithm, SigningKey};

use crate::error::{Error, Result};

/// Protocol message kinds, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    /// `samlp:AuthnRequest`.
    AuthnRequest,
    /// `samlp:Response`.
    Response,
    /// `saml:Assertion`.
    Assertion,
    /// `samlp:LogoutRequest`.
    LogoutRequest,
    /// `samlp:LogoutResponse`.
    LogoutResponse,
}

impl MessageKind {
    /// Returns the local element name.
    #[must_use]
    pub const fn element_name(self) -> &'static str {
        match self {
            Self::AuthnRequest => "AuthnRequest",
            Self::Response => "Response",
            Self::Assertion => "Assertion",
            Self::LogoutRequest => "LogoutRequest",
            Self::LogoutResponse => "LogoutResponse",
        }
    }
}

/// Top-level configuration for the hosted service provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceProviderConfig {
    /// Entity id published in metadata and used as `Issuer`.
    pub entity_id: String,

    /// Base URL the SP endpoints hang off.
    pub base_url: String,

    /// Outbound signing.
    #[serde(default)]
    pub signing: SigningConfig,

    /// Inbound validation.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Authentication request defaults.
    #[serde(default)]
    pub sso: SsoConfig,

    /// Remote metadata cache.
    #[serde(default)]
    pub metadata_cache: MetadataCacheConfig,

    /// Issued request id registry.
    #[serde(default)]
    pub request_registry: RequestRegistryConfig,
}

/// Outbound signing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Sign outbound `AuthnRequest`s.
    #[serde(default = "default_true")]
    pub sign_requests: bool,

    /// Signature algorithm for every outbound signature.
    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,

    /// Digest algorithm for embedded signature references.
    #[serde(default)]
    pub digest_algorithm: DigestAlgorithm,

    /// PKCS#8 PEM private key.
    #[serde(default, skip_serializing)]
    pub private_key_pem: Option<String>,

    /// PEM certificate matching the private key.
    #[serde(default)]
    pub certificate_pem: Option<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            sign_requests: true,
            signature_algorithm: SignatureAlgorithm::default(),
            digest_algorithm: DigestAlgorithm::default(),
            private_key_pem: None,
            certificate_pem: None,
        }
    }
}

impl SigningConfig {
    /// Parses the configured private key, if any.
    pub fn signing_key(&self) -> Result<Option<SigningKey>> {
        self.private_key_pem
            .as_deref()
            .map(SigningKey::from_pem)
            .transpose()
            .map_err(Error::from)
    }

    /// Parses the configured certificate, if any.
    pub fn certificate(&self) -> Result<Option<Certificate>> {
        self.certificate_pem
            .as_deref()
            .map(Certificate::from_pem)
            .transpose()
            .map_err(Error::from)
    }
}

/// Inbound validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Allowed clock drift against the remote party, in seconds.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_tolerance_seconds: u32,

    /// Require a valid signature on inbound messages.
    #[serde(default = "default_true")]
    pub enforce_signature_on_receive: bool,

    /// Message kinds accepted without a signature even when enforcement is on.
    #[serde(default)]
    pub unsigned_message_kinds: Vec<MessageKind>,

    /// Require a `Destination` attribute on inbound signed messages.
    #[serde(default)]
    pub require_destination: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance_seconds: default_clock_skew(),
            enforce_signature_on_receive: true,
            unsigned_message_kinds: Vec::new(),
            require_destination: false,
        }
    }
}

impl ValidationConfig {
    /// Returns whether a signature is mandatory for `kind`.
    #[must_use]
    pub fn signature_required(&self, kind: MessageKind) -> bool {
        self.enforce_signature_on_receive && !self.unsigned_message_kinds.contains(&kind)
    }
}

/// Authentication request defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SsoConfig {
    /// `NameIDPolicy/@Format` to request.
    #[serde(default)]
    pub name_id_format: Option<String>,

    /// `NameIDPolicy/@AllowCreate`.
    #[serde(default)]
    pub allow_create: Option<bool>,

    /// `AuthnRequest/@ForceAuthn`.
    #[serde(default)]
    pub force_authn: bool,

    /// `AuthnRequest/@IsPassive`.
    #[serde(default)]
    pub is_passive: bool,
}

/// Remote metadata cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataCacheConfig {
    /// Seconds before a cached entry is due for refresh.
    #[serde(default = "default_metadata_ttl")]
    pub ttl_seconds: u64,
}

impl Default for MetadataCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_metadata_ttl(),
        }
    }
}

/// Issued request registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRegistryConfig {
    /// Seconds an issued request id stays answerable.
    #[serde(default = "default_request_ttl")]
    pub ttl_seconds: u64,
}

impl Default for RequestRegistryConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_request_ttl(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_clock_skew() -> u32 {
    60
}

const fn default_metadata_ttl() -> u64 {
    3600
}

const fn default_request_ttl() -> u64 {
    300
}

impl ServiceProviderConfig {
    /// Creates a configuration with default sections.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            base_url: base_url.into(),
            signing: SigningConfig::default(),
            validation: ValidationConfig::default(),
            sso: SsoConfig::default(),
            metadata_cache: MetadataCacheConfig::default(),
            request_registry: RequestRegistryConfig::default(),
        }
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> Result<()> {
        if self.entity_id.trim().is_empty() {
            return Err(Error::Config("entity_id must not be empty".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.metadata_cache.ttl_seconds == 0 || self.request_registry.ttl_seconds == 0 {
            return Err(Error::Config("ttl_seconds must be positive".to_string()));
        }

        let key = self.signing.signing_key()?;
        match &key {
            None if self.signing.sign_requests => {
                return Err(Error::Config(
                    "signing.sign_requests requires signing.private_key_pem".to_string(),
                ));
            }
            Some(key) if !key.supports(self.signing.signature_algorithm) => {
                return Err(Error::Config(format!(
                    "signing key of kind {:?} cannot produce {}",
                    key.kind(),
                    self.signing.signature_algorithm.uri()
                )));
            }
            _ => {}
        }

        if let (Some(key), Some(cert)) = (&key, self.signing.certificate()?) {
            if cert.verifying_key().kind() != key.kind() {
                return Err(Error::Config(
                    "signing certificate does not match the private key type".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Assertion consumer service location.
    #[must_use]
    pub fn assertion_consumer_service_url(&self) -> String {
        format!("{}/acs", self.base_url.trim_end_matches('/'))
    }

    /// Single logout service location.
    #[must_use]
    pub fn single_logout_service_url(&self) -> String {
        format!("{}/slo", self.base_url.trim_end_matches('/'))
    }

    /// Metadata document location.
    #[must_use]
    pub fn metadata_url(&self) -> String {
        format!("{}/metadata", self.base_url.trim_end_matches('/'))
    }
}
