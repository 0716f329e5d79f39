//! The hosted service provider and lookup of remote parties.

use std::{collections::HashMap, sync::Arc};

use sp_cache::MetadataCache;
use sp_core::{config::ValidationConfig, Event, EventType, ServiceProviderConfig, Telemetry};

use crate::{
    error::SamlResult,
    signature::SigningCredential,
    types::{
        Endpoint, IdentityProviderMetadata, KeyUse, SamlBinding, ServiceProviderMetadata,
        SsoProvider, SsoRole,
    },
};

/// Source of remote identity provider metadata, keyed by entity id.
pub trait RemoteProviders: Send + Sync {
    /// Metadata snapshot for `entity_id`.
    fn identity_provider(&self, entity_id: &str) -> Option<Arc<IdentityProviderMetadata>>;
}

impl RemoteProviders for MetadataCache<IdentityProviderMetadata> {
    fn identity_provider(&self, entity_id: &str) -> Option<Arc<IdentityProviderMetadata>> {
        self.get(entity_id)
    }
}

impl RemoteProviders for HashMap<String, Arc<IdentityProviderMetadata>> {
    fn identity_provider(&self, entity_id: &str) -> Option<Arc<IdentityProviderMetadata>> {
        self.get(entity_id).cloned()
    }
}

/// The local service provider: configuration, published metadata, signing
/// material and the telemetry events are reported to.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct HostedServiceProvider {
    pub(crate) config: ServiceProviderConfig,
    metadata: ServiceProviderMetadata,
    credential: Option<SigningCredential>,
    pub(crate) telemetry: Telemetry,
}

impl HostedServiceProvider {
    /// Builds the hosted provider from validated configuration.
    ///
    /// Publishes one HTTP-POST assertion consumer service and HTTP-Redirect
    /// plus HTTP-POST single logout services under `base_url`.
    pub fn from_config(config: &ServiceProviderConfig, telemetry: Telemetry) -> SamlResult<Self> {
        config.validate()?;

        let credential = match config.signing.signing_key()? {
            Some(key) => {
                let credential = SigningCredential::new(key).with_algorithms(
                    config.signing.signature_algorithm,
                    config.signing.digest_algorithm,
                );
                Some(match config.signing.certificate()? {
                    Some(certificate) => credential.with_certificate(certificate),
                    None => credential,
                })
            }
            None => None,
        };

        let slo = config.single_logout_service_url();
        let mut descriptor = SsoProvider::new(SsoRole::ServiceProvider)
            .with_assertion_consumer_service(
                Endpoint::new(config.assertion_consumer_service_url(), SamlBinding::HttpPost)
                    .with_index(0)
                    .with_default(true),
            )
            .with_single_logout_service(Endpoint::new(slo.clone(), SamlBinding::HttpRedirect))
            .with_single_logout_service(Endpoint::new(slo, SamlBinding::HttpPost));
        if let Some(certificate) = credential.as_ref().and_then(SigningCredential::certificate) {
            descriptor = descriptor.with_key(Some(KeyUse::Signing), certificate.clone());
        }
        if let Some(format) = &config.sso.name_id_format {
            descriptor = descriptor.with_name_id_format(format.clone());
        }

        let mut metadata = ServiceProviderMetadata::new(config.entity_id.clone())
            .with_provider(descriptor)
            .with_authn_requests_signed(config.signing.sign_requests);
        if let Some(credential) = &credential {
            metadata = metadata.with_signing(credential.clone());
        }

        telemetry.in_scope(|| {
            tracing::debug!(
                entity_id = %config.entity_id,
                signing = credential.is_some(),
                "hosted service provider ready"
            );
        });

        Ok(Self {
            config: config.clone(),
            metadata,
            credential,
            telemetry,
        })
    }

    /// Local entity id.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.config.entity_id
    }

    /// Configuration the provider was built from.
    #[must_use]
    pub const fn config(&self) -> &ServiceProviderConfig {
        &self.config
    }

    /// Receive-side policy.
    #[must_use]
    pub const fn validation_policy(&self) -> &ValidationConfig {
        &self.config.validation
    }

    /// Published metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ServiceProviderMetadata {
        &self.metadata
    }

    /// Signing material, whether or not outbound signing is enabled.
    #[must_use]
    pub const fn credential(&self) -> Option<&SigningCredential> {
        self.credential.as_ref()
    }

    /// Credential for outbound protocol messages; `None` when
    /// `sign_requests` is off.
    #[must_use]
    pub fn outbound_credential(&self) -> Option<&SigningCredential> {
        self.credential
            .as_ref()
            .filter(|_| self.config.signing.sign_requests)
    }

    /// Injected telemetry.
    #[must_use]
    pub const fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Assertion consumer service location.
    #[must_use]
    pub fn assertion_consumer_service_url(&self) -> String {
        self.config.assertion_consumer_service_url()
    }

    /// Single logout service location.
    #[must_use]
    pub fn single_logout_service_url(&self) -> String {
        self.config.single_logout_service_url()
    }

    /// The metadata document, signed when a key is configured.
    pub fn metadata_xml(&self) -> SamlResult<String> {
        let xml = self.metadata.to_xml()?;
        self.telemetry.record(
            &Event::builder(EventType::MetadataServed)
                .endpoint(self.config.metadata_url())
                .build(),
        );
        Ok(xml)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use sp_crypto::Certificate;

    use super::*;
    use crate::{
        error::SamlError,
        signature::verify_embedded,
        types::{MD_NS, SP_METADATA_FILENAME},
        xml::parse,
    };

    const SP_KEY: &str = include_str!("../../../testdata/sp-signing.key");
    const SP_CERT: &str = include_str!("../../../testdata/sp-signing.crt");

    fn config(sign_requests: bool) -> ServiceProviderConfig {
        let mut config = ServiceProviderConfig::new("sp.example", "https://sp.example/saml");
        config.signing.sign_requests = sign_requests;
        config.signing.private_key_pem = Some(SP_KEY.to_string());
        config.signing.certificate_pem = Some(SP_CERT.to_string());
        config
    }

    #[test]
    fn endpoints_derived_from_base_url() {
        let sp = HostedServiceProvider::from_config(&config(true), Telemetry::disabled()).unwrap();
        let descriptor = sp.metadata().sp_provider().unwrap();

        assert_eq!(descriptor.assertion_consumer_services[0].location, "https://sp.example/saml/acs");
        assert!(descriptor.assertion_consumer_services[0].is_default);
        assert_eq!(descriptor.single_logout_services.len(), 2);
        assert_eq!(descriptor.keys.len(), 1);
        assert!(sp.outbound_credential().is_some());
    }

    #[test]
    fn sign_requests_off_keeps_metadata_key() {
        let sp = HostedServiceProvider::from_config(&config(false), Telemetry::disabled()).unwrap();
        assert!(sp.outbound_credential().is_none());
        assert!(sp.credential().is_some());
        assert!(!sp.metadata().authn_requests_signed);
    }

    #[test]
    fn signing_without_key_is_a_config_error() {
        let mut config = config(true);
        config.signing.private_key_pem = None;
        let err = HostedServiceProvider::from_config(&config, Telemetry::disabled()).unwrap_err();
        assert!(matches!(err, SamlError::Config(_)));
    }

    #[test]
    fn metadata_document_is_signed() {
        let sp = HostedServiceProvider::from_config(&config(true), Telemetry::disabled()).unwrap();
        let xml = sp.metadata_xml().unwrap();
        assert!(!xml.starts_with("<?xml"));

        let element = parse(&xml).unwrap();
        assert!(element.is(MD_NS, "EntityDescriptor"));
        assert_eq!(element.attr("entityID"), Some("sp.example"));

        let key = Certificate::from_pem(SP_CERT).unwrap().verifying_key().clone();
        assert!(verify_embedded(&element, &[key]).is_ok());
        assert!(SP_METADATA_FILENAME.ends_with(".xml"));
    }

    #[test]
    fn remote_lookup_from_cache_and_map() {
        let cache = MetadataCache::new(Duration::minutes(10));
        cache.replace("idp.example", IdentityProviderMetadata::new("idp.example"));
        assert!(cache.identity_provider("idp.example").is_some());
        assert!(cache.identity_provider("other.example").is_none());

        let mut map = HashMap::new();
        map.insert(
            "idp.example".to_string(),
            Arc::new(IdentityProviderMetadata::new("idp.example")),
        );
        let remotes: &dyn RemoteProviders = &map;
        assert_eq!(
            remotes.identity_provider("idp.example").map(|m| m.entity_id.clone()),
            Some("idp.example".to_string())
        );
    }
}
