//! `EntityDescriptor` documents.
//!
//! Remote identity provider metadata is parsed; the hosted service provider's
//! metadata is produced, embedded-signed when a signing credential exists.

use sp_crypto::Certificate;

use super::{canonicalize, codec::parse_bool, parse, XmlCodec, XmlElement};
use crate::{
    error::{SamlError, SamlResult},
    signature::{embed_signature, sign_element},
    types::{
        id_prefixes, Endpoint, IdentityProviderMetadata, KeyDescriptor, KeyUse, SamlBinding,
        ServiceProviderMetadata, SsoProvider, SsoRole, MD_NS, SAMLP_NS, XMLDSIG_NS,
    },
};

fn endpoint_element(name: &str, endpoint: &Endpoint) -> XmlElement {
    XmlElement::md(name)
        .with_attr("Binding", endpoint.binding.uri())
        .with_attr("Location", endpoint.location.as_str())
        .with_opt_attr("index", endpoint.index)
        .with_opt_attr("isDefault", endpoint.is_default.then_some(true))
}

fn endpoints_from(element: &XmlElement, name: &str) -> SamlResult<Vec<Endpoint>> {
    let mut endpoints = Vec::new();
    for el in element.children_named(MD_NS, name) {
        let binding_uri = el.required_attr("Binding")?;
        // Endpoints with bindings this engine cannot speak are skipped.
        let Some(binding) = SamlBinding::from_uri(binding_uri) else {
            continue;
        };
        let index = el
            .attr("index")
            .map(|i| {
                i.trim().parse::<u32>().map_err(|e| {
                    SamlError::MalformedMessage(format!("invalid endpoint index {i}: {e}"))
                })
            })
            .transpose()?;
        endpoints.push(Endpoint {
            location: el.required_attr("Location")?.to_string(),
            binding,
            index,
            is_default: el.attr("isDefault").map(parse_bool).transpose()?.unwrap_or(false),
        });
    }
    Ok(endpoints)
}

fn key_element(key: &KeyDescriptor) -> XmlElement {
    XmlElement::md("KeyDescriptor")
        .with_opt_attr("use", key.usage.map(KeyUse::as_str))
        .with_child(
            XmlElement::ds("KeyInfo").with_child(
                XmlElement::ds("X509Data").with_child(
                    XmlElement::ds("X509Certificate").with_text(key.certificate.to_base64()),
                ),
            ),
        )
}

fn keys_from(element: &XmlElement) -> SamlResult<Vec<KeyDescriptor>> {
    let mut keys = Vec::new();
    for el in element.children_named(MD_NS, "KeyDescriptor") {
        let usage = match el.attr("use") {
            None => None,
            Some("signing") => Some(KeyUse::Signing),
            Some("encryption") => Some(KeyUse::Encryption),
            Some(other) => {
                return Err(SamlError::MalformedMessage(format!(
                    "unknown key use {other}"
                )))
            }
        };
        let certificates = el
            .child(XMLDSIG_NS, "KeyInfo")
            .into_iter()
            .flat_map(|ki| ki.children_named(XMLDSIG_NS, "X509Data"))
            .flat_map(|data| data.children_named(XMLDSIG_NS, "X509Certificate"));
        for cert in certificates {
            keys.push(KeyDescriptor {
                usage,
                certificate: Certificate::from_base64(&cert.text())?,
            });
        }
    }
    Ok(keys)
}

fn descriptor_element(provider: &SsoProvider) -> XmlElement {
    let name = match provider.role {
        SsoRole::IdentityProvider => "IDPSSODescriptor",
        SsoRole::ServiceProvider => "SPSSODescriptor",
    };

    XmlElement::md(name)
        .with_attr("protocolSupportEnumeration", SAMLP_NS)
        .with_children(provider.keys.iter().map(key_element))
        .with_children(
            provider
                .single_logout_services
                .iter()
                .map(|e| endpoint_element("SingleLogoutService", e)),
        )
        .with_children(
            provider
                .name_id_formats
                .iter()
                .map(|f| XmlElement::md("NameIDFormat").with_text(f.as_str())),
        )
        .with_children(
            provider
                .single_sign_on_services
                .iter()
                .map(|e| endpoint_element("SingleSignOnService", e)),
        )
        .with_children(
            provider
                .assertion_consumer_services
                .iter()
                .map(|e| endpoint_element("AssertionConsumerService", e)),
        )
}

fn descriptor_from(element: &XmlElement, role: SsoRole) -> SamlResult<SsoProvider> {
    Ok(SsoProvider {
        role,
        single_sign_on_services: endpoints_from(element, "SingleSignOnService")?,
        single_logout_services: endpoints_from(element, "SingleLogoutService")?,
        assertion_consumer_services: endpoints_from(element, "AssertionConsumerService")?,
        keys: keys_from(element)?,
        name_id_formats: element
            .children_named(MD_NS, "NameIDFormat")
            .map(|f| f.text().trim().to_string())
            .collect(),
    })
}

impl XmlCodec for IdentityProviderMetadata {
    fn to_element(&self) -> XmlElement {
        let mut root = XmlElement::md("EntityDescriptor").with_attr("entityID", self.entity_id.as_str());
        let mut first_idp = true;
        for provider in &self.providers {
            let mut descriptor = descriptor_element(provider);
            if provider.role == SsoRole::IdentityProvider && first_idp {
                descriptor.set_attr(
                    "WantAuthnRequestsSigned",
                    self.want_authn_requests_signed.to_string(),
                );
                first_idp = false;
            }
            root = root.with_child(descriptor);
        }
        root
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        if !element.is(MD_NS, "EntityDescriptor") {
            return Err(SamlError::MalformedMessage(format!(
                "expected EntityDescriptor, found {}",
                element.name
            )));
        }

        let mut providers = Vec::new();
        let mut want_authn_requests_signed = None;
        for el in element.elements() {
            let role = if el.is(MD_NS, "IDPSSODescriptor") {
                SsoRole::IdentityProvider
            } else if el.is(MD_NS, "SPSSODescriptor") {
                SsoRole::ServiceProvider
            } else {
                continue;
            };
            if role == SsoRole::IdentityProvider && want_authn_requests_signed.is_none() {
                want_authn_requests_signed = Some(
                    el.attr("WantAuthnRequestsSigned")
                        .map(parse_bool)
                        .transpose()?
                        .unwrap_or(false),
                );
            }
            providers.push(descriptor_from(el, role)?);
        }

        Ok(Self {
            entity_id: element.required_attr("entityID")?.to_string(),
            providers,
            want_authn_requests_signed: want_authn_requests_signed.unwrap_or(false),
        })
    }
}

impl IdentityProviderMetadata {
    /// Parses an `EntityDescriptor` document.
    pub fn from_metadata_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&parse(xml)?)
    }
}

impl ServiceProviderMetadata {
    /// Builds the unsigned `EntityDescriptor` carrying `id`.
    #[must_use]
    pub fn to_element(&self, id: &str) -> XmlElement {
        let descriptors = self.providers.iter().map(|provider| {
            let mut descriptor = descriptor_element(provider);
            if provider.role == SsoRole::ServiceProvider {
                descriptor.set_attr("AuthnRequestsSigned", self.authn_requests_signed.to_string());
                descriptor.set_attr(
                    "WantAssertionsSigned",
                    self.want_assertions_signed.to_string(),
                );
            }
            descriptor
        });

        XmlElement::md("EntityDescriptor")
            .with_attr("ID", id)
            .with_attr("entityID", self.entity_id.as_str())
            .with_children(descriptors)
    }

    /// Canonical metadata document, signed when a credential is configured.
    pub fn to_xml(&self) -> SamlResult<String> {
        let mut element = self.to_element(&sp_crypto::random::message_id(id_prefixes::METADATA));
        if let Some(credential) = &self.signing {
            let signature = sign_element(&element, credential)?;
            embed_signature(&mut element, &signature);
        }
        Ok(canonicalize(&element))
    }
}
