use sp_protocol_saml::{
    endpoint::{resolve, resolve_required},
    Endpoint, IdentityProviderMetadata, SamlBinding, SamlError,
};

use crate::common::{IDP_ENTITY, IDP_SSO};

fn advertised() -> Vec<Endpoint> {
    vec![
        Endpoint::new("https://idp.example/post", SamlBinding::HttpPost).with_index(0),
        Endpoint::new("https://idp.example/redirect", SamlBinding::HttpRedirect)
            .with_index(1)
            .with_default(true),
    ]
}

#[test]
fn requested_index_wins() {
    let endpoints = advertised();
    let chosen = resolve(&endpoints, Some(SamlBinding::HttpRedirect), Some(0));
    assert_eq!(chosen.map(|e| e.binding), Some(SamlBinding::HttpPost));
}

#[test]
fn default_without_preferences() {
    let endpoints = advertised();
    let chosen = resolve(&endpoints, None, None);
    assert_eq!(chosen.map(|e| e.location.as_str()), Some("https://idp.example/redirect"));
}

#[test]
fn unknown_index_falls_through_to_default() {
    let endpoints = advertised();
    let chosen = resolve(&endpoints, None, Some(7));
    assert_eq!(chosen.map(|e| e.binding), Some(SamlBinding::HttpRedirect));
}

#[test]
fn binding_preference_without_default() {
    let endpoints = vec![
        Endpoint::new("https://idp.example/post", SamlBinding::HttpPost),
        Endpoint::new("https://idp.example/redirect-a", SamlBinding::HttpRedirect),
        Endpoint::new("https://idp.example/redirect-b", SamlBinding::HttpRedirect),
    ];
    let chosen = resolve(&endpoints, Some(SamlBinding::HttpRedirect), None);
    assert_eq!(chosen.map(|e| e.location.as_str()), Some("https://idp.example/redirect-a"));

    let chosen = resolve(&endpoints, Some(SamlBinding::Soap), None);
    assert_eq!(chosen.map(|e| e.location.as_str()), Some("https://idp.example/post"));
}

#[test]
fn empty_list_is_absent() {
    assert!(resolve(&[], None, None).is_none());
    assert!(resolve(&[], Some(SamlBinding::HttpPost), Some(0)).is_none());

    let err = resolve_required(&[], None, None, IDP_ENTITY, "SingleSignOnService").unwrap_err();
    match err {
        SamlError::NoUsableEndpoint { entity_id, service } => {
            assert_eq!(entity_id, IDP_ENTITY);
            assert_eq!(service, "SingleSignOnService");
        }
        other => panic!("expected NoUsableEndpoint, got {other:?}"),
    }
}

#[test]
fn endpoints_read_from_metadata() -> anyhow::Result<()> {
    let xml = format!(
        r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{IDP_ENTITY}">
  <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://idp.example/saml/post"/>
    <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="{IDP_SSO}"/>
  </md:IDPSSODescriptor>
</md:EntityDescriptor>"#
    );
    let idp = IdentityProviderMetadata::from_metadata_xml(&xml)?;
    let services = idp.single_sign_on_services();
    assert_eq!(services.len(), 2);

    let chosen = resolve(services, Some(SamlBinding::HttpRedirect), None);
    assert_eq!(chosen.map(|e| e.location.as_str()), Some(IDP_SSO));
    Ok(())
}
