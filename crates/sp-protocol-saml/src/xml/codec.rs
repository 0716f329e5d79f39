//! Conversion between the message model and [`XmlElement`] trees.
//!
//! Serialization always goes through the canonical writer, so a message's
//! wire form and the bytes its digest covers come from the same code path.

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use sp_crypto::{DigestAlgorithm, SignatureAlgorithm};

use super::{canonicalize, parse, XmlElement};
use crate::{
    error::{SamlError, SamlResult},
    types::{
        Assertion, Attribute, AudienceRestriction, AuthnRequest, AuthnStatement, Conditions,
        LogoutRequest, LogoutResponse, MessageHeader, NameId, NameIdPolicy, ProtocolMessage,
        Response, SamlBinding, Signature, SignaturePlacement, Status, StatusCode, Subject,
        SubjectConfirmation, SubjectConfirmationData, SAMLP_NS, SAML_NS, SAML_VERSION,
        XMLDSIG_NS,
    },
};

/// Mapping between a model type and its XML element.
pub trait XmlCodec: Sized {
    /// Builds the element, including an embedded signature if present.
    fn to_element(&self) -> XmlElement;

    /// Reads the model from an element.
    fn from_element(element: &XmlElement) -> SamlResult<Self>;

    /// Canonical XML text.
    fn to_xml(&self) -> String {
        canonicalize(&self.to_element())
    }

    /// Parses XML text.
    fn from_xml(xml: &str) -> SamlResult<Self> {
        Self::from_element(&parse(xml)?)
    }
}

/// Parses any protocol message, dispatching on the root element.
pub fn parse_message(xml: &str) -> SamlResult<ProtocolMessage> {
    ProtocolMessage::from_element(&parse(xml)?)
}

pub(crate) fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SamlError::MalformedMessage(format!("invalid instant {value}: {e}")))
}

fn parse_opt_instant(element: &XmlElement, name: &str) -> SamlResult<Option<DateTime<Utc>>> {
    element.attr(name).map(parse_instant).transpose()
}

pub(crate) fn parse_bool(value: &str) -> SamlResult<bool> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(SamlError::MalformedMessage(format!(
            "invalid boolean {other}"
        ))),
    }
}

fn parse_opt_bool(element: &XmlElement, name: &str) -> SamlResult<Option<bool>> {
    element.attr(name).map(parse_bool).transpose()
}

/// Decodes base64 element text, ignoring line breaks and indentation.
pub(crate) fn decode_base64_text(text: &str) -> SamlResult<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(STANDARD.decode(compact)?)
}

fn expect_root(element: &XmlElement, namespace: &str, name: &str) -> SamlResult<()> {
    if element.is(namespace, name) {
        Ok(())
    } else {
        Err(SamlError::MalformedMessage(format!(
            "expected {name}, found {}",
            element.name
        )))
    }
}

// Header

fn with_header(element: XmlElement, header: &MessageHeader) -> XmlElement {
    element
        .with_attr("ID", header.id.as_str())
        .with_attr("Version", header.version.as_str())
        .with_attr("IssueInstant", format_instant(header.issue_instant))
        .with_opt_attr("Destination", header.destination.as_deref())
        .with_child(XmlElement::saml("Issuer").with_text(header.issuer.as_str()))
        .with_opt_child(header.signature.as_ref().and_then(signature_element))
}

fn header_from(element: &XmlElement) -> SamlResult<MessageHeader> {
    let version = element.required_attr("Version")?;
    if version != SAML_VERSION {
        return Err(SamlError::MalformedMessage(format!(
            "unsupported version {version}"
        )));
    }

    let signature = element
        .child(XMLDSIG_NS, "Signature")
        .map(signature_from_element)
        .transpose()?;

    Ok(MessageHeader {
        id: element.required_attr("ID")?.to_string(),
        issue_instant: parse_instant(element.required_attr("IssueInstant")?)?,
        issuer: element
            .child_text(SAML_NS, "Issuer")
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        destination: element.attr("Destination").map(str::to_string),
        version: version.to_string(),
        signature,
    })
}

// ds:Signature

/// The `ds:Signature` element for an embedded signature. Detached
/// signatures have no element form.
pub(crate) fn signature_element(signature: &Signature) -> Option<XmlElement> {
    let SignaturePlacement::Embedded { signed_info, .. } = &signature.placement else {
        return None;
    };

    let key_info = signature.certificate.as_ref().map(|cert| {
        XmlElement::ds("KeyInfo").with_child(
            XmlElement::ds("X509Data")
                .with_child(XmlElement::ds("X509Certificate").with_text(cert.as_str())),
        )
    });

    Some(
        XmlElement::ds("Signature")
            .with_child(signed_info.clone())
            .with_child(XmlElement::ds("SignatureValue").with_text(STANDARD.encode(&signature.value)))
            .with_opt_child(key_info),
    )
}

/// Reads an enveloped `ds:Signature` element.
pub(crate) fn signature_from_element(element: &XmlElement) -> SamlResult<Signature> {
    let signed_info = element.required_child(XMLDSIG_NS, "SignedInfo")?;

    let method = signed_info
        .required_child(XMLDSIG_NS, "SignatureMethod")?
        .required_attr("Algorithm")?;
    let algorithm = SignatureAlgorithm::from_uri(method)
        .map_err(|e| SamlError::MalformedMessage(e.to_string()))?;

    let mut references = signed_info.children_named(XMLDSIG_NS, "Reference");
    let reference = references.next().ok_or_else(|| {
        SamlError::MalformedMessage("SignedInfo has no Reference".to_string())
    })?;
    if references.next().is_some() {
        return Err(SamlError::MalformedMessage(
            "SignedInfo has more than one Reference".to_string(),
        ));
    }

    let digest_method = reference
        .required_child(XMLDSIG_NS, "DigestMethod")?
        .required_attr("Algorithm")?;
    let digest_algorithm = DigestAlgorithm::from_uri(digest_method)
        .map_err(|e| SamlError::MalformedMessage(e.to_string()))?;
    let digest_value =
        decode_base64_text(&reference.required_child(XMLDSIG_NS, "DigestValue")?.text())?;

    let value = decode_base64_text(&element.required_child(XMLDSIG_NS, "SignatureValue")?.text())?;

    let certificate = element
        .child(XMLDSIG_NS, "KeyInfo")
        .and_then(|ki| ki.child(XMLDSIG_NS, "X509Data"))
        .and_then(|data| data.child_text(XMLDSIG_NS, "X509Certificate"))
        .map(|text| text.chars().filter(|c| !c.is_whitespace()).collect());

    Ok(Signature {
        algorithm,
        value,
        certificate,
        placement: SignaturePlacement::Embedded {
            reference_uri: reference.attr("URI").unwrap_or_default().to_string(),
            digest_algorithm,
            digest_value,
            signed_info: signed_info.clone(),
        },
    })
}

// Shared pieces

fn name_id_element(name_id: &NameId) -> XmlElement {
    XmlElement::saml("NameID")
        .with_opt_attr("Format", name_id.format.as_deref())
        .with_opt_attr("NameQualifier", name_id.name_qualifier.as_deref())
        .with_opt_attr("SPNameQualifier", name_id.sp_name_qualifier.as_deref())
        .with_text(name_id.value.as_str())
}

fn name_id_from(element: &XmlElement) -> NameId {
    NameId {
        value: element.text().trim().to_string(),
        format: element.attr("Format").map(str::to_string),
        name_qualifier: element.attr("NameQualifier").map(str::to_string),
        sp_name_qualifier: element.attr("SPNameQualifier").map(str::to_string),
    }
}

impl XmlCodec for Status {
    fn to_element(&self) -> XmlElement {
        let sub = self
            .sub_code
            .map(|code| XmlElement::samlp("StatusCode").with_attr("Value", code.uri()));
        XmlElement::samlp("Status")
            .with_child(
                XmlElement::samlp("StatusCode")
                    .with_attr("Value", self.code.uri())
                    .with_opt_child(sub),
            )
            .with_opt_child(
                self.message
                    .as_ref()
                    .map(|m| XmlElement::samlp("StatusMessage").with_text(m.as_str())),
            )
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "Status")?;
        let code_el = element.required_child(SAMLP_NS, "StatusCode")?;
        let code = status_code_from(code_el)?;
        let sub_code = code_el
            .child(SAMLP_NS, "StatusCode")
            .map(status_code_from)
            .transpose()?;

        Ok(Self {
            code,
            sub_code,
            message: element.child_text(SAMLP_NS, "StatusMessage"),
        })
    }
}

fn status_code_from(element: &XmlElement) -> SamlResult<StatusCode> {
    let value = element.required_attr("Value")?;
    StatusCode::from_uri(value)
        .ok_or_else(|| SamlError::MalformedMessage(format!("unknown status code {value}")))
}

// AuthnRequest

impl XmlCodec for AuthnRequest {
    fn to_element(&self) -> XmlElement {
        let policy = self.name_id_policy.as_ref().map(|p| {
            XmlElement::samlp("NameIDPolicy")
                .with_opt_attr("Format", p.format.as_deref())
                .with_opt_attr("SPNameQualifier", p.sp_name_qualifier.as_deref())
                .with_opt_attr("AllowCreate", p.allow_create)
        });

        with_header(XmlElement::samlp("AuthnRequest"), &self.header)
            .with_opt_attr(
                "AssertionConsumerServiceURL",
                self.assertion_consumer_service_url.as_deref(),
            )
            .with_opt_attr("ProtocolBinding", self.protocol_binding.map(SamlBinding::uri))
            .with_opt_attr("ForceAuthn", self.force_authn)
            .with_opt_attr("IsPassive", self.is_passive)
            .with_opt_attr("ProviderName", self.provider_name.as_deref())
            .with_opt_child(policy)
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "AuthnRequest")?;

        let protocol_binding = element
            .attr("ProtocolBinding")
            .map(|uri| {
                SamlBinding::from_uri(uri)
                    .ok_or_else(|| SamlError::UnsupportedBinding(uri.to_string()))
            })
            .transpose()?;

        let name_id_policy = element
            .child(SAMLP_NS, "NameIDPolicy")
            .map(|p| -> SamlResult<NameIdPolicy> {
                Ok(NameIdPolicy {
                    format: p.attr("Format").map(str::to_string),
                    sp_name_qualifier: p.attr("SPNameQualifier").map(str::to_string),
                    allow_create: parse_opt_bool(p, "AllowCreate")?,
                })
            })
            .transpose()?;

        Ok(Self {
            header: header_from(element)?,
            assertion_consumer_service_url: element
                .attr("AssertionConsumerServiceURL")
                .map(str::to_string),
            protocol_binding,
            name_id_policy,
            force_authn: parse_opt_bool(element, "ForceAuthn")?,
            is_passive: parse_opt_bool(element, "IsPassive")?,
            provider_name: element.attr("ProviderName").map(str::to_string),
        })
    }
}

// Assertion

fn subject_element(subject: &Subject) -> XmlElement {
    let confirmations = subject.confirmations.iter().map(|c| {
        let data = c.data.as_ref().map(|d| {
            XmlElement::saml("SubjectConfirmationData")
                .with_opt_attr("NotBefore", d.not_before.map(format_instant))
                .with_opt_attr("NotOnOrAfter", d.not_on_or_after.map(format_instant))
                .with_opt_attr("Recipient", d.recipient.as_deref())
                .with_opt_attr("InResponseTo", d.in_response_to.as_deref())
        });
        XmlElement::saml("SubjectConfirmation")
            .with_attr("Method", c.method.as_str())
            .with_opt_child(data)
    });

    XmlElement::saml("Subject")
        .with_opt_child(subject.name_id.as_ref().map(name_id_element))
        .with_children(confirmations)
}

fn subject_from(element: &XmlElement) -> SamlResult<Subject> {
    let mut confirmations = Vec::new();
    for c in element.children_named(SAML_NS, "SubjectConfirmation") {
        let data = c
            .child(SAML_NS, "SubjectConfirmationData")
            .map(|d| -> SamlResult<SubjectConfirmationData> {
                Ok(SubjectConfirmationData {
                    not_before: parse_opt_instant(d, "NotBefore")?,
                    not_on_or_after: parse_opt_instant(d, "NotOnOrAfter")?,
                    recipient: d.attr("Recipient").map(str::to_string),
                    in_response_to: d.attr("InResponseTo").map(str::to_string),
                })
            })
            .transpose()?;
        confirmations.push(SubjectConfirmation {
            method: c.required_attr("Method")?.to_string(),
            data,
        });
    }

    Ok(Subject {
        name_id: element.child(SAML_NS, "NameID").map(name_id_from),
        confirmations,
    })
}

fn conditions_element(conditions: &Conditions) -> XmlElement {
    let restrictions = conditions.audience_restrictions.iter().map(|r| {
        XmlElement::saml("AudienceRestriction").with_children(
            r.audiences
                .iter()
                .map(|a| XmlElement::saml("Audience").with_text(a.as_str())),
        )
    });

    XmlElement::saml("Conditions")
        .with_opt_attr("NotBefore", conditions.not_before.map(format_instant))
        .with_opt_attr("NotOnOrAfter", conditions.not_on_or_after.map(format_instant))
        .with_children(restrictions)
}

fn conditions_from(element: &XmlElement) -> SamlResult<Conditions> {
    Ok(Conditions {
        not_before: parse_opt_instant(element, "NotBefore")?,
        not_on_or_after: parse_opt_instant(element, "NotOnOrAfter")?,
        audience_restrictions: element
            .children_named(SAML_NS, "AudienceRestriction")
            .map(|r| AudienceRestriction {
                audiences: r
                    .children_named(SAML_NS, "Audience")
                    .map(|a| a.text().trim().to_string())
                    .collect(),
            })
            .collect(),
    })
}

fn authn_statement_element(statement: &AuthnStatement) -> XmlElement {
    let context = XmlElement::saml("AuthnContext").with_opt_child(
        statement
            .authn_context_class_ref
            .as_ref()
            .map(|r| XmlElement::saml("AuthnContextClassRef").with_text(r.as_str())),
    );

    XmlElement::saml("AuthnStatement")
        .with_attr("AuthnInstant", format_instant(statement.authn_instant))
        .with_opt_attr("SessionIndex", statement.session_index.as_deref())
        .with_opt_attr(
            "SessionNotOnOrAfter",
            statement.session_not_on_or_after.map(format_instant),
        )
        .with_child(context)
}

fn authn_statement_from(element: &XmlElement) -> SamlResult<AuthnStatement> {
    Ok(AuthnStatement {
        authn_instant: parse_instant(element.required_attr("AuthnInstant")?)?,
        session_index: element.attr("SessionIndex").map(str::to_string),
        session_not_on_or_after: parse_opt_instant(element, "SessionNotOnOrAfter")?,
        authn_context_class_ref: element
            .child(SAML_NS, "AuthnContext")
            .and_then(|c| c.child_text(SAML_NS, "AuthnContextClassRef"))
            .map(|s| s.trim().to_string()),
    })
}

fn attribute_element(attribute: &Attribute) -> XmlElement {
    XmlElement::saml("Attribute")
        .with_attr("Name", attribute.name.as_str())
        .with_opt_attr("NameFormat", attribute.name_format.as_deref())
        .with_opt_attr("FriendlyName", attribute.friendly_name.as_deref())
        .with_children(
            attribute
                .values
                .iter()
                .map(|v| XmlElement::saml("AttributeValue").with_text(v.as_str())),
        )
}

fn attribute_from(element: &XmlElement) -> SamlResult<Attribute> {
    Ok(Attribute {
        name: element.required_attr("Name")?.to_string(),
        name_format: element.attr("NameFormat").map(str::to_string),
        friendly_name: element.attr("FriendlyName").map(str::to_string),
        values: element
            .children_named(SAML_NS, "AttributeValue")
            .map(XmlElement::text)
            .collect(),
    })
}

impl XmlCodec for Assertion {
    fn to_element(&self) -> XmlElement {
        let attributes = (!self.attributes.is_empty()).then(|| {
            XmlElement::saml("AttributeStatement")
                .with_children(self.attributes.iter().map(attribute_element))
        });

        // Assertions carry no Destination.
        let mut header = self.header.clone();
        header.destination = None;

        with_header(XmlElement::saml("Assertion"), &header)
            .with_opt_child(self.subject.as_ref().map(subject_element))
            .with_opt_child(self.conditions.as_ref().map(conditions_element))
            .with_children(self.authn_statements.iter().map(authn_statement_element))
            .with_opt_child(attributes)
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAML_NS, "Assertion")?;

        let mut header = header_from(element)?;
        header.destination = None;

        let attributes = element
            .children_named(SAML_NS, "AttributeStatement")
            .flat_map(|s| s.children_named(SAML_NS, "Attribute"))
            .map(attribute_from)
            .collect::<SamlResult<Vec<_>>>()?;

        Ok(Self {
            header,
            subject: element
                .child(SAML_NS, "Subject")
                .map(subject_from)
                .transpose()?,
            conditions: element
                .child(SAML_NS, "Conditions")
                .map(conditions_from)
                .transpose()?,
            authn_statements: element
                .children_named(SAML_NS, "AuthnStatement")
                .map(authn_statement_from)
                .collect::<SamlResult<Vec<_>>>()?,
            attributes,
        })
    }
}

// Response

impl XmlCodec for Response {
    fn to_element(&self) -> XmlElement {
        with_header(XmlElement::samlp("Response"), &self.header)
            .with_opt_attr("InResponseTo", self.in_response_to.as_deref())
            .with_child(self.status.to_element())
            .with_children(self.assertions.iter().map(XmlCodec::to_element))
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "Response")?;
        Ok(Self {
            header: header_from(element)?,
            in_response_to: element.attr("InResponseTo").map(str::to_string),
            status: Status::from_element(element.required_child(SAMLP_NS, "Status")?)?,
            assertions: element
                .children_named(SAML_NS, "Assertion")
                .map(Assertion::from_element)
                .collect::<SamlResult<Vec<_>>>()?,
        })
    }
}

// Logout

impl XmlCodec for LogoutRequest {
    fn to_element(&self) -> XmlElement {
        with_header(XmlElement::samlp("LogoutRequest"), &self.header)
            .with_opt_attr("Reason", self.reason.as_deref())
            .with_opt_attr("NotOnOrAfter", self.not_on_or_after.map(format_instant))
            .with_child(name_id_element(&self.name_id))
            .with_children(
                self.session_indexes
                    .iter()
                    .map(|i| XmlElement::samlp("SessionIndex").with_text(i.as_str())),
            )
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "LogoutRequest")?;
        Ok(Self {
            header: header_from(element)?,
            name_id: name_id_from(element.required_child(SAML_NS, "NameID")?),
            session_indexes: element
                .children_named(SAMLP_NS, "SessionIndex")
                .map(|i| i.text().trim().to_string())
                .collect(),
            reason: element.attr("Reason").map(str::to_string),
            not_on_or_after: parse_opt_instant(element, "NotOnOrAfter")?,
        })
    }
}

impl XmlCodec for LogoutResponse {
    fn to_element(&self) -> XmlElement {
        with_header(XmlElement::samlp("LogoutResponse"), &self.header)
            .with_opt_attr("InResponseTo", self.in_response_to.as_deref())
            .with_child(self.status.to_element())
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        expect_root(element, SAMLP_NS, "LogoutResponse")?;
        Ok(Self {
            header: header_from(element)?,
            in_response_to: element.attr("InResponseTo").map(str::to_string),
            status: Status::from_element(element.required_child(SAMLP_NS, "Status")?)?,
        })
    }
}

impl XmlCodec for ProtocolMessage {
    fn to_element(&self) -> XmlElement {
        match self {
            Self::AuthnRequest(m) => m.to_element(),
            Self::Response(m) => m.to_element(),
            Self::Assertion(m) => m.to_element(),
            Self::LogoutRequest(m) => m.to_element(),
            Self::LogoutResponse(m) => m.to_element(),
        }
    }

    fn from_element(element: &XmlElement) -> SamlResult<Self> {
        let namespace = element.namespace.as_deref().unwrap_or_default();
        match (namespace, element.name.as_str()) {
            (SAMLP_NS, "AuthnRequest") => AuthnRequest::from_element(element).map(Self::from),
            (SAMLP_NS, "Response") => Response::from_element(element).map(Self::from),
            (SAML_NS, "Assertion") => Assertion::from_element(element).map(Self::from),
            (SAMLP_NS, "LogoutRequest") => LogoutRequest::from_element(element).map(Self::from),
            (SAMLP_NS, "LogoutResponse") => LogoutResponse::from_element(element).map(Self::from),
            (_, name) => Err(SamlError::MalformedMessage(format!(
                "{name} is not a supported protocol message"
            ))),
        }
    }
}
