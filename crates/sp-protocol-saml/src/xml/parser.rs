//! XML parsing into [`XmlElement`] trees.
//!
//! Document type declarations are refused. Comments and processing
//! instructions are dropped. Text, including whitespace between elements,
//! is kept as written after line-end normalization.

use std::{borrow::Cow, collections::BTreeMap};

use quick_xml::{escape::unescape, events::Event, reader::Reader};

use super::{XmlAttribute, XmlElement, XmlNode};
use crate::{
    error::{SamlError, SamlResult},
    types::XML_NS,
};

type Scope = BTreeMap<String, String>;

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn utf8(bytes: &[u8]) -> SamlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| SamlError::MalformedMessage(e.to_string()))
}

fn resolve(scope: &Scope, prefix: &str) -> SamlResult<String> {
    if prefix == "xml" {
        return Ok(XML_NS.to_string());
    }
    scope
        .get(prefix)
        .filter(|uri| !uri.is_empty())
        .cloned()
        .ok_or_else(|| SamlError::MalformedMessage(format!("unbound namespace prefix {prefix}")))
}

/// `\r\n` and lone `\r` become `\n`, as an XML processor reports them.
fn normalize_line_ends(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

fn push_text(element: &mut XmlElement, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(XmlNode::Text(existing)) = element.children.last_mut() {
        existing.push_str(text);
    } else {
        element.children.push(XmlNode::Text(text.to_string()));
    }
}

/// Parses a document into its root element.
pub fn parse(xml: &str) -> SamlResult<XmlElement> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(SamlError::MalformedMessage(
                        "content after the root element".to_string(),
                    ));
                }

                let mut scope = stack
                    .last()
                    .map(|parent| parent.namespaces.clone())
                    .unwrap_or_default();
                let mut raw_attributes = Vec::new();

                for attr in start.attributes() {
                    let attr = attr?;
                    let key = utf8(attr.key.as_ref())?.to_string();
                    let value = attr.unescape_value()?.into_owned();
                    if key == "xmlns" {
                        scope.insert(String::new(), value);
                    } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                        scope.insert(prefix.to_string(), value);
                    } else {
                        raw_attributes.push((key, value));
                    }
                }

                let qname = utf8(start.name().as_ref())?.to_string();
                let (prefix, local) = split_qname(&qname);
                let namespace = match prefix {
                    Some(prefix) => Some(resolve(&scope, prefix)?),
                    None => scope.get("").filter(|uri| !uri.is_empty()).cloned(),
                };

                let mut attributes = Vec::with_capacity(raw_attributes.len());
                for (key, value) in raw_attributes {
                    let (attr_prefix, attr_local) = split_qname(&key);
                    let attr_namespace = attr_prefix.map(|p| resolve(&scope, p)).transpose()?;
                    attributes.push(XmlAttribute {
                        prefix: attr_prefix.map(str::to_string),
                        namespace: attr_namespace,
                        name: attr_local.to_string(),
                        value,
                    });
                }

                stack.push(XmlElement {
                    prefix: prefix.map(str::to_string),
                    namespace,
                    name: local.to_string(),
                    attributes,
                    children: Vec::new(),
                    namespaces: scope,
                });
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    SamlError::MalformedMessage("unbalanced end tag".to_string())
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(XmlNode::Element(element)),
                    None => root = Some(element),
                }
            }
            Event::Text(text) => {
                let raw = normalize_line_ends(utf8(&text)?);
                let text = unescape(&raw).map_err(|e| SamlError::MalformedMessage(e.to_string()))?;
                match stack.last_mut() {
                    Some(parent) => push_text(parent, &text),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(SamlError::MalformedMessage(
                            "text outside the root element".to_string(),
                        ))
                    }
                }
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = normalize_line_ends(utf8(&bytes)?);
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, &text);
                }
            }
            Event::DocType(_) => {
                return Err(SamlError::MalformedMessage(
                    "document type declarations are not accepted".to_string(),
                ))
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(SamlError::MalformedMessage("unclosed element".to_string()));
    }
    root.ok_or_else(|| SamlError::MalformedMessage("empty document".to_string()))
}
