//! XML tree used on both sides of the wire.
//!
//! Elements and attributes carry their resolved namespace URI next to the
//! prefix they were written with, so any subtree can be canonicalized on its
//! own without consulting its ancestors. Parsed elements also keep the
//! namespace bindings in scope where they appeared.

mod canonical;
pub(crate) mod codec;
mod metadata;
mod parser;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use canonical::{canonicalize, canonicalize_with_prefixes};
pub use codec::{parse_message, XmlCodec};
pub use parser::parse;

use crate::{
    error::{SamlError, SamlResult},
    types::{MD_NS, SAMLP_NS, SAML_NS, XMLDSIG_NS},
};

/// An attribute with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlAttribute {
    /// Prefix as written, `None` for unqualified attributes.
    pub prefix: Option<String>,
    /// Namespace URI, `None` for unqualified attributes.
    pub namespace: Option<String>,
    /// Local name.
    pub name: String,
    /// Unescaped value.
    pub value: String,
}

/// A child node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum XmlNode {
    /// Nested element.
    Element(XmlElement),
    /// Character data, unescaped.
    Text(String),
}

/// An element with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XmlElement {
    /// Prefix as written, `None` when in the default namespace.
    pub prefix: Option<String>,
    /// Namespace URI.
    pub namespace: Option<String>,
    /// Local name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<XmlAttribute>,
    /// Children in document order.
    pub children: Vec<XmlNode>,
    /// Prefix to namespace bindings in scope, the default namespace under
    /// `""`. Empty for elements built in code.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub namespaces: BTreeMap<String, String>,
}

impl XmlElement {
    /// Creates an element in `namespace` written with `prefix`.
    #[must_use]
    pub fn new(namespace: &str, prefix: &str, name: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            namespaces: BTreeMap::new(),
        }
    }

    /// `saml:` element.
    #[must_use]
    pub fn saml(name: &str) -> Self {
        Self::new(SAML_NS, "saml", name)
    }

    /// `samlp:` element.
    #[must_use]
    pub fn samlp(name: &str) -> Self {
        Self::new(SAMLP_NS, "samlp", name)
    }

    /// `ds:` element.
    #[must_use]
    pub fn ds(name: &str) -> Self {
        Self::new(XMLDSIG_NS, "ds", name)
    }

    /// `md:` element.
    #[must_use]
    pub fn md(name: &str) -> Self {
        Self::new(MD_NS, "md", name)
    }

    /// Adds an unqualified attribute.
    #[must_use]
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Adds an unqualified attribute when `value` is present.
    #[must_use]
    pub fn with_opt_attr<T: ToString>(self, name: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with_attr(name, value.to_string()),
            None => self,
        }
    }

    /// Sets or replaces an unqualified attribute.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == name)
        {
            Some(existing) => existing.value = value,
            None => self.attributes.push(XmlAttribute {
                prefix: None,
                namespace: None,
                name: name.to_string(),
                value,
            }),
        }
    }

    /// Appends a child element.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Appends a child element when present.
    #[must_use]
    pub fn with_opt_child(self, child: Option<Self>) -> Self {
        match child {
            Some(child) => self.with_child(child),
            None => self,
        }
    }

    /// Appends children.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children
            .extend(children.into_iter().map(XmlNode::Element));
        self
    }

    /// Appends text content.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Returns true if this element is `{namespace}name`.
    #[must_use]
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Returns an unqualified attribute value.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Returns an unqualified attribute value or a malformed-message error.
    pub fn required_attr(&self, name: &str) -> SamlResult<&str> {
        self.attr(name).ok_or_else(|| {
            SamlError::MalformedMessage(format!("{} is missing attribute {name}", self.name))
        })
    }

    /// Iterates child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// Iterates child elements named `{namespace}name`.
    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Self> + 'a {
        self.elements().filter(move |el| el.is(namespace, name))
    }

    /// Returns the first child element named `{namespace}name`.
    #[must_use]
    pub fn child(&self, namespace: &str, name: &str) -> Option<&Self> {
        self.elements().find(|el| el.is(namespace, name))
    }

    /// Returns the first child element named `{namespace}name` or a
    /// malformed-message error.
    pub fn required_child(&self, namespace: &str, name: &str) -> SamlResult<&Self> {
        self.child(namespace, name).ok_or_else(|| {
            SamlError::MalformedMessage(format!("{} is missing child {name}", self.name))
        })
    }

    /// Concatenated direct text content.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Text content of the first matching child.
    #[must_use]
    pub fn child_text(&self, namespace: &str, name: &str) -> Option<String> {
        self.child(namespace, name).map(Self::text)
    }

    /// Returns a copy without any direct child named `{namespace}name`.
    #[must_use]
    pub fn without_child(&self, namespace: &str, name: &str) -> Self {
        let mut copy = self.clone();
        copy.children.retain(|node| match node {
            XmlNode::Element(el) => !el.is(namespace, name),
            XmlNode::Text(_) => true,
        });
        copy
    }

    /// Inserts `child` directly after the first child named
    /// `{namespace}name`, or first if there is none.
    pub fn insert_after(&mut self, namespace: &str, name: &str, child: Self) {
        let position = self
            .children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(el) if el.is(namespace, name)))
            .map_or(0, |i| i + 1);
        self.children.insert(position, XmlNode::Element(child));
    }

    /// Canonical serialization of this subtree.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        canonicalize(self)
    }
}
