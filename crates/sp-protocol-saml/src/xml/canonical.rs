//! Canonical serialization.
//!
//! Follows exclusive XML canonicalization (without comments) over the
//! [`XmlElement`] model:
//!
//! - no XML declaration, start and end tags always written out
//! - a namespace declaration is emitted on the element that first visibly
//!   uses the prefix, and only if the nearest rendered ancestor bound it
//!   differently
//! - namespace declarations sorted by prefix, default first; attributes
//!   sorted by namespace URI then local name
//! - C14N character escaping
//! - prefixes named in an `InclusiveNamespaces` `PrefixList` are declared
//!   wherever they are in scope and not yet rendered, as inclusive C14N does
//!
//! Text is written as it appears in the tree, so whitespace a parsed
//! document carried between elements is part of the output.

use std::collections::BTreeMap;

use super::{XmlElement, XmlNode};
use crate::types::XML_NS;

type Rendered = BTreeMap<String, String>;

/// Canonical form of `element` and its descendants.
#[must_use]
pub fn canonicalize(element: &XmlElement) -> String {
    canonicalize_with_prefixes(element, &[])
}

/// Canonical form with an inclusive prefix list. `#default` names the
/// default namespace.
#[must_use]
pub fn canonicalize_with_prefixes(element: &XmlElement, inclusive: &[String]) -> String {
    let inclusive: Vec<&str> = inclusive
        .iter()
        .map(|prefix| if prefix == "#default" { "" } else { prefix.as_str() })
        .collect();
    let mut out = String::new();
    write_element(element, &inclusive, &Rendered::new(), &mut out);
    out
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{name}"),
        _ => name.to_string(),
    }
}

fn write_element(element: &XmlElement, inclusive: &[&str], inherited: &Rendered, out: &mut String) {
    let mut rendered = inherited.clone();
    let mut declarations: BTreeMap<String, String> = BTreeMap::new();

    // Element prefix, including the default namespace.
    let element_prefix = element.prefix.clone().unwrap_or_default();
    let element_ns = element.namespace.clone().unwrap_or_default();
    let needs_decl = match rendered.get(&element_prefix) {
        Some(bound) => *bound != element_ns,
        None => !element_ns.is_empty(),
    };
    if needs_decl {
        declarations.insert(element_prefix.clone(), element_ns.clone());
        rendered.insert(element_prefix, element_ns);
    }

    for attr in &element.attributes {
        let (Some(prefix), Some(ns)) = (&attr.prefix, &attr.namespace) else {
            continue;
        };
        if ns == XML_NS {
            continue;
        }
        if rendered.get(prefix) != Some(ns) {
            declarations.insert(prefix.clone(), ns.clone());
            rendered.insert(prefix.clone(), ns.clone());
        }
    }

    for &prefix in inclusive {
        let uri = element.namespaces.get(prefix).map_or("", String::as_str);
        let undeclare = uri.is_empty()
            && prefix.is_empty()
            && rendered.get("").is_some_and(|bound| !bound.is_empty());
        if (!uri.is_empty() && rendered.get(prefix).map(String::as_str) != Some(uri)) || undeclare {
            declarations.insert(prefix.to_string(), uri.to_string());
            rendered.insert(prefix.to_string(), uri.to_string());
        }
    }

    let tag = qualified(element.prefix.as_deref(), &element.name);
    out.push('<');
    out.push_str(&tag);

    for (prefix, uri) in &declarations {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attr(uri, out);
        out.push('"');
    }

    let mut attributes: Vec<_> = element.attributes.iter().collect();
    attributes.sort_by(|a, b| {
        let a_ns = a.namespace.as_deref().unwrap_or("");
        let b_ns = b.namespace.as_deref().unwrap_or("");
        a_ns.cmp(b_ns).then_with(|| a.name.cmp(&b.name))
    });
    for attr in attributes {
        out.push(' ');
        out.push_str(&qualified(attr.prefix.as_deref(), &attr.name));
        out.push_str("=\"");
        escape_attr(&attr.value, out);
        out.push('"');
    }
    out.push('>');

    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(el, inclusive, &rendered, out),
            XmlNode::Text(text) => escape_text(text, out),
        }
    }

    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}
