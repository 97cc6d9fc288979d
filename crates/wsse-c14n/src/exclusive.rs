#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N) over a subtree.
//!
//! Only "visibly utilized" namespace declarations are output. A prefix is
//! visibly utilized on an element when:
//! 1. the element's own name uses it, or
//! 2. one of the element's attributes uses it, or
//! 3. it is listed in the InclusiveNamespaces PrefixList (`#default` standing
//!    for the default namespace).
//!
//! A declaration is emitted only if the nearest output ancestor did not
//! already render the same binding. Rendering starts from an empty context
//! at the apex, so a signed subtree canonicalizes identically wherever it is
//! later moved.

use std::collections::{BTreeMap, BTreeSet};
use wsse_core::{ns, Error};
use wsse_xml::document::{Document, Element, NodeId, NodeKind};
use wsse_xml::writer::{escape_attr, escape_text};

/// Canonicalize `apex` and everything below it.
pub fn canonicalize(
    doc: &Document,
    apex: NodeId,
    with_comments: bool,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    if doc.node_kind(apex).is_none() {
        return Err(Error::MalformedInput("canonicalization target not found".into()));
    }
    let inclusive: BTreeSet<String> = inclusive_prefixes
        .iter()
        .map(|p| if p == "#default" { String::new() } else { p.clone() })
        .collect();

    let mut out = Vec::new();
    // Bindings rendered by the enclosing output elements, one map per open
    // element.
    let mut scopes: Vec<BTreeMap<String, String>> = vec![BTreeMap::new()];
    let mut stack = vec![Step::Enter(apex)];

    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Leave(name) => {
                out.extend_from_slice(b"</");
                out.extend_from_slice(name.as_bytes());
                out.push(b'>');
                scopes.pop();
                continue;
            }
            Step::Enter(id) => id,
        };

        match doc.node_kind(id) {
            Some(NodeKind::Document) => {
                stack.extend(doc.children(id).iter().rev().map(|c| Step::Enter(*c)));
            }
            Some(NodeKind::Element(elem)) => {
                let rendered = scopes.last().cloned().unwrap_or_default();
                let decls = namespaces_to_render(doc, id, elem, &inclusive, &rendered);
                let name = elem.name.qualified();

                out.push(b'<');
                out.extend_from_slice(name.as_bytes());
                for (prefix, uri) in &decls {
                    if prefix.is_empty() {
                        out.extend_from_slice(b" xmlns=\"");
                    } else {
                        out.extend_from_slice(b" xmlns:");
                        out.extend_from_slice(prefix.as_bytes());
                        out.extend_from_slice(b"=\"");
                    }
                    out.extend_from_slice(escape_attr(uri).as_bytes());
                    out.push(b'"');
                }
                for (qualified, value) in sorted_attributes(elem) {
                    out.push(b' ');
                    out.extend_from_slice(qualified.as_bytes());
                    out.extend_from_slice(b"=\"");
                    out.extend_from_slice(escape_attr(value).as_bytes());
                    out.push(b'"');
                }
                out.push(b'>');

                let mut child_scope = rendered;
                child_scope.extend(decls);
                scopes.push(child_scope);
                stack.push(Step::Leave(name));
                stack.extend(doc.children(id).iter().rev().map(|c| Step::Enter(*c)));
            }
            Some(NodeKind::Text(text)) => {
                out.extend_from_slice(escape_text(text).as_bytes());
            }
            Some(NodeKind::Comment(text)) => {
                if with_comments {
                    let top_level = is_top_level(doc, id);
                    if top_level && has_sibling_element(doc, id, Direction::Before) {
                        out.push(b'\n');
                    }
                    out.extend_from_slice(b"<!--");
                    out.extend_from_slice(text.as_bytes());
                    out.extend_from_slice(b"-->");
                    if top_level && has_sibling_element(doc, id, Direction::After) {
                        out.push(b'\n');
                    }
                }
            }
            Some(NodeKind::ProcessingInstruction(pi)) => {
                let top_level = is_top_level(doc, id);
                if top_level && has_sibling_element(doc, id, Direction::Before) {
                    out.push(b'\n');
                }
                out.extend_from_slice(b"<?");
                out.extend_from_slice(pi.target.as_bytes());
                if let Some(data) = pi.data.as_deref().filter(|d| !d.is_empty()) {
                    out.push(b' ');
                    out.extend_from_slice(data.replace('\r', "&#xD;").as_bytes());
                }
                out.extend_from_slice(b"?>");
                if top_level && has_sibling_element(doc, id, Direction::After) {
                    out.push(b'\n');
                }
            }
            None => {}
        }
    }
    Ok(out)
}

enum Step {
    Enter(NodeId),
    Leave(String),
}

/// Declarations to emit on `elem`, sorted by prefix (default first).
fn namespaces_to_render(
    doc: &Document,
    id: NodeId,
    elem: &Element,
    inclusive: &BTreeSet<String>,
    rendered: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut utilized: BTreeSet<String> = inclusive.clone();
    utilized.insert(elem.name.prefix.clone().unwrap_or_default());
    for attr in &elem.attributes {
        if let Some(p) = &attr.name.prefix {
            utilized.insert(p.clone());
        }
    }
    utilized.remove(ns::prefix::XML);

    let in_scope = doc.in_scope_namespaces(id);
    let mut decls = Vec::new();
    // BTreeSet iteration puts "" (the default namespace) first.
    for prefix in utilized {
        match in_scope.get(&prefix) {
            Some(uri) => {
                if rendered.get(&prefix) != Some(uri) {
                    decls.push((prefix, uri.clone()));
                }
            }
            None if prefix.is_empty() => {
                if rendered.get("").is_some_and(|u| !u.is_empty()) {
                    decls.push((String::new(), String::new()));
                }
            }
            None => {}
        }
    }
    decls
}

/// Attributes as `(qualified name, value)`: unqualified ones first by local
/// name, then by (namespace URI, local name).
fn sorted_attributes(elem: &Element) -> Vec<(String, &str)> {
    let mut attrs: Vec<(&str, &str, String, &str)> = elem
        .attributes
        .iter()
        .map(|a| {
            (
                a.name.namespace_uri.as_deref().unwrap_or(""),
                a.name.local_name.as_str(),
                a.name.qualified(),
                a.value.as_str(),
            )
        })
        .collect();
    attrs.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    attrs.into_iter().map(|(_, _, q, v)| (q, v)).collect()
}

fn is_top_level(doc: &Document, id: NodeId) -> bool {
    doc.parent(id)
        .is_some_and(|p| matches!(doc.node_kind(p), Some(NodeKind::Document)))
}

enum Direction {
    Before,
    After,
}

fn has_sibling_element(doc: &Document, id: NodeId, direction: Direction) -> bool {
    let Some(parent) = doc.parent(id) else {
        return false;
    };
    let siblings = doc.children(parent);
    let Some(pos) = siblings.iter().position(|s| *s == id) else {
        return false;
    };
    let range = match direction {
        Direction::Before => &siblings[..pos],
        Direction::After => &siblings[pos + 1..],
    };
    range.iter().any(|s| doc.element(*s).is_some())
}
