#![forbid(unsafe_code)]

//! Serialization of a [`Document`] back to XML text.
//!
//! Output is byte-stable for a given tree: no indentation is added,
//! declarations come before attributes, and empty elements self-close.

use crate::document::{Document, Element, NodeId, NodeKind};

/// Serialize the whole document, without an XML declaration.
pub fn to_string(doc: &Document) -> String {
    node_to_string(doc, doc.root())
}

/// Serialize one node and its subtree exactly as stored.
pub fn node_to_string(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &[], &mut out);
    out
}

/// Serialize a node so that the result parses on its own: an element gets
/// the namespace bindings it inherits from its ancestors declared inline.
pub fn node_to_string_standalone(doc: &Document, id: NodeId) -> String {
    let mut extra = Vec::new();
    if let (Some(elem), Some(parent)) = (doc.element(id), doc.parent(id)) {
        for (prefix, uri) in doc.in_scope_namespaces(parent) {
            if !elem.namespace_declarations.iter().any(|(p, _)| *p == prefix) {
                extra.push((prefix, uri));
            }
        }
    }
    let mut out = String::new();
    write_node(doc, id, &extra, &mut out);
    out
}

/// Serialize the children of `id` one after another, each standalone.
pub fn children_to_string_standalone(doc: &Document, id: NodeId) -> String {
    doc.children(id)
        .iter()
        .map(|c| node_to_string_standalone(doc, *c))
        .collect()
}

enum Step {
    Enter(NodeId),
    Leave(NodeId),
}

fn write_node(doc: &Document, id: NodeId, extra_ns: &[(String, String)], out: &mut String) {
    let mut stack = vec![Step::Enter(id)];
    while let Some(step) = stack.pop() {
        match step {
            Step::Enter(n) => match doc.node_kind(n) {
                Some(NodeKind::Document) => {
                    stack.extend(doc.children(n).iter().rev().map(|c| Step::Enter(*c)));
                }
                Some(NodeKind::Element(elem)) => {
                    let extra = if n == id { extra_ns } else { &[] };
                    write_start_tag(elem, extra, out);
                    let children = doc.children(n);
                    if children.is_empty() {
                        out.push_str("/>");
                    } else {
                        out.push('>');
                        stack.push(Step::Leave(n));
                        stack.extend(children.iter().rev().map(|c| Step::Enter(*c)));
                    }
                }
                Some(NodeKind::Text(t)) => out.push_str(&escape_text(t)),
                Some(NodeKind::Comment(c)) => {
                    out.push_str("<!--");
                    out.push_str(c);
                    out.push_str("-->");
                }
                Some(NodeKind::ProcessingInstruction(pi)) => {
                    out.push_str("<?");
                    out.push_str(&pi.target);
                    if let Some(data) = &pi.data {
                        out.push(' ');
                        out.push_str(data);
                    }
                    out.push_str("?>");
                }
                None => {}
            },
            Step::Leave(n) => {
                if let Some(elem) = doc.element(n) {
                    out.push_str("</");
                    out.push_str(&elem.name.qualified());
                    out.push('>');
                }
            }
        }
    }
}

fn write_start_tag(elem: &Element, extra_ns: &[(String, String)], out: &mut String) {
    out.push('<');
    out.push_str(&elem.name.qualified());
    for (prefix, uri) in elem.namespace_declarations.iter().chain(extra_ns) {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        out.push_str(&escape_attr(uri));
        out.push('"');
    }
    for attr in &elem.attributes {
        out.push(' ');
        out.push_str(&attr.name.qualified());
        out.push_str("=\"");
        out.push_str(&escape_attr(&attr.value));
        out.push('"');
    }
}

/// Escape character data.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value for a double-quoted attribute.
pub fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(c),
        }
    }
    out
}
