#![forbid(unsafe_code)]

//! Identifier and name based element lookup.
//!
//! All walks are iterative pre-order traversals from the document root.

use crate::document::{Document, NodeId};
use wsse_core::{ns, Error};

/// Trim a same-document reference and drop its leading `#`.
pub fn strip_reference(uri: &str) -> &str {
    let uri = uri.trim();
    uri.strip_prefix('#').unwrap_or(uri)
}

/// Identifier attributes of an element in lookup order: `wsu:Id`, `Id`,
/// then `id`.
pub fn element_ids(doc: &Document, id: NodeId) -> impl Iterator<Item = &str> {
    [
        doc.attribute(id, ns::attr::ID, Some(ns::WSU)),
        doc.attribute(id, ns::attr::ID, None),
        doc.attribute(id, ns::attr::LOWER_ID, None),
    ]
    .into_iter()
    .flatten()
}

fn has_id(doc: &Document, node: NodeId, wanted: &str) -> bool {
    element_ids(doc, node).any(|v| v == wanted)
}

/// Resolve a reference (`#x` or `x`) to the element carrying that
/// identifier.
///
/// With `check_duplicates` the whole tree is scanned and a second match
/// fails the lookup instead of returning either candidate.
pub fn find_by_id(doc: &Document, reference: &str, check_duplicates: bool) -> Result<NodeId, Error> {
    let wanted = strip_reference(reference);
    if wanted.is_empty() {
        return Err(Error::ReferenceResolution("empty reference".into()));
    }

    if !check_duplicates {
        if let Some(body) = find_body(doc) {
            if has_id(doc, body, wanted) {
                return Ok(body);
            }
        }
    }

    let mut found = None;
    for node in doc.descendants(doc.root()) {
        if doc.element(node).is_none() || !has_id(doc, node, wanted) {
            continue;
        }
        if !check_duplicates {
            return Ok(node);
        }
        if found.is_some() {
            tracing::warn!(id = wanted, "identifier appears more than once");
            return Err(Error::ReferenceResolution(format!(
                "duplicate identifier '{wanted}'"
            )));
        }
        found = Some(node);
    }

    found.ok_or_else(|| Error::ReferenceResolution(format!("identifier '{wanted}' not found")))
}

/// All elements with the given local name and namespace, in document order.
pub fn find_elements(doc: &Document, local_name: &str, namespace_uri: &str) -> Vec<NodeId> {
    if local_name == ns::node::BODY && (namespace_uri == ns::SOAP11 || namespace_uri == ns::SOAP12) {
        if let Some(body) = find_body(doc) {
            if doc.is_element(body, local_name, namespace_uri) {
                return vec![body];
            }
        }
    }
    doc.descendants(doc.root())
        .filter(|n| doc.is_element(*n, local_name, namespace_uri))
        .collect()
}

/// First element with the given name in document order.
pub fn find_element(doc: &Document, local_name: &str, namespace_uri: &str) -> Option<NodeId> {
    find_elements(doc, local_name, namespace_uri).into_iter().next()
}

pub fn find_child_element(
    doc: &Document,
    parent: NodeId,
    local_name: &str,
    namespace_uri: &str,
) -> Option<NodeId> {
    doc.children(parent)
        .iter()
        .copied()
        .find(|c| doc.is_element(*c, local_name, namespace_uri))
}

pub fn find_child_elements(
    doc: &Document,
    parent: NodeId,
    local_name: &str,
    namespace_uri: &str,
) -> Vec<NodeId> {
    doc.children(parent)
        .iter()
        .copied()
        .filter(|c| doc.is_element(*c, local_name, namespace_uri))
        .collect()
}

/// Namespace URI of the SOAP envelope (1.1 or 1.2), if the document
/// element is one.
pub fn soap_namespace(doc: &Document) -> Option<&str> {
    let env = doc.element(doc.document_element()?)?;
    if env.name.local_name != ns::node::ENVELOPE {
        return None;
    }
    match env.name.namespace_uri.as_deref() {
        Some(uri @ (ns::SOAP11 | ns::SOAP12)) => Some(uri),
        _ => None,
    }
}

fn envelope_child(doc: &Document, local_name: &str) -> Option<NodeId> {
    let soap = soap_namespace(doc)?;
    let env = doc.document_element()?;
    find_child_element(doc, env, local_name, soap)
}

/// The SOAP `Body` directly under the envelope.
pub fn find_body(doc: &Document) -> Option<NodeId> {
    envelope_child(doc, ns::node::BODY)
}

/// The SOAP `Header` directly under the envelope.
pub fn find_header(doc: &Document) -> Option<NodeId> {
    envelope_child(doc, ns::node::HEADER)
}

/// The `wsse:Security` element directly under the SOAP `Header`.
pub fn find_security_header(doc: &Document) -> Option<NodeId> {
    let header = find_header(doc)?;
    find_child_element(doc, header, ns::node::SECURITY, ns::WSSE)
}

/// Slash-separated local names from the document element down to `id`,
/// e.g. `/Envelope/Body/Ping`.
pub fn absolute_path(doc: &Document, id: NodeId) -> String {
    let mut names = Vec::new();
    let mut current = Some(id);
    while let Some(n) = current {
        if let Some(e) = doc.element(n) {
            names.push(e.name.local_name.as_str());
        }
        current = doc.parent(n);
    }
    let mut path = String::new();
    for name in names.iter().rev() {
        path.push('/');
        path.push_str(name);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = concat!(
        r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope" "#,
        r#"xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">"#,
        r#"<soap:Header><a Id="hdr"/></soap:Header>"#,
        r#"<soap:Body wsu:Id="TheBody"><ns:Ping xmlns:ns="urn:ping" id="p1">42</ns:Ping></soap:Body>"#,
        r#"</soap:Envelope>"#
    );

    #[test]
    fn test_strip_reference() {
        assert_eq!(strip_reference("#TheBody"), "TheBody");
        assert_eq!(strip_reference("  #x "), "x");
        assert_eq!(strip_reference("plain"), "plain");
    }

    #[test]
    fn test_find_by_each_id_form() {
        let doc = Document::parse(ENVELOPE).unwrap();
        let body = find_body(&doc).unwrap();
        assert_eq!(find_by_id(&doc, "#TheBody", true).unwrap(), body);
        assert_eq!(find_by_id(&doc, "TheBody", false).unwrap(), body);
        let hdr = find_by_id(&doc, "#hdr", true).unwrap();
        assert_eq!(doc.element(hdr).unwrap().name.local_name, "a");
        let ping = find_by_id(&doc, "#p1", true).unwrap();
        assert_eq!(absolute_path(&doc, ping), "/Envelope/Body/Ping");
    }

    #[test]
    fn test_missing_id() {
        let doc = Document::parse(ENVELOPE).unwrap();
        assert!(matches!(
            find_by_id(&doc, "#nope", true),
            Err(Error::ReferenceResolution(_))
        ));
        assert!(find_by_id(&doc, "#", false).is_err());
    }

    #[test]
    fn test_duplicate_id_fails_closed() {
        let xml = ENVELOPE.replace(r#"<a Id="hdr"/>"#, r#"<a wsu:Id="TheBody"/>"#);
        let doc = Document::parse(&xml).unwrap();
        assert!(find_by_id(&doc, "#TheBody", true).is_err());
        // Without detection the Body wins.
        assert_eq!(find_by_id(&doc, "#TheBody", false).unwrap(), find_body(&doc).unwrap());
    }

    #[test]
    fn test_find_elements_by_name() {
        let doc = Document::parse(ENVELOPE).unwrap();
        let bodies = find_elements(&doc, "Body", ns::SOAP12);
        assert_eq!(bodies, vec![find_body(&doc).unwrap()]);
        assert_eq!(find_elements(&doc, "Ping", "urn:ping").len(), 1);
        assert!(find_elements(&doc, "Ping", "").is_empty());
        assert!(find_security_header(&doc).is_none());
        assert_eq!(soap_namespace(&doc), Some(ns::SOAP12));
    }
}
