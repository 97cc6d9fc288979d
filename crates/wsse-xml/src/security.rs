#![forbid(unsafe_code)]

//! The `wsse:Security` header and the token structures placed in it.

use base64::Engine;
use wsse_core::{ns, Error};

use crate::document::{Document, NodeId, QName};
use crate::resolve;

/// A fresh identifier of the form `<prefix>-<uuid>`.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4())
}

pub(crate) fn wsse_name(local_name: &str) -> QName {
    QName::new(ns::prefix::WSSE, local_name, ns::WSSE)
}

/// Return the existing `wsse:Security` header or append a new one to the
/// SOAP `Header`. A missing `Header` is an error.
pub fn get_or_create_security_header(doc: &mut Document) -> Result<NodeId, Error> {
    if let Some(existing) = resolve::find_security_header(doc) {
        return Ok(existing);
    }
    let header = resolve::find_header(doc)
        .ok_or_else(|| Error::MalformedInput("SOAP Header not found".into()))?;

    let security = doc.create_element(wsse_name(ns::node::SECURITY));
    doc.declare_namespace(security, ns::prefix::WSSE, ns::WSSE)?;
    doc.append_child(header, security)?;
    tracing::debug!("created wsse:Security header");
    Ok(security)
}

/// Insert a block as the first child of the Security header.
pub fn prepend_child(doc: &mut Document, security: NodeId, child: NodeId) -> Result<(), Error> {
    doc.prepend_child(security, child)
}

/// `wsse:SecurityTokenReference/wsse:Reference` pointing at the sender
/// certificate token.
pub fn build_security_token_reference(doc: &mut Document) -> Result<NodeId, Error> {
    let str_node = doc.create_element(wsse_name(ns::node::SECURITY_TOKEN_REFERENCE));
    doc.declare_namespace(str_node, ns::prefix::WSSE, ns::WSSE)?;

    let reference = doc.create_element(wsse_name(ns::node::REFERENCE));
    doc.set_attribute(
        reference,
        QName::local(ns::attr::URI),
        &format!("#{}", ns::SENDER_CERT),
    )?;
    doc.set_attribute(
        reference,
        QName::local(ns::attr::VALUE_TYPE),
        ns::X509V3_VALUE_TYPE,
    )?;
    doc.append_child(str_node, reference)?;
    Ok(str_node)
}

/// The identifier a `SecurityTokenReference` points at, without `#`.
pub fn security_token_reference_target(doc: &Document, str_node: NodeId) -> Result<String, Error> {
    if !doc.is_element(str_node, ns::node::SECURITY_TOKEN_REFERENCE, ns::WSSE) {
        return Err(Error::InvalidSecurity(
            "expected wsse:SecurityTokenReference".into(),
        ));
    }
    let reference = resolve::find_child_element(doc, str_node, ns::node::REFERENCE, ns::WSSE)
        .ok_or_else(|| Error::InvalidSecurity("SecurityTokenReference has no Reference".into()))?;
    let uri = doc
        .attribute(reference, ns::attr::URI, None)
        .map(resolve::strip_reference)
        .unwrap_or("");
    if uri.is_empty() {
        return Err(Error::InvalidSecurity("token Reference has no URI".into()));
    }
    Ok(uri.to_owned())
}

/// `wsse:BinarySecurityToken` carrying a base64 DER certificate under the
/// sender certificate identifier.
pub fn build_binary_security_token(doc: &mut Document, cert_der: &[u8]) -> Result<NodeId, Error> {
    let bst = doc.create_element(wsse_name(ns::node::BINARY_SECURITY_TOKEN));
    doc.declare_namespace(bst, ns::prefix::WSU, ns::WSU)?;
    doc.set_attribute(
        bst,
        QName::local(ns::attr::ENCODING_TYPE),
        ns::BASE64_ENCODING_TYPE,
    )?;
    doc.set_attribute(bst, QName::local(ns::attr::VALUE_TYPE), ns::X509V3_VALUE_TYPE)?;
    doc.set_attribute(
        bst,
        QName::new(ns::prefix::WSU, ns::attr::ID, ns::WSU),
        ns::SENDER_CERT,
    )?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(cert_der);
    doc.set_text(bst, &encoded)?;
    Ok(bst)
}

/// Resolve a token identifier to exactly one `wsse:BinarySecurityToken`
/// and return its decoded payload.
pub fn read_binary_security_token(doc: &Document, reference: &str) -> Result<Vec<u8>, Error> {
    let bst = resolve::find_by_id(doc, reference, true)?;
    if !doc.is_element(bst, ns::node::BINARY_SECURITY_TOKEN, ns::WSSE) {
        return Err(Error::InvalidSecurity(
            "token reference does not point at a BinarySecurityToken".into(),
        ));
    }
    decode_base64(&doc.text_content(bst))
}

/// Base64 decode, ignoring embedded whitespace and line breaks.
pub fn decode_base64(text: &str) -> Result<Vec<u8>, Error> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned)
        .map_err(|e| Error::Base64(e.to_string()))
}

pub fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}
