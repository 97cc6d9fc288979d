#![forbid(unsafe_code)]

//! Signature creation.
//!
//! Produces, inside `wsse:Security`:
//!
//! ```text
//! <ds:Signature>
//!   <ds:SignedInfo>
//!     <ds:CanonicalizationMethod Algorithm="exc-c14n"><ec:InclusiveNamespaces/></..>
//!     <ds:SignatureMethod Algorithm="rsa-sha1 | dsa-sha1"/>
//!     <ds:Reference URI="#<body id>">
//!       <ds:Transforms><ds:Transform Algorithm="exc-c14n">..</ds:Transform></ds:Transforms>
//!       <ds:DigestMethod/><ds:DigestValue/>
//!     </ds:Reference>
//!   </ds:SignedInfo>
//!   <ds:SignatureValue/>
//!   <ds:KeyInfo><wsse:SecurityTokenReference/></ds:KeyInfo>
//! </ds:Signature>
//! ```

use crate::context::DsigContext;
use wsse_c14n::inclusive_prefixes;
use wsse_core::{ns, Error};
use wsse_crypto::digest;
use wsse_keys::CryptoContext;
use wsse_xml::document::{Document, NodeId, QName};
use wsse_xml::{resolve, security};

/// Sign the SOAP Body of `doc` with the credentials in `crypto`.
///
/// Every precondition is checked before the tree is touched, so a failure
/// leaves the envelope as it was.
pub fn sign(ctx: &DsigContext, doc: &mut Document, crypto: &CryptoContext) -> Result<(), Error> {
    let signature_method = crypto.public_key.signature_algorithm();
    let sig_alg = wsse_crypto::sign::from_uri(signature_method)?;
    let signing_key = crypto.private_key()?.to_signing_key();
    digest::from_uri(&ctx.digest_method)?;

    let body = resolve::find_body(doc)
        .ok_or_else(|| Error::MalformedInput("SOAP Body not found".into()))?;
    let body_id = resolve::element_ids(doc, body)
        .next()
        .map(str::to_owned)
        .ok_or_else(|| Error::MalformedInput("SOAP Body carries no identifier".into()))?;
    if resolve::find_by_id(doc, &body_id, true)? != body {
        return Err(Error::ReferenceResolution(format!(
            "identifier '{body_id}' does not name the SOAP Body"
        )));
    }
    if resolve::find_security_header(doc).is_none() && resolve::find_header(doc).is_none() {
        return Err(Error::MalformedInput("SOAP Header not found".into()));
    }

    // A token already under the sender identifier is reused only when it is
    // the one BinarySecurityToken by that name and holds this certificate.
    let token_present = resolve::find_by_id(doc, ns::SENDER_CERT, false).is_ok();
    if token_present && security::read_binary_security_token(doc, ns::SENDER_CERT)? != crypto.certificate.der() {
        return Err(Error::InvalidSecurity(
            "sender token holds a different certificate".into(),
        ));
    }

    // The Body subtree is not changed by anything below, so its digest can
    // be taken up front.
    let body_prefixes = inclusive_prefixes(doc, body);
    let canonical_body = wsse_c14n::canonicalize(doc, body, ctx.canonicalization, &body_prefixes)?;
    let body_digest = digest::digest(&ctx.digest_method, &canonical_body)?;
    tracing::debug!(
        reference = %body_id,
        digest = %hex::encode(&body_digest),
        "computed Body digest"
    );

    // HeaderPrepared
    let security_existed = resolve::find_security_header(doc).is_some();
    let security = security::get_or_create_security_header(doc)?;

    // TokenEmbedded
    let token = if token_present {
        tracing::debug!("sender certificate token already present");
        None
    } else {
        let bst = security::build_binary_security_token(doc, crypto.certificate.der())?;
        doc.append_child(security, bst)?;
        Some(bst)
    };

    // SignedInfoBuilt, then Signed
    let signature = build_signature(
        ctx,
        doc,
        signature_method,
        &body_id,
        &body_prefixes,
        &security::encode_base64(&body_digest),
    )?;
    security::prepend_child(doc, security, signature)?;

    let outcome = (|| -> Result<(), Error> {
        let signed_info = child(doc, signature, ns::node::SIGNED_INFO)?;
        let method = child(doc, signed_info, ns::node::CANONICALIZATION_METHOD)?;
        let prefixes = inclusive_prefixes(doc, signed_info);
        write_prefix_list(doc, method, &prefixes)?;

        let canonical = wsse_c14n::canonicalize(doc, signed_info, ctx.canonicalization, &prefixes)?;
        let value = sig_alg.sign(&signing_key, &canonical)?;
        let value_node = child(doc, signature, ns::node::SIGNATURE_VALUE)?;
        doc.set_text(value_node, &security::encode_base64(&value))
    })();

    if let Err(e) = outcome {
        doc.detach(signature);
        if let Some(bst) = token {
            doc.detach(bst);
        }
        if !security_existed {
            doc.detach(security);
        }
        return Err(e);
    }

    tracing::debug!(
        algorithm = signature_method,
        subject = crypto.certificate.subject(),
        "signed SOAP Body"
    );
    Ok(())
}

fn ds(doc: &mut Document, local_name: &str) -> NodeId {
    doc.create_element(QName::new(ns::prefix::DS, local_name, ns::DSIG))
}

fn ds_with_algorithm(doc: &mut Document, local_name: &str, uri: &str) -> Result<NodeId, Error> {
    let node = ds(doc, local_name);
    doc.set_attribute(node, QName::local(ns::attr::ALGORITHM), uri)?;
    Ok(node)
}

fn build_signature(
    ctx: &DsigContext,
    doc: &mut Document,
    signature_method: &str,
    body_id: &str,
    body_prefixes: &[String],
    digest_value: &str,
) -> Result<NodeId, Error> {
    let c14n_uri = ctx.canonicalization.uri();

    let signature = ds(doc, ns::node::SIGNATURE);
    doc.declare_namespace(signature, ns::prefix::DS, ns::DSIG)?;

    let signed_info = ds(doc, ns::node::SIGNED_INFO);
    doc.append_child(signature, signed_info)?;

    let c14n_method = ds_with_algorithm(doc, ns::node::CANONICALIZATION_METHOD, c14n_uri)?;
    doc.append_child(signed_info, c14n_method)?;
    let method_ns = inclusive_namespaces(doc)?;
    doc.append_child(c14n_method, method_ns)?;

    let sig_method = ds_with_algorithm(doc, ns::node::SIGNATURE_METHOD, signature_method)?;
    doc.append_child(signed_info, sig_method)?;

    let reference = ds(doc, ns::node::REFERENCE);
    doc.set_attribute(reference, QName::local(ns::attr::URI), &format!("#{body_id}"))?;
    doc.append_child(signed_info, reference)?;

    let transforms = ds(doc, ns::node::TRANSFORMS);
    doc.append_child(reference, transforms)?;
    let transform = ds_with_algorithm(doc, ns::node::TRANSFORM, c14n_uri)?;
    doc.append_child(transforms, transform)?;
    let transform_ns = inclusive_namespaces(doc)?;
    doc.append_child(transform, transform_ns)?;
    write_prefix_list(doc, transform, body_prefixes)?;

    let digest_method = ds_with_algorithm(doc, ns::node::DIGEST_METHOD, &ctx.digest_method)?;
    doc.append_child(reference, digest_method)?;
    let digest_node = ds(doc, ns::node::DIGEST_VALUE);
    doc.set_text(digest_node, digest_value)?;
    doc.append_child(reference, digest_node)?;

    let value = ds(doc, ns::node::SIGNATURE_VALUE);
    doc.append_child(signature, value)?;

    let key_info = ds(doc, ns::node::KEY_INFO);
    doc.append_child(signature, key_info)?;
    let str_node = security::build_security_token_reference(doc)?;
    doc.append_child(key_info, str_node)?;

    Ok(signature)
}

fn inclusive_namespaces(doc: &mut Document) -> Result<NodeId, Error> {
    let node = doc.create_element(QName::new(
        ns::prefix::EC,
        ns::node::INCLUSIVE_NAMESPACES,
        ns::EXC_C14N,
    ));
    doc.declare_namespace(node, ns::prefix::EC, ns::EXC_C14N)?;
    Ok(node)
}

/// Set `PrefixList` on the `InclusiveNamespaces` child of `method`.
fn write_prefix_list(doc: &mut Document, method: NodeId, prefixes: &[String]) -> Result<(), Error> {
    let list = resolve::find_child_element(doc, method, ns::node::INCLUSIVE_NAMESPACES, ns::EXC_C14N)
        .ok_or_else(|| Error::MalformedInput("InclusiveNamespaces missing".into()))?;
    doc.set_attribute(list, QName::local(ns::attr::PREFIX_LIST), &prefixes.join(" "))
}

fn child(doc: &Document, parent: NodeId, local_name: &str) -> Result<NodeId, Error> {
    resolve::find_child_element(doc, parent, local_name, ns::DSIG)
        .ok_or_else(|| Error::MalformedInput(format!("{local_name} missing")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsse_core::{algorithm, ErrorKind};
    use wsse_keys::loader;
    use wsse_xml::writer;

    const ENVELOPE: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Header/><soap:Body id="TheBody"><ns:Ping xmlns:ns="urn:example:ping">42</ns:Ping></soap:Body></soap:Envelope>"#;

    fn rsa_context() -> CryptoContext {
        let cert = loader::load_certificate(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../test-data/rsa-cert.pem"
        )))
        .unwrap();
        let key = loader::load_private_key(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../test-data/rsa-key.pem"
        )))
        .unwrap();
        CryptoContext::from_certificate(cert).with_private_key(key)
    }

    #[test]
    fn test_signature_structure() {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        sign(&DsigContext::default(), &mut doc, &rsa_context()).unwrap();

        let security = resolve::find_security_header(&doc).unwrap();
        let children = doc.element_children(security);
        assert_eq!(children.len(), 2);
        assert!(doc.is_element(children[0], ns::node::SIGNATURE, ns::DSIG));
        assert!(doc.is_element(children[1], ns::node::BINARY_SECURITY_TOKEN, ns::WSSE));

        let reference = resolve::find_element(&doc, ns::node::REFERENCE, ns::DSIG).unwrap();
        assert_eq!(doc.attribute(reference, ns::attr::URI, None), Some("#TheBody"));
        let method = resolve::find_element(&doc, ns::node::SIGNATURE_METHOD, ns::DSIG).unwrap();
        assert_eq!(
            doc.attribute(method, ns::attr::ALGORITHM, None),
            Some(algorithm::RSA_SHA1)
        );
        let value = resolve::find_element(&doc, ns::node::SIGNATURE_VALUE, ns::DSIG).unwrap();
        assert!(!doc.text_content(value).is_empty());

        let xml = writer::to_string(&doc);
        assert!(xml.contains(&format!(r##"URI="#{}""##, ns::SENDER_CERT)));
        assert!(xml.contains(r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#">"#));
    }

    #[test]
    fn test_prefix_lists() {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        sign(&DsigContext::default(), &mut doc, &rsa_context()).unwrap();

        let lists = resolve::find_elements(&doc, ns::node::INCLUSIVE_NAMESPACES, ns::EXC_C14N);
        assert_eq!(lists.len(), 2);
        // SignedInfo sits under Signature, Security, Header and Envelope.
        assert_eq!(
            doc.attribute(lists[0], ns::attr::PREFIX_LIST, None),
            Some("ds soap wsse")
        );
        assert_eq!(doc.attribute(lists[1], ns::attr::PREFIX_LIST, None), Some("soap"));
    }

    #[test]
    fn test_existing_token_reused() {
        let ctx = rsa_context();
        let mut doc = Document::parse(ENVELOPE).unwrap();
        let security = security::get_or_create_security_header(&mut doc).unwrap();
        let bst = security::build_binary_security_token(&mut doc, ctx.certificate.der()).unwrap();
        doc.append_child(security, bst).unwrap();

        sign(&DsigContext::default(), &mut doc, &ctx).unwrap();
        let tokens = resolve::find_elements(&doc, ns::node::BINARY_SECURITY_TOKEN, ns::WSSE);
        assert_eq!(tokens.len(), 1);
    }

    fn with_token(cert_der: &[u8], copies: usize) -> Document {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        let security = security::get_or_create_security_header(&mut doc).unwrap();
        for _ in 0..copies {
            let bst = security::build_binary_security_token(&mut doc, cert_der).unwrap();
            doc.append_child(security, bst).unwrap();
        }
        doc
    }

    #[test]
    fn test_foreign_token_rejected() {
        let other = loader::load_certificate(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../test-data/other-rsa-cert.pem"
        )))
        .unwrap();
        let mut doc = with_token(other.der(), 1);
        let before = writer::to_string(&doc);
        let err = sign(&DsigContext::default(), &mut doc, &rsa_context()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSecurity);
        assert_eq!(writer::to_string(&doc), before);
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let ctx = rsa_context();
        let mut doc = with_token(ctx.certificate.der(), 2);
        let before = writer::to_string(&doc);
        let err = sign(&DsigContext::default(), &mut doc, &ctx).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferenceResolutionFailure);
        assert_eq!(writer::to_string(&doc), before);
    }

    #[test]
    fn test_non_token_sender_id_rejected() {
        let xml = ENVELOPE.replace(
            "<soap:Header/>",
            &format!(r#"<soap:Header><x Id="{}"/></soap:Header>"#, ns::SENDER_CERT),
        );
        let mut doc = Document::parse(&xml).unwrap();
        assert!(sign(&DsigContext::default(), &mut doc, &rsa_context()).is_err());
        assert_eq!(writer::to_string(&doc), xml);
    }

    #[test]
    fn test_missing_header_leaves_tree_untouched() {
        let xml = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body id="b"><x/></soap:Body></soap:Envelope>"#;
        let mut doc = Document::parse(xml).unwrap();
        let err = sign(&DsigContext::default(), &mut doc, &rsa_context()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(writer::to_string(&doc), xml);
    }

    #[test]
    fn test_missing_body_id() {
        let xml = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Header/><soap:Body><x/></soap:Body></soap:Envelope>"#;
        let mut doc = Document::parse(xml).unwrap();
        let err = sign(&DsigContext::default(), &mut doc, &rsa_context()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(resolve::find_security_header(&doc).is_none());
    }

    #[test]
    fn test_missing_private_key() {
        let ctx = CryptoContext::from_certificate(rsa_context().certificate);
        let mut doc = Document::parse(ENVELOPE).unwrap();
        assert!(sign(&DsigContext::default(), &mut doc, &ctx).is_err());
        assert!(resolve::find_security_header(&doc).is_none());
    }

    #[test]
    fn test_unsupported_digest() {
        let ctx = DsigContext::default().with_digest_method("urn:example:md5");
        let mut doc = Document::parse(ENVELOPE).unwrap();
        let err = sign(&ctx, &mut doc, &rsa_context()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
        assert!(resolve::find_security_header(&doc).is_none());
    }

    #[test]
    fn test_duplicate_body_id_rejected() {
        let xml = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Header><x id="TheBody"/></soap:Header><soap:Body id="TheBody"><y/></soap:Body></soap:Envelope>"#;
        let mut doc = Document::parse(xml).unwrap();
        let err = sign(&DsigContext::default(), &mut doc, &rsa_context()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferenceResolutionFailure);
        assert_eq!(writer::to_string(&doc), xml);
    }
}
