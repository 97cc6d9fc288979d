#![forbid(unsafe_code)]

//! Signature verification.
//!
//! Every failure, from a missing token to a digest mismatch, is reported as
//! the same `invalid signature` error. The specific cause is only logged.

use wsse_c14n::C14nMode;
use wsse_core::{ns, Error};
use wsse_crypto::digest;
use wsse_keys::keyvalue::parse_key_value;
use wsse_keys::{Certificate, PublicKey};
use wsse_xml::document::{Document, NodeId};
use wsse_xml::{resolve, security};

/// What a successful verification established.
#[derive(Debug, Clone)]
pub struct VerifiedSignature {
    /// SignatureMethod URI.
    pub signature_method: String,
    /// Certificate taken from the BinarySecurityToken, `None` when the key
    /// came from an inline `KeyValue`.
    pub certificate: Option<Certificate>,
    /// Elements covered by the signature's references, in order.
    pub references: Vec<NodeId>,
}

impl VerifiedSignature {
    /// Whether `node` is one of the signed elements.
    pub fn covers(&self, node: NodeId) -> bool {
        self.references.contains(&node)
    }
}

/// Verify the signature in the Security header of `doc`.
pub fn verify(doc: &Document) -> Result<VerifiedSignature, Error> {
    check_signature(doc).map_err(|e| {
        tracing::debug!(cause = %e, "signature verification failed");
        Error::invalid_signature()
    })
}

fn check_signature(doc: &Document) -> Result<VerifiedSignature, Error> {
    // SignatureLocated
    let security_header = resolve::find_security_header(doc)
        .ok_or_else(|| Error::InvalidSecurity("no Security header".into()))?;
    let signatures = resolve::find_child_elements(doc, security_header, ns::node::SIGNATURE, ns::DSIG);
    let signature = match signatures.as_slice() {
        [] => return Err(Error::InvalidSecurity("no signature present".into())),
        [only] => *only,
        _ => {
            return Err(Error::InvalidSecurity(format!(
                "{} signatures present",
                signatures.len()
            )))
        }
    };

    let signed_info = required_child(doc, signature, ns::node::SIGNED_INFO)?;
    let c14n_method = required_child(doc, signed_info, ns::node::CANONICALIZATION_METHOD)?;
    let c14n_mode = c14n_mode(doc, c14n_method)?;
    let signed_info_prefixes = read_inclusive_prefixes(doc, c14n_method);

    let sig_method = required_child(doc, signed_info, ns::node::SIGNATURE_METHOD)?;
    let sig_method_uri = algorithm_of(doc, sig_method)?;
    let sig_alg = wsse_crypto::sign::from_uri(sig_method_uri)?;

    // TokenDereferenced, CertificateExtracted
    let key_info = required_child(doc, signature, ns::node::KEY_INFO)?;
    let (public_key, certificate) = resolve_key(doc, key_info)?;

    let references = resolve::find_child_elements(doc, signed_info, ns::node::REFERENCE, ns::DSIG);
    if references.is_empty() {
        return Err(Error::InvalidSecurity("SignedInfo has no Reference".into()));
    }
    let mut covered = Vec::with_capacity(references.len());
    for reference in references {
        covered.push(verify_reference(doc, reference)?);
    }
    let body = resolve::find_body(doc)
        .ok_or_else(|| Error::MalformedInput("SOAP Body not found".into()))?;
    if !covered.contains(&body) {
        return Err(Error::InvalidSecurity("SOAP Body is not signed".into()));
    }

    // Checked
    let canonical = wsse_c14n::canonicalize(doc, signed_info, c14n_mode, &signed_info_prefixes)?;
    let value_node = required_child(doc, signature, ns::node::SIGNATURE_VALUE)?;
    let value = security::decode_base64(&doc.text_content(value_node))?;
    if !sig_alg.verify(&public_key.to_verifying_key(), &canonical, &value)? {
        return Err(Error::InvalidSecurity("signature value mismatch".into()));
    }

    tracing::debug!(algorithm = sig_method_uri, "signature verified");
    Ok(VerifiedSignature {
        signature_method: sig_method_uri.to_owned(),
        certificate,
        references: covered,
    })
}

/// The key to check the signature with: the certificate behind the
/// SecurityTokenReference, or an inline `KeyValue` when there is no
/// token reference.
fn resolve_key(doc: &Document, key_info: NodeId) -> Result<(PublicKey, Option<Certificate>), Error> {
    if let Some(str_node) =
        resolve::find_child_element(doc, key_info, ns::node::SECURITY_TOKEN_REFERENCE, ns::WSSE)
    {
        let target = security::security_token_reference_target(doc, str_node)?;
        let der = security::read_binary_security_token(doc, &target)?;
        let certificate = Certificate::from_der(&der)?;
        tracing::debug!(subject = certificate.subject(), "signer certificate from token");
        return Ok((certificate.public_key().clone(), Some(certificate)));
    }

    if let Some(key_value) = resolve::find_child_element(doc, key_info, ns::node::KEY_VALUE, ns::DSIG) {
        let key = parse_key_value(doc, key_value)?;
        tracing::debug!(algorithm = key.algorithm_name(), "signer key from KeyValue");
        return Ok((key, None));
    }

    Err(Error::InvalidSecurity(
        "KeyInfo holds neither a token reference nor a key".into(),
    ))
}

/// Recompute one Reference digest and return the element it covers.
fn verify_reference(doc: &Document, reference: NodeId) -> Result<NodeId, Error> {
    let uri = doc.attribute(reference, ns::attr::URI, None).unwrap_or("");
    if !uri.trim_start().starts_with('#') {
        return Err(Error::ReferenceResolution(format!(
            "unsupported reference URI '{uri}'"
        )));
    }
    let target = resolve::find_by_id(doc, uri, true)?;

    let transforms = resolve::find_child_element(doc, reference, ns::node::TRANSFORMS, ns::DSIG)
        .map(|t| resolve::find_child_elements(doc, t, ns::node::TRANSFORM, ns::DSIG))
        .unwrap_or_default();
    let transform = match transforms.as_slice() {
        [only] => *only,
        _ => {
            return Err(Error::UnsupportedAlgorithm(format!(
                "{} transforms on reference '{uri}'",
                transforms.len()
            )))
        }
    };
    let mode = c14n_mode(doc, transform)?;
    let prefixes = read_inclusive_prefixes(doc, transform);

    let digest_method = required_child(doc, reference, ns::node::DIGEST_METHOD)?;
    let digest_uri = algorithm_of(doc, digest_method)?;
    let digest_node = required_child(doc, reference, ns::node::DIGEST_VALUE)?;
    let expected = security::decode_base64(&doc.text_content(digest_node))?;

    let canonical = wsse_c14n::canonicalize(doc, target, mode, &prefixes)?;
    let computed = digest::digest(digest_uri, &canonical)?;
    if computed != expected {
        tracing::debug!(
            reference = uri,
            expected = %hex::encode(&expected),
            computed = %hex::encode(&computed),
            "digest mismatch"
        );
        return Err(Error::InvalidSecurity(format!("digest mismatch for '{uri}'")));
    }
    Ok(target)
}

fn c14n_mode(doc: &Document, method: NodeId) -> Result<C14nMode, Error> {
    let uri = algorithm_of(doc, method)?;
    C14nMode::from_uri(uri).ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {uri}")))
}

fn algorithm_of(doc: &Document, node: NodeId) -> Result<&str, Error> {
    doc.attribute(node, ns::attr::ALGORITHM, None)
        .ok_or_else(|| Error::InvalidSecurity("Algorithm attribute missing".into()))
}

fn required_child(doc: &Document, parent: NodeId, local_name: &str) -> Result<NodeId, Error> {
    resolve::find_child_element(doc, parent, local_name, ns::DSIG)
        .ok_or_else(|| Error::InvalidSecurity(format!("{local_name} missing")))
}

fn read_inclusive_prefixes(doc: &Document, method: NodeId) -> Vec<String> {
    resolve::find_child_element(doc, method, ns::node::INCLUSIVE_NAMESPACES, ns::EXC_C14N)
        .and_then(|n| doc.attribute(n, ns::attr::PREFIX_LIST, None))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sign, DsigContext};
    use rsa::traits::PublicKeyParts;
    use wsse_core::ErrorKind;
    use wsse_keys::{loader, CryptoContext};
    use wsse_xml::document::QName;
    use wsse_xml::writer;

    const ENVELOPE: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Header/><soap:Body id="TheBody"><ns:Ping xmlns:ns="urn:example:ping">42</ns:Ping></soap:Body></soap:Envelope>"#;

    fn context(cert: &[u8], key: &[u8]) -> CryptoContext {
        CryptoContext::from_certificate(loader::load_certificate(cert).unwrap())
            .with_private_key(loader::load_private_key(key).unwrap())
    }

    fn rsa_context() -> CryptoContext {
        context(
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/rsa-cert.pem")),
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/rsa-key.pem")),
        )
    }

    fn dsa_context() -> CryptoContext {
        context(
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/dsa-cert.pem")),
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/dsa-key.pem")),
        )
    }

    fn signed(ctx: &CryptoContext) -> Document {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        sign(&DsigContext::default(), &mut doc, ctx).unwrap();
        doc
    }

    fn assert_invalid(result: Result<VerifiedSignature, Error>) {
        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSecurity);
        assert_eq!(err.to_string(), Error::invalid_signature().to_string());
    }

    #[test]
    fn test_rsa_roundtrip() {
        let doc = signed(&rsa_context());
        let verified = verify(&doc).unwrap();
        assert_eq!(verified.signature_method, wsse_core::algorithm::RSA_SHA1);
        assert!(verified.covers(resolve::find_body(&doc).unwrap()));
        assert_eq!(verified.certificate.unwrap().subject(), rsa_context().certificate.subject());
    }

    #[test]
    fn test_dsa_roundtrip() {
        let doc = signed(&dsa_context());
        let verified = verify(&doc).unwrap();
        assert_eq!(verified.signature_method, wsse_core::algorithm::DSA_SHA1);
    }

    #[test]
    fn test_serialized_roundtrip() {
        let doc = signed(&rsa_context());
        let reparsed = Document::parse(&writer::to_string(&doc)).unwrap();
        assert!(verify(&reparsed).is_ok());
    }

    #[test]
    fn test_flipped_digest_value() {
        let xml = writer::to_string(&signed(&rsa_context()));
        let marker = "<ds:DigestValue>";
        let pos = xml.find(marker).unwrap() + marker.len();
        let original = &xml[pos..pos + 1];
        let replacement = if original == "A" { "B" } else { "A" };
        let tampered = format!("{}{}{}", &xml[..pos], replacement, &xml[pos + 1..]);

        let doc = Document::parse(&tampered).unwrap();
        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_tampered_body() {
        let mut doc = signed(&rsa_context());
        let ping = resolve::find_element(&doc, "Ping", "urn:example:ping").unwrap();
        doc.set_text(ping, "43").unwrap();
        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_no_signature() {
        let doc = Document::parse(ENVELOPE).unwrap();
        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_duplicate_body_id() {
        let mut doc = signed(&rsa_context());
        let header = resolve::find_header(&doc).unwrap();
        let decoy = doc.create_element(QName::local("Decoy"));
        doc.set_attribute(decoy, QName::local("id"), "TheBody").unwrap();
        doc.append_child(header, decoy).unwrap();
        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_duplicate_token_id() {
        let ctx = rsa_context();
        let mut doc = signed(&ctx);
        let security = resolve::find_security_header(&doc).unwrap();
        let second = security::build_binary_security_token(&mut doc, ctx.certificate.der()).unwrap();
        doc.append_child(security, second).unwrap();
        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_body_moved_into_header() {
        let mut doc = signed(&rsa_context());
        let header = resolve::find_header(&doc).unwrap();
        let body = resolve::find_body(&doc).unwrap();
        let envelope = doc.parent(body).unwrap();

        let wrapper = doc.create_element(QName::local("Wrapper"));
        doc.append_child(header, wrapper).unwrap();
        doc.detach(body);
        doc.append_child(wrapper, body).unwrap();

        let forged = r#"<soap:Body id="Forged"><ns:Ping xmlns:ns="urn:example:ping">9999</ns:Ping></soap:Body>"#;
        for node in doc.parse_fragment(envelope, forged).unwrap() {
            doc.append_child(envelope, node).unwrap();
        }
        assert_eq!(doc.attribute(resolve::find_body(&doc).unwrap(), "id", None), Some("Forged"));

        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_signature_outside_security_header() {
        let mut doc = signed(&rsa_context());
        let security_header = resolve::find_security_header(&doc).unwrap();
        let signature = doc.first_element_child(security_header).unwrap();
        let header = resolve::find_header(&doc).unwrap();
        doc.detach(signature);
        doc.append_child(header, signature).unwrap();
        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_payload_signature_ignored() {
        let xml = ENVELOPE.replace(
            ">42<",
            r#"><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"/>42<"#,
        );
        let mut doc = Document::parse(&xml).unwrap();
        sign(&DsigContext::default(), &mut doc, &rsa_context()).unwrap();
        assert_eq!(resolve::find_elements(&doc, ns::node::SIGNATURE, ns::DSIG).len(), 2);
        assert!(verify(&doc).is_ok());
    }

    #[test]
    fn test_certificate_key_mismatch() {
        let ctx = context(
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/other-rsa-cert.pem")),
            include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/rsa-key.pem")),
        );
        let doc = signed(&ctx);
        assert_invalid(verify(&doc));
    }

    #[test]
    fn test_key_value_fallback() {
        let ctx = rsa_context();
        let mut doc = signed(&ctx);
        let PublicKey::Rsa(public) = &ctx.public_key else {
            panic!("expected an RSA key");
        };

        let key_info = resolve::find_element(&doc, ns::node::KEY_INFO, ns::DSIG).unwrap();
        let str_node = doc.first_element_child(key_info).unwrap();
        doc.detach(str_node);
        let fragment = format!(
            "<ds:KeyValue><ds:RSAKeyValue><ds:Modulus>{}</ds:Modulus><ds:Exponent>{}</ds:Exponent></ds:RSAKeyValue></ds:KeyValue>",
            security::encode_base64(&public.n().to_bytes_be()),
            security::encode_base64(&public.e().to_bytes_be()),
        );
        let nodes = doc.parse_fragment(key_info, &fragment).unwrap();
        for node in nodes {
            doc.append_child(key_info, node).unwrap();
        }

        let verified = verify(&doc).unwrap();
        assert!(verified.certificate.is_none());
    }

    #[test]
    fn test_empty_key_info() {
        let mut doc = signed(&rsa_context());
        let key_info = resolve::find_element(&doc, ns::node::KEY_INFO, ns::DSIG).unwrap();
        let str_node = doc.first_element_child(key_info).unwrap();
        doc.detach(str_node);
        assert_invalid(verify(&doc));
    }
}
