#![forbid(unsafe_code)]

//! Encryption of the SOAP Body content.
//!
//! Produces an `xenc:EncryptedKey` as the first child of `wsse:Security`
//! and replaces the Body children with one `xenc:EncryptedData`:
//!
//! ```text
//! <xenc:EncryptedKey Id="EK-..">
//!   <xenc:EncryptionMethod Algorithm="rsa-1_5 | rsa-oaep-mgf1p"/>
//!   <ds:KeyInfo><wsse:SecurityTokenReference/></ds:KeyInfo>
//!   <xenc:CipherData><xenc:CipherValue/></xenc:CipherData>
//!   <xenc:ReferenceList><xenc:DataReference URI="#ED-.."/></xenc:ReferenceList>
//! </xenc:EncryptedKey>
//! ```

use crate::context::{EncryptionConfig, EncryptionPart};
use wsse_core::{algorithm, ns, Error};
use wsse_crypto::{cipher, keytransport};
use wsse_keys::Certificate;
use wsse_xml::document::{Document, NodeId, QName};
use wsse_xml::{resolve, security, writer};

/// Encrypt the SOAP Body content of `doc` for the holder of `recipient`.
///
/// Returns the identifiers of the produced `EncryptedData` elements. All
/// algorithm, key and envelope checks, and all cryptography, happen before
/// the tree is modified.
pub fn encrypt(
    config: &EncryptionConfig,
    doc: &mut Document,
    recipient: &Certificate,
) -> Result<Vec<String>, Error> {
    if config.part != EncryptionPart::BodyContent {
        return Err(Error::UnsupportedAlgorithm(format!(
            "{:?} encryption; only SOAP Body content can be encrypted",
            config.part
        )));
    }
    let content_cipher = cipher::from_uri(&config.content_algorithm)?;
    let transport = keytransport::from_uri(&config.key_transport)?;
    let public_key = recipient.public_key().rsa()?;

    let body = resolve::find_body(doc)
        .ok_or_else(|| Error::MalformedInput("SOAP Body not found".into()))?;
    if resolve::find_security_header(doc).is_none() && resolve::find_header(doc).is_none() {
        return Err(Error::MalformedInput("SOAP Header not found".into()));
    }

    // GenerateKey, WrapKey
    let session_key = cipher::generate_key(content_cipher.as_ref());
    let wrapped = transport.encrypt(public_key, &session_key)?;

    let plaintext = writer::children_to_string_standalone(doc, body);
    let ciphertext = content_cipher.encrypt(&session_key, plaintext.as_bytes())?;

    // BuildEncryptedKeyElement
    let key_id = security::generate_id("EK");
    let encrypted_key = xenc(doc, ns::node::ENCRYPTED_KEY);
    doc.declare_namespace(encrypted_key, ns::prefix::XENC, ns::ENC)?;
    doc.set_attribute(encrypted_key, QName::local(ns::attr::ID), &key_id)?;
    let method = encryption_method(doc, transport.uri())?;
    doc.append_child(encrypted_key, method)?;
    let key_info = build_key_info(doc)?;
    doc.append_child(encrypted_key, key_info)?;
    let cipher_data = build_cipher_data(doc, &wrapped)?;
    doc.append_child(encrypted_key, cipher_data)?;

    // EncryptContent
    let data_id = security::generate_id("ED");
    let encrypted_data = xenc(doc, ns::node::ENCRYPTED_DATA);
    doc.declare_namespace(encrypted_data, ns::prefix::XENC, ns::ENC)?;
    doc.set_attribute(encrypted_data, QName::local(ns::attr::ID), &data_id)?;
    doc.set_attribute(
        encrypted_data,
        QName::local(ns::attr::TYPE),
        algorithm::ENC_TYPE_CONTENT,
    )?;
    let method = encryption_method(doc, content_cipher.uri())?;
    doc.append_child(encrypted_data, method)?;
    let key_info = build_key_info(doc)?;
    doc.append_child(encrypted_data, key_info)?;
    let cipher_data = build_cipher_data(doc, &ciphertext)?;
    doc.append_child(encrypted_data, cipher_data)?;

    for child in doc.children(body).to_vec() {
        doc.detach(child);
    }
    doc.append_child(body, encrypted_data)?;

    // LinkReferences
    let reference_list = xenc(doc, ns::node::REFERENCE_LIST);
    doc.append_child(encrypted_key, reference_list)?;
    let data_reference = xenc(doc, ns::node::DATA_REFERENCE);
    doc.set_attribute(
        data_reference,
        QName::local(ns::attr::URI),
        &format!("#{data_id}"),
    )?;
    doc.append_child(reference_list, data_reference)?;

    let security_header = security::get_or_create_security_header(doc)?;
    security::prepend_child(doc, security_header, encrypted_key)?;

    tracing::debug!(
        key_transport = transport.uri(),
        content = content_cipher.uri(),
        encrypted_key = %key_id,
        encrypted_data = %data_id,
        "encrypted SOAP Body content"
    );
    Ok(vec![data_id])
}

fn xenc(doc: &mut Document, local_name: &str) -> NodeId {
    doc.create_element(QName::new(ns::prefix::XENC, local_name, ns::ENC))
}

fn encryption_method(doc: &mut Document, uri: &str) -> Result<NodeId, Error> {
    let method = xenc(doc, ns::node::ENCRYPTION_METHOD);
    doc.set_attribute(method, QName::local(ns::attr::ALGORITHM), uri)?;
    Ok(method)
}

/// `ds:KeyInfo` holding the sender certificate token reference.
fn build_key_info(doc: &mut Document) -> Result<NodeId, Error> {
    let key_info = doc.create_element(QName::new(ns::prefix::DS, ns::node::KEY_INFO, ns::DSIG));
    doc.declare_namespace(key_info, ns::prefix::DS, ns::DSIG)?;
    let str_node = security::build_security_token_reference(doc)?;
    doc.append_child(key_info, str_node)?;
    Ok(key_info)
}

fn build_cipher_data(doc: &mut Document, data: &[u8]) -> Result<NodeId, Error> {
    let cipher_data = xenc(doc, ns::node::CIPHER_DATA);
    let cipher_value = xenc(doc, ns::node::CIPHER_VALUE);
    doc.set_text(cipher_value, &security::encode_base64(data))?;
    doc.append_child(cipher_data, cipher_value)?;
    Ok(cipher_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wsse_core::ErrorKind;
    use wsse_keys::loader;

    const ENVELOPE: &str = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Header/><soap:Body id="TheBody"><ns:Ping xmlns:ns="urn:example:ping">42</ns:Ping></soap:Body></soap:Envelope>"#;

    fn rsa_cert() -> Certificate {
        loader::load_certificate(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../test-data/rsa-cert.pem"
        )))
        .unwrap()
    }

    fn first_block(doc: &Document) -> NodeId {
        let security_header = resolve::find_security_header(doc).unwrap();
        doc.first_element_child(security_header).unwrap()
    }

    #[test]
    fn test_encrypted_structure() {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        let ids = encrypt(&EncryptionConfig::default(), &mut doc, &rsa_cert()).unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids[0].starts_with("ED-"));

        assert_eq!(resolve::find_elements(&doc, ns::node::ENCRYPTED_KEY, ns::ENC).len(), 1);
        assert_eq!(resolve::find_elements(&doc, ns::node::DATA_REFERENCE, ns::ENC).len(), 1);
        assert_eq!(resolve::find_elements(&doc, ns::node::ENCRYPTED_DATA, ns::ENC).len(), 1);
        assert!(resolve::find_element(&doc, "Ping", "urn:example:ping").is_none());

        let body = resolve::find_body(&doc).unwrap();
        let body_children = doc.children(body).to_vec();
        assert_eq!(body_children.len(), 1);
        assert!(doc.is_element(body_children[0], ns::node::ENCRYPTED_DATA, ns::ENC));
        assert_eq!(
            doc.attribute(body_children[0], ns::attr::TYPE, None),
            Some(algorithm::ENC_TYPE_CONTENT)
        );
        assert_eq!(doc.attribute(body, "id", None), Some("TheBody"));

        let data_ref = resolve::find_element(&doc, ns::node::DATA_REFERENCE, ns::ENC).unwrap();
        assert_eq!(
            doc.attribute(data_ref, ns::attr::URI, None),
            Some(format!("#{}", ids[0]).as_str())
        );

        for block in [first_block(&doc), body_children[0]] {
            assert!(resolve::find_child_element(&doc, block, ns::node::KEY_INFO, ns::DSIG).is_some());
            assert!(resolve::find_child_element(&doc, block, ns::node::CIPHER_DATA, ns::ENC).is_some());
        }

        let first = first_block(&doc);
        assert!(doc.is_element(first, ns::node::ENCRYPTED_KEY, ns::ENC));
        assert!(doc
            .attribute(first, ns::attr::ID, None)
            .is_some_and(|id| id.starts_with("EK-")));
    }

    #[test]
    fn test_prepends_before_existing_blocks() {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        let security_header = security::get_or_create_security_header(&mut doc).unwrap();
        let bst = security::build_binary_security_token(&mut doc, rsa_cert().der()).unwrap();
        doc.append_child(security_header, bst).unwrap();

        encrypt(&EncryptionConfig::default(), &mut doc, &rsa_cert()).unwrap();
        let children = doc.element_children(security_header);
        assert_eq!(children.len(), 2);
        assert!(doc.is_element(children[0], ns::node::ENCRYPTED_KEY, ns::ENC));
        assert_eq!(children[1], bst);
    }

    #[test]
    fn test_unsupported_content_algorithm() {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        let config = EncryptionConfig::new(algorithm::RSA_PKCS1, "urn:example:rot13");
        let err = encrypt(&config, &mut doc, &rsa_cert()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
        assert!(resolve::find_security_header(&doc).is_none());
        assert_eq!(writer::to_string(&doc), ENVELOPE);
    }

    #[test]
    fn test_unsupported_key_transport() {
        let mut doc = Document::parse(ENVELOPE).unwrap();
        let config = EncryptionConfig::new("urn:example:kw", algorithm::AES128_CBC);
        let err = encrypt(&config, &mut doc, &rsa_cert()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
        assert_eq!(writer::to_string(&doc), ENVELOPE);
    }

    #[test]
    fn test_element_and_header_parts_rejected() {
        for part in [EncryptionPart::BodyElement, EncryptionPart::Header] {
            let mut doc = Document::parse(ENVELOPE).unwrap();
            let config = EncryptionConfig {
                part,
                ..EncryptionConfig::default()
            };
            let err = encrypt(&config, &mut doc, &rsa_cert()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedAlgorithm);
            assert_eq!(writer::to_string(&doc), ENVELOPE);
        }
    }

    #[test]
    fn test_dsa_recipient_rejected() {
        let cert = loader::load_certificate(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../../test-data/dsa-cert.pem"
        )))
        .unwrap();
        let mut doc = Document::parse(ENVELOPE).unwrap();
        assert!(encrypt(&EncryptionConfig::default(), &mut doc, &cert).is_err());
        assert_eq!(writer::to_string(&doc), ENVELOPE);
    }

    #[test]
    fn test_missing_header() {
        let xml = r#"<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"><soap:Body id="b"><x/></soap:Body></soap:Envelope>"#;
        let mut doc = Document::parse(xml).unwrap();
        let err = encrypt(&EncryptionConfig::default(), &mut doc, &rsa_cert()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert_eq!(writer::to_string(&doc), xml);
    }
}
