#![forbid(unsafe_code)]

//! Public keys carried inline as `ds:KeyValue`.

use wsse_core::{ns, Error};
use wsse_xml::document::{Document, NodeId};
use wsse_xml::{resolve, security};

use crate::key::PublicKey;

/// Parse an `RSAKeyValue` or `DSAKeyValue` inside a `ds:KeyValue` element.
pub fn parse_key_value(doc: &Document, key_value: NodeId) -> Result<PublicKey, Error> {
    if let Some(rsa_kv) = resolve::find_child_element(doc, key_value, ns::node::RSA_KEY_VALUE, ns::DSIG) {
        let n = rsa::BigUint::from_bytes_be(&crypto_binary(doc, rsa_kv, ns::node::RSA_MODULUS)?);
        let e = rsa::BigUint::from_bytes_be(&crypto_binary(doc, rsa_kv, ns::node::RSA_EXPONENT)?);
        let public = rsa::RsaPublicKey::new(n, e)
            .map_err(|err| Error::Key(format!("invalid RSA public key: {err}")))?;
        return Ok(PublicKey::Rsa(public));
    }

    if let Some(dsa_kv) = resolve::find_child_element(doc, key_value, ns::node::DSA_KEY_VALUE, ns::DSIG) {
        let big = |name: &str| -> Result<dsa::BigUint, Error> {
            Ok(dsa::BigUint::from_bytes_be(&crypto_binary(doc, dsa_kv, name)?))
        };
        let components = dsa::Components::from_components(
            big(ns::node::DSA_P)?,
            big(ns::node::DSA_Q)?,
            big(ns::node::DSA_G)?,
        )
        .map_err(|e| Error::Key(format!("invalid DSA components: {e}")))?;
        let vk = dsa::VerifyingKey::from_components(components, big(ns::node::DSA_Y)?)
            .map_err(|e| Error::Key(format!("invalid DSA public key: {e}")))?;
        return Ok(PublicKey::Dsa(vk));
    }

    Err(Error::Key("KeyValue holds no RSA or DSA key".into()))
}

fn crypto_binary(doc: &Document, parent: NodeId, name: &str) -> Result<Vec<u8>, Error> {
    let node = resolve::find_child_element(doc, parent, name, ns::DSIG)
        .ok_or_else(|| Error::Key(format!("KeyValue is missing {name}")))?;
    security::decode_base64(&doc.text_content(node))
}
