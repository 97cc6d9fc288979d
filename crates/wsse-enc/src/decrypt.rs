#![forbid(unsafe_code)]

//! Decryption of the parts listed by an `xenc:EncryptedKey`.

use wsse_core::{algorithm, ns, Error};
use wsse_crypto::{cipher, keytransport};
use wsse_keys::CryptoContext;
use wsse_xml::document::{Document, NodeId};
use wsse_xml::{resolve, security};

/// One decrypted reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRef {
    /// Identifier the `DataReference` pointed at, without `#`.
    pub id: String,
    /// Content encryption URI.
    pub algorithm: String,
    /// Whether element content (rather than a whole element) was encrypted.
    pub content: bool,
    /// The decrypted node now in the tree.
    pub node: Option<NodeId>,
    /// Absolute path of `node`, e.g. `/Envelope/Body/Ping`.
    pub path: Option<String>,
}

/// Decrypt everything referenced by the first `EncryptedKey` in the
/// Security header, using the private key in `recipient`.
///
/// An envelope without an `EncryptedKey` is not an error: the result is
/// empty.
pub fn decrypt(doc: &mut Document, recipient: &CryptoContext) -> Result<Vec<DataRef>, Error> {
    // LocateEncryptedKey
    let Some(security_header) = resolve::find_security_header(doc) else {
        return Ok(Vec::new());
    };
    let Some(encrypted_key) =
        resolve::find_child_element(doc, security_header, ns::node::ENCRYPTED_KEY, ns::ENC)
    else {
        tracing::debug!("no EncryptedKey in Security header");
        return Ok(Vec::new());
    };

    // UnwrapKey
    let transport = keytransport::from_uri(encryption_algorithm(doc, encrypted_key)?)?;
    let wrapped = cipher_value(doc, encrypted_key)?;
    let private_key = recipient.private_key()?.rsa()?;
    let session_key = transport.decrypt(private_key, &wrapped)?;
    tracing::debug!(key_transport = transport.uri(), "unwrapped session key");

    // ResolveReferences
    let uris = data_reference_uris(doc, encrypted_key);
    let mut pending: Vec<Pending> = Vec::with_capacity(uris.len());
    for uri in uris {
        let target = resolve::find_by_id(doc, &uri, true)?;
        let part = locate(doc, uri, target)?;
        if pending.iter().any(|p| p.encrypted_data == part.encrypted_data) {
            return Err(Error::ReferenceResolution(format!(
                "EncryptedData '{}' is referenced more than once",
                part.id
            )));
        }
        pending.push(part);
    }

    // DecryptEach. Every reference is decrypted and parsed before the
    // tree changes, so a failure leaves the envelope as it was.
    let mut decrypted = Vec::with_capacity(pending.len());
    for part in pending {
        let nodes = decrypt_part(doc, &part, &session_key)?;
        decrypted.push((part, nodes));
    }

    // Splice
    let mut data_refs = Vec::with_capacity(decrypted.len());
    for (part, nodes) in decrypted {
        data_refs.push(splice(doc, part, &nodes)?);
    }
    Ok(data_refs)
}

/// A resolved `DataReference`, not yet decrypted.
struct Pending {
    id: String,
    encrypted_data: NodeId,
    /// The `wsse11:EncryptedHeader` around `encrypted_data`, if any.
    wrapper: Option<NodeId>,
    /// The node the plaintext replaces: the wrapper, or the EncryptedData.
    replaced: NodeId,
    /// Parent of `replaced`; the plaintext is parsed in its scope.
    parent: NodeId,
    content: bool,
    algorithm: String,
}

fn locate(doc: &Document, id: String, target: NodeId) -> Result<Pending, Error> {
    let (encrypted_data, wrapper) = if doc.is_element(target, ns::node::ENCRYPTED_HEADER, ns::WSSE11) {
        let inner = doc
            .first_element_child(target)
            .ok_or_else(|| Error::InvalidSecurity("EncryptedHeader is empty".into()))?;
        (inner, Some(target))
    } else {
        (target, None)
    };
    if !doc.is_element(encrypted_data, ns::node::ENCRYPTED_DATA, ns::ENC) {
        return Err(Error::InvalidSecurity(format!(
            "reference '{id}' does not point at EncryptedData"
        )));
    }

    let replaced = wrapper.unwrap_or(encrypted_data);
    let parent = doc
        .parent(replaced)
        .ok_or_else(|| Error::InvalidSecurity("EncryptedData is detached".into()))?;
    let content = doc.attribute(encrypted_data, ns::attr::TYPE, None) == Some(algorithm::ENC_TYPE_CONTENT);
    let algorithm = encryption_algorithm(doc, encrypted_data)?.to_owned();
    Ok(Pending {
        id,
        encrypted_data,
        wrapper,
        replaced,
        parent,
        content,
        algorithm,
    })
}

/// Decrypt one part and parse the plaintext into detached nodes.
fn decrypt_part(doc: &mut Document, part: &Pending, session_key: &[u8]) -> Result<Vec<NodeId>, Error> {
    let content_cipher = cipher::from_uri(&part.algorithm)?;
    if session_key.len() != content_cipher.key_size() {
        return Err(Error::InvalidSecurity(format!(
            "session key does not fit {}",
            content_cipher.uri()
        )));
    }
    let ciphertext = cipher_value(doc, part.encrypted_data)?;
    let plaintext = content_cipher.decrypt(session_key, &ciphertext)?;
    let text = String::from_utf8(plaintext)
        .map_err(|_| Error::InvalidSecurity("decrypted content is not UTF-8".into()))?;
    doc.parse_fragment(part.parent, &text)
}

fn splice(doc: &mut Document, part: Pending, nodes: &[NodeId]) -> Result<DataRef, Error> {
    let previous = doc.previous_sibling(part.replaced);
    doc.replace_with(part.replaced, nodes)?;

    let node = if part.wrapper.is_some() {
        nodes.iter().copied().find(|n| doc.element(*n).is_some())
    } else if part.content {
        nodes
            .iter()
            .copied()
            .find(|n| doc.element(*n).is_some())
            .or(Some(part.parent))
    } else {
        match previous {
            Some(p) => doc.next_sibling(p),
            None => doc.children(part.parent).first().copied(),
        }
    };

    let path = node.map(|n| resolve::absolute_path(doc, n));
    tracing::debug!(
        reference = %part.id,
        algorithm = %part.algorithm,
        content = part.content,
        path = path.as_deref().unwrap_or(""),
        "decrypted reference"
    );
    Ok(DataRef {
        id: part.id,
        algorithm: part.algorithm,
        content: part.content,
        node,
        path,
    })
}

fn encryption_algorithm(doc: &Document, parent: NodeId) -> Result<&str, Error> {
    resolve::find_child_element(doc, parent, ns::node::ENCRYPTION_METHOD, ns::ENC)
        .and_then(|m| doc.attribute(m, ns::attr::ALGORITHM, None))
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| Error::UnsupportedAlgorithm("EncryptionMethod missing".into()))
}

fn cipher_value(doc: &Document, parent: NodeId) -> Result<Vec<u8>, Error> {
    let value = resolve::find_child_element(doc, parent, ns::node::CIPHER_DATA, ns::ENC)
        .and_then(|d| resolve::find_child_element(doc, d, ns::node::CIPHER_VALUE, ns::ENC))
        .ok_or_else(|| Error::InvalidSecurity("CipherValue missing".into()))?;
    security::decode_base64(&doc.text_content(value))
}

/// `DataReference` URIs of an EncryptedKey, without `#`.
fn data_reference_uris(doc: &Document, encrypted_key: NodeId) -> Vec<String> {
    let Some(list) = resolve::find_child_element(doc, encrypted_key, ns::node::REFERENCE_LIST, ns::ENC)
    else {
        return Vec::new();
    };
    resolve::find_child_elements(doc, list, ns::node::DATA_REFERENCE, ns::ENC)
        .into_iter()
        .filter_map(|r| doc.attribute(r, ns::attr::URI, None))
        .map(|uri| resolve::strip_reference(uri).to_owned())
        .filter(|uri| !uri.is_empty())
        .collect()
}
