#![forbid(unsafe_code)]

//! Encryption settings.

use wsse_core::algorithm;

/// What an encryption request protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionPart {
    /// The children of the SOAP Body; the Body element itself stays.
    #[default]
    BodyContent,
    /// The SOAP Body element as a whole.
    BodyElement,
    /// A SOAP header block, wrapped in `wsse11:EncryptedHeader`.
    Header,
}

/// Algorithms and target of one `encrypt` call.
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Key transport URI for the session key.
    pub key_transport: String,
    /// Content encryption URI.
    pub content_algorithm: String,
    pub part: EncryptionPart,
}

impl EncryptionConfig {
    pub fn new(key_transport: &str, content_algorithm: &str) -> Self {
        Self {
            key_transport: key_transport.to_owned(),
            content_algorithm: content_algorithm.to_owned(),
            part: EncryptionPart::BodyContent,
        }
    }
}

impl Default for EncryptionConfig {
    /// RSA v1.5 key transport with AES-128-CBC content encryption.
    fn default() -> Self {
        Self::new(algorithm::RSA_PKCS1, algorithm::AES128_CBC)
    }
}
