#![forbid(unsafe_code)]

//! A SOAP envelope together with the security operations applied to it.

use wsse_core::{ns, Error};
use wsse_dsig::{DsigContext, VerifiedSignature};
use wsse_enc::{DataRef, EncryptionConfig};
use wsse_keys::{Certificate, CryptoContext};
use wsse_xml::document::{Document, NodeId, QName};
use wsse_xml::{resolve, security, writer};

/// SOAP envelope version, told apart by namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Soap11 => ns::SOAP11,
            Self::Soap12 => ns::SOAP12,
        }
    }

    pub fn from_namespace(uri: &str) -> Option<Self> {
        match uri {
            ns::SOAP11 => Some(Self::Soap11),
            ns::SOAP12 => Some(Self::Soap12),
            _ => None,
        }
    }
}

/// A SOAP envelope.
///
/// Messages built with [`SoapMessage::new`] carry a `soap:Header` and a
/// `soap:Body` with an `id` attribute, so they can be signed and
/// encrypted as they are.
#[derive(Debug, Clone)]
pub struct SoapMessage {
    doc: Document,
    /// First node restored by decryption.
    decrypted: Option<NodeId>,
}

impl SoapMessage {
    /// An empty SOAP 1.2 envelope.
    pub fn new() -> Result<Self, Error> {
        Self::with_version(SoapVersion::Soap12)
    }

    pub fn with_version(version: SoapVersion) -> Result<Self, Error> {
        let soap = version.namespace();
        let mut doc = Document::new();

        let envelope = doc.create_element(QName::new(ns::prefix::SOAP, ns::node::ENVELOPE, soap));
        doc.declare_namespace(envelope, ns::prefix::SOAP, soap)?;
        let root = doc.root();
        doc.append_child(root, envelope)?;

        let header = doc.create_element(QName::new(ns::prefix::SOAP, ns::node::HEADER, soap));
        doc.append_child(envelope, header)?;

        let body = doc.create_element(QName::new(ns::prefix::SOAP, ns::node::BODY, soap));
        doc.set_attribute(
            body,
            QName::local(ns::attr::LOWER_ID),
            &security::generate_id("BE"),
        )?;
        doc.append_child(envelope, body)?;

        Ok(Self {
            doc,
            decrypted: None,
        })
    }

    /// Parse a received envelope. The document element must be a SOAP 1.1
    /// or 1.2 `Envelope`.
    pub fn parse(xml: &str) -> Result<Self, Error> {
        let doc = Document::parse(xml)?;
        if resolve::soap_namespace(&doc).is_none() {
            return Err(Error::MalformedInput(
                "document element is not a SOAP Envelope".into(),
            ));
        }
        Ok(Self {
            doc,
            decrypted: None,
        })
    }

    pub fn from_document(doc: Document) -> Result<Self, Error> {
        if resolve::soap_namespace(&doc).is_none() {
            return Err(Error::MalformedInput(
                "document element is not a SOAP Envelope".into(),
            ));
        }
        Ok(Self {
            doc,
            decrypted: None,
        })
    }

    pub fn version(&self) -> Option<SoapVersion> {
        resolve::soap_namespace(&self.doc).and_then(SoapVersion::from_namespace)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    fn body(&self) -> Result<NodeId, Error> {
        resolve::find_body(&self.doc)
            .ok_or_else(|| Error::MalformedInput("SOAP Body not found".into()))
    }

    /// The Body's identifier attribute, if it has one.
    pub fn body_id(&self) -> Option<&str> {
        let body = resolve::find_body(&self.doc)?;
        resolve::element_ids(&self.doc, body).next()
    }

    /// Parse `xml` in the Body's namespace scope and append it to the Body.
    pub fn set_content(&mut self, xml: &str) -> Result<(), Error> {
        let body = self.body()?;
        let nodes = self.doc.parse_fragment(body, xml)?;
        for node in nodes {
            self.doc.append_child(body, node)?;
        }
        Ok(())
    }

    /// The decrypted node after [`SoapMessage::verify_and_decrypt`],
    /// otherwise the first element in the Body.
    pub fn content(&self) -> Option<NodeId> {
        if self.decrypted.is_some() {
            return self.decrypted;
        }
        let body = resolve::find_body(&self.doc)?;
        self.doc.first_element_child(body)
    }

    /// [`SoapMessage::content`] serialized so that it parses on its own.
    pub fn content_xml(&self) -> Option<String> {
        self.content()
            .map(|n| writer::node_to_string_standalone(&self.doc, n))
    }

    /// Sign the Body with `credentials`.
    pub fn sign(&mut self, credentials: &CryptoContext) -> Result<(), Error> {
        wsse_dsig::sign(&DsigContext::default(), &mut self.doc, credentials)
    }

    /// Encrypt the Body content for `recipient`, then sign the result with
    /// `credentials`. Encryption has to come first so that the signature
    /// covers the ciphertext.
    pub fn encrypt_and_sign(
        &mut self,
        credentials: &CryptoContext,
        recipient: &Certificate,
        config: &EncryptionConfig,
    ) -> Result<(), Error> {
        wsse_enc::encrypt(config, &mut self.doc, recipient)?;
        self.sign(credentials)
    }

    /// Verify the signature in the Security header.
    pub fn verify(&self) -> Result<VerifiedSignature, Error> {
        wsse_dsig::verify(&self.doc)
    }

    /// Verify the signature, then decrypt with the private key in
    /// `credentials`. The first decrypted node becomes the content.
    pub fn verify_and_decrypt(&mut self, credentials: &CryptoContext) -> Result<Vec<DataRef>, Error> {
        self.verify()?;
        self.decrypt(credentials)
    }

    /// Decrypt without checking a signature.
    pub fn decrypt(&mut self, credentials: &CryptoContext) -> Result<Vec<DataRef>, Error> {
        let refs = wsse_enc::decrypt(&mut self.doc, credentials)?;
        if let Some(node) = refs.first().and_then(|r| r.node) {
            self.decrypted = Some(node);
        }
        Ok(refs)
    }

    /// Serialize without indentation.
    pub fn to_xml(&self) -> String {
        writer::to_string(&self.doc)
    }
}
