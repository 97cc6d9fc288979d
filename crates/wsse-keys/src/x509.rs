#![forbid(unsafe_code)]

//! X.509 certificates as carried in a BinarySecurityToken.

use der::{Decode, Encode};
use wsse_core::Error;

use crate::key::PublicKey;
use crate::loader;

/// A DER certificate together with its decoded public key.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    public_key: PublicKey,
}

impl Certificate {
    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let cert = x509_cert::Certificate::from_der(der)
            .map_err(|e| Error::Key(format!("failed to parse X.509 certificate: {e}")))?;
        let spki_der = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Key(format!("failed to encode SPKI: {e}")))?;
        let public_key = loader::load_spki_der(&spki_der)?;
        Ok(Self {
            der: der.to_vec(),
            subject: cert.tbs_certificate.subject.to_string(),
            public_key,
        })
    }

    /// Parse a `CERTIFICATE` PEM block.
    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(pem)
            .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;
        let (label, der) = pem_rfc7468::decode_vec(text.trim().as_bytes())
            .map_err(|e| Error::Key(format!("failed to decode certificate PEM: {e}")))?;
        if label != "CERTIFICATE" {
            return Err(Error::Key(format!(
                "expected CERTIFICATE PEM label, got: {label}"
            )));
        }
        Self::from_der(&der)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_CERT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/rsa-cert.pem"));
    const DSA_CERT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/dsa-cert.pem"));

    #[test]
    fn test_rsa_certificate() {
        let cert = Certificate::from_pem(RSA_CERT.as_bytes()).unwrap();
        assert!(matches!(cert.public_key(), PublicKey::Rsa(_)));
        assert!(cert.subject().contains("wsse-test-rsa"));
        let again = Certificate::from_der(cert.der()).unwrap();
        assert_eq!(again.der(), cert.der());
    }

    #[test]
    fn test_dsa_certificate() {
        let cert = Certificate::from_pem(DSA_CERT.as_bytes()).unwrap();
        assert!(matches!(cert.public_key(), PublicKey::Dsa(_)));
        assert_eq!(
            cert.public_key().signature_algorithm(),
            wsse_core::algorithm::DSA_SHA1
        );
    }

    #[test]
    fn test_garbage_certificate() {
        assert!(matches!(Certificate::from_der(b"\x30\x00"), Err(Error::Key(_))));
        let key_pem = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/rsa-key.pem"));
        assert!(Certificate::from_pem(key_pem.as_bytes()).is_err());
    }
}
