#![forbid(unsafe_code)]

//! Loading certificates and keys from PEM or DER.

use std::path::Path;

use der::Decode;
use pkcs1::DecodeRsaPrivateKey;
use pkcs8::DecodePrivateKey;
use spki::DecodePublicKey;
use wsse_core::Error;

use crate::key::{PrivateKey, PublicKey};
use crate::x509::Certificate;

fn looks_like_pem(data: &[u8]) -> bool {
    data.iter()
        .position(|b| !b.is_ascii_whitespace())
        .is_some_and(|i| data[i..].starts_with(b"-----BEGIN"))
}

/// Load a certificate, auto-detecting PEM or DER.
pub fn load_certificate(data: &[u8]) -> Result<Certificate, Error> {
    if looks_like_pem(data) {
        Certificate::from_pem(data)
    } else {
        Certificate::from_der(data)
    }
}

/// Load a private key: PKCS#8 (RSA or DSA) as PEM or DER, or PKCS#1 RSA.
pub fn load_private_key(data: &[u8]) -> Result<PrivateKey, Error> {
    if !looks_like_pem(data) {
        return load_private_key_der(data);
    }
    let text = std::str::from_utf8(data)
        .map_err(|e| Error::Key(format!("invalid PEM encoding: {e}")))?;
    let (label, der) = pem_rfc7468::decode_vec(text.trim().as_bytes())
        .map_err(|e| Error::Key(format!("failed to decode PEM: {e}")))?;
    match label {
        "PRIVATE KEY" => load_private_key_pkcs8_der(&der),
        "RSA PRIVATE KEY" => rsa::RsaPrivateKey::from_pkcs1_der(&der)
            .map(PrivateKey::Rsa)
            .map_err(|e| Error::Key(format!("invalid PKCS#1 RSA key: {e}"))),
        _ => Err(Error::Key(format!("unsupported PEM label: {label}"))),
    }
}

fn load_private_key_der(der: &[u8]) -> Result<PrivateKey, Error> {
    load_private_key_pkcs8_der(der).or_else(|_| {
        rsa::RsaPrivateKey::from_pkcs1_der(der)
            .map(PrivateKey::Rsa)
            .map_err(|_| Error::Key("unrecognized private key encoding".into()))
    })
}

fn load_private_key_pkcs8_der(der: &[u8]) -> Result<PrivateKey, Error> {
    if let Ok(pk) = rsa::RsaPrivateKey::from_pkcs8_der(der) {
        return Ok(PrivateKey::Rsa(pk));
    }
    let info = pkcs8::PrivateKeyInfo::from_der(der)
        .map_err(|e| Error::Key(format!("invalid PKCS#8 structure: {e}")))?;
    dsa::SigningKey::try_from(info)
        .map(PrivateKey::Dsa)
        .map_err(|e| Error::Key(format!("unsupported PKCS#8 private key: {e}")))
}

/// Load an RSA or DSA public key from SubjectPublicKeyInfo DER.
pub fn load_spki_der(der: &[u8]) -> Result<PublicKey, Error> {
    if let Ok(pk) = rsa::RsaPublicKey::from_public_key_der(der) {
        return Ok(PublicKey::Rsa(pk));
    }
    let spki = spki::SubjectPublicKeyInfoRef::from_der(der)
        .map_err(|e| Error::Key(format!("invalid SubjectPublicKeyInfo: {e}")))?;
    dsa::VerifyingKey::try_from(spki)
        .map(PublicKey::Dsa)
        .map_err(|e| Error::Key(format!("unsupported public key algorithm: {e}")))
}

pub fn load_certificate_file(path: &Path) -> Result<Certificate, Error> {
    load_certificate(&std::fs::read(path)?)
}

pub fn load_private_key_file(path: &Path) -> Result<PrivateKey, Error> {
    load_private_key(&std::fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    const RSA_KEY: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/rsa-key.pem"));
    const DSA_KEY: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/dsa-key.pem"));
    const RSA_CERT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../test-data/rsa-cert.pem"));

    #[test]
    fn test_load_pkcs8_pem() {
        assert!(matches!(load_private_key(RSA_KEY.as_bytes()).unwrap(), PrivateKey::Rsa(_)));
        assert!(matches!(load_private_key(DSA_KEY.as_bytes()).unwrap(), PrivateKey::Dsa(_)));
    }

    #[test]
    fn test_load_pkcs8_der() {
        let (_, der) = pem_rfc7468::decode_vec(RSA_KEY.trim().as_bytes()).unwrap();
        assert!(matches!(load_private_key(&der).unwrap(), PrivateKey::Rsa(_)));
    }

    #[test]
    fn test_load_pkcs1_pem() {
        use pkcs1::EncodeRsaPrivateKey;
        let PrivateKey::Rsa(pk) = load_private_key(RSA_KEY.as_bytes()).unwrap() else {
            panic!("expected RSA");
        };
        let pem = pk.to_pkcs1_pem(pkcs1::LineEnding::LF).unwrap();
        assert!(matches!(load_private_key(pem.as_bytes()).unwrap(), PrivateKey::Rsa(_)));
    }

    #[test]
    fn test_load_certificate_pem_and_der() {
        let cert = load_certificate(RSA_CERT.as_bytes()).unwrap();
        let der_cert = load_certificate(cert.der()).unwrap();
        assert_eq!(der_cert.subject(), cert.subject());
    }

    #[test]
    fn test_private_key_matches_certificate() {
        let cert = load_certificate(RSA_CERT.as_bytes()).unwrap();
        let key = load_private_key(RSA_KEY.as_bytes()).unwrap();
        let (PublicKey::Rsa(a), PublicKey::Rsa(b)) = (key.public_key(), cert.public_key().clone()) else {
            panic!("expected RSA keys");
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_unknown_label() {
        let pem = format!(
            "-----BEGIN FOO-----\n{}\n-----END FOO-----\n",
            base64::engine::general_purpose::STANDARD.encode(b"junk")
        );
        assert!(matches!(load_private_key(pem.as_bytes()), Err(Error::Key(_))));
    }
}
