#![forbid(unsafe_code)]

//! Signature algorithms: RSA PKCS#1 v1.5 (SHA-1, SHA-256) and DSA-SHA1.
//!
//! Signature values use the XML-DSig encodings: the raw RSA signature, and
//! for DSA the fixed-width concatenation `r || s` of two 20-byte integers.

use sha1::Digest;
use signature::{DigestSigner, DigestVerifier, SignatureEncoding, Signer, Verifier};
use wsse_core::{algorithm, Error};

/// Private key material for signing.
#[derive(Clone)]
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    Dsa(dsa::SigningKey),
}

/// Public key material for verification.
#[derive(Clone)]
pub enum VerifyingKey {
    Rsa(rsa::RsaPublicKey),
    Dsa(dsa::VerifyingKey),
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    /// `Ok(false)` for a well-formed signature that does not match.
    fn verify(&self, key: &VerifyingKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA1,
            sha256: false,
        })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA256,
            sha256: true,
        })),
        algorithm::DSA_SHA1 => Ok(Box::new(DsaSha1)),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "signature algorithm: {uri}"
        ))),
    }
}

// ── RSA PKCS#1 v1.5 ─────────────────────────────────────────────────

struct RsaPkcs1v15 {
    uri: &'static str,
    sha256: bool,
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        let SigningKey::Rsa(private_key) = key else {
            return Err(Error::Key("RSA private key required".into()));
        };
        let sig = if self.sha256 {
            rsa::pkcs1v15::SigningKey::<sha2::Sha256>::new(private_key.clone())
                .try_sign(data)
        } else {
            rsa::pkcs1v15::SigningKey::<sha1::Sha1>::new(private_key.clone()).try_sign(data)
        }
        .map_err(|e| Error::Crypto(format!("RSA sign: {e}")))?;
        Ok(sig.to_vec())
    }

    fn verify(&self, key: &VerifyingKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let VerifyingKey::Rsa(public_key) = key else {
            return Err(Error::Key("RSA public key required".into()));
        };
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        let result = if self.sha256 {
            rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(public_key.clone()).verify(data, &sig)
        } else {
            rsa::pkcs1v15::VerifyingKey::<sha1::Sha1>::new(public_key.clone()).verify(data, &sig)
        };
        Ok(result.is_ok())
    }
}

// ── DSA-SHA1 ─────────────────────────────────────────────────────────

/// Width in bytes of each of `r` and `s` in an XML-DSig DSA-SHA1 value.
const DSA_SHA1_HALF: usize = 20;

struct DsaSha1;

impl SignatureAlgorithm for DsaSha1 {
    fn uri(&self) -> &'static str {
        algorithm::DSA_SHA1
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        let SigningKey::Dsa(signing_key) = key else {
            return Err(Error::Key("DSA private key required".into()));
        };
        let sig: dsa::Signature = signing_key
            .try_sign_digest(sha1::Sha1::new_with_prefix(data))
            .map_err(|e| Error::Crypto(format!("DSA sign: {e}")))?;
        dsa_to_xmldsig(&sig)
    }

    fn verify(&self, key: &VerifyingKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let VerifyingKey::Dsa(verifying_key) = key else {
            return Err(Error::Key("DSA public key required".into()));
        };
        let sig = xmldsig_to_dsa(sig_bytes)?;
        Ok(verifying_key
            .verify_digest(sha1::Sha1::new_with_prefix(data), &sig)
            .is_ok())
    }
}

/// XML-DSig DSA-SHA1 `r || s` to a typed signature.
pub fn xmldsig_to_dsa(rs: &[u8]) -> Result<dsa::Signature, Error> {
    if rs.len() != 2 * DSA_SHA1_HALF {
        return Err(Error::Crypto(format!(
            "DSA-SHA1 signature must be {} bytes, got {}",
            2 * DSA_SHA1_HALF,
            rs.len()
        )));
    }
    let (r, s) = rs.split_at(DSA_SHA1_HALF);
    dsa::Signature::from_components(dsa::BigUint::from_bytes_be(r), dsa::BigUint::from_bytes_be(s))
        .map_err(|e| Error::Crypto(format!("invalid DSA signature: {e}")))
}

/// Typed DSA signature to XML-DSig `r || s`, each half left-padded to 20
/// bytes.
pub fn dsa_to_xmldsig(sig: &dsa::Signature) -> Result<Vec<u8>, Error> {
    let mut out = vec![0u8; 2 * DSA_SHA1_HALF];
    for (i, component) in [sig.r(), sig.s()].into_iter().enumerate() {
        let digits = component.to_bytes_be();
        if digits.len() > DSA_SHA1_HALF {
            return Err(Error::Crypto("DSA signature component too large".into()));
        }
        let end = (i + 1) * DSA_SHA1_HALF;
        out[end - digits.len()..end].copy_from_slice(&digits);
    }
    Ok(out)
}
