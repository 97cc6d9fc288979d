#![forbid(unsafe_code)]

//! Credential value types.
//!
//! These are plain immutable values handed to each operation; nothing here
//! caches or shares state between envelopes.

use wsse_core::{algorithm, Error};
use wsse_crypto::sign::{SigningKey, VerifyingKey};

use crate::x509::Certificate;

/// A public key usable for verification or key transport.
#[derive(Clone)]
pub enum PublicKey {
    Rsa(rsa::RsaPublicKey),
    Dsa(dsa::VerifyingKey),
}

impl PublicKey {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::Dsa(_) => "DSA",
        }
    }

    /// XML-DSig signature method for this key type.
    pub fn signature_algorithm(&self) -> &'static str {
        match self {
            Self::Rsa(_) => algorithm::RSA_SHA1,
            Self::Dsa(_) => algorithm::DSA_SHA1,
        }
    }

    pub fn to_verifying_key(&self) -> VerifyingKey {
        match self {
            Self::Rsa(k) => VerifyingKey::Rsa(k.clone()),
            Self::Dsa(k) => VerifyingKey::Dsa(k.clone()),
        }
    }

    /// The RSA key, required for key transport.
    pub fn rsa(&self) -> Result<&rsa::RsaPublicKey, Error> {
        match self {
            Self::Rsa(k) => Ok(k),
            Self::Dsa(_) => Err(Error::Key("key transport requires an RSA public key".into())),
        }
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} public key", self.algorithm_name())
    }
}

/// A private key usable for signing or key unwrapping.
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    Dsa(dsa::SigningKey),
}

impl PrivateKey {
    pub fn algorithm_name(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::Dsa(_) => "DSA",
        }
    }

    pub fn to_signing_key(&self) -> SigningKey {
        match self {
            Self::Rsa(k) => SigningKey::Rsa(k.clone()),
            Self::Dsa(k) => SigningKey::Dsa(k.clone()),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Rsa(k) => PublicKey::Rsa(k.to_public_key()),
            Self::Dsa(k) => PublicKey::Dsa(k.verifying_key().clone()),
        }
    }

    /// The RSA key, required for key unwrapping.
    pub fn rsa(&self) -> Result<&rsa::RsaPrivateKey, Error> {
        match self {
            Self::Rsa(k) => Ok(k),
            Self::Dsa(_) => Err(Error::Key("key transport requires an RSA private key".into())),
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} private key", self.algorithm_name())
    }
}

/// Certificate, its public key and an optional matching private key.
#[derive(Debug, Clone)]
pub struct CryptoContext {
    pub certificate: Certificate,
    pub public_key: PublicKey,
    pub private_key: Option<PrivateKey>,
}

impl CryptoContext {
    /// Context holding only a certificate, e.g. a peer's.
    pub fn from_certificate(certificate: Certificate) -> Self {
        Self {
            public_key: certificate.public_key().clone(),
            certificate,
            private_key: None,
        }
    }

    pub fn with_private_key(mut self, private_key: PrivateKey) -> Self {
        self.private_key = Some(private_key);
        self
    }

    pub fn private_key(&self) -> Result<&PrivateKey, Error> {
        self.private_key
            .as_ref()
            .ok_or_else(|| Error::Key("no private key available".into()))
    }
}
