#![forbid(unsafe_code)]

//! Digest algorithms used by signature references.

use digest::Digest;
use wsse_core::{algorithm, Error};

/// Trait for digest algorithms.
pub trait DigestAlgorithm: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self: Box<Self>) -> Vec<u8>;
    fn uri(&self) -> &'static str;
}

/// Create a digest algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn DigestAlgorithm>, Error> {
    match uri {
        algorithm::SHA1 => Ok(Box::new(Hashing::<sha1::Sha1>::new(algorithm::SHA1))),
        algorithm::SHA256 => Ok(Box::new(Hashing::<sha2::Sha256>::new(algorithm::SHA256))),
        _ => Err(Error::UnsupportedAlgorithm(format!("digest algorithm: {uri}"))),
    }
}

/// One-shot digest.
pub fn digest(uri: &str, data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut hasher = from_uri(uri)?;
    hasher.update(data);
    Ok(hasher.finalize())
}

struct Hashing<D> {
    inner: D,
    uri: &'static str,
}

impl<D: Digest> Hashing<D> {
    fn new(uri: &'static str) -> Self {
        Self { inner: D::new(), uri }
    }
}

impl<D: Digest + Send> DigestAlgorithm for Hashing<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        let this = *self;
        this.inner.finalize().to_vec()
    }

    fn uri(&self) -> &'static str {
        self.uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_value() {
        let out = digest(algorithm::SHA1, b"abc").unwrap();
        assert_eq!(hex::encode(out), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_sha256_incremental() {
        let mut h = from_uri(algorithm::SHA256).unwrap();
        assert_eq!(h.uri(), algorithm::SHA256);
        h.update(b"hel");
        h.update(b"lo");
        assert_eq!(
            hex::encode(h.finalize()),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_unknown_digest() {
        let err = digest("http://www.w3.org/2001/04/xmldsig-more#md5", b"x").unwrap_err();
        assert!(matches!(err, Error::UnsupportedAlgorithm(_)));
    }
}
