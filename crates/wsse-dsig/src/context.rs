#![forbid(unsafe_code)]

//! DSig context: the fixed choices made when a signature is created.

use wsse_c14n::C14nMode;
use wsse_core::algorithm;

/// Settings for signature creation.
///
/// The signature method is not configurable; it follows the signing
/// certificate's key type.
#[derive(Debug, Clone)]
pub struct DsigContext {
    /// Canonicalization for both SignedInfo and the Body reference.
    pub canonicalization: C14nMode,
    /// Digest method URI of the Body reference.
    pub digest_method: String,
}

impl DsigContext {
    pub fn new() -> Self {
        Self {
            canonicalization: C14nMode::Exclusive,
            digest_method: algorithm::SHA1.to_owned(),
        }
    }

    /// Use another digest method for the Body reference.
    pub fn with_digest_method(mut self, uri: &str) -> Self {
        self.digest_method = uri.to_owned();
        self
    }
}

impl Default for DsigContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = DsigContext::default();
        assert_eq!(ctx.canonicalization, C14nMode::Exclusive);
        assert_eq!(ctx.digest_method, algorithm::SHA1);
        let ctx = ctx.with_digest_method(algorithm::SHA256);
        assert_eq!(ctx.digest_method, algorithm::SHA256);
    }
}
