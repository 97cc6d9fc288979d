#![forbid(unsafe_code)]

//! Cryptographic primitives for the wsse workspace.
//!
//! Each algorithm family is a trait with a `from_uri` factory keyed on the
//! XML-DSig / XML-Enc algorithm identifier.

pub mod cipher;
pub mod digest;
pub mod keytransport;
pub mod sign;

pub use cipher::CipherAlgorithm;
pub use digest::DigestAlgorithm;
pub use keytransport::KeyTransportAlgorithm;
pub use sign::{SignatureAlgorithm, SigningKey, VerifyingKey};
