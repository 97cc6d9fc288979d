#![forbid(unsafe_code)]

//! Credentials for the wsse workspace.
//!
//! Certificates and RSA/DSA keys loaded from PEM or DER, the
//! [`CryptoContext`] value passed to each operation, and inline `KeyValue`
//! parsing.

pub mod key;
pub mod keyvalue;
pub mod loader;
pub mod x509;

pub use key::{CryptoContext, PrivateKey, PublicKey};
pub use x509::Certificate;
