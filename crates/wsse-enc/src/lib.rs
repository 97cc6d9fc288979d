#![forbid(unsafe_code)]

//! XML Encryption for WS-Security envelopes.
//!
//! The Encryptor wraps a fresh session key for the recipient and replaces
//! the SOAP Body content with `xenc:EncryptedData`; the Decryptor reverses
//! that and reports where each decrypted part ended up.

pub mod context;
pub mod decrypt;
pub mod encrypt;

pub use context::{EncryptionConfig, EncryptionPart};
pub use decrypt::{decrypt, DataRef};
pub use encrypt::encrypt;
