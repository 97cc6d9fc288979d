#![forbid(unsafe_code)]

//! WS-Security for SOAP clients.
//!
//! Re-exports the workspace crates under one roof. Most callers only need
//! [`soap`]: build a [`soap::SoapMessage`], then sign, encrypt, verify or
//! decrypt it directly or through a [`soap::SecuritySession`].

pub use wsse_core as core;
pub use wsse_xml as xml;
pub use wsse_c14n as c14n;
pub use wsse_crypto as crypto;
pub use wsse_keys as keys;
pub use wsse_dsig as dsig;
pub use wsse_enc as enc;
pub use wsse_soap as soap;

pub use wsse_core::{Error, ErrorKind};
pub use wsse_keys::{Certificate, CryptoContext};
pub use wsse_soap::{SecurityPolicy, SecuritySession, SoapMessage, SoapVersion};
