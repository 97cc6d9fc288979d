#![forbid(unsafe_code)]

//! XML Digital Signature for WS-Security envelopes.
//!
//! The Signer covers the SOAP Body with one exclusive-c14n reference and
//! identifies its key through a BinarySecurityToken; the Verifier checks
//! such a signature and reports every failure the same way.

pub mod context;
pub mod sign;
pub mod verify;

pub use context::DsigContext;
pub use sign::sign;
pub use verify::{verify, VerifiedSignature};
