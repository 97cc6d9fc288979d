#![forbid(unsafe_code)]

//! Core types shared by every wsse crate: the error taxonomy, namespace
//! constants, algorithm URIs and the fixed WS-Security identifiers.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, ErrorKind, Result};
