#![forbid(unsafe_code)]

//! Owned SOAP envelope tree for the wsse workspace.
//!
//! Parses with `roxmltree` into a mutable arena, serializes without
//! reformatting, and provides identifier resolution plus the
//! `wsse:Security` header helpers the signing and encryption crates build on.

pub mod document;
pub mod resolve;
pub mod security;
pub mod writer;

pub use document::{Attribute, Document, Element, NodeId, NodeKind, QName};
