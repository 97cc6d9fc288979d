#![forbid(unsafe_code)]

//! XML canonicalization for the wsse workspace.
//!
//! Only Exclusive Canonical XML 1.0 is offered, with and without comments,
//! since that is the one transform WS-Security signatures use here.

pub mod exclusive;

use std::collections::BTreeSet;
use wsse_core::{algorithm, Error};
use wsse_xml::document::{Document, NodeId};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::ExclusiveWithComments)
    }
}

/// Canonicalize the subtree rooted at `node`.
///
/// `inclusive_prefixes` is the InclusiveNamespaces PrefixList; `#default`
/// names the default namespace.
pub fn canonicalize(
    doc: &Document,
    node: NodeId,
    mode: C14nMode,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    exclusive::canonicalize(doc, node, mode.with_comments(), inclusive_prefixes)
}

/// Prefixes declared on the ancestors of `node`, `#default` for the default
/// namespace. Used to fill an InclusiveNamespaces PrefixList.
pub fn inclusive_prefixes(doc: &Document, node: NodeId) -> Vec<String> {
    let mut prefixes = BTreeSet::new();
    let mut current = doc.parent(node);
    while let Some(n) = current {
        if let Some(elem) = doc.element(n) {
            for (prefix, uri) in &elem.namespace_declarations {
                if !uri.is_empty() {
                    prefixes.insert(prefix.clone());
                }
            }
        }
        current = doc.parent(n);
    }
    prefixes
        .into_iter()
        .map(|p| if p.is_empty() { "#default".to_owned() } else { p })
        .collect()
}
