#![forbid(unsafe_code)]

/// Errors produced while securing or validating a SOAP envelope.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("reference resolution failed: {0}")]
    ReferenceResolution(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("invalid security: {0}")]
    InvalidSecurity(String),

    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedInput,
    UnsupportedAlgorithm,
    ReferenceResolutionFailure,
    CryptoOperationFailure,
    InvalidSecurity,
    Other,
}

impl Error {
    /// Map this error onto its failure class.
    ///
    /// Parse failures count as malformed input, key and base64 problems as
    /// crypto failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput(_) | Self::XmlParse(_) => ErrorKind::MalformedInput,
            Self::UnsupportedAlgorithm(_) => ErrorKind::UnsupportedAlgorithm,
            Self::ReferenceResolution(_) => ErrorKind::ReferenceResolutionFailure,
            Self::Crypto(_) | Self::Key(_) | Self::Base64(_) => ErrorKind::CryptoOperationFailure,
            Self::InvalidSecurity(_) => ErrorKind::InvalidSecurity,
            Self::Transport(_) | Self::Io(_) => ErrorKind::Other,
        }
    }

    /// The single outcome reported for every failed signature check.
    pub fn invalid_signature() -> Self {
        Self::InvalidSecurity("invalid signature".into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
