#![forbid(unsafe_code)]

//! SOAP messages and the session that secures and validates them.

pub mod message;
pub mod policy;
pub mod session;
pub mod transport;

pub use message::{SoapMessage, SoapVersion};
pub use policy::{RequestProtection, ResponseValidation, SecurityPolicy};
pub use session::SecuritySession;
pub use transport::{SoapResponse, SoapTransport, TransportConfig};
