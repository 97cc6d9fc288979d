#![forbid(unsafe_code)]

//! The boundary to whatever carries envelopes over the wire.
//!
//! No HTTP client lives here; callers plug one in through [`SoapTransport`].

use std::time::Duration;
use wsse_core::Error;

/// Settings handed to the transport with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub content_type: String,
    pub soap_action: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl TransportConfig {
    /// HTTP headers for a SOAP POST.
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            ("Content-type", self.content_type.as_str()),
            ("SOAPAction", self.soap_action.as_str()),
        ]
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            content_type: "text/xml; charset=UTF-8".into(),
            soap_action: String::new(),
            connect_timeout: Duration::from_millis(5000),
            read_timeout: Duration::from_millis(20000),
        }
    }
}

/// Status code and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl SoapResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.body)
            .map_err(|e| Error::Transport(format!("response is not UTF-8: {e}")))
    }
}

/// Sends a serialized envelope to `url` and returns the response.
pub trait SoapTransport {
    fn send(&mut self, url: &str, config: &TransportConfig, envelope: &str) -> Result<SoapResponse, Error>;
}

impl<F> SoapTransport for F
where
    F: FnMut(&str, &TransportConfig, &str) -> Result<SoapResponse, Error>,
{
    fn send(&mut self, url: &str, config: &TransportConfig, envelope: &str) -> Result<SoapResponse, Error> {
        self(url, config, envelope)
    }
}
