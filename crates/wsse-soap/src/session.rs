#![forbid(unsafe_code)]

//! A caller-owned security session.
//!
//! Holds the credentials, policy and transport used for a series of
//! exchanges. Nothing is shared between sessions.

use crate::message::SoapMessage;
use crate::policy::{RequestProtection, ResponseValidation, SecurityPolicy};
use crate::transport::{SoapTransport, TransportConfig};
use wsse_core::Error;
use wsse_enc::EncryptionConfig;
use wsse_keys::{Certificate, CryptoContext};

pub struct SecuritySession<T> {
    /// Own certificate and private key: signs requests, decrypts responses.
    credentials: Option<CryptoContext>,
    /// The service's certificate: requests are encrypted for it.
    peer_certificate: Option<Certificate>,
    policy: SecurityPolicy,
    encryption: EncryptionConfig,
    transport_config: TransportConfig,
    transport: T,
}

impl<T: SoapTransport> SecuritySession<T> {
    /// A session with no credentials and no protection.
    pub fn new(transport: T) -> Self {
        Self {
            credentials: None,
            peer_certificate: None,
            policy: SecurityPolicy::default(),
            encryption: EncryptionConfig::default(),
            transport_config: TransportConfig::default(),
            transport,
        }
    }

    pub fn with_credentials(mut self, credentials: CryptoContext) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_peer_certificate(mut self, certificate: Certificate) -> Self {
        self.peer_certificate = Some(certificate);
        self
    }

    pub fn with_policy(mut self, policy: SecurityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_encryption(mut self, encryption: EncryptionConfig) -> Self {
        self.encryption = encryption;
        self
    }

    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = config;
        self
    }

    pub fn policy(&self) -> &SecurityPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn credentials(&self) -> Result<&CryptoContext, Error> {
        self.credentials
            .as_ref()
            .ok_or_else(|| Error::Key("no credentials configured".into()))
    }

    /// Apply the request side of the policy to an outgoing message.
    pub fn secure(&self, message: &mut SoapMessage) -> Result<(), Error> {
        match self.policy.request_protection() {
            RequestProtection::None => {}
            RequestProtection::Sign => message.sign(self.credentials()?)?,
            RequestProtection::EncryptAndSign => {
                let credentials = self.credentials()?;
                let peer = self
                    .peer_certificate
                    .as_ref()
                    .ok_or_else(|| Error::Key("no peer certificate configured".into()))?;
                message.encrypt_and_sign(credentials, peer, &self.encryption)?;
            }
        }
        tracing::debug!(protection = ?self.policy.request_protection(), "secured request");
        Ok(())
    }

    /// Apply the response side of the policy to an incoming message.
    pub fn validate(&self, message: &mut SoapMessage) -> Result<(), Error> {
        match self.policy.response_validation() {
            ResponseValidation::None => {}
            ResponseValidation::Verify => {
                message.verify()?;
            }
            ResponseValidation::VerifyAndDecrypt => {
                message.verify_and_decrypt(self.credentials()?)?;
            }
        }
        tracing::debug!(validation = ?self.policy.response_validation(), "validated response");
        Ok(())
    }

    /// Secure `message`, send it to `url` and validate the reply.
    ///
    /// Returns `None` when the service answers with a status other than
    /// 200.
    pub fn exchange(&mut self, message: &mut SoapMessage, url: &str) -> Result<Option<SoapMessage>, Error> {
        self.secure(message)?;
        let envelope = message.to_xml();
        let response = self.transport.send(url, &self.transport_config, &envelope)?;
        if !response.is_ok() {
            tracing::warn!(url, status = response.status, "SOAP request was not accepted");
            return Ok(None);
        }
        if response.body.is_empty() {
            return Err(Error::Transport("no response data retrieved".into()));
        }

        let mut reply = SoapMessage::parse(response.text()?)?;
        self.validate(&mut reply)?;
        Ok(Some(reply))
    }
}
