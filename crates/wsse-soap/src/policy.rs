#![forbid(unsafe_code)]

//! Which protections a session applies to requests and expects on
//! responses.

/// Request and response security flags.
///
/// When both request flags are set, signing alone wins; when both
/// response flags are set, verification alone wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub sign_request: bool,
    pub encrypt_and_sign_request: bool,
    pub verify_response: bool,
    pub decrypt_and_verify_response: bool,
}

/// What happens to an outgoing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestProtection {
    None,
    Sign,
    EncryptAndSign,
}

/// What is checked on an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseValidation {
    None,
    Verify,
    VerifyAndDecrypt,
}

impl SecurityPolicy {
    /// Sign requests and verify responses.
    pub fn signed() -> Self {
        Self {
            sign_request: true,
            verify_response: true,
            ..Self::default()
        }
    }

    /// Encrypt and sign requests; verify and decrypt responses.
    pub fn encrypted() -> Self {
        Self {
            encrypt_and_sign_request: true,
            decrypt_and_verify_response: true,
            ..Self::default()
        }
    }

    pub fn request_protection(&self) -> RequestProtection {
        if self.sign_request {
            RequestProtection::Sign
        } else if self.encrypt_and_sign_request {
            RequestProtection::EncryptAndSign
        } else {
            RequestProtection::None
        }
    }

    pub fn response_validation(&self) -> ResponseValidation {
        if self.verify_response {
            ResponseValidation::Verify
        } else if self.decrypt_and_verify_response {
            ResponseValidation::VerifyAndDecrypt
        } else {
            ResponseValidation::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unprotected() {
        let policy = SecurityPolicy::default();
        assert_eq!(policy.request_protection(), RequestProtection::None);
        assert_eq!(policy.response_validation(), ResponseValidation::None);
    }

    #[test]
    fn test_presets() {
        assert_eq!(SecurityPolicy::signed().request_protection(), RequestProtection::Sign);
        assert_eq!(SecurityPolicy::signed().response_validation(), ResponseValidation::Verify);
        assert_eq!(
            SecurityPolicy::encrypted().request_protection(),
            RequestProtection::EncryptAndSign
        );
        assert_eq!(
            SecurityPolicy::encrypted().response_validation(),
            ResponseValidation::VerifyAndDecrypt
        );
    }

    #[test]
    fn test_sign_takes_precedence() {
        let policy = SecurityPolicy {
            sign_request: true,
            encrypt_and_sign_request: true,
            verify_response: true,
            decrypt_and_verify_response: true,
        };
        assert_eq!(policy.request_protection(), RequestProtection::Sign);
        assert_eq!(policy.response_validation(), ResponseValidation::Verify);
    }
}
