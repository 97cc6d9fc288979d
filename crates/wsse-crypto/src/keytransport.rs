#![forbid(unsafe_code)]

//! Key transport: wrapping a session key under the recipient's RSA key.

use rsa::{Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use wsse_core::{algorithm, Error};

/// Trait for key transport algorithms.
pub trait KeyTransportAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn encrypt(&self, public_key: &RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error>;
    fn decrypt(&self, private_key: &RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Create a key transport algorithm from its URI.
///
/// `rsa-oaep-mgf1p` uses SHA-1 for both the OAEP digest and MGF1 and an
/// empty label.
pub fn from_uri(uri: &str) -> Result<Box<dyn KeyTransportAlgorithm>, Error> {
    match uri {
        algorithm::RSA_PKCS1 => Ok(Box::new(RsaTransport { oaep: false })),
        algorithm::RSA_OAEP => Ok(Box::new(RsaTransport { oaep: true })),
        _ => Err(Error::UnsupportedAlgorithm(format!("key transport: {uri}"))),
    }
}

struct RsaTransport {
    oaep: bool,
}

impl KeyTransportAlgorithm for RsaTransport {
    fn uri(&self) -> &'static str {
        if self.oaep {
            algorithm::RSA_OAEP
        } else {
            algorithm::RSA_PKCS1
        }
    }

    fn encrypt(&self, public_key: &RsaPublicKey, key_data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut rng = rand::thread_rng();
        let wrapped = if self.oaep {
            public_key.encrypt(&mut rng, Oaep::new::<sha1::Sha1>(), key_data)
        } else {
            public_key.encrypt(&mut rng, Pkcs1v15Encrypt, key_data)
        };
        wrapped.map_err(|e| Error::Crypto(format!("RSA key wrap: {e}")))
    }

    fn decrypt(&self, private_key: &RsaPrivateKey, encrypted: &[u8]) -> Result<Vec<u8>, Error> {
        let unwrapped = if self.oaep {
            private_key.decrypt(Oaep::new::<sha1::Sha1>(), encrypted)
        } else {
            private_key.decrypt(Pkcs1v15Encrypt, encrypted)
        };
        unwrapped.map_err(|e| Error::Crypto(format!("RSA key unwrap: {e}")))
    }
}
