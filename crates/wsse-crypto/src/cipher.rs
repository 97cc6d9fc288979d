#![forbid(unsafe_code)]

//! Content ciphers: AES-CBC and AES-GCM.
//!
//! Ciphertext layout follows XML Encryption: the IV (16 bytes for CBC) or
//! nonce (12 bytes for GCM) is prepended to the encrypted octets.

use aes_gcm::aead::{Aead, KeyInit};
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use wsse_core::{algorithm, Error};

const AES_BLOCK: usize = 16;
const GCM_NONCE: usize = 12;
const GCM_TAG: usize = 16;

/// Trait for content cipher algorithms.
pub trait CipherAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn key_size(&self) -> usize;
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error>;
    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error>;
}

/// Create a cipher algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn CipherAlgorithm>, Error> {
    let (mode, key_size, uri) = match uri {
        algorithm::AES128_CBC => (Mode::Cbc, 16, algorithm::AES128_CBC),
        algorithm::AES192_CBC => (Mode::Cbc, 24, algorithm::AES192_CBC),
        algorithm::AES256_CBC => (Mode::Cbc, 32, algorithm::AES256_CBC),
        algorithm::AES128_GCM => (Mode::Gcm, 16, algorithm::AES128_GCM),
        algorithm::AES192_GCM => (Mode::Gcm, 24, algorithm::AES192_GCM),
        algorithm::AES256_GCM => (Mode::Gcm, 32, algorithm::AES256_GCM),
        _ => return Err(Error::UnsupportedAlgorithm(format!("cipher: {uri}"))),
    };
    Ok(Box::new(Aes {
        mode,
        key_size,
        uri,
    }))
}

/// Fresh random key material sized for `cipher`.
pub fn generate_key(cipher: &dyn CipherAlgorithm) -> Vec<u8> {
    let mut key = vec![0u8; cipher.key_size()];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Cbc,
    Gcm,
}

struct Aes {
    mode: Mode,
    key_size: usize,
    uri: &'static str,
}

impl Aes {
    fn check_key(&self, key: &[u8]) -> Result<(), Error> {
        if key.len() == self.key_size {
            Ok(())
        } else {
            Err(Error::Crypto(format!(
                "expected {} byte key, got {}",
                self.key_size,
                key.len()
            )))
        }
    }
}

impl CipherAlgorithm for Aes {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn key_size(&self) -> usize {
        self.key_size
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_key(key)?;
        match self.mode {
            Mode::Cbc => {
                let mut iv = [0u8; AES_BLOCK];
                rand::thread_rng().fill_bytes(&mut iv);
                let body = match self.key_size {
                    16 => cbc_encrypt::<aes::Aes128>(key, &iv, plaintext)?,
                    24 => cbc_encrypt::<aes::Aes192>(key, &iv, plaintext)?,
                    _ => cbc_encrypt::<aes::Aes256>(key, &iv, plaintext)?,
                };
                Ok([iv.as_slice(), &body].concat())
            }
            Mode::Gcm => {
                let mut nonce = [0u8; GCM_NONCE];
                rand::thread_rng().fill_bytes(&mut nonce);
                let body = match self.key_size {
                    16 => gcm_seal::<aes_gcm::Aes128Gcm>(key, &nonce, plaintext)?,
                    24 => gcm_seal::<Aes192Gcm>(key, &nonce, plaintext)?,
                    _ => gcm_seal::<aes_gcm::Aes256Gcm>(key, &nonce, plaintext)?,
                };
                Ok([nonce.as_slice(), &body].concat())
            }
        }
    }

    fn decrypt(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        self.check_key(key)?;
        match self.mode {
            Mode::Cbc => {
                if data.len() < 2 * AES_BLOCK || data.len() % AES_BLOCK != 0 {
                    return Err(Error::Crypto("AES-CBC data invalid length".into()));
                }
                let (iv, body) = data.split_at(AES_BLOCK);
                let padded = match self.key_size {
                    16 => cbc_decrypt::<aes::Aes128>(key, iv, body)?,
                    24 => cbc_decrypt::<aes::Aes192>(key, iv, body)?,
                    _ => cbc_decrypt::<aes::Aes256>(key, iv, body)?,
                };
                xmlenc_unpad(padded)
            }
            Mode::Gcm => {
                if data.len() < GCM_NONCE + GCM_TAG {
                    return Err(Error::Crypto("AES-GCM data too short".into()));
                }
                let (nonce, body) = data.split_at(GCM_NONCE);
                match self.key_size {
                    16 => gcm_open::<aes_gcm::Aes128Gcm>(key, nonce, body),
                    24 => gcm_open::<Aes192Gcm>(key, nonce, body),
                    _ => gcm_open::<aes_gcm::Aes256Gcm>(key, nonce, body),
                }
            }
        }
    }
}

type Aes192Gcm = aes_gcm::AesGcm<aes::Aes192, aes_gcm::aead::consts::U12>;

fn cbc_encrypt<C>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error>
where
    C: BlockEncryptMut + BlockCipher + KeyInit,
{
    let enc = cbc::Encryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| Error::Crypto(format!("AES-CBC init: {e}")))?;
    Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt<C>(key: &[u8], iv: &[u8], body: &[u8]) -> Result<Vec<u8>, Error>
where
    C: BlockDecryptMut + BlockCipher + KeyInit,
{
    let dec = cbc::Decryptor::<C>::new_from_slices(key, iv)
        .map_err(|e| Error::Crypto(format!("AES-CBC init: {e}")))?;
    dec.decrypt_padded_vec_mut::<NoPadding>(body)
        .map_err(|e| Error::Crypto(format!("AES-CBC decrypt: {e}")))
}

fn gcm_seal<A: Aead + KeyInit>(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = A::new_from_slice(key).map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?;
    cipher
        .encrypt(aes_gcm::aead::Nonce::<A>::from_slice(nonce), plaintext)
        .map_err(|e| Error::Crypto(format!("AES-GCM encrypt: {e}")))
}

fn gcm_open<A: Aead + KeyInit>(key: &[u8], nonce: &[u8], body: &[u8]) -> Result<Vec<u8>, Error> {
    let cipher = A::new_from_slice(key).map_err(|e| Error::Crypto(format!("AES-GCM init: {e}")))?;
    cipher
        .decrypt(aes_gcm::aead::Nonce::<A>::from_slice(nonce), body)
        .map_err(|e| Error::Crypto(format!("AES-GCM decrypt: {e}")))
}

/// Strip XML Encryption block padding.
///
/// Only the final byte (the pad length) is checked, which accepts both
/// PKCS#7 and ISO 10126 style filler.
fn xmlenc_unpad(mut data: Vec<u8>) -> Result<Vec<u8>, Error> {
    let Some(&last) = data.last() else {
        return Ok(data);
    };
    let pad = last as usize;
    if pad == 0 || pad > AES_BLOCK || pad > data.len() {
        return Err(Error::Crypto("invalid padding".into()));
    }
    data.truncate(data.len() - pad);
    Ok(data)
}
