//! Encryption service - Fernet tokens for backup files
//!
//! Backups are stored as Fernet tokens so they stay readable by the Python
//! `cryptography` package and the server tooling:
//!
//! ```text
//! base64url( 0x80 | timestamp (u64 BE) | IV (16) | AES-128-CBC ciphertext | HMAC-SHA256 (32) )
//! ```
//!
//! The key is 32 bytes of URL-safe base64: the first half signs, the second
//! half encrypts.

use std::fs;
use std::path::Path;
use std::time::Duration;

use aes::Aes128;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::domain::result::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
const BLOCK_LEN: usize = 16;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = 1 + 8 + IV_LEN;

/// Tokens dated further in the future than this are rejected under a TTL
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Decode URL-safe base64 with or without trailing padding
///
/// ASCII whitespace anywhere in the input is ignored, so wrapped token files
/// decode the same as single-line ones.
fn decode_urlsafe(input: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    URL_SAFE_NO_PAD.decode(compact.trim_end_matches('='))
}

/// Authenticated symmetric cipher for backup files
#[derive(Clone)]
pub struct FernetCipher {
    /// HMAC-SHA256 keyed with the signing half, cloned per token
    mac: HmacSha256,
    encryption_key: [u8; 16],
}

impl std::fmt::Debug for FernetCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FernetCipher { .. }")
    }
}

impl FernetCipher {
    /// Build a cipher from a URL-safe base64 encoded 32-byte key
    pub fn new(key: &str) -> Result<Self> {
        let raw = decode_urlsafe(key)
            .map_err(|e| Error::InvalidKey(format!("key is not URL-safe base64: {}", e)))?;
        if raw.len() != 32 {
            return Err(Error::InvalidKey(format!(
                "key must decode to 32 bytes, got {}",
                raw.len()
            )));
        }

        let mac = <HmacSha256 as Mac>::new_from_slice(&raw[..16])
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        let mut encryption_key = [0u8; 16];
        encryption_key.copy_from_slice(&raw[16..]);

        Ok(Self {
            mac,
            encryption_key,
        })
    }

    /// Encrypt `plaintext` into a fresh token (new IV, current timestamp)
    pub fn encrypt(&self, plaintext: &[u8]) -> String {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);
        self.encrypt_with_parts(plaintext, Utc::now().timestamp() as u64, iv)
    }

    /// Encrypt a string; convenience for text backups
    pub fn encrypt_str(&self, plaintext: &str) -> String {
        self.encrypt(plaintext.as_bytes())
    }

    fn encrypt_with_parts(&self, plaintext: &[u8], timestamp: u64, iv: [u8; IV_LEN]) -> String {
        let ciphertext = Aes128CbcEnc::new(&self.encryption_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
        token.push(VERSION);
        token.extend_from_slice(&timestamp.to_be_bytes());
        token.extend_from_slice(&iv);
        token.extend_from_slice(&ciphertext);

        let mut mac = self.mac.clone();
        mac.update(&token);
        token.extend_from_slice(&mac.finalize().into_bytes());

        URL_SAFE.encode(token)
    }

    /// Verify and decrypt a token
    pub fn decrypt(&self, token: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_with_ttl(token, None)
    }

    /// Verify and decrypt a token, rejecting it when older than `max_age`
    pub fn decrypt_with_ttl(&self, token: &[u8], max_age: Option<Duration>) -> Result<Vec<u8>> {
        let text = std::str::from_utf8(token)
            .map_err(|_| Error::decryption("token is not ASCII text"))?;
        let data = decode_urlsafe(text)
            .map_err(|e| Error::decryption(format!("token is not URL-safe base64: {}", e)))?;

        if data.len() < HEADER_LEN + BLOCK_LEN + MAC_LEN
            || (data.len() - HEADER_LEN - MAC_LEN) % BLOCK_LEN != 0
        {
            return Err(Error::decryption("token has an invalid length"));
        }
        if data[0] != VERSION {
            return Err(Error::decryption(format!(
                "unsupported token version 0x{:02x}",
                data[0]
            )));
        }

        let (signed, tag) = data.split_at(data.len() - MAC_LEN);
        let mut mac = self.mac.clone();
        mac.update(signed);
        mac.verify_slice(tag)
            .map_err(|_| Error::decryption("token signature does not match the key"))?;

        if let Some(ttl) = max_age {
            let mut ts = [0u8; 8];
            ts.copy_from_slice(&signed[1..9]);
            let issued = u64::from_be_bytes(ts) as i64;
            let now = Utc::now().timestamp();
            if issued > now + MAX_CLOCK_SKEW_SECS {
                return Err(Error::decryption("token timestamp is in the future"));
            }
            if now - issued > ttl.as_secs() as i64 {
                return Err(Error::decryption("token has expired"));
            }
        }

        let iv = &signed[9..HEADER_LEN];
        let ciphertext = &signed[HEADER_LEN..];
        Aes128CbcDec::new_from_slices(&self.encryption_key, iv)
            .map_err(Error::decryption)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::decryption("invalid padding"))
    }

    /// Read a token file and return its plaintext as UTF-8 text
    ///
    /// Unreadable file, malformed token, wrong key and non-UTF-8 plaintext
    /// all come back as [`Error::Decryption`].
    pub fn decrypt_file(&self, path: &Path) -> Result<String> {
        let token = fs::read(path).map_err(|e| {
            Error::decryption(format!("cannot read {}: {}", path.display(), e))
        })?;
        let plaintext = self.decrypt(&token)?;
        String::from_utf8(plaintext)
            .map_err(|_| Error::decryption("plaintext is not valid UTF-8"))
    }
}
