//! ChaCha20-Poly1305 authenticated encryption
//!
//! Every call draws a fresh 96-bit nonce and prepends it to the output,
//! so decryption needs nothing but the key:
//!
//!   nonce (12 bytes) || ciphertext || tag (16 bytes)
//!
//! Text fields travel as standard base64 of that layout.

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use thiserror::Error;

use crate::key::MasterKey;

/// 96-bit nonce (12 bytes)
pub const NONCE_SIZE: usize = 12;
/// Poly1305 tag (16 bytes)
pub const TAG_SIZE: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("No session key - log in first")]
    NotInitialized,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Authentication failed - wrong key or corrupted ciphertext")]
    AuthenticationFailed,

    #[error("Decrypted text is not valid UTF-8")]
    InvalidUtf8,

    #[error("System random number generator failed")]
    Rng,
}

/// Field cipher bound to one session key
pub struct Cipher {
    key: MasterKey,
    rng: SystemRandom,
}

impl Cipher {
    pub fn new(key: MasterKey) -> Self {
        Self {
            key,
            rng: SystemRandom::new(),
        }
    }

    /// Encrypt raw bytes. Returns nonce || ciphertext || tag.
    pub fn encrypt_bytes(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let aead = ChaCha20Poly1305::new_from_slice(self.key.as_bytes())
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng.fill(&mut nonce_bytes).map_err(|_| CipherError::Rng)?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = aead
            .encrypt(nonce, plaintext)
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt output of [`Cipher::encrypt_bytes`]
    pub fn decrypt_bytes(&self, data: &[u8]) -> Result<Vec<u8>, CipherError> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::AuthenticationFailed);
        }

        let aead = ChaCha20Poly1305::new_from_slice(self.key.as_bytes())
            .map_err(|_| CipherError::AuthenticationFailed)?;

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        aead.decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CipherError::AuthenticationFailed)
    }

    /// Encrypt a text field into base64
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let sealed = self.encrypt_bytes(plaintext.as_bytes())?;
        Ok(STANDARD.encode(sealed))
    }

    /// Decrypt a base64 text field.
    ///
    /// Anything that is not valid base64 cannot be our ciphertext, so it
    /// fails authentication like any other tampering.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CipherError> {
        let sealed = STANDARD
            .decode(ciphertext)
            .map_err(|_| CipherError::AuthenticationFailed)?;
        let plaintext = self.decrypt_bytes(&sealed)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").finish_non_exhaustive()
    }
}
