//! Per-session key holder
//!
//! Owned by the orchestrator rather than living in a global, so two
//! sessions in one process never share a key. The key is published once
//! derivation finishes and is read-only afterwards; `end` drops it.

use keeper_crypto::{Cipher, CipherError, MasterKey};
use secrecy::SecretString;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Default)]
pub struct Session {
    cipher: RwLock<Option<Arc<Cipher>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the session key from the master password, replacing any
    /// previous key.
    pub fn derive_key(&self, password: &SecretString) {
        let cipher = Arc::new(Cipher::new(MasterKey::derive(password)));
        *self.cipher.write().unwrap_or_else(PoisonError::into_inner) = Some(cipher);
    }

    pub fn is_initialized(&self) -> bool {
        self.cipher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current cipher, or `NotInitialized` before login
    pub fn cipher(&self) -> Result<Arc<Cipher>, CipherError> {
        self.cipher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(CipherError::NotInitialized)
    }

    /// Forget the key (logout)
    pub fn end(&self) {
        self.cipher
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
