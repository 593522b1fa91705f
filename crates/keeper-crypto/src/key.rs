//! Master key derivation
//!
//! The key only ever lives in memory. It is wrapped in `Zeroizing<>` so it
//! is scrubbed on drop, and there is no way to serialize it.

use ring::digest;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use zeroize::Zeroizing;

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Symmetric key for a single session
pub struct MasterKey(Zeroizing<[u8; KEY_SIZE]>);

impl MasterKey {
    /// Derive the session key from the master password.
    ///
    /// Single SHA-256 pass over the password bytes, no salt. Every device
    /// of the same user must derive the same key from the password alone,
    /// since there is nowhere to keep a salt.
    pub fn derive(password: &SecretString) -> Self {
        let hash = digest::digest(&digest::SHA256, password.expose_secret().as_bytes());
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        key.copy_from_slice(hash.as_ref());
        Self(key)
    }

    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = MasterKey::derive(&secret("correct horse"));
        let b = MasterKey::derive(&secret("correct horse"));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_different_passwords_different_keys() {
        let a = MasterKey::derive(&secret("pw1"));
        let b = MasterKey::derive(&secret("pw2"));
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_debug_never_prints_key() {
        let key = MasterKey::from_bytes([7u8; KEY_SIZE]);
        assert_eq!(format!("{:?}", key), "MasterKey(<redacted>)");
    }
}
