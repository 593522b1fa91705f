//! Keeper Crypto - session key and field cipher
//!
//! This crate provides:
//! - Master key derivation from the user's password
//! - ChaCha20-Poly1305 encryption of text and binary fields

pub mod cipher;
pub mod key;

pub use cipher::{Cipher, CipherError};
pub use key::MasterKey;
