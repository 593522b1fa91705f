//! Keeper Cache
//!
//! Durable local mirror of the remote store. Holds ciphertext only and
//! can be rebuilt from the server at any time.

pub mod sqlite;

pub use sqlite::SqliteCache;
