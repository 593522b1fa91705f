//! Keeper Core
//!
//! Client-side secret keeping: record tables, a per-session key, the
//! remote-then-local dual write, and remote-wins cache reconciliation.
//! Records are encrypted before they reach either store.

pub mod error;
pub mod keeper;
pub mod memory;
pub mod record;
pub mod session;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use error::{CacheError, KeeperError, RemoteError, Result, WriteOp};
pub use keeper::{Keeper, KeeperConfig, WriteOutcome};
pub use memory::MemoryCache;
pub use record::{
    BinaryRecord, CardRecord, CredentialRecord, Field, FieldMut, RecordKind, SecureRecord,
    Sensitivity, TextRecord,
};
pub use session::Session;
pub use store::{LocalBackend, LocalStore, RemoteBackend, RemoteStore};
pub use sync::{SyncEngine, SyncReport, SyncState};

pub use keeper_crypto::CipherError;
