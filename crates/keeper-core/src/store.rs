//! Store capabilities consumed by the orchestrator
//!
//! Both stores only ever see ciphertext. Implementations must not try to
//! interpret field contents.

use async_trait::async_trait;

use crate::error::{CacheError, RemoteError};
use crate::record::{BinaryRecord, CardRecord, CredentialRecord, SecureRecord, TextRecord};

/// Authoritative per-user store, reached over the network
#[async_trait]
pub trait RemoteStore<R: SecureRecord>: Send + Sync {
    /// Persist a new record. The returned record carries the assigned id.
    async fn create(&self, record: R) -> Result<R, RemoteError>;

    async fn get_all(&self) -> Result<Vec<R>, RemoteError>;

    async fn update(&self, record: R) -> Result<R, RemoteError>;

    async fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Offline, rebuildable mirror of the remote store
#[async_trait]
pub trait LocalStore<R: SecureRecord>: Send + Sync {
    /// Fails with `InvalidArgument` on an empty id, `DuplicateId` if present.
    async fn create(&self, record: R) -> Result<R, CacheError>;

    async fn get(&self, id: &str) -> Result<Option<R>, CacheError>;

    /// All cached records of the kind, in no particular order
    async fn get_all(&self) -> Result<Vec<R>, CacheError>;

    /// Fails with `NotFound` if the id is not cached.
    async fn update(&self, record: R) -> Result<R, CacheError>;

    /// Fails with `NotFound` if the id is not cached.
    async fn delete(&self, id: &str) -> Result<(), CacheError>;

    /// Drop every cached record of the kind
    async fn clear(&self) -> Result<(), CacheError>;

    /// Replace the whole kind with `records`, returning how many were stored.
    ///
    /// Not atomic by default; backends with transactions should override.
    async fn replace_all(&self, records: Vec<R>) -> Result<usize, CacheError> {
        self.clear().await?;
        let count = records.len();
        for record in records {
            self.create(record).await?;
        }
        Ok(count)
    }
}

/// A remote store serving every record kind
pub trait RemoteBackend:
    RemoteStore<BinaryRecord>
    + RemoteStore<CardRecord>
    + RemoteStore<CredentialRecord>
    + RemoteStore<TextRecord>
{
}

impl<T> RemoteBackend for T where
    T: RemoteStore<BinaryRecord>
        + RemoteStore<CardRecord>
        + RemoteStore<CredentialRecord>
        + RemoteStore<TextRecord>
{
}

/// A local cache holding every record kind
pub trait LocalBackend:
    LocalStore<BinaryRecord>
    + LocalStore<CardRecord>
    + LocalStore<CredentialRecord>
    + LocalStore<TextRecord>
{
}

impl<T> LocalBackend for T where
    T: LocalStore<BinaryRecord>
        + LocalStore<CardRecord>
        + LocalStore<CredentialRecord>
        + LocalStore<TextRecord>
{
}
