//! Error types for the two stores and the orchestrator

use keeper_crypto::CipherError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::record::RecordKind;

/// Failures of the authoritative remote store.
///
/// The orchestrator passes these through unchanged.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not authorized - log in again")]
    Unauthorized,

    #[error("Remote record not found: {0}")]
    NotFound(String),

    #[error("Malformed response from remote store: {0}")]
    InvalidResponse(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures of the local cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Record not found in cache: {0}")]
    NotFound(String),

    #[error("Record already cached: {0}")]
    DuplicateId(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cache storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

impl CacheError {
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage(err.into())
    }
}

/// Which half-committed write left the cache stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteOp::Create => "create",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        })
    }
}

#[derive(Error, Debug)]
pub enum KeeperError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Crypto(#[from] CipherError),

    #[error("failed to sync {kind}: {source}")]
    Sync {
        kind: RecordKind,
        source: Box<KeeperError>,
    },

    #[error("Synchronization already in progress")]
    SyncInProgress,

    #[error("{op} of {kind} {id} reached the server but the local cache is stale: {source}")]
    PartialFailure {
        op: WriteOp,
        kind: RecordKind,
        id: String,
        source: CacheError,
    },
}

impl KeeperError {
    /// True when the session key could not open a stored field
    pub fn is_authentication_failure(&self) -> bool {
        match self {
            KeeperError::Crypto(CipherError::AuthenticationFailed) => true,
            KeeperError::Sync { source, .. } => source.is_authentication_failure(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, KeeperError>;
