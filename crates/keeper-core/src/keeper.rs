//! Dual-write orchestrator
//!
//! The only component that sees plaintext. Every write is a two-step
//! saga: the remote store first, then the local cache with the same
//! ciphertext. Reads come from the local cache only.

use secrecy::SecretString;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{CacheError, KeeperError, RemoteError, Result, WriteOp};
use crate::record::{RecordKind, SecureRecord};
use crate::session::Session;
use crate::store::{LocalBackend, LocalStore, RemoteBackend, RemoteStore};
use crate::sync::{SyncEngine, SyncReport, SyncState};

/// Per-step deadlines. `None` waits forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeeperConfig {
    pub remote_timeout: Option<Duration>,
    pub local_timeout: Option<Duration>,
}

/// Result of a write that reached the remote store
#[derive(Debug)]
#[must_use]
pub enum WriteOutcome<T> {
    /// Both stores hold the change
    Committed(T),
    /// The remote store holds the change, the local cache does not.
    /// The cache is stale until the next sync.
    Partial { remote: T, local_error: CacheError },
}

impl<T> WriteOutcome<T> {
    pub fn is_partial(&self) -> bool {
        matches!(self, WriteOutcome::Partial { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            WriteOutcome::Committed(value) | WriteOutcome::Partial { remote: value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            WriteOutcome::Committed(value) | WriteOutcome::Partial { remote: value, .. } => value,
        }
    }

    pub fn local_error(&self) -> Option<&CacheError> {
        match self {
            WriteOutcome::Committed(_) => None,
            WriteOutcome::Partial { local_error, .. } => Some(local_error),
        }
    }
}

/// Run `fut` under an optional deadline
pub(crate) async fn bounded<T, E>(
    limit: Option<Duration>,
    fut: impl Future<Output = std::result::Result<T, E>>,
    on_timeout: impl FnOnce(Duration) -> E,
) -> std::result::Result<T, E> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(limit)),
        },
        None => fut.await,
    }
}

/// Fold the local half of a saga into its outcome
fn settle<T>(
    op: WriteOp,
    kind: RecordKind,
    id: &str,
    remote: T,
    local: std::result::Result<(), CacheError>,
) -> WriteOutcome<T> {
    match local {
        Ok(()) => {
            debug!(%kind, id, %op, "write committed");
            WriteOutcome::Committed(remote)
        }
        Err(local_error) => {
            warn!(
                %kind,
                id,
                %op,
                error = %local_error,
                "remote write committed but local cache failed; cache is stale until next sync"
            );
            WriteOutcome::Partial { remote, local_error }
        }
    }
}

pub struct Keeper<Rm, L> {
    remote: Arc<Rm>,
    local: Arc<L>,
    session: Session,
    sync: SyncEngine,
    config: KeeperConfig,
}

impl<Rm, L> Keeper<Rm, L> {
    pub fn new(remote: Arc<Rm>, local: Arc<L>) -> Self {
        Self {
            remote,
            local,
            session: Session::new(),
            sync: SyncEngine::new(),
            config: KeeperConfig::default(),
        }
    }

    pub fn with_config(mut self, config: KeeperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn remote(&self) -> &Rm {
        &self.remote
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    /// Derive the session key, then reconcile the cache.
    ///
    /// The key stays derived even if the sync fails, so cached records
    /// remain readable offline.
    pub async fn start_session(&self, password: &SecretString) -> Result<SyncReport>
    where
        Rm: RemoteBackend,
        L: LocalBackend,
    {
        self.session.derive_key(password);
        info!("session key derived");
        self.sync().await
    }

    /// Drop the session key (logout)
    pub fn end_session(&self) {
        self.session.end();
        info!("session ended");
    }

    /// Force a full remote-wins reconciliation
    pub async fn sync(&self) -> Result<SyncReport>
    where
        Rm: RemoteBackend,
        L: LocalBackend,
    {
        self.sync
            .run(self.remote.as_ref(), self.local.as_ref(), &self.config)
            .await
    }

    /// Encrypt, store remotely, then cache the same ciphertext.
    ///
    /// Returns the submitted plaintext with its server-assigned id. Uses the
    /// deadlines from [`KeeperConfig`].
    pub async fn create<R>(&self, record: R) -> Result<WriteOutcome<R>>
    where
        R: SecureRecord,
        Rm: RemoteStore<R>,
        L: LocalStore<R>,
    {
        self.create_with(record, self.config).await
    }

    /// [`Keeper::create`] with deadlines for this call only.
    ///
    /// Wrapping a write in an outer timeout can cancel it between the remote
    /// commit and the local write with no outcome reported; pass deadlines
    /// here instead.
    pub async fn create_with<R>(
        &self,
        record: R,
        deadlines: KeeperConfig,
    ) -> Result<WriteOutcome<R>>
    where
        R: SecureRecord,
        Rm: RemoteStore<R>,
        L: LocalStore<R>,
    {
        let cipher = self.session.cipher()?;
        let mut sealed = record.clone();
        sealed.encrypt_fields(&cipher)?;

        let stored = bounded(
            deadlines.remote_timeout,
            self.remote.create(sealed.clone()),
            RemoteError::Timeout,
        )
        .await?;
        let id = stored.id().to_string();
        debug!(kind = %R::KIND, id = %id, "remote create committed");

        // From here on the write is committed; nothing below may fail it.
        sealed.set_id(id.clone());
        let local = bounded(deadlines.local_timeout, self.local.create(sealed), CacheError::Timeout)
            .await
            .map(|_| ());

        let mut plain = record;
        plain.set_id(id.clone());
        Ok(settle(WriteOp::Create, R::KIND, &id, plain, local))
    }

    /// Read one record from the cache and decrypt it
    pub async fn read<R>(&self, id: &str) -> Result<Option<R>>
    where
        R: SecureRecord,
        L: LocalStore<R>,
    {
        let cipher = self.session.cipher()?;
        let cached = bounded(self.config.local_timeout, self.local.get(id), CacheError::Timeout)
            .await?;

        match cached {
            Some(mut record) => {
                record.decrypt_fields(&cipher)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Read and decrypt every cached record of a kind
    pub async fn read_all<R>(&self) -> Result<Vec<R>>
    where
        R: SecureRecord,
        L: LocalStore<R>,
    {
        let cipher = self.session.cipher()?;
        let cached =
            bounded(self.config.local_timeout, self.local.get_all(), CacheError::Timeout).await?;

        cached
            .into_iter()
            .map(|mut record| {
                record.decrypt_fields(&cipher)?;
                Ok(record)
            })
            .collect()
    }

    /// Encrypt and update remotely, then locally. The remote state wins.
    pub async fn update<R>(&self, record: R) -> Result<WriteOutcome<R>>
    where
        R: SecureRecord,
        Rm: RemoteStore<R>,
        L: LocalStore<R>,
    {
        self.update_with(record, self.config).await
    }

    /// [`Keeper::update`] with deadlines for this call only
    pub async fn update_with<R>(
        &self,
        record: R,
        deadlines: KeeperConfig,
    ) -> Result<WriteOutcome<R>>
    where
        R: SecureRecord,
        Rm: RemoteStore<R>,
        L: LocalStore<R>,
    {
        let cipher = self.session.cipher()?;
        let mut sealed = record.clone();
        sealed.encrypt_fields(&cipher)?;

        bounded(
            deadlines.remote_timeout,
            self.remote.update(sealed.clone()),
            RemoteError::Timeout,
        )
        .await?;
        let id = record.id().to_string();
        debug!(kind = %R::KIND, id = %id, "remote update committed");

        let local = bounded(deadlines.local_timeout, self.local.update(sealed), CacheError::Timeout)
            .await
            .map(|_| ());

        Ok(settle(WriteOp::Update, R::KIND, &id, record, local))
    }

    /// Delete remotely, then locally. A record already missing from the
    /// cache is the intended end state, not an error.
    pub async fn delete<R>(&self, id: &str) -> Result<WriteOutcome<()>>
    where
        R: SecureRecord,
        Rm: RemoteStore<R>,
        L: LocalStore<R>,
    {
        self.delete_with::<R>(id, self.config).await
    }

    /// [`Keeper::delete`] with deadlines for this call only
    pub async fn delete_with<R>(
        &self,
        id: &str,
        deadlines: KeeperConfig,
    ) -> Result<WriteOutcome<()>>
    where
        R: SecureRecord,
        Rm: RemoteStore<R>,
        L: LocalStore<R>,
    {
        let remote = RemoteStore::<R>::delete(self.remote.as_ref(), id);
        bounded(deadlines.remote_timeout, remote, RemoteError::Timeout).await?;
        debug!(kind = %R::KIND, id, "remote delete committed");

        let local = LocalStore::<R>::delete(self.local.as_ref(), id);
        let local = match bounded(deadlines.local_timeout, local, CacheError::Timeout).await {
            Err(CacheError::NotFound(_)) => {
                debug!(kind = %R::KIND, id, "record was not cached");
                Ok(())
            }
            other => other,
        };

        Ok(settle(WriteOp::Delete, R::KIND, id, (), local))
    }
}

impl<T> WriteOutcome<T> {
    /// Treat a partial write as an error, for callers that cannot act on it
    pub fn into_result(self, op: WriteOp, kind: RecordKind, id: &str) -> Result<T> {
        match self {
            WriteOutcome::Committed(value) => Ok(value),
            WriteOutcome::Partial { local_error, .. } => Err(KeeperError::PartialFailure {
                op,
                kind,
                id: id.to_string(),
                source: local_error,
            }),
        }
    }
}
