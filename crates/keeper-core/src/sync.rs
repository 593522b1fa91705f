//! Remote-wins reconciliation
//!
//! Each kind is pulled from the remote store and replaces the local table
//! wholesale. Kinds run in a fixed order and the pass stops at the first
//! failure; kinds already reconciled stay reconciled.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::error::{CacheError, KeeperError, RemoteError};
use crate::keeper::{bounded, KeeperConfig};
use crate::record::{
    BinaryRecord, CardRecord, CredentialRecord, RecordKind, SecureRecord, TextRecord,
};
use crate::store::{LocalBackend, LocalStore, RemoteBackend, RemoteStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Records pulled per kind by one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub binaries: usize,
    pub cards: usize,
    pub credentials: usize,
    pub texts: usize,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.binaries + self.cards + self.credentials + self.texts
    }

    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Binary => self.binaries,
            RecordKind::Card => self.cards,
            RecordKind::Credential => self.credentials,
            RecordKind::Text => self.texts,
        }
    }
}

#[derive(Debug, Default)]
pub struct SyncEngine {
    syncing: AtomicBool,
}

/// Flips the engine back to idle however the pass ends
struct SyncGuard<'a>(&'a AtomicBool);

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SyncState {
        if self.syncing.load(Ordering::Acquire) {
            SyncState::Syncing
        } else {
            SyncState::Idle
        }
    }

    fn begin(&self) -> Result<SyncGuard<'_>, KeeperError> {
        self.syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| KeeperError::SyncInProgress)?;
        Ok(SyncGuard(&self.syncing))
    }

    /// Run one full pass: binaries, cards, credentials, text data.
    ///
    /// Never writes to the remote store.
    pub async fn run<Rm, L>(
        &self,
        remote: &Rm,
        local: &L,
        config: &KeeperConfig,
    ) -> Result<SyncReport, KeeperError>
    where
        Rm: RemoteBackend,
        L: LocalBackend,
    {
        let _guard = self.begin()?;
        info!("sync started");

        let report = SyncReport {
            binaries: reconcile::<BinaryRecord, _, _>(remote, local, config).await?,
            cards: reconcile::<CardRecord, _, _>(remote, local, config).await?,
            credentials: reconcile::<CredentialRecord, _, _>(remote, local, config).await?,
            texts: reconcile::<TextRecord, _, _>(remote, local, config).await?,
        };

        info!(total = report.total(), "sync complete");
        Ok(report)
    }
}

/// Replace one kind's local table with a fresh remote pull
async fn reconcile<R, Rm, L>(
    remote: &Rm,
    local: &L,
    config: &KeeperConfig,
) -> Result<usize, KeeperError>
where
    R: SecureRecord,
    Rm: RemoteStore<R>,
    L: LocalStore<R>,
{
    let kind = R::KIND;
    let fail = |source: KeeperError| {
        warn!(%kind, error = %source, "sync aborted");
        KeeperError::Sync {
            kind,
            source: Box::new(source),
        }
    };

    let records = bounded(config.remote_timeout, remote.get_all(), RemoteError::Timeout)
        .await
        .map_err(|err| fail(err.into()))?;

    let count = bounded(config.local_timeout, local.replace_all(records), CacheError::Timeout)
        .await
        .map_err(|err| fail(err.into()))?;

    info!(%kind, count, "kind reconciled");
    Ok(count)
}
