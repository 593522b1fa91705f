//! Test doubles for the store traits

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::error::{CacheError, RemoteError};
use crate::memory::MemoryCache;
use crate::record::{FieldMut, RecordKind, SecureRecord};
use crate::store::{LocalStore, RemoteStore};

/// Remote store that assigns `r-N` ids and can be taken offline
#[derive(Default)]
pub struct FakeRemote {
    records: MemoryCache,
    next_id: AtomicU64,
    offline: AtomicBool,
    tamper_replies: AtomicBool,
    failing: Mutex<HashSet<RecordKind>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record directly, bypassing failure switches
    pub async fn seed<R: SecureRecord>(&self, mut record: R) -> R {
        if record.id().is_empty() {
            record.set_id(self.assign_id());
        }
        LocalStore::<R>::create(&self.records, record)
            .await
            .expect("seed record")
    }

    /// Every call for any kind fails with `Unavailable`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Store records as sent but answer with a corrupted copy
    pub fn tamper_replies(&self, tamper: bool) {
        self.tamper_replies.store(tamper, Ordering::SeqCst);
    }

    /// Calls for `kind` fail with `Unavailable`
    pub fn fail_kind(&self, kind: RecordKind) {
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(kind);
    }

    /// Everything the server holds for a kind, as ciphertext
    pub async fn stored<R: SecureRecord>(&self) -> Vec<R> {
        LocalStore::<R>::get_all(&self.records)
            .await
            .expect("read fake remote")
    }

    fn assign_id(&self) -> String {
        format!("r-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn reply<R: SecureRecord>(&self, mut record: R) -> R {
        if self.tamper_replies.load(Ordering::SeqCst) {
            for field in record.fields_mut() {
                match field.value {
                    FieldMut::Text(value) if !value.is_empty() => *value = "tampered".into(),
                    FieldMut::Bytes(value) if !value.is_empty() => *value = b"tampered".to_vec(),
                    _ => {}
                }
            }
        }
        record
    }

    fn check(&self, kind: RecordKind) -> Result<(), RemoteError> {
        let failing = self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&kind);
        if failing || self.offline.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(format!("{kind} endpoint unreachable")));
        }
        Ok(())
    }
}

fn backend(err: CacheError) -> RemoteError {
    match err {
        CacheError::NotFound(id) => RemoteError::NotFound(id),
        other => RemoteError::Rejected {
            status: 500,
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl<R: SecureRecord> RemoteStore<R> for FakeRemote {
    async fn create(&self, mut record: R) -> Result<R, RemoteError> {
        self.check(R::KIND)?;
        record.set_id(self.assign_id());
        let stored = LocalStore::<R>::create(&self.records, record)
            .await
            .map_err(backend)?;
        Ok(self.reply(stored))
    }

    async fn get_all(&self) -> Result<Vec<R>, RemoteError> {
        self.check(R::KIND)?;
        LocalStore::<R>::get_all(&self.records).await.map_err(backend)
    }

    async fn update(&self, record: R) -> Result<R, RemoteError> {
        self.check(R::KIND)?;
        let stored = LocalStore::<R>::update(&self.records, record)
            .await
            .map_err(backend)?;
        Ok(self.reply(stored))
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.check(R::KIND)?;
        LocalStore::<R>::delete(&self.records, id).await.map_err(backend)
    }
}

/// Local cache whose writes can be made to fail or stall
#[derive(Default)]
pub struct FailingCache {
    inner: MemoryCache,
    fail_writes: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FailingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stall every write by `delay`
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = delay;
    }

    async fn before_write(&self) -> Result<(), CacheError> {
        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::storage("disk full"));
        }
        Ok(())
    }
}

#[async_trait]
impl<R: SecureRecord> LocalStore<R> for FailingCache {
    async fn create(&self, record: R) -> Result<R, CacheError> {
        self.before_write().await?;
        self.inner.create(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<R>, CacheError> {
        self.inner.get(id).await
    }

    async fn get_all(&self) -> Result<Vec<R>, CacheError> {
        self.inner.get_all().await
    }

    async fn update(&self, record: R) -> Result<R, CacheError> {
        self.before_write().await?;
        self.inner.update(record).await
    }

    async fn delete(&self, id: &str) -> Result<(), CacheError> {
        self.before_write().await?;
        LocalStore::<R>::delete(&self.inner, id).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.before_write().await?;
        LocalStore::<R>::clear(&self.inner).await
    }

    async fn replace_all(&self, records: Vec<R>) -> Result<usize, CacheError> {
        self.before_write().await?;
        self.inner.replace_all(records).await
    }
}
