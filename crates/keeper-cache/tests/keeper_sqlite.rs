//! End-to-end: orchestrator over the SQLite cache and an in-process server

use async_trait::async_trait;
use keeper_cache::SqliteCache;
use keeper_core::{
    BinaryRecord, CardRecord, CipherError, CredentialRecord, Keeper, KeeperError, LocalStore,
    MemoryCache, RemoteError, RemoteStore, SecureRecord, TextRecord,
};
use secrecy::SecretString;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Server stand-in: assigns uuid ids and keeps whatever it is sent
#[derive(Default)]
struct Server {
    records: MemoryCache,
}

fn rejected(err: keeper_core::CacheError) -> RemoteError {
    RemoteError::Rejected {
        status: 400,
        message: err.to_string(),
    }
}

#[async_trait]
impl<R: SecureRecord> RemoteStore<R> for Server {
    async fn create(&self, mut record: R) -> Result<R, RemoteError> {
        record.set_id(Uuid::new_v4().to_string());
        LocalStore::<R>::create(&self.records, record).await.map_err(rejected)
    }

    async fn get_all(&self) -> Result<Vec<R>, RemoteError> {
        LocalStore::<R>::get_all(&self.records).await.map_err(rejected)
    }

    async fn update(&self, record: R) -> Result<R, RemoteError> {
        LocalStore::<R>::update(&self.records, record).await.map_err(rejected)
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        LocalStore::<R>::delete(&self.records, id)
            .await
            .map_err(|_| RemoteError::NotFound(id.to_string()))
    }
}

fn password(s: &str) -> SecretString {
    SecretString::new(s.to_string())
}

async fn keeper(dir: &TempDir, server: Arc<Server>) -> Keeper<Server, SqliteCache> {
    let cache = SqliteCache::open(&dir.path().join("cache.db")).await.unwrap();
    Keeper::new(server, Arc::new(cache))
}

#[tokio::test]
async fn test_cache_holds_only_ciphertext() {
    let dir = TempDir::new().unwrap();
    let keeper = keeper(&dir, Arc::new(Server::default())).await;
    keeper.start_session(&password("pw1")).await.unwrap();

    let text = keeper
        .create(TextRecord::new("note", "launch codes"))
        .await
        .unwrap()
        .into_value();
    let card = keeper
        .create(CardRecord {
            metadata: "visa".into(),
            number: "4111111111111111".into(),
            holder: "J DOE".into(),
            expiration: "12/29".into(),
            cvv: "123".into(),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_value();
    let binary = keeper
        .create(BinaryRecord::new("key file", b"-----BEGIN-----".to_vec()))
        .await
        .unwrap()
        .into_value();
    let credential = keeper
        .create(CredentialRecord::new("mail", "alice", "hunter2"))
        .await
        .unwrap()
        .into_value();

    let raw: TextRecord = keeper.local().get(&text.id).await.unwrap().unwrap();
    assert_ne!(raw.data, "launch codes");
    assert_ne!(raw.metadata, "note");

    let raw: CardRecord = keeper.local().get(&card.id).await.unwrap().unwrap();
    assert_ne!(raw.number, "4111111111111111");
    assert_ne!(raw.cvv, "123");

    let raw: BinaryRecord = keeper.local().get(&binary.id).await.unwrap().unwrap();
    assert_ne!(raw.data, b"-----BEGIN-----".to_vec());

    let raw: CredentialRecord = keeper.local().get(&credential.id).await.unwrap().unwrap();
    assert_ne!(raw.metadata, "mail");
    assert_eq!(raw.login, "alice");

    assert_eq!(keeper.read::<TextRecord>(&text.id).await.unwrap(), Some(text));
    assert_eq!(keeper.read::<CardRecord>(&card.id).await.unwrap(), Some(card));
    assert_eq!(keeper.read::<BinaryRecord>(&binary.id).await.unwrap(), Some(binary));
    assert_eq!(
        keeper.read::<CredentialRecord>(&credential.id).await.unwrap(),
        Some(credential)
    );
}

#[tokio::test]
async fn test_second_device_sees_first_device_writes() {
    let server = Arc::new(Server::default());

    let phone_dir = TempDir::new().unwrap();
    let phone = keeper(&phone_dir, server.clone()).await;
    phone.start_session(&password("pw1")).await.unwrap();
    let created = phone
        .create(TextRecord::new("note", "shared"))
        .await
        .unwrap()
        .into_value();

    let laptop_dir = TempDir::new().unwrap();
    let laptop = keeper(&laptop_dir, server.clone()).await;
    let report = laptop.start_session(&password("pw1")).await.unwrap();
    assert_eq!(report.texts, 1);
    assert_eq!(report.total(), 1);

    let read = laptop.read::<TextRecord>(&created.id).await.unwrap();
    assert_eq!(read, Some(created.clone()));

    // Deleted on the phone: the laptop keeps its stale copy until it syncs.
    phone.delete::<TextRecord>(&created.id).await.unwrap();
    assert!(laptop.read::<TextRecord>(&created.id).await.unwrap().is_some());
    laptop.sync().await.unwrap();
    assert!(laptop.read::<TextRecord>(&created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_wrong_password_cannot_open_cache() {
    let server = Arc::new(Server::default());
    let dir = TempDir::new().unwrap();

    let keeper = keeper(&dir, server).await;
    keeper.start_session(&password("pw1")).await.unwrap();
    let id = keeper
        .create(TextRecord::new("note", "secret"))
        .await
        .unwrap()
        .into_value()
        .id;
    keeper.end_session();

    keeper.start_session(&password("pw2")).await.unwrap();
    let err = keeper.read::<TextRecord>(&id).await.unwrap_err();
    assert!(matches!(err, KeeperError::Crypto(CipherError::AuthenticationFailed)));
}

#[tokio::test]
async fn test_cache_survives_restart_offline() {
    let dir = TempDir::new().unwrap();
    let server = Arc::new(Server::default());

    let first = keeper(&dir, server.clone()).await;
    first.start_session(&password("pw1")).await.unwrap();
    let id = first
        .create(TextRecord::new("note", "kept"))
        .await
        .unwrap()
        .into_value()
        .id;
    first.local().close().await;

    // New process, no sync: only the key is derived.
    let second = keeper(&dir, server).await;
    second.session().derive_key(&password("pw1"));
    let read = second.read::<TextRecord>(&id).await.unwrap().unwrap();
    assert_eq!(read.data, "kept");
}
