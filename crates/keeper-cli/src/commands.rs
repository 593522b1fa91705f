//! Subcommand handlers over the orchestrator

use anyhow::Context;
use clap::{Subcommand, ValueEnum};
use keeper_core::{
    BinaryRecord, CardRecord, CredentialRecord, Keeper, LocalStore, RecordKind, RemoteStore,
    SecureRecord, TextRecord, WriteOutcome,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Binary,
    Card,
    Credential,
    Text,
}

impl From<KindArg> for RecordKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Binary => RecordKind::Binary,
            KindArg::Card => RecordKind::Card,
            KindArg::Credential => RecordKind::Credential,
            KindArg::Text => RecordKind::Text,
        }
    }
}

/// Field values for `add` and `update`. On update, omitted fields keep
/// their cached value.
#[derive(Debug, Subcommand)]
pub enum RecordFields {
    /// Arbitrary file contents
    Binary {
        #[arg(long)]
        metadata: Option<String>,
        /// File to read the payload from
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Bank card
    Card {
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long)]
        number: Option<String>,
        #[arg(long)]
        holder: Option<String>,
        #[arg(long)]
        expiration: Option<String>,
        #[arg(long)]
        cvv: Option<String>,
    },

    /// Login and password for some service
    Credential {
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long)]
        login: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },

    /// Free-form note
    Text {
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long)]
        data: Option<String>,
    },
}

fn set(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn warn_stale<T>(outcome: &WriteOutcome<T>) {
    if let Some(err) = outcome.local_error() {
        eprintln!(
            "⚠️  Saved on the server, but the local cache is stale until the next sync: {err}"
        );
    }
}

fn print_outcome<T: Serialize>(outcome: WriteOutcome<T>) -> anyhow::Result<()> {
    warn_stale(&outcome);
    print_json(outcome.value())
}

async fn list_kind<R, Rm, L>(keeper: &Keeper<Rm, L>) -> anyhow::Result<()>
where
    R: SecureRecord,
    L: LocalStore<R>,
{
    let records = keeper.read_all::<R>().await?;
    print_json(&records)
}

async fn get_kind<R, Rm, L>(keeper: &Keeper<Rm, L>, id: &str) -> anyhow::Result<()>
where
    R: SecureRecord,
    L: LocalStore<R>,
{
    let record = keeper
        .read::<R>(id)
        .await?
        .with_context(|| format!("no {} with id {id} in the local cache", R::KIND))?;
    print_json(&record)
}

async fn delete_kind<R, Rm, L>(keeper: &Keeper<Rm, L>, id: &str) -> anyhow::Result<()>
where
    R: SecureRecord,
    Rm: RemoteStore<R>,
    L: LocalStore<R>,
{
    let outcome = keeper.delete::<R>(id).await?;
    warn_stale(&outcome);
    println!("✅ Deleted {} {id}", R::KIND);
    Ok(())
}

async fn create_and_print<R, Rm, L>(keeper: &Keeper<Rm, L>, record: R) -> anyhow::Result<()>
where
    R: SecureRecord,
    Rm: RemoteStore<R>,
    L: LocalStore<R>,
{
    print_outcome(keeper.create(record).await?)
}

async fn update_and_print<R, Rm, L>(keeper: &Keeper<Rm, L>, record: R) -> anyhow::Result<()>
where
    R: SecureRecord,
    Rm: RemoteStore<R>,
    L: LocalStore<R>,
{
    print_outcome(keeper.update(record).await?)
}

/// Fetch the cached plaintext a patch applies to
async fn cached<R, Rm, L>(keeper: &Keeper<Rm, L>, id: &str) -> anyhow::Result<R>
where
    R: SecureRecord,
    L: LocalStore<R>,
{
    keeper
        .read::<R>(id)
        .await?
        .with_context(|| {
            format!("no {} with id {id} in the local cache; run `keeper sync`", R::KIND)
        })
}

async fn read_file(path: Option<PathBuf>) -> anyhow::Result<Option<Vec<u8>>> {
    match path {
        Some(path) => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(data))
        }
        None => Ok(None),
    }
}

pub async fn list<Rm, L>(keeper: &Keeper<Rm, L>, kind: KindArg) -> anyhow::Result<()>
where
    L: keeper_core::LocalBackend,
{
    match kind {
        KindArg::Binary => list_kind::<BinaryRecord, _, _>(keeper).await,
        KindArg::Card => list_kind::<CardRecord, _, _>(keeper).await,
        KindArg::Credential => list_kind::<CredentialRecord, _, _>(keeper).await,
        KindArg::Text => list_kind::<TextRecord, _, _>(keeper).await,
    }
}

pub async fn get<Rm, L>(keeper: &Keeper<Rm, L>, kind: KindArg, id: &str) -> anyhow::Result<()>
where
    L: keeper_core::LocalBackend,
{
    match kind {
        KindArg::Binary => get_kind::<BinaryRecord, _, _>(keeper, id).await,
        KindArg::Card => get_kind::<CardRecord, _, _>(keeper, id).await,
        KindArg::Credential => get_kind::<CredentialRecord, _, _>(keeper, id).await,
        KindArg::Text => get_kind::<TextRecord, _, _>(keeper, id).await,
    }
}

pub async fn delete<Rm, L>(keeper: &Keeper<Rm, L>, kind: KindArg, id: &str) -> anyhow::Result<()>
where
    Rm: keeper_core::RemoteBackend,
    L: keeper_core::LocalBackend,
{
    match kind {
        KindArg::Binary => delete_kind::<BinaryRecord, _, _>(keeper, id).await,
        KindArg::Card => delete_kind::<CardRecord, _, _>(keeper, id).await,
        KindArg::Credential => delete_kind::<CredentialRecord, _, _>(keeper, id).await,
        KindArg::Text => delete_kind::<TextRecord, _, _>(keeper, id).await,
    }
}

pub async fn add<Rm, L>(keeper: &Keeper<Rm, L>, fields: RecordFields) -> anyhow::Result<()>
where
    Rm: keeper_core::RemoteBackend,
    L: keeper_core::LocalBackend,
{
    match fields {
        RecordFields::Binary { metadata, file } => {
            let mut record = BinaryRecord::default();
            set(&mut record.metadata, metadata);
            record.data = read_file(file).await?.unwrap_or_default();
            create_and_print(keeper, record).await
        }
        RecordFields::Card {
            metadata,
            number,
            holder,
            expiration,
            cvv,
        } => {
            let mut record = CardRecord::default();
            set(&mut record.metadata, metadata);
            set(&mut record.number, number);
            set(&mut record.holder, holder);
            set(&mut record.expiration, expiration);
            set(&mut record.cvv, cvv);
            create_and_print(keeper, record).await
        }
        RecordFields::Credential {
            metadata,
            login,
            password,
        } => {
            let mut record = CredentialRecord::default();
            set(&mut record.metadata, metadata);
            set(&mut record.login, login);
            set(&mut record.password, password);
            create_and_print(keeper, record).await
        }
        RecordFields::Text { metadata, data } => {
            let mut record = TextRecord::default();
            set(&mut record.metadata, metadata);
            set(&mut record.data, data);
            create_and_print(keeper, record).await
        }
    }
}

pub async fn update<Rm, L>(
    keeper: &Keeper<Rm, L>,
    id: &str,
    fields: RecordFields,
) -> anyhow::Result<()>
where
    Rm: keeper_core::RemoteBackend,
    L: keeper_core::LocalBackend,
{
    match fields {
        RecordFields::Binary { metadata, file } => {
            let mut record: BinaryRecord = cached(keeper, id).await?;
            set(&mut record.metadata, metadata);
            if let Some(data) = read_file(file).await? {
                record.data = data;
            }
            update_and_print(keeper, record).await
        }
        RecordFields::Card {
            metadata,
            number,
            holder,
            expiration,
            cvv,
        } => {
            let mut record: CardRecord = cached(keeper, id).await?;
            set(&mut record.metadata, metadata);
            set(&mut record.number, number);
            set(&mut record.holder, holder);
            set(&mut record.expiration, expiration);
            set(&mut record.cvv, cvv);
            update_and_print(keeper, record).await
        }
        RecordFields::Credential {
            metadata,
            login,
            password,
        } => {
            let mut record: CredentialRecord = cached(keeper, id).await?;
            set(&mut record.metadata, metadata);
            set(&mut record.login, login);
            set(&mut record.password, password);
            update_and_print(keeper, record).await
        }
        RecordFields::Text { metadata, data } => {
            let mut record: TextRecord = cached(keeper, id).await?;
            set(&mut record.metadata, metadata);
            set(&mut record.data, data);
            update_and_print(keeper, record).await
        }
    }
}
