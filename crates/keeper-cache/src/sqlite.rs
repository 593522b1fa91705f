//! SQLite local cache via sqlx
//!
//! One table per record kind. Statements are built from each kind's field
//! table, so a column exists for every field and nothing else.

use async_trait::async_trait;
use keeper_core::{CacheError, FieldMut, LocalStore, SecureRecord};
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Row, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const MAX_CONNECTIONS: u32 = 4;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed cache. Cheap to clone (the pool is shared).
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open or create the cache database at `path` and apply migrations
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(CacheError::storage)?;
        }

        // WAL must be set on the connection, not inside a migration.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(CacheError::storage)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(CacheError::storage)?;

        info!(path = %path.display(), "local cache opened");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn insert_sql<R: SecureRecord>() -> String {
    let names = R::field_names();
    let placeholders = vec!["?"; names.len() + 1].join(", ");
    format!(
        "INSERT INTO {} (id, {}) VALUES ({})",
        R::KIND.table(),
        names.join(", "),
        placeholders
    )
}

fn update_sql<R: SecureRecord>() -> String {
    let assignments: Vec<String> = R::field_names()
        .iter()
        .map(|name| format!("{name} = ?"))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE id = ?",
        R::KIND.table(),
        assignments.join(", ")
    )
}

fn select_sql<R: SecureRecord>() -> String {
    format!(
        "SELECT id, {} FROM {}",
        R::field_names().join(", "),
        R::KIND.table()
    )
}

/// Bind every field value, in table order
fn bind_fields<'q, R: SecureRecord>(mut query: SqliteQuery<'q>, record: &R) -> SqliteQuery<'q> {
    let mut record = record.clone();
    for field in record.fields_mut() {
        query = match field.value {
            FieldMut::Text(value) => query.bind(std::mem::take(value)),
            FieldMut::Bytes(value) => query.bind(std::mem::take(value)),
        };
    }
    query
}

fn decode<R: SecureRecord>(row: &SqliteRow) -> Result<R, sqlx::Error> {
    let mut record = R::default();
    record.set_id(row.try_get("id")?);
    for field in record.fields_mut() {
        match field.value {
            FieldMut::Text(value) => {
                *value = row.try_get::<Option<String>, _>(field.name)?.unwrap_or_default();
            }
            FieldMut::Bytes(value) => {
                *value = row.try_get::<Option<Vec<u8>>, _>(field.name)?.unwrap_or_default();
            }
        }
    }
    Ok(record)
}

fn require_id(id: &str) -> Result<(), CacheError> {
    if id.is_empty() {
        return Err(CacheError::InvalidArgument("record id must not be empty".into()));
    }
    Ok(())
}

fn insert_error(err: sqlx::Error, id: &str) -> CacheError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            CacheError::DuplicateId(id.to_string())
        }
        _ => CacheError::storage(err),
    }
}

#[async_trait]
impl<R: SecureRecord> LocalStore<R> for SqliteCache {
    async fn create(&self, record: R) -> Result<R, CacheError> {
        require_id(record.id())?;
        let sql = insert_sql::<R>();
        bind_fields(sqlx::query(&sql).bind(record.id().to_string()), &record)
            .execute(&self.pool)
            .await
            .map_err(|err| insert_error(err, record.id()))?;

        debug!(kind = %R::KIND, id = record.id(), "cached");
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<R>, CacheError> {
        let sql = format!("{} WHERE id = ?", select_sql::<R>());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::storage)?;

        row.as_ref()
            .map(decode::<R>)
            .transpose()
            .map_err(CacheError::storage)
    }

    async fn get_all(&self) -> Result<Vec<R>, CacheError> {
        let sql = format!("{} ORDER BY rowid", select_sql::<R>());
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(CacheError::storage)?;

        rows.iter()
            .map(decode::<R>)
            .collect::<Result<Vec<R>, _>>()
            .map_err(CacheError::storage)
    }

    async fn update(&self, record: R) -> Result<R, CacheError> {
        require_id(record.id())?;
        let sql = update_sql::<R>();
        let result = bind_fields(sqlx::query(&sql), &record)
            .bind(record.id().to_string())
            .execute(&self.pool)
            .await
            .map_err(CacheError::storage)?;

        if result.rows_affected() == 0 {
            return Err(CacheError::NotFound(record.id().to_string()));
        }
        debug!(kind = %R::KIND, id = record.id(), "cache updated");
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<(), CacheError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", R::KIND.table());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(CacheError::storage)?;

        if result.rows_affected() == 0 {
            return Err(CacheError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let sql = format!("DELETE FROM {}", R::KIND.table());
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(CacheError::storage)?;
        Ok(())
    }

    /// Clear and refill in one transaction. Either the whole remote set
    /// lands or the previous contents stay.
    async fn replace_all(&self, records: Vec<R>) -> Result<usize, CacheError> {
        for record in &records {
            require_id(record.id())?;
        }

        let mut tx = self.pool.begin().await.map_err(CacheError::storage)?;

        let clear = format!("DELETE FROM {}", R::KIND.table());
        sqlx::query(&clear)
            .execute(&mut *tx)
            .await
            .map_err(CacheError::storage)?;

        let insert = insert_sql::<R>();
        for record in &records {
            bind_fields(sqlx::query(&insert).bind(record.id().to_string()), record)
                .execute(&mut *tx)
                .await
                .map_err(|err| insert_error(err, record.id()))?;
        }

        tx.commit().await.map_err(CacheError::storage)?;
        Ok(records.len())
    }
}
