//! In-memory local store
//!
//! Same contract as the SQLite cache, nothing survives the process.
//! Useful for ephemeral sessions and as a test double.

use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::error::CacheError;
use crate::record::{RecordKind, SecureRecord};
use crate::store::LocalStore;

type Table<R> = HashMap<String, R>;

#[derive(Default)]
pub struct MemoryCache {
    tables: Mutex<HashMap<RecordKind, Box<dyn Any + Send>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_table<R, T>(&self, f: impl FnOnce(&mut Table<R>) -> T) -> Result<T, CacheError>
    where
        R: SecureRecord,
    {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .entry(R::KIND)
            .or_insert_with(|| Box::new(Table::<R>::new()) as Box<dyn Any + Send>)
            .downcast_mut::<Table<R>>()
            .ok_or_else(|| CacheError::storage(format!("table {} holds another type", R::KIND)))?;
        Ok(f(table))
    }
}

fn require_id(id: &str) -> Result<(), CacheError> {
    if id.is_empty() {
        return Err(CacheError::InvalidArgument("record id must not be empty".into()));
    }
    Ok(())
}

#[async_trait]
impl<R: SecureRecord> LocalStore<R> for MemoryCache {
    async fn create(&self, record: R) -> Result<R, CacheError> {
        require_id(record.id())?;
        self.with_table(|table: &mut Table<R>| {
            if table.contains_key(record.id()) {
                return Err(CacheError::DuplicateId(record.id().to_string()));
            }
            table.insert(record.id().to_string(), record.clone());
            Ok(record)
        })?
    }

    async fn get(&self, id: &str) -> Result<Option<R>, CacheError> {
        self.with_table(|table: &mut Table<R>| table.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<R>, CacheError> {
        self.with_table(|table: &mut Table<R>| table.values().cloned().collect())
    }

    async fn update(&self, record: R) -> Result<R, CacheError> {
        require_id(record.id())?;
        self.with_table(|table: &mut Table<R>| match table.get_mut(record.id()) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(CacheError::NotFound(record.id().to_string())),
        })?
    }

    async fn delete(&self, id: &str) -> Result<(), CacheError> {
        self.with_table(|table: &mut Table<R>| match table.remove(id) {
            Some(_) => Ok(()),
            None => Err(CacheError::NotFound(id.to_string())),
        })?
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.with_table(|table: &mut Table<R>| table.clear())
    }

    /// Atomic: the new table is built first and swapped in, so on error
    /// the previous contents stay.
    async fn replace_all(&self, records: Vec<R>) -> Result<usize, CacheError> {
        let mut fresh = Table::<R>::with_capacity(records.len());
        for record in records {
            require_id(record.id())?;
            if fresh.contains_key(record.id()) {
                return Err(CacheError::DuplicateId(record.id().to_string()));
            }
            fresh.insert(record.id().to_string(), record);
        }
        let count = fresh.len();
        self.with_table(|table: &mut Table<R>| *table = fresh)?;
        Ok(count)
    }
}
