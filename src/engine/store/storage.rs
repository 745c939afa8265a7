//! Store: the storage engine entry point
//!
//! A `Store` owns its configuration and id generator; nothing is global, so
//! several stores can live in one process.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use crate::engine::config::StoreConfig;

use super::document::Document;
use super::error::{Result, StoreError};
use super::id::{IdGenerator, RowId, TimestampIdGenerator};
use super::path;
use super::query::{self, Query};
use super::table::Table;

/// Handle on one database instance rooted at `config.root`.
///
/// Cheap to clone. Operations take no locks: concurrent writers to one row
/// race, except explicit-id inserts, which are exclusive.
#[derive(Clone)]
pub struct Store {
    config: Arc<StoreConfig>,
    ids: Arc<dyn IdGenerator>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Store {
    /// Open an existing store
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let tables = path::tables_dir(&config.root);

        match fs::metadata(&tables).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StoreError::StoreNotFound(config.root)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::StoreNotFound(config.root))
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self::from_config(config))
    }

    /// Create the store layout (root and tables directory) and open it.
    /// Running setup on an existing store is harmless.
    pub async fn setup(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(path::tables_dir(&config.root)).await?;
        info!(root = %config.root.display(), "store ready");
        Ok(Self::from_config(config))
    }

    /// Open or create a store
    pub async fn open_or_setup(config: StoreConfig) -> Result<Self> {
        match Self::open(config.clone()).await {
            Err(StoreError::StoreNotFound(_)) => Self::setup(config).await,
            other => other,
        }
    }

    fn from_config(config: StoreConfig) -> Self {
        Self {
            config: Arc::new(config),
            ids: Arc::new(TimestampIdGenerator),
        }
    }

    /// Replace the strategy used for inserts without an explicit id
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    // ========== Tables ==========

    /// Open a handle on an existing table
    pub async fn table(&self, name: &str) -> Result<Table> {
        Table::open(self.root(), name, self.config.pretty).await
    }

    pub async fn create_table(&self, name: &str) -> Result<Table> {
        Table::create(self.root(), name, self.config.pretty).await
    }

    /// Whether a table exists. Invalid names and I/O failures are errors,
    /// not `false`.
    pub async fn table_exists(&self, name: &str) -> Result<bool> {
        match self.table(name).await {
            Ok(_) => Ok(true),
            Err(StoreError::TableNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Names of all tables, sorted
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(path::tables_dir(self.root())).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::StoreNotFound(self.root().to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut tables = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                // Skip hidden and reserved directories
                if path::validate_table_name(name).is_ok() {
                    tables.push(name.to_string());
                }
            }
        }

        tables.sort();
        Ok(tables)
    }

    /// Delete a table and every row in it
    pub async fn delete_table(&self, name: &str) -> Result<()> {
        self.table(name).await?.drop().await
    }

    /// Rename a table. The destination name must be free.
    pub async fn rename_table(&self, name: &str, new_name: &str) -> Result<()> {
        let from = self.table(name).await?;
        let to = path::table_dir(self.root(), new_name)?;

        // rename(2) would happily replace an empty directory
        match fs::symlink_metadata(&to).await {
            Ok(_) => return Err(StoreError::TableAlreadyExists(new_name.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match fs::rename(from.path(), &to).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::TableNotFound(name.to_string()))
            }
            Err(e) if is_occupied(&e) => {
                return Err(StoreError::TableAlreadyExists(new_name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        info!(from = name, to = new_name, "renamed table");
        Ok(())
    }

    /// Number of rows in a table
    pub async fn count(&self, table: &str) -> Result<usize> {
        self.table(table).await?.count().await
    }

    /// IDs of every row in a table, sorted
    pub async fn list_ids(&self, table: &str) -> Result<Vec<RowId>> {
        self.table(table).await?.list_ids().await
    }

    // ========== Rows ==========

    /// Insert under a generated id and return it.
    ///
    /// A generated id that is already taken is not an error: a fresh
    /// candidate is requested, up to `max_insert_attempts` in total.
    pub async fn insert(&self, table: &str, data: Document) -> Result<RowId> {
        let table = self.table(table).await?;
        let attempts = self.config.insert_attempts();

        for attempt in 1..=attempts {
            let id = self.ids.generate();
            match table.insert(id.as_str(), &data).await {
                Ok(()) => return Ok(id),
                Err(StoreError::DuplicateId { .. }) => {
                    debug!(table = %table.name, %id, attempt, "generated id collided");
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::IdsExhausted {
            table: table.name.clone(),
            attempts,
        })
    }

    /// Insert under a caller-chosen id; fails with `DuplicateId` if taken.
    pub async fn insert_with_id(
        &self,
        table: &str,
        id: impl Into<RowId>,
        data: Document,
    ) -> Result<RowId> {
        let id = id.into();
        self.table(table).await?.insert(id.as_str(), &data).await?;
        Ok(id)
    }

    pub async fn get_row(&self, table: &str, id: impl Into<RowId>) -> Result<Document> {
        let id = id.into();
        self.table(table).await?.get(id.as_str()).await
    }

    /// Shallow-merge `partial` into a row; returns the merged document
    pub async fn update(
        &self,
        table: &str,
        id: impl Into<RowId>,
        partial: Document,
    ) -> Result<Document> {
        let id = id.into();
        self.table(table).await?.update(id.as_str(), partial).await
    }

    pub async fn delete_row(&self, table: &str, id: impl Into<RowId>) -> Result<()> {
        let id = id.into();
        self.table(table).await?.delete(id.as_str()).await
    }

    /// Move a row to another table, keeping its id and content.
    ///
    /// The destination copy is written and synced before the source is
    /// removed, so an interruption leaves the row in the source table
    /// (possibly in both), never in neither.
    pub async fn move_row(&self, from: &str, to: &str, id: impl Into<RowId>) -> Result<()> {
        let id = id.into();
        let source = self.table(from).await?;
        let dest = self.table(to).await?;

        let bytes = source.get_raw(id.as_str()).await?;
        dest.insert_raw(id.as_str(), &bytes).await?;
        source.delete(id.as_str()).await?;

        info!(from, to, %id, "moved row");
        Ok(())
    }

    // ========== Queries ==========

    /// Every row of a table, in id order
    pub async fn get_all(&self, table: &str) -> Result<Vec<Document>> {
        self.table(table).await?.all().await
    }

    /// Rows whose `key` strictly equals `value`
    pub async fn filter(
        &self,
        table: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Document>> {
        let docs = self.get_all(table).await?;
        Ok(query::filter_eq(docs, key, &value.into()))
    }

    /// Left outer join of `left` with `right` on `key`; left fields win
    pub async fn eq_join(&self, left: &str, right: &str, key: &str) -> Result<Vec<Document>> {
        let (left_docs, right_docs) = tokio::try_join!(self.get_all(left), self.get_all(right))?;
        Ok(query::eq_join(&left_docs, &right_docs, key))
    }

    pub async fn query(&self, table: &str, query: &Query) -> Result<Vec<Document>> {
        let docs = self.get_all(table).await?;
        Ok(query.execute(docs))
    }
}

/// Whether a rename failed because the destination directory is in use
fn is_occupied(e: &io::Error) -> bool {
    if e.kind() == io::ErrorKind::AlreadyExists {
        return true;
    }
    occupied_os_error(e.raw_os_error())
}

// ENOTEMPTY is 39 on linux and 66 on the BSDs
#[cfg(unix)]
fn occupied_os_error(code: Option<i32>) -> bool {
    matches!(code, Some(17) | Some(39) | Some(66))
}

// ERROR_ALREADY_EXISTS
#[cfg(not(unix))]
fn occupied_os_error(code: Option<i32>) -> bool {
    code == Some(183)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::error::ErrorKind;
    use serde_json::json;
    use tempfile::tempdir;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_store_lifecycle() {
        let dir = tempdir().unwrap();

        let store = Store::setup(StoreConfig::new(dir.path())).await.unwrap();
        assert!(store.list_tables().await.unwrap().is_empty());

        store.create_table("users").await.unwrap();
        assert!(store.table_exists("users").await.unwrap());

        let id = store.insert("users", doc(json!({"name": "Alice", "age": 30}))).await.unwrap();
        let retrieved = store.get_row("users", &id).await.unwrap();
        assert_eq!(retrieved["name"], json!("Alice"));

        assert_eq!(store.count("users").await.unwrap(), 1);
        assert_eq!(store.list_ids("users").await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_store_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = Store::setup(StoreConfig::new(dir.path())).await.unwrap();
            store.create_table("test").await.unwrap();
            store.insert("test", doc(json!({"x": 1}))).await.unwrap();
        }

        {
            let store = Store::open(StoreConfig::new(dir.path())).await.unwrap();
            assert_eq!(store.count("test").await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_open_missing_store() {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("nowhere"));

        let err = Store::open(config.clone()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let store = Store::open_or_setup(config).await.unwrap();
        assert!(path::tables_dir(store.root()).is_dir());
    }

    #[tokio::test]
    async fn test_list_tables_skips_reserved_entries() {
        let dir = tempdir().unwrap();
        let store = Store::setup(StoreConfig::new(dir.path())).await.unwrap();

        store.create_table("b").await.unwrap();
        store.create_table("a").await.unwrap();
        std::fs::create_dir(path::tables_dir(dir.path()).join(".trash")).unwrap();
        std::fs::write(path::tables_dir(dir.path()).join("notes.txt"), "x").unwrap();

        assert_eq!(store.list_tables().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_rename_onto_empty_table_conflicts() {
        let dir = tempdir().unwrap();
        let store = Store::setup(StoreConfig::new(dir.path())).await.unwrap();

        store.create_table("a").await.unwrap();
        store.create_table("b").await.unwrap();

        let err = store.rename_table("a", "b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.list_tables().await.unwrap(), vec!["a", "b"]);
    }
}
