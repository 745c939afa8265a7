//! Table handles: one directory of row files
//!
//! Every row write goes through a hidden temp file that is flushed to disk
//! before it is published under its final name, so readers only ever see
//! complete documents. New rows are published with a hard link, which fails
//! when the target exists and gives exclusive-create semantics; updates are
//! published with a rename over the old file.

use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::try_join_all;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::document::{self, Document};
use super::error::{Result, StoreError};
use super::id::RowId;
use super::path;

/// Handle on an existing table directory.
///
/// Holding a handle does not keep the table alive: another caller may
/// delete or rename it, after which operations fail with `TableNotFound`.
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name
    pub name: String,

    /// Path to table directory
    path: PathBuf,

    /// Pretty-print rows on write
    pretty: bool,
}

impl Table {
    /// Open an existing table
    pub async fn open(root: &Path, name: &str, pretty: bool) -> Result<Self> {
        let path = path::table_dir(root, name)?;

        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StoreError::TableNotFound(name.to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::TableNotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            name: name.to_string(),
            path,
            pretty,
        })
    }

    /// Create a new, empty table
    pub async fn create(root: &Path, name: &str, pretty: bool) -> Result<Self> {
        let path = path::table_dir(root, name)?;

        // create_dir (not create_dir_all) so an existing table is an error
        match fs::create_dir(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::TableAlreadyExists(name.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::StoreNotFound(root.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        }

        info!(table = name, "created table");

        Ok(Self {
            name: name.to_string(),
            path,
            pretty,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn row_path(&self, id: &str) -> Result<PathBuf> {
        path::validate_row_id(id)?;
        Ok(self.path.join(path::row_file_name(id)))
    }

    /// Insert a document under `id`, failing if the id is taken.
    pub async fn insert(&self, id: &str, doc: &Document) -> Result<()> {
        let bytes = document::encode(doc, self.pretty)?;
        self.insert_raw(id, &bytes).await
    }

    /// Exclusive-create of an already-encoded row. Returns only once the
    /// row and its directory entry are on disk.
    pub(crate) async fn insert_raw(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let target = self.row_path(id)?;
        let tmp = self.write_temp(bytes).await?;

        let linked = fs::hard_link(&tmp, &target).await;
        self.discard_temp(&tmp).await;

        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::duplicate_id(&self.name, id))
            }
            Err(e) => return Err(self.map_io(e)),
        }

        let synced = self.sync_dir().await;
        self.published(id, synced)
    }

    /// Outcome of an insert whose row is already linked in place. A failed
    /// directory sync only weakens durability; reporting it as an error
    /// would hide a row that exists (and, for generated ids, its id).
    fn published(&self, id: &str, synced: Result<()>) -> Result<()> {
        if let Err(e) = synced {
            warn!(table = %self.name, id, error = %e, "failed to sync table directory");
        }
        debug!(table = %self.name, id, "inserted row");
        Ok(())
    }

    /// Get a document by ID
    pub async fn get(&self, id: &str) -> Result<Document> {
        let (path, bytes) = self.read(id).await?;
        document::decode(&path, &bytes)
    }

    /// Raw bytes of a row, after checking they decode to a document.
    pub(crate) async fn get_raw(&self, id: &str) -> Result<Vec<u8>> {
        let (path, bytes) = self.read(id).await?;
        document::decode(&path, &bytes)?;
        Ok(bytes)
    }

    async fn read(&self, id: &str) -> Result<(PathBuf, Vec<u8>)> {
        let path = self.row_path(id)?;

        match fs::read(&path).await {
            Ok(bytes) => Ok((path, bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(self.missing_row_or_table(id).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shallow-merge `partial` into the stored document and write it back.
    ///
    /// Read-modify-write: two concurrent updates of the same row can lose
    /// one of the merges.
    pub async fn update(&self, id: &str, partial: Document) -> Result<Document> {
        let mut doc = self.get(id).await?;
        document::merge(&mut doc, partial);

        let target = self.row_path(id)?;
        let bytes = document::encode(&doc, self.pretty)?;
        let tmp = self.write_temp(&bytes).await?;

        if let Err(e) = fs::rename(&tmp, &target).await {
            self.discard_temp(&tmp).await;
            return Err(self.map_io(e));
        }

        debug!(table = %self.name, id, "updated row");
        Ok(doc)
    }

    /// Delete a document
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.row_path(id)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(table = %self.name, id, "deleted row");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(self.missing_row_or_table(id).await)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List all row IDs, sorted
    pub async fn list_ids(&self) -> Result<Vec<RowId>> {
        let mut entries = fs::read_dir(&self.path).await.map_err(|e| self.map_io(e))?;
        let mut ids = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(path::row_id_from_file_name) {
                ids.push(RowId::from(id));
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Count documents
    pub async fn count(&self) -> Result<usize> {
        Ok(self.list_ids().await?.len())
    }

    /// All documents, in row ID order. Rows are read concurrently and the
    /// first failure is returned.
    pub async fn all(&self) -> Result<Vec<Document>> {
        let ids = self.list_ids().await?;
        try_join_all(ids.iter().map(|id| self.get(id.as_str()))).await
    }

    /// Drop this table and every row in it
    pub async fn drop(self) -> Result<()> {
        fs::remove_dir_all(&self.path).await.map_err(|e| self.map_io(e))?;
        info!(table = %self.name, "dropped table");
        Ok(())
    }

    async fn write_temp(&self, bytes: &[u8]) -> Result<PathBuf> {
        // named from the uuid alone so long ids still fit in NAME_MAX
        let tmp = self.path.join(format!(".{}.tmp", Uuid::new_v4().simple()));

        let written = async {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp)
                .await?;
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            if e.kind() != io::ErrorKind::NotFound {
                self.discard_temp(&tmp).await;
            }
            return Err(self.map_io(e));
        }

        Ok(tmp)
    }

    async fn discard_temp(&self, tmp: &Path) {
        if let Err(e) = fs::remove_file(tmp).await {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
            }
        }
    }

    #[cfg(unix)]
    async fn sync_dir(&self) -> Result<()> {
        fs::File::open(&self.path).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> Result<()> {
        Ok(())
    }

    /// A missing row file means either the row or the whole table is gone.
    async fn missing_row_or_table(&self, id: &str) -> StoreError {
        match fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() => StoreError::row_not_found(&self.name, id),
            _ => StoreError::TableNotFound(self.name.clone()),
        }
    }

    fn map_io(&self, e: io::Error) -> StoreError {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::TableNotFound(self.name.clone())
        } else {
            e.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::error::ErrorKind;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn setup(root: &Path) -> Table {
        fs::create_dir_all(path::tables_dir(root)).await.unwrap();
        Table::create(root, "users", true).await.unwrap()
    }

    #[tokio::test]
    async fn test_table_crud() {
        let dir = tempdir().unwrap();
        let table = setup(dir.path()).await;

        table.insert("1", &doc(json!({"name": "Alice", "age": 30}))).await.unwrap();
        assert_eq!(table.get("1").await.unwrap()["name"], json!("Alice"));

        let merged = table.update("1", doc(json!({"age": 31}))).await.unwrap();
        assert_eq!(Value::Object(merged), json!({"name": "Alice", "age": 31}));

        table.delete("1").await.unwrap();
        assert_eq!(table.get("1").await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_insert_is_exclusive() {
        let dir = tempdir().unwrap();
        let table = setup(dir.path()).await;

        table.insert("1", &doc(json!({"v": 1}))).await.unwrap();
        let err = table.insert("1", &doc(json!({"v": 2}))).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(table.get("1").await.unwrap()["v"], json!(1));
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let table = setup(dir.path()).await;

        table.insert("1", &doc(json!({"v": 1}))).await.unwrap();
        let _ = table.insert("1", &doc(json!({"v": 2}))).await;
        table.update("1", doc(json!({"w": 3}))).await.unwrap();

        let mut names = Vec::new();
        let mut entries = fs::read_dir(table.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["1.json".to_string()]);
    }

    #[tokio::test]
    async fn test_long_row_id_insert_and_update() {
        let dir = tempdir().unwrap();
        let table = setup(dir.path()).await;
        let id = "a".repeat(240);

        table.insert(&id, &doc(json!({"t": 1}))).await.unwrap();
        let merged = table.update(&id, doc(json!({"u": 2}))).await.unwrap();

        assert_eq!(Value::Object(merged), json!({"t": 1, "u": 2}));
        assert_eq!(table.list_ids().await.unwrap(), vec![RowId::from(id.as_str())]);
    }

    #[tokio::test]
    async fn test_failed_dir_sync_keeps_inserted_row() {
        let dir = tempdir().unwrap();
        let table = setup(dir.path()).await;
        table.insert("1", &doc(json!({"v": 1}))).await.unwrap();

        let sync_err = StoreError::Io(io::Error::new(io::ErrorKind::Other, "sync failed"));
        assert!(table.published("1", Err(sync_err)).is_ok());
        assert_eq!(table.get("1").await.unwrap()["v"], json!(1));
    }

    #[tokio::test]
    async fn test_list_ids_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let table = setup(dir.path()).await;

        table.insert("b", &doc(json!({}))).await.unwrap();
        table.insert("a", &doc(json!({}))).await.unwrap();
        fs::write(table.path().join("README.txt"), "x").await.unwrap();
        fs::write(table.path().join(".0123abcd.tmp"), "{").await.unwrap();

        let ids = table.list_ids().await.unwrap();
        assert_eq!(ids, vec![RowId::from("a"), RowId::from("b")]);
    }

    #[tokio::test]
    async fn test_missing_table_vs_missing_row() {
        let dir = tempdir().unwrap();
        let table = setup(dir.path()).await;

        assert!(matches!(
            table.get("nope").await.unwrap_err(),
            StoreError::RowNotFound { .. }
        ));

        fs::remove_dir_all(table.path()).await.unwrap();
        assert!(matches!(
            table.get("nope").await.unwrap_err(),
            StoreError::TableNotFound(_)
        ));
        assert!(matches!(
            table.insert("1", &doc(json!({}))).await.unwrap_err(),
            StoreError::TableNotFound(_)
        ));
    }
}
