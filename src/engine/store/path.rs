//! Mapping from (store root, table, row id) to filesystem locations
//!
//! Layout: `<root>/tables/<table>/<id>.json`. Everything here is pure; no
//! function touches the filesystem.

use std::path::{Path, PathBuf};

use super::error::{Result, StoreError};

/// Directory under the store root holding one directory per table
pub const TABLES_DIR: &str = "tables";

/// Extension of a persisted row
pub const ROW_EXTENSION: &str = "json";

pub fn tables_dir(root: &Path) -> PathBuf {
    root.join(TABLES_DIR)
}

pub fn table_dir(root: &Path, table: &str) -> Result<PathBuf> {
    validate_table_name(table)?;
    Ok(tables_dir(root).join(table))
}

/// Resolve the file holding row `id` of `table`.
pub fn resolve(root: &Path, table: &str, id: &str) -> Result<PathBuf> {
    validate_row_id(id)?;
    Ok(table_dir(root, table)?.join(row_file_name(id)))
}

pub fn row_file_name(id: &str) -> String {
    format!("{}.{}", id, ROW_EXTENSION)
}

/// Row id for a directory entry, or `None` for anything that is not a
/// published row (temp files, foreign files).
pub fn row_id_from_file_name(name: &str) -> Option<&str> {
    if name.starts_with('.') {
        return None;
    }
    let id = name.strip_suffix(ROW_EXTENSION)?.strip_suffix('.')?;
    validate_segment(id).ok().map(|_| id)
}

pub fn validate_table_name(name: &str) -> Result<()> {
    validate_segment(name)?;

    if name.starts_with('_') {
        return Err(invalid(name, "table name cannot start with underscore"));
    }

    Ok(())
}

pub fn validate_row_id(id: &str) -> Result<()> {
    validate_segment(id)
}

fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "name cannot be empty"));
    }

    if name == "." || name == ".." {
        return Err(invalid(name, "name cannot be a relative path component"));
    }

    if name.starts_with('.') {
        return Err(invalid(name, "name cannot start with a dot"));
    }

    if name.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err(invalid(name, "name cannot contain path separators or control characters"));
    }

    Ok(())
}

fn invalid(name: &str, reason: &'static str) -> StoreError {
    StoreError::InvalidName {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::store::error::ErrorKind;

    #[test]
    fn test_resolve_layout() {
        let path = resolve(Path::new("/data"), "posts", "1").unwrap();
        assert_eq!(path, PathBuf::from("/data/tables/posts/1.json"));
    }

    #[test]
    fn test_rejects_traversal() {
        let root = Path::new("/data");
        for bad in ["..", ".", "", "../etc", "a/b", "a\\b", ".hidden", "nul\0"] {
            let err = resolve(root, "posts", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidName, "id {:?}", bad);
            let err = table_dir(root, bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidName, "table {:?}", bad);
        }
    }

    #[test]
    fn test_table_underscore_reserved() {
        assert!(validate_table_name("_system").is_err());
        assert!(validate_row_id("_1").is_ok());
    }

    #[test]
    fn test_row_id_from_file_name() {
        assert_eq!(row_id_from_file_name("1.json"), Some("1"));
        assert_eq!(row_id_from_file_name("lq3x_ab12cd.json"), Some("lq3x_ab12cd"));
        assert_eq!(row_id_from_file_name(".1.json.abc.tmp"), None);
        assert_eq!(row_id_from_file_name("notes.txt"), None);
        assert_eq!(row_id_from_file_name(".json"), None);
    }
}
