//! Store Error Types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`StoreError`], for callers that only care
/// about what went wrong and not where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ResourceExhausted,
    CorruptData,
    InvalidName,
    Io,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to serialize row: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Store not found at {0}")]
    StoreNotFound(PathBuf),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Row not found: {table}/{id}")]
    RowNotFound { table: String, id: String },

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Row ID already exists: {table}/{id}")]
    DuplicateId { table: String, id: String },

    #[error("No free row ID in table {table} after {attempts} attempts")]
    IdsExhausted { table: String, attempts: u32 },

    #[error("Corrupt row data at {}: {reason}", path.display())]
    CorruptData { path: PathBuf, reason: String },

    #[error("Invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::StoreNotFound(_)
            | StoreError::TableNotFound(_)
            | StoreError::RowNotFound { .. } => ErrorKind::NotFound,
            StoreError::TableAlreadyExists(_) | StoreError::DuplicateId { .. } => {
                ErrorKind::Conflict
            }
            StoreError::IdsExhausted { .. } => ErrorKind::ResourceExhausted,
            StoreError::CorruptData { .. } => ErrorKind::CorruptData,
            StoreError::InvalidName { .. } => ErrorKind::InvalidName,
            StoreError::Io(_) | StoreError::Serialize(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn row_not_found(table: &str, id: &str) -> Self {
        StoreError::RowNotFound {
            table: table.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate_id(table: &str, id: &str) -> Self {
        StoreError::DuplicateId {
            table: table.to_string(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(StoreError::TableNotFound("t".into()).kind(), ErrorKind::NotFound);
        assert_eq!(StoreError::duplicate_id("t", "1").kind(), ErrorKind::Conflict);
        assert_eq!(
            StoreError::IdsExhausted { table: "t".into(), attempts: 5 }.kind(),
            ErrorKind::ResourceExhausted
        );
        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(StoreError::from(io).kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_messages() {
        let err = StoreError::row_not_found("posts", "1");
        assert_eq!(err.to_string(), "Row not found: posts/1");
    }
}
