//! sketchdb Storage Engine
//!
//! Tables of JSON documents stored directly on the filesystem:
//! - one directory per table, one `.json` file per row
//! - exclusive-create inserts with bounded retry on generated-id collisions
//! - shallow-merge updates published atomically
//! - full-scan queries: filter, equi-join, composable `Query`

pub mod document;
pub mod error;
pub mod id;
pub mod path;
pub mod query;
pub mod storage;
pub mod table;

pub use document::Document;
pub use error::{ErrorKind, Result, StoreError};
pub use id::{IdGenerator, RowId, SequentialIdGenerator, TimestampIdGenerator};
pub use query::{Filter, FilterOp, Query};
pub use storage::Store;
pub use table::Table;
