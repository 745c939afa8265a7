//! sketchdb - Serverless JSON document store backed by the filesystem
//!
//! ```no_run
//! use serde_json::json;
//! use sketchdb::{Store, StoreConfig};
//!
//! # async fn demo() -> sketchdb::Result<()> {
//! let store = Store::setup(StoreConfig::new("sketchdb_store")).await?;
//! store.create_table("posts").await?;
//!
//! let row = json!({"title": "a"}).as_object().cloned().unwrap_or_default();
//! let id = store.insert("posts", row).await?;
//! let post = store.get_row("posts", &id).await?;
//! # let _ = post;
//! # Ok(())
//! # }
//! ```

pub mod engine;

pub use engine::config::{ConfigError, StoreConfig};
pub use engine::store::{
    Document, ErrorKind, Filter, FilterOp, IdGenerator, Query, Result, RowId,
    SequentialIdGenerator, Store, StoreError, Table, TimestampIdGenerator,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
