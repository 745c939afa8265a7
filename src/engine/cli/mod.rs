//! sketchdb CLI Module
//! Command-line interface over the storage engine

pub mod formatter;

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::engine::store::Document;

#[derive(Parser, Debug)]
#[command(name = "sketchdb")]
#[command(author = "sketchdb Team")]
#[command(version)]
#[command(about = "Serverless JSON document store backed by the filesystem", long_about = None)]
pub struct Cli {
    /// Store root. Defaults to SKETCHDB_ROOT; otherwise ./tests/fixtures
    /// when SKETCHDB_ENV=test, else ./sketchdb_store
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store directories
    Setup,

    /// List tables
    Tables,

    /// Create a table
    CreateTable {
        /// Table name
        name: String,
    },

    /// Delete a table and all of its rows
    DropTable {
        /// Table name
        name: String,
    },

    /// Rename a table
    RenameTable {
        /// Current table name
        name: String,

        /// New table name
        new_name: String,
    },

    /// Insert a row
    Insert {
        /// Table name
        table: String,

        /// Row data as a JSON object
        data: String,

        /// Row ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Print a row
    Get {
        /// Table name
        table: String,

        /// Row ID
        id: String,
    },

    /// Merge fields into a row
    Update {
        /// Table name
        table: String,

        /// Row ID
        id: String,

        /// Fields to set, as a JSON object
        data: String,
    },

    /// Delete a row
    Delete {
        /// Table name
        table: String,

        /// Row ID
        id: String,
    },

    /// Move a row to another table
    Move {
        /// Source table
        from: String,

        /// Destination table
        to: String,

        /// Row ID
        id: String,
    },

    /// Print every row of a table
    All {
        /// Table name
        table: String,
    },

    /// Print rows where a field equals a value
    Filter {
        /// Table name
        table: String,

        /// Field name
        key: String,

        /// Value (parsed as JSON, otherwise taken as a string)
        value: String,
    },

    /// Left join two tables on a field
    Join {
        /// Left table; its fields win on conflict
        left: String,

        /// Right table
        right: String,

        /// Field to join on
        key: String,
    },

    /// Count rows in a table
    Count {
        /// Table name
        table: String,
    },
}

/// Parse a CLI argument that must hold a JSON object
pub fn parse_document(input: &str) -> Result<Document, String> {
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("row data must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {}", e)),
    }
}

/// Parse a filter value: JSON when it parses, a plain string otherwise.
/// `2` is the number 2; `"2"` (quoted) or `two` are strings.
pub fn parse_value(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}
