//! Row documents and the merge rules applied to them

use std::path::Path;

use serde_json::{Map, Value};

use super::error::{Result, StoreError};

/// A row: a JSON object stored exactly as the caller supplied it.
///
/// Key order is preserved so persisted rows stay readable.
pub type Document = Map<String, Value>;

/// Shallow merge of `partial` into `base`.
///
/// Every key of `partial` replaces or adds the same key in `base`; nested
/// objects are replaced wholesale, not merged.
pub fn merge(base: &mut Document, partial: Document) {
    for (key, value) in partial {
        base.insert(key, value);
    }
}

/// Merge used by joins: fields of `matched` overridden by fields of
/// `primary`.
pub fn overlay(matched: Option<&Document>, primary: &Document) -> Document {
    let mut joined = matched.cloned().unwrap_or_default();
    merge(&mut joined, primary.clone());
    joined
}

/// Parse a persisted row; anything but a JSON object is corrupt.
pub fn decode(path: &Path, bytes: &[u8]) -> Result<Document> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::CorruptData {
            path: path.to_path_buf(),
            reason: format!("expected a JSON object, found {}", type_name(&other)),
        }),
        Err(e) => Err(StoreError::CorruptData {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

pub fn encode(doc: &Document, pretty: bool) -> Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(doc)
    } else {
        serde_json::to_vec(doc)
    };
    bytes.map_err(StoreError::Serialize)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
