//! In-memory query operations over scanned rows
//!
//! Nothing here touches the filesystem: the store scans a table with
//! `get_all` and hands the documents to these functions.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::{self, Document};

/// Rows whose `key` strictly equals `value`. Rows without `key` never match.
pub fn filter_eq(docs: Vec<Document>, key: &str, value: &Value) -> Vec<Document> {
    docs.into_iter()
        .filter(|doc| doc.get(key) == Some(value))
        .collect()
}

/// Left outer equi-join on `key`.
///
/// Each document of `left` is paired with the first document of `right`
/// holding an equal `key`; the output is the right document overridden by
/// the left one. Left documents without a match (or without `key`) come
/// through unchanged. Quadratic, as there is no index to probe.
pub fn eq_join(left: &[Document], right: &[Document], key: &str) -> Vec<Document> {
    left.iter()
        .map(|primary| {
            let matched = primary
                .get(key)
                .and_then(|wanted| right.iter().find(|doc| doc.get(key) == Some(wanted)));
            document::overlay(matched, primary)
        })
        .collect()
}

/// Filter operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    /// Field value is one of the listed values
    In(Vec<Value>),
    /// Field is present (`true`) or absent (`false`)
    Exists(bool),
}

/// A single predicate on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
}

impl Filter {
    pub fn new(field: &str, op: FilterOp) -> Self {
        Self { field: field.to_string(), op }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq(value.into()))
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Ne(value.into()))
    }

    pub fn exists(field: &str, present: bool) -> Self {
        Self::new(field, FilterOp::Exists(present))
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let value = doc.get(&self.field);

        match (&self.op, value) {
            (FilterOp::Exists(present), val) => val.is_some() == *present,
            (_, None) => false,
            (FilterOp::Eq(expected), Some(actual)) => actual == expected,
            (FilterOp::Ne(expected), Some(actual)) => actual != expected,
            (FilterOp::Gt(expected), Some(actual)) => {
                compare_values(actual, expected) == Some(Ordering::Greater)
            }
            (FilterOp::Gte(expected), Some(actual)) => {
                matches!(compare_values(actual, expected), Some(Ordering::Greater | Ordering::Equal))
            }
            (FilterOp::Lt(expected), Some(actual)) => {
                compare_values(actual, expected) == Some(Ordering::Less)
            }
            (FilterOp::Lte(expected), Some(actual)) => {
                matches!(compare_values(actual, expected), Some(Ordering::Less | Ordering::Equal))
            }
            (FilterOp::In(values), Some(actual)) => values.contains(actual),
        }
    }
}

/// Numbers order numerically and strings lexicographically; nothing else
/// orders.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of filters with optional ordering and paging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Vec<Filter>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,

    #[serde(default)]
    pub sort_desc: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    #[serde(default)]
    pub skip: usize,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn sort(mut self, field: &str, desc: bool) -> Self {
        self.sort_by = Some(field.to_string());
        self.sort_desc = desc;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn execute(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut results: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .collect();

        if let Some(ref field) = self.sort_by {
            // stable sort; rows missing the field go last either way
            results.sort_by(|a, b| match (a.get(field), b.get(field)) {
                (Some(a), Some(b)) => {
                    let o = compare_values(a, b).unwrap_or(Ordering::Equal);
                    if self.sort_desc { o.reverse() } else { o }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            });
        }

        results
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values.into_iter().map(|v| v.as_object().cloned().unwrap()).collect()
    }

    #[test]
    fn test_filter_eq_is_strict() {
        let rows = docs(vec![
            json!({"group": "2", "name": "Ben"}),
            json!({"group": 2, "name": "Basia"}),
            json!({"name": "Aline"}),
        ]);

        let found = filter_eq(rows, "group", &json!("2"));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], json!("Ben"));
    }

    #[test]
    fn test_eq_join_left_outer_left_wins() {
        let posts = docs(vec![
            json!({"title": "t1", "author": "Aline", "date": "Nov"}),
            json!({"title": "t2", "author": "Nobody"}),
            json!({"title": "t3"}),
        ]);
        let authors = docs(vec![
            json!({"author": "Aline", "email": "aline@x", "date": "ignored"}),
            json!({"author": "Aline", "email": "second@x"}),
        ]);

        let joined = eq_join(&posts, &authors, "author");
        assert_eq!(joined.len(), 3);
        assert_eq!(
            Value::Object(joined[0].clone()),
            json!({"author": "Aline", "email": "aline@x", "date": "Nov", "title": "t1"})
        );
        assert_eq!(joined[1], posts[1]);
        assert_eq!(joined[2], posts[2]);
    }

    #[test]
    fn test_eq_join_left_without_key_matches_nothing() {
        let left = docs(vec![json!({"x": 1})]);
        let right = docs(vec![json!({"y": 2}), json!({"k": null, "z": 3})]);

        let joined = eq_join(&left, &right, "k");
        assert_eq!(joined, left);
    }

    #[test]
    fn test_filter_ops() {
        let doc = docs(vec![json!({"name": "Alice", "age": 30})]).remove(0);

        assert!(Filter::eq("age", 30).matches(&doc));
        assert!(Filter::ne("name", "Bob").matches(&doc));
        assert!(Filter::new("age", FilterOp::Gt(json!(29))).matches(&doc));
        assert!(!Filter::new("age", FilterOp::Lt(json!("40"))).matches(&doc));
        assert!(Filter::new("name", FilterOp::In(vec![json!("Alice"), json!("Eve")])).matches(&doc));
        assert!(Filter::exists("email", false).matches(&doc));
        assert!(!Filter::ne("email", "x").matches(&doc));
    }

    #[test]
    fn test_query_sort_skip_limit() {
        let rows = docs(vec![
            json!({"name": "Alice", "age": 30}),
            json!({"name": "Bob", "age": 25}),
            json!({"name": "Charlie", "age": 35}),
            json!({"name": "Dana"}),
        ]);

        let names: Vec<Value> = Query::new()
            .sort("age", true)
            .skip(1)
            .limit(2)
            .execute(rows)
            .into_iter()
            .map(|d| d["name"].clone())
            .collect();

        assert_eq!(names, vec![json!("Alice"), json!("Bob")]);
    }
}
