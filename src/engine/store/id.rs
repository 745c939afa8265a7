//! Row identifiers and the strategies that generate them

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a row, unique within its table.
///
/// Caller-supplied ids may come from strings or integers; generated ids
/// come from an [`IdGenerator`]. Whether an id is usable as a path segment
/// is checked when it is resolved, not when it is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RowId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RowId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&String> for RowId {
    fn from(id: &String) -> Self {
        Self(id.clone())
    }
}

impl From<&RowId> for RowId {
    fn from(id: &RowId) -> Self {
        id.clone()
    }
}

macro_rules! row_id_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RowId {
                fn from(id: $t) -> Self {
                    Self(id.to_string())
                }
            }
        )*
    };
}

row_id_from_int!(u32, u64, i32, i64, usize);

/// Source of candidate row ids for inserts that do not name one.
///
/// A generated id is only a candidate: the store still detects a row
/// already living at that id and asks for another one.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> RowId;
}

impl<F> IdGenerator for F
where
    F: Fn() -> RowId + Send + Sync,
{
    fn generate(&self) -> RowId {
        self()
    }
}

/// Default generator: `<base36 millis>_<6 base36 random chars>`.
#[derive(Debug, Default)]
pub struct TimestampIdGenerator;

impl IdGenerator for TimestampIdGenerator {
    fn generate(&self) -> RowId {
        let millis = Utc::now().timestamp_millis().max(0) as u128;
        let random = Uuid::new_v4().as_u128();

        let mut id = to_base36(millis);
        id.push('_');
        // 36^6 fits comfortably in the 122 random bits of a v4 UUID
        let suffix = to_base36(random % 36u128.pow(RANDOM_CHARS));
        for _ in suffix.len()..RANDOM_CHARS as usize {
            id.push('0');
        }
        id.push_str(&suffix);

        RowId(id)
    }
}

const RANDOM_CHARS: u32 = 6;

/// Deterministic generator handing out `<prefix>1`, `<prefix>2`, ...
///
/// Useful for tests and for tools that want predictable ids.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> RowId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        RowId(format!("{}{}", self.prefix, n))
    }
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    if n == 0 {
        return "0".to_string();
    }

    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}
