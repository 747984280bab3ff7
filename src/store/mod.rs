//! Hierarchical document store behind a trait so the record layer can be
//! exercised against an in-memory backend in tests.
//!
//! Documents are addressed by slash-separated paths: the last segment is the
//! document id, everything before it is the collection ("parent"), e.g.
//! `students/{id}/grades/{key}`.

mod mem;
mod sqlite;

pub use mem::MemStore;
pub use sqlite::SqliteStore;

use serde_json::Value;
use thiserror::Error;

/// Fields backed by a supporting index. `list` refuses to order by anything
/// else so a missing index surfaces as a deployment concern instead of a
/// silent scan.
const INDEXED_FIELDS: &[&str] = &["date"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid document path `{0}`")]
    BadPath(String),
    #[error("document `{0}` not found")]
    NotFound(String),
    #[error("ordering by `{0}` requires a supporting index")]
    IndexRequired(String),
    #[error("read failed: {0}")]
    Read(String),
    #[error("write failed: {0}")]
    Write(String),
}

/// Order a listing by a document field. Backends may only support ordering
/// on fields they index; everything else fails with `IndexRequired`.
#[derive(Debug, Clone, Copy)]
pub struct OrderBy<'a> {
    pub field: &'a str,
    pub descending: bool,
}

impl<'a> OrderBy<'a> {
    pub fn desc(field: &'a str) -> Self {
        OrderBy {
            field,
            descending: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Doc {
    pub id: String,
    pub body: Value,
}

pub trait Store {
    /// Fetch one document. Absence is not an error.
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Create-or-replace (last-write-wins). Idempotent.
    fn set(&self, path: &str, body: Value) -> Result<(), StoreError>;

    /// Atomic multi-document create-or-replace: either every write lands or
    /// none do.
    fn set_many(&self, writes: Vec<(String, Value)>) -> Result<(), StoreError>;

    /// Shallow field merge into an existing document. Fails with `NotFound`
    /// when the document does not exist.
    fn update(&self, path: &str, patch: Value) -> Result<(), StoreError>;

    /// Idempotent delete; succeeds even if the document never existed.
    fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// All documents in a collection, optionally ordered by a field.
    fn list(&self, collection: &str, order: Option<OrderBy>) -> Result<Vec<Doc>, StoreError>;
}

/// Split a document path into (collection, id).
fn split_doc_path(path: &str) -> Result<(&str, &str), StoreError> {
    let (parent, id) = path
        .rsplit_once('/')
        .ok_or_else(|| StoreError::BadPath(path.to_string()))?;
    if parent.is_empty() || id.is_empty() {
        return Err(StoreError::BadPath(path.to_string()));
    }
    Ok((parent, id))
}

/// Shallow merge of `patch`'s top-level fields into `body`.
fn merge_fields(body: &mut Value, patch: Value) {
    match (body, patch) {
        (Value::Object(base), Value::Object(fields)) => {
            for (k, v) in fields {
                base.insert(k, v);
            }
        }
        (body, patch) => *body = patch,
    }
}
