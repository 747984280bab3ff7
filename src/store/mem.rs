use std::cell::RefCell;
use std::collections::BTreeMap;

use serde_json::Value;

use super::{merge_fields, split_doc_path, Doc, OrderBy, Store, StoreError, INDEXED_FIELDS};

/// In-memory store for unit tests. Mirrors the SQLite backend's contract,
/// including its whitelist of orderable fields.
#[derive(Default)]
pub struct MemStore {
    docs: RefCell<BTreeMap<(String, String), Value>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let (parent, id) = split_doc_path(path)?;
        Ok(self
            .docs
            .borrow()
            .get(&(parent.to_string(), id.to_string()))
            .cloned())
    }

    fn set(&self, path: &str, body: Value) -> Result<(), StoreError> {
        let (parent, id) = split_doc_path(path)?;
        self.docs
            .borrow_mut()
            .insert((parent.to_string(), id.to_string()), body);
        Ok(())
    }

    fn set_many(&self, writes: Vec<(String, Value)>) -> Result<(), StoreError> {
        // Validate every path first so a bad write leaves the map untouched.
        let mut keyed = Vec::with_capacity(writes.len());
        for (path, body) in writes {
            let (parent, id) = split_doc_path(&path)?;
            keyed.push(((parent.to_string(), id.to_string()), body));
        }
        let mut docs = self.docs.borrow_mut();
        for (key, body) in keyed {
            docs.insert(key, body);
        }
        Ok(())
    }

    fn update(&self, path: &str, patch: Value) -> Result<(), StoreError> {
        let (parent, id) = split_doc_path(path)?;
        let mut docs = self.docs.borrow_mut();
        let body = docs
            .get_mut(&(parent.to_string(), id.to_string()))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        merge_fields(body, patch);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let (parent, id) = split_doc_path(path)?;
        self.docs
            .borrow_mut()
            .remove(&(parent.to_string(), id.to_string()));
        Ok(())
    }

    fn list(&self, collection: &str, order: Option<OrderBy>) -> Result<Vec<Doc>, StoreError> {
        if collection.is_empty() || collection.starts_with('/') || collection.ends_with('/') {
            return Err(StoreError::BadPath(collection.to_string()));
        }
        let mut docs: Vec<Doc> = self
            .docs
            .borrow()
            .iter()
            .filter(|((parent, _), _)| parent == collection)
            .map(|((_, id), body)| Doc {
                id: id.clone(),
                body: body.clone(),
            })
            .collect();
        if let Some(o) = order {
            if !INDEXED_FIELDS.contains(&o.field) {
                return Err(StoreError::IndexRequired(o.field.to_string()));
            }
            // ISO dates sort correctly as strings.
            docs.sort_by(|a, b| {
                let ka = a.body.get(o.field).and_then(|v| v.as_str()).unwrap_or("");
                let kb = b.body.get(o.field).and_then(|v| v.as_str()).unwrap_or("");
                if o.descending {
                    kb.cmp(ka)
                } else {
                    ka.cmp(kb)
                }
            });
        }
        Ok(docs)
    }
}
