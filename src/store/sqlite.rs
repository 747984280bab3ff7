use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use super::{merge_fields, split_doc_path, Doc, OrderBy, Store, StoreError, INDEXED_FIELDS};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the document store inside a workspace directory.
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(workspace)?;
        let conn = Connection::open(workspace.join("roster.sqlite3"))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> anyhow::Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents(
                parent TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY(parent, id)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_parent_date
             ON documents(parent, json_extract(body, '$.date'))",
            [],
        )?;
        Ok(SqliteStore { conn })
    }

    fn set_one(conn: &Connection, path: &str, body: &Value) -> Result<(), StoreError> {
        let (parent, id) = split_doc_path(path)?;
        let text = body.to_string();
        conn.execute(
            "INSERT INTO documents(parent, id, body, updated_at)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(parent, id) DO UPDATE SET
               body = excluded.body,
               updated_at = excluded.updated_at",
            (parent, id, &text, chrono::Utc::now().to_rfc3339()),
        )
        .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }
}

impl Store for SqliteStore {
    fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let (parent, id) = split_doc_path(path)?;
        let text: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE parent = ? AND id = ?",
                (parent, id),
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Read(e.to_string()))?;
        match text {
            None => Ok(None),
            Some(t) => serde_json::from_str(&t)
                .map(Some)
                .map_err(|e| StoreError::Read(format!("{path}: {e}"))),
        }
    }

    fn set(&self, path: &str, body: Value) -> Result<(), StoreError> {
        Self::set_one(&self.conn, path, &body)
    }

    fn set_many(&self, writes: Vec<(String, Value)>) -> Result<(), StoreError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Write(e.to_string()))?;
        for (path, body) in &writes {
            Self::set_one(&tx, path, body)?;
        }
        tx.commit().map_err(|e| StoreError::Write(e.to_string()))
    }

    fn update(&self, path: &str, patch: Value) -> Result<(), StoreError> {
        let mut body = self
            .get(path)?
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        merge_fields(&mut body, patch);
        Self::set_one(&self.conn, path, &body)
    }

    fn delete(&self, path: &str) -> Result<(), StoreError> {
        let (parent, id) = split_doc_path(path)?;
        self.conn
            .execute(
                "DELETE FROM documents WHERE parent = ? AND id = ?",
                (parent, id),
            )
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    fn list(&self, collection: &str, order: Option<OrderBy>) -> Result<Vec<Doc>, StoreError> {
        if collection.is_empty() || collection.starts_with('/') || collection.ends_with('/') {
            return Err(StoreError::BadPath(collection.to_string()));
        }
        let sql = match order {
            None => "SELECT id, body FROM documents WHERE parent = ? ORDER BY id".to_string(),
            Some(o) => {
                if !INDEXED_FIELDS.contains(&o.field) {
                    return Err(StoreError::IndexRequired(o.field.to_string()));
                }
                format!(
                    "SELECT id, body FROM documents WHERE parent = ?
                     ORDER BY json_extract(body, '$.{}') {}",
                    o.field,
                    if o.descending { "DESC" } else { "ASC" }
                )
            }
        };
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| StoreError::Read(e.to_string()))?;
        let rows = stmt
            .query_map([collection], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(|e| StoreError::Read(e.to_string()))?;
        rows.into_iter()
            .map(|(id, text)| {
                let body = serde_json::from_str(&text)
                    .map_err(|e| StoreError::Read(format!("{collection}/{id}: {e}")))?;
                Ok(Doc { id, body })
            })
            .collect()
    }
}
