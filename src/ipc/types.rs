use std::path::PathBuf;
use std::rc::Rc;

use serde::Deserialize;

use crate::auth::{LocalAuth, Session};
use crate::store::SqliteStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Store and auth provider for the selected workspace. Both are constructed
/// together in `workspace.select` and injected into every handler; nothing
/// reaches for a process-wide client.
pub struct Backend {
    pub store: Rc<SqliteStore>,
    pub auth: LocalAuth<SqliteStore>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub session: Session,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            workspace: None,
            backend: None,
            session: Session::Unauthenticated,
        }
    }
}
