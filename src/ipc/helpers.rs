//! Shared param parsing and the core-error → wire-code mapping used by every
//! handler.

use serde_json::json;

use crate::auth::AuthError;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Backend};
use crate::records::{self, Access, Principal, RecordsError, Role};
use crate::store::StoreError;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::IndexRequired(_) => "index_required",
            StoreError::NotFound(_) | StoreError::Read(_) => "store_read_failed",
            StoreError::BadPath(_) | StoreError::Write(_) => "store_write_failed",
        };
        let details = match &e {
            // A missing index is a deployment concern; the same request can
            // succeed once the index exists.
            StoreError::IndexRequired(field) => Some(json!({ "field": field, "retryable": true })),
            _ => None,
        };
        HandlerErr {
            code,
            message: e.to_string(),
            details,
        }
    }
}

impl From<RecordsError> for HandlerErr {
    fn from(e: RecordsError) -> Self {
        match e {
            RecordsError::Store(s) => s.into(),
            RecordsError::EmptyLabel(_) => HandlerErr::new("empty_subject", e.to_string()),
            RecordsError::InvalidDate(_) => HandlerErr::new("bad_date", e.to_string()),
            RecordsError::InvalidGrade(_) => HandlerErr::new("bad_params", e.to_string()),
            RecordsError::PermissionDenied { .. } => {
                HandlerErr::new("permission_denied", e.to_string())
            }
            RecordsError::MalformedDoc { .. } => HandlerErr::new("malformed_doc", e.to_string()),
        }
    }
}

impl From<AuthError> for HandlerErr {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Store(s) => s.into(),
            AuthError::InvalidCredentials | AuthError::Hash(_) => {
                HandlerErr::new("auth_failed", e.to_string())
            }
            AuthError::InvalidEmail(_) => HandlerErr::new("bad_params", e.to_string()),
            AuthError::EmailInUse => HandlerErr::new("email_in_use", e.to_string()),
            AuthError::RoleMismatch { .. } => HandlerErr::new("role_mismatch", e.to_string()),
            AuthError::OrphanedCredential => {
                HandlerErr::new("orphaned_credential", e.to_string())
            }
        }
    }
}

pub fn required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing or non-numeric {}", key)))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn parse_role(value: &str) -> Result<Role, HandlerErr> {
    match value {
        "student" => Ok(Role::Student),
        "teacher" => Ok(Role::Teacher),
        other => Err(HandlerErr::new(
            "bad_params",
            format!("role must be student or teacher, got `{}`", other),
        )),
    }
}

pub fn require_backend(state: &AppState) -> Result<&Backend, HandlerErr> {
    state
        .backend
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_principal(state: &AppState) -> Result<Principal, HandlerErr> {
    state
        .session
        .principal()
        .cloned()
        .ok_or_else(|| HandlerErr::new("not_signed_in", "sign in first"))
}

/// Session + scope check in one step for record handlers.
pub fn authorize_scope(
    state: &AppState,
    student_id: &str,
    access: Access,
) -> Result<Principal, HandlerErr> {
    let principal = require_principal(state)?;
    records::authorize(&principal, student_id, access)?;
    Ok(principal)
}

pub fn require_teacher(state: &AppState) -> Result<Principal, HandlerErr> {
    let principal = require_principal(state)?;
    if principal.role != Role::Teacher {
        return Err(HandlerErr::new(
            "permission_denied",
            "teacher role required",
        ));
    }
    Ok(principal)
}
