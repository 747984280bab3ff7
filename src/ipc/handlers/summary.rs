use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{authorize_scope, require_backend, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::{Access, StudentRecords};
use crate::summary;

/// Derived statistics only; works off the partitions directly so it stays
/// usable even while the profile document is missing.
fn student(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    authorize_scope(state, &student_id, Access::Read)?;
    let backend = require_backend(state)?;
    let recs = StudentRecords::new(&*backend.store, &student_id);
    let attendance = recs.attendance(None)?;
    let grades = recs.grades(None)?;
    Ok(json!({
        "attendance": summary::attendance_summary(&attendance),
        "grades": summary::grade_summary(&grades),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "summary.student" => Some(match student(state, &req.params) {
            Ok(value) => ok(&req.id, value),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}
