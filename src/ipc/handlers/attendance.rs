use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    authorize_scope, optional_str, require_backend, required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{Access, AttendanceStatus, StudentRecords};
use crate::store::OrderBy;

fn parse_status(value: &str) -> Result<AttendanceStatus, HandlerErr> {
    match value {
        "present" => Ok(AttendanceStatus::Present),
        "absent" => Ok(AttendanceStatus::Absent),
        "late" => Ok(AttendanceStatus::Late),
        other => Err(HandlerErr::new(
            "bad_params",
            format!("status must be present, absent or late, got `{}`", other),
        )),
    }
}

fn set(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let date = required_str(params, "date")?;
    let status = parse_status(&required_str(params, "status")?)?;
    authorize_scope(state, &student_id, Access::Write)?;
    let backend = require_backend(state)?;
    StudentRecords::new(&*backend.store, &student_id).set_attendance(&date, status)?;
    Ok(json!({}))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let date = required_str(params, "date")?;
    authorize_scope(state, &student_id, Access::Write)?;
    let backend = require_backend(state)?;
    StudentRecords::new(&*backend.store, &student_id).delete_attendance(&date)?;
    Ok(json!({}))
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    authorize_scope(state, &student_id, Access::Read)?;
    let backend = require_backend(state)?;
    let order_field = optional_str(params, "orderBy");
    let order = order_field.as_deref().map(OrderBy::desc);
    let records = StudentRecords::new(&*backend.store, &student_id).attendance(order)?;
    Ok(json!({ "attendance": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.set" => set(state, &req.params),
        "attendance.delete" => delete(state, &req.params),
        "attendance.list" => list(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(e) => e.response(&req.id),
    })
}
