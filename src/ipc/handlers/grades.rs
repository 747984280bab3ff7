use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{
    authorize_scope, optional_str, require_backend, required_f64, required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{Access, StudentRecords};
use crate::store::OrderBy;

fn set(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let subject = required_str(params, "subject")?;
    let grade = required_f64(params, "grade")?;
    let date = required_str(params, "date")?;
    authorize_scope(state, &student_id, Access::Write)?;
    let backend = require_backend(state)?;
    let write = StudentRecords::new(&*backend.store, &student_id).set_grade(&subject, grade, &date)?;
    Ok(json!({ "key": write.key, "slug": write.slug }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let subject = required_str(params, "subject")?;
    let date = required_str(params, "date")?;
    authorize_scope(state, &student_id, Access::Write)?;
    let backend = require_backend(state)?;
    StudentRecords::new(&*backend.store, &student_id).delete_grade(&subject, &date)?;
    Ok(json!({}))
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    authorize_scope(state, &student_id, Access::Read)?;
    let backend = require_backend(state)?;
    let order_field = optional_str(params, "orderBy");
    let order = order_field.as_deref().map(OrderBy::desc);
    let records = StudentRecords::new(&*backend.store, &student_id).grades(order)?;
    Ok(json!({ "grades": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "grades.set" => set(state, &req.params),
        "grades.delete" => delete(state, &req.params),
        "grades.list" => list(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(e) => e.response(&req.id),
    })
}
