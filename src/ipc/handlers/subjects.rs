use serde_json::json;

use crate::ipc::error::ok;
use crate::ipc::helpers::{authorize_scope, require_backend, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records::{Access, StudentRecords};

fn add(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let name = required_str(params, "name")?;
    authorize_scope(state, &student_id, Access::Write)?;
    let backend = require_backend(state)?;
    let slug = StudentRecords::new(&*backend.store, &student_id).add_subject(&name)?;
    Ok(json!({ "slug": slug }))
}

fn delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    let name = required_str(params, "name")?;
    authorize_scope(state, &student_id, Access::Write)?;
    let backend = require_backend(state)?;
    StudentRecords::new(&*backend.store, &student_id).delete_subject(&name)?;
    Ok(json!({}))
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    authorize_scope(state, &student_id, Access::Read)?;
    let backend = require_backend(state)?;
    let subjects = StudentRecords::new(&*backend.store, &student_id).subjects()?;
    Ok(json!({ "subjects": subjects }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "subjects.add" => add(state, &req.params),
        "subjects.delete" => delete(state, &req.params),
        "subjects.list" => list(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(e) => e.response(&req.id),
    })
}
