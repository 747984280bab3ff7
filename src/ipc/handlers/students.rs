use serde_json::json;

use crate::auth::AuthProvider;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    authorize_scope, optional_str, require_backend, require_teacher, required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::records::{self, Access, Role, StudentRecords};
use crate::summary;

/// Account provisioning for one student: credential, user record and profile
/// in one action, mirroring `auth.register` but gated to teachers.
fn create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let name = required_str(params, "name")?;
    let email = required_str(params, "email")?;
    let password = required_str(params, "password")?;
    let class = optional_str(params, "class");

    let backend = state
        .backend
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let id = backend.auth.register(&email, &password)?;
    records::provision_user(
        &*backend.store,
        &id,
        Role::Student,
        &name,
        &email,
        class.as_deref(),
    )?;
    Ok(json!({ "studentId": id }))
}

fn list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    require_teacher(state)?;
    let backend = require_backend(state)?;
    let students: Vec<serde_json::Value> = records::list_profiles(&*backend.store)?
        .into_iter()
        .map(|p| {
            json!({
                "id": p.id,
                "name": p.name,
                "class": p.class,
                "email": p.email,
            })
        })
        .collect();
    Ok(json!({ "students": students }))
}

/// Everything one dashboard needs in a single fetch: profile, the three
/// partitions, and the derived summaries.
fn open(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = required_str(params, "studentId")?;
    authorize_scope(state, &student_id, Access::Read)?;
    let backend = require_backend(state)?;
    let recs = StudentRecords::new(&*backend.store, &student_id);

    let Some(profile) = recs.profile()? else {
        return Err(HandlerErr::new(
            "profile_not_found",
            format!("no student profile for {student_id}"),
        ));
    };
    let subjects = recs.subjects()?;
    let attendance = recs.attendance(None)?;
    let grades = recs.grades(None)?;
    let attendance_summary = summary::attendance_summary(&attendance);
    let grade_summary = summary::grade_summary(&grades);

    Ok(json!({
        "profile": profile,
        "subjects": subjects,
        "attendance": attendance,
        "grades": grades,
        "summary": {
            "attendance": attendance_summary,
            "grades": grade_summary,
        }
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => create(state, &req.params),
        "students.list" => list(state),
        "students.open" => open(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(e) => e.response(&req.id),
    })
}
