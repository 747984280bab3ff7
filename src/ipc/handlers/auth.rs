use std::rc::Rc;

use serde_json::json;

use crate::auth::{self, AuthProvider, Session};
use crate::ipc::error::ok;
use crate::ipc::helpers::{optional_str, parse_role, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::records;

fn no_workspace() -> HandlerErr {
    HandlerErr::new("no_workspace", "select a workspace first")
}

/// Provisioning: create a credential plus its user record (and, for
/// students, the profile). Deployments front this; first run registers the
/// teacher account.
fn register(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = required_str(params, "email")?;
    let password = required_str(params, "password")?;
    let role = parse_role(&required_str(params, "role")?)?;
    let name = required_str(params, "name")?;
    let class = optional_str(params, "class");

    let backend = state.backend.as_mut().ok_or_else(no_workspace)?;
    let id = backend.auth.register(&email, &password)?;
    records::provision_user(&*backend.store, &id, role, &name, &email, class.as_deref())?;
    Ok(json!({ "principalId": id }))
}

fn sign_in(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let email = required_str(params, "email")?;
    let password = required_str(params, "password")?;
    let role = parse_role(&required_str(params, "role")?)?;

    let result = {
        let backend = state.backend.as_mut().ok_or_else(no_workspace)?;
        let store = Rc::clone(&backend.store);
        auth::sign_in_for_role(&mut backend.auth, &*store, &email, &password, role)
    };
    match result {
        Ok(principal) => {
            state.session = Session::Authenticated(principal.clone());
            Ok(json!({ "principalId": principal.id, "role": principal.role }))
        }
        Err(e) => {
            // The gate already signed the provider out; drop the session too.
            state.session = Session::Unauthenticated;
            Err(e.into())
        }
    }
}

fn sign_out(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    if let Some(backend) = state.backend.as_mut() {
        backend.auth.sign_out();
    }
    state.session = Session::Unauthenticated;
    Ok(json!({}))
}

fn current(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(match state.session.principal() {
        Some(p) => json!({ "principal": { "id": p.id, "role": p.role } }),
        None => json!({ "principal": null }),
    })
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.register" => register(state, &req.params),
        "auth.signIn" => sign_in(state, &req.params),
        "auth.signOut" => sign_out(state),
        "auth.current" => current(state),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(e) => e.response(&req.id),
    })
}
