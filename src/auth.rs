//! Credential verification and the role gate.
//!
//! The gate runs once per sign-in: after the provider verifies the
//! credential, the principal's stored role is checked against the role the
//! caller asked to sign in as. Any failure after credential verification
//! forces a sign-out so a half-authenticated session can never reach
//! role-specific data.

use std::rc::Rc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{self, Principal, RecordsError, Role};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("`{0}` is not a usable email address")]
    InvalidEmail(String),
    #[error("email already registered")]
    EmailInUse,
    #[error("account role is {actual}, not {requested}")]
    RoleMismatch { requested: Role, actual: Role },
    #[error("authenticated credential has no user record")]
    OrphanedCredential,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// External authentication collaborator, interface-level.
pub trait AuthProvider {
    /// Create a credential and return the new principal id.
    fn register(&mut self, email: &str, password: &str) -> Result<String, AuthError>;
    /// Verify a credential and mark its principal as the current one.
    fn sign_in(&mut self, email: &str, password: &str) -> Result<String, AuthError>;
    fn sign_out(&mut self);
    fn current_principal(&self) -> Option<&str>;
}

/// `credentials/{email}`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialDoc {
    principal_id: String,
    password_hash: String,
}

/// Store-backed provider: argon2 PHC hashes in a `credentials` collection,
/// keyed by normalized email.
pub struct LocalAuth<S: Store> {
    store: Rc<S>,
    current: Option<String>,
}

impl<S: Store> LocalAuth<S> {
    pub fn new(store: Rc<S>) -> Self {
        LocalAuth {
            store,
            current: None,
        }
    }

    fn credential_path(email: &str) -> Result<String, AuthError> {
        let email = email.trim().to_ascii_lowercase();
        if email.is_empty() || !email.contains('@') || email.contains('/') {
            return Err(AuthError::InvalidEmail(email));
        }
        Ok(format!("credentials/{email}"))
    }
}

impl<S: Store> AuthProvider for LocalAuth<S> {
    fn register(&mut self, email: &str, password: &str) -> Result<String, AuthError> {
        let path = Self::credential_path(email)?;
        if self.store.get(&path)?.is_some() {
            return Err(AuthError::EmailInUse);
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .to_string();
        let id = uuid::Uuid::new_v4().to_string();
        let doc = serde_json::to_value(CredentialDoc {
            principal_id: id.clone(),
            password_hash: hash,
        })
        .map_err(|e| StoreError::Write(e.to_string()))?;
        self.store.set(&path, doc)?;
        Ok(id)
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<String, AuthError> {
        let path = Self::credential_path(email)?;
        let Some(body) = self.store.get(&path)? else {
            return Err(AuthError::InvalidCredentials);
        };
        let cred: CredentialDoc =
            serde_json::from_value(body).map_err(|_| AuthError::InvalidCredentials)?;
        let parsed =
            PasswordHash::new(&cred.password_hash).map_err(|_| AuthError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|_| AuthError::InvalidCredentials)?;
        self.current = Some(cred.principal_id.clone());
        Ok(cred.principal_id)
    }

    fn sign_out(&mut self) {
        self.current = None;
    }

    fn current_principal(&self) -> Option<&str> {
        self.current.as_deref()
    }
}

/// Session state machine. `Unauthenticated -> Authenticated` only through
/// [`sign_in_for_role`]; the reverse transition is explicit sign-out, which
/// the gate forces on any post-credential failure.
#[derive(Debug, Clone, Default)]
pub enum Session {
    #[default]
    Unauthenticated,
    Authenticated(Principal),
}

impl Session {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Session::Unauthenticated => None,
            Session::Authenticated(p) => Some(p),
        }
    }
}

/// The gate: verify the credential, then require the stored role to match
/// the role the caller navigated in as.
pub fn sign_in_for_role<P: AuthProvider, S: Store>(
    provider: &mut P,
    store: &S,
    email: &str,
    password: &str,
    requested: Role,
) -> Result<Principal, AuthError> {
    let id = provider.sign_in(email, password)?;
    let user = match records::fetch_user(store, &id) {
        Ok(user) => user,
        Err(e) => {
            provider.sign_out();
            return Err(match e {
                RecordsError::Store(s) => AuthError::Store(s),
                // A user record we cannot read the role from gates the same
                // as a missing one.
                _ => AuthError::OrphanedCredential,
            });
        }
    };
    let Some(user) = user else {
        provider.sign_out();
        return Err(AuthError::OrphanedCredential);
    };
    if user.role != requested {
        provider.sign_out();
        return Err(AuthError::RoleMismatch {
            requested,
            actual: user.role,
        });
    }
    Ok(Principal {
        id,
        role: user.role,
    })
}
