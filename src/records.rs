//! Typed partition schemas and the per-student record adapter.
//!
//! Three partitions hang off each student scope: `subjects`, `attendance`
//! and `grades`. Every write goes through a deterministic key from
//! [`crate::ident`], so re-writing the same natural key overwrites in place
//! and never duplicates. Reads deserialize into the schemas below; a stored
//! document that does not conform is rejected, not silently defaulted.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::ident::{grade_key, slugify};
use crate::store::{OrderBy, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => f.write_str("student"),
            Role::Teacher => f.write_str("teacher"),
        }
    }
}

/// An authenticated identity plus its stored role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Role,
}

/// `users/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    pub role: Role,
    pub name: String,
    pub email: String,
}

/// `students/{id}`: `subjects` is a denormalized cache of the subjects
/// partition; the partition is the source of truth and profile reads return
/// labels from it, never from this field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDoc {
    pub name: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

/// `students/{id}/subjects/{slug}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDoc {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Subject {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

/// `students/{id}/attendance/{date}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub date: String,
    pub status: AttendanceStatus,
}

/// `students/{id}/grades/{slug_date}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub student_id: String,
    pub subject: String,
    pub subject_slug: String,
    pub grade: f64,
    pub date: String,
}

/// Profile view returned to callers: cache-free, subjects come from the
/// partition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub name: String,
    pub class: String,
    pub email: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("label `{0}` yields an empty slug")]
    EmptyLabel(String),
    #[error("invalid date `{0}`: expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("grade value {0} is not a finite number")]
    InvalidGrade(f64),
    #[error("{role} {principal_id} may not {access} records of student {student_id}")]
    PermissionDenied {
        principal_id: String,
        role: Role,
        student_id: String,
        access: &'static str,
    },
    #[error("malformed document at `{path}`: {reason}")]
    MalformedDoc { path: String, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Teachers read and write any student scope; students read only their own
/// and never write.
pub fn authorize(
    principal: &Principal,
    student_id: &str,
    access: Access,
) -> Result<(), RecordsError> {
    let allowed = match principal.role {
        Role::Teacher => true,
        Role::Student => access == Access::Read && principal.id == student_id,
    };
    if allowed {
        Ok(())
    } else {
        Err(RecordsError::PermissionDenied {
            principal_id: principal.id.clone(),
            role: principal.role,
            student_id: student_id.to_string(),
            access: match access {
                Access::Read => "read",
                Access::Write => "write",
            },
        })
    }
}

fn parse_doc<T: DeserializeOwned>(path: &str, body: serde_json::Value) -> Result<T, RecordsError> {
    serde_json::from_value(body).map_err(|e| RecordsError::MalformedDoc {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

/// Strict fixed-width ISO date check; the grade-key collision guarantee
/// depends on it.
fn validate_date(date: &str) -> Result<(), RecordsError> {
    let round_trips = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string() == date)
        .unwrap_or(false);
    if round_trips {
        Ok(())
    } else {
        Err(RecordsError::InvalidDate(date.to_string()))
    }
}

fn nonempty_slug(label: &str) -> Result<String, RecordsError> {
    let slug = slugify(label);
    if slug.is_empty() {
        return Err(RecordsError::EmptyLabel(label.to_string()));
    }
    Ok(slug)
}

pub fn user_path(id: &str) -> String {
    format!("users/{id}")
}

pub fn profile_path(id: &str) -> String {
    format!("students/{id}")
}

/// Fetch and validate `users/{id}`. Absence is not an error.
pub fn fetch_user<S: Store>(store: &S, id: &str) -> Result<Option<UserDoc>, RecordsError> {
    let path = user_path(id);
    match store.get(&path)? {
        None => Ok(None),
        Some(body) => parse_doc(&path, body).map(Some),
    }
}

/// Provision the documents for a new account. For students the user record
/// and the profile land in one atomic write so a grade can never reference a
/// profile-less principal id.
pub fn provision_user<S: Store>(
    store: &S,
    id: &str,
    role: Role,
    name: &str,
    email: &str,
    class: Option<&str>,
) -> Result<(), RecordsError> {
    let user = serde_json::to_value(UserDoc {
        role,
        name: name.to_string(),
        email: email.to_string(),
    })
    .map_err(|e| StoreError::Write(e.to_string()))?;
    let mut writes = vec![(user_path(id), user)];
    if role == Role::Student {
        let profile = serde_json::to_value(ProfileDoc {
            name: name.to_string(),
            class: class.unwrap_or("").to_string(),
            email: email.to_string(),
            subjects: Vec::new(),
        })
        .map_err(|e| StoreError::Write(e.to_string()))?;
        writes.push((profile_path(id), profile));
    }
    store.set_many(writes)?;
    Ok(())
}

/// All student profiles, for the teacher roster view.
pub fn list_profiles<S: Store>(store: &S) -> Result<Vec<StudentProfile>, RecordsError> {
    let docs = store.list("students", None)?;
    docs.into_iter()
        .map(|doc| {
            let path = profile_path(&doc.id);
            let profile: ProfileDoc = parse_doc(&path, doc.body)?;
            Ok(StudentProfile {
                id: doc.id,
                name: profile.name,
                class: profile.class,
                email: profile.email,
                subjects: profile.subjects,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeWrite {
    pub key: String,
    pub slug: String,
}

/// All record operations scoped to one student. Construct after
/// [`authorize`] has cleared the caller for the scope.
pub struct StudentRecords<'a, S: Store> {
    store: &'a S,
    student_id: &'a str,
}

impl<'a, S: Store> StudentRecords<'a, S> {
    pub fn new(store: &'a S, student_id: &'a str) -> Self {
        StudentRecords { store, student_id }
    }

    fn subjects_collection(&self) -> String {
        format!("students/{}/subjects", self.student_id)
    }

    fn attendance_collection(&self) -> String {
        format!("students/{}/attendance", self.student_id)
    }

    fn grades_collection(&self) -> String {
        format!("students/{}/grades", self.student_id)
    }

    /// Profile with subjects read from the partition. `None` when no profile
    /// document exists; callers surface that as a recoverable state.
    pub fn profile(&self) -> Result<Option<StudentProfile>, RecordsError> {
        let path = profile_path(self.student_id);
        let Some(body) = self.store.get(&path)? else {
            return Ok(None);
        };
        let doc: ProfileDoc = parse_doc(&path, body)?;
        let subjects = self.subjects()?.into_iter().map(|s| s.name).collect();
        Ok(Some(StudentProfile {
            id: self.student_id.to_string(),
            name: doc.name,
            class: doc.class,
            email: doc.email,
            subjects,
        }))
    }

    pub fn subjects(&self) -> Result<Vec<Subject>, RecordsError> {
        let collection = self.subjects_collection();
        let docs = self.store.list(&collection, None)?;
        docs.into_iter()
            .map(|doc| {
                let path = format!("{collection}/{}", doc.id);
                let subject: SubjectDoc = parse_doc(&path, doc.body)?;
                Ok(Subject {
                    slug: doc.id,
                    name: subject.name,
                })
            })
            .collect()
    }

    /// Idempotent: the slug is the document id, so case/spacing variants of
    /// the same label land on the same document.
    pub fn add_subject(&self, label: &str) -> Result<String, RecordsError> {
        let name = label.trim();
        let slug = nonempty_slug(name)?;
        self.store.set(
            &format!("{}/{slug}", self.subjects_collection()),
            json!({ "name": name }),
        )?;
        self.refresh_subject_cache();
        Ok(slug)
    }

    pub fn delete_subject(&self, label: &str) -> Result<(), RecordsError> {
        let slug = nonempty_slug(label.trim())?;
        self.store
            .delete(&format!("{}/{slug}", self.subjects_collection()))?;
        self.refresh_subject_cache();
        Ok(())
    }

    pub fn attendance(&self, order: Option<OrderBy>) -> Result<Vec<AttendanceRecord>, RecordsError> {
        let collection = self.attendance_collection();
        let order = order.unwrap_or(OrderBy::desc("date"));
        let docs = self.store.list(&collection, Some(order))?;
        docs.into_iter()
            .map(|doc| parse_doc(&format!("{collection}/{}", doc.id), doc.body))
            .collect()
    }

    /// Upsert by date: writing the same date twice overwrites, never
    /// duplicates.
    pub fn set_attendance(
        &self,
        date: &str,
        status: AttendanceStatus,
    ) -> Result<(), RecordsError> {
        validate_date(date)?;
        let record = AttendanceRecord {
            student_id: self.student_id.to_string(),
            date: date.to_string(),
            status,
        };
        let body = serde_json::to_value(&record).map_err(|e| StoreError::Write(e.to_string()))?;
        self.store
            .set(&format!("{}/{date}", self.attendance_collection()), body)?;
        Ok(())
    }

    pub fn delete_attendance(&self, date: &str) -> Result<(), RecordsError> {
        validate_date(date)?;
        self.store
            .delete(&format!("{}/{date}", self.attendance_collection()))?;
        Ok(())
    }

    pub fn grades(&self, order: Option<OrderBy>) -> Result<Vec<GradeRecord>, RecordsError> {
        let collection = self.grades_collection();
        let order = order.unwrap_or(OrderBy::desc("date"));
        let docs = self.store.list(&collection, Some(order))?;
        docs.into_iter()
            .map(|doc| parse_doc(&format!("{collection}/{}", doc.id), doc.body))
            .collect()
    }

    /// Upsert by (subject, date). The grade document and its subject
    /// document are written in one atomic multi-key write, so a grade can
    /// never reference a subject that was not (re-)created with it.
    pub fn set_grade(
        &self,
        subject_label: &str,
        grade: f64,
        date: &str,
    ) -> Result<GradeWrite, RecordsError> {
        validate_date(date)?;
        if !grade.is_finite() {
            return Err(RecordsError::InvalidGrade(grade));
        }
        let name = subject_label.trim();
        let slug = nonempty_slug(name)?;
        let key = grade_key(&slug, date);
        let record = GradeRecord {
            student_id: self.student_id.to_string(),
            subject: name.to_string(),
            subject_slug: slug.clone(),
            grade,
            date: date.to_string(),
        };
        let body = serde_json::to_value(&record).map_err(|e| StoreError::Write(e.to_string()))?;
        self.store.set_many(vec![
            (format!("{}/{key}", self.grades_collection()), body),
            (
                format!("{}/{slug}", self.subjects_collection()),
                json!({ "name": name }),
            ),
        ])?;
        self.refresh_subject_cache();
        Ok(GradeWrite { key, slug })
    }

    pub fn delete_grade(&self, subject_label: &str, date: &str) -> Result<(), RecordsError> {
        validate_date(date)?;
        let slug = nonempty_slug(subject_label.trim())?;
        let key = grade_key(&slug, date);
        self.store
            .delete(&format!("{}/{key}", self.grades_collection()))?;
        Ok(())
    }

    /// Best-effort rewrite of the denormalized `subjects` field on the
    /// profile document. Failure never propagates: the partition stays the
    /// source of truth and the cache is allowed to go stale.
    fn refresh_subject_cache(&self) {
        let labels = match self.subjects() {
            Ok(subjects) => subjects.into_iter().map(|s| s.name).collect::<Vec<_>>(),
            Err(e) => {
                tracing::warn!(student = self.student_id, error = %e, "subject cache refresh: partition read failed");
                return;
            }
        };
        if let Err(e) = self.store.update(
            &profile_path(self.student_id),
            json!({ "subjects": labels }),
        ) {
            tracing::warn!(student = self.student_id, error = %e, "subject cache refresh failed");
        }
    }
}
