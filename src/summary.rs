//! Pure reductions of raw record sequences into display statistics.
//! No I/O here: callers fetch, this module folds.

use std::collections::HashMap;

use serde::Serialize;

use crate::records::{AttendanceRecord, AttendanceStatus, GradeRecord};

/// Round to 2 decimal places for display averages.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub percent_present: u32,
}

/// Partition the records by status and derive the attendance rate.
/// `present + absent + late == total` always; the rate is 0 for an empty
/// set.
pub fn attendance_summary(records: &[AttendanceRecord]) -> AttendanceSummary {
    let mut present = 0usize;
    let mut absent = 0usize;
    let mut late = 0usize;
    for r in records {
        match r.status {
            AttendanceStatus::Present => present += 1,
            AttendanceStatus::Absent => absent += 1,
            AttendanceStatus::Late => late += 1,
        }
    }
    let total = records.len();
    let percent_present = if total == 0 {
        0
    } else {
        (100.0 * present as f64 / total as f64).round() as u32
    };
    AttendanceSummary {
        total,
        present,
        absent,
        late,
        percent_present,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: String,
    pub avg: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSummary {
    pub per_subject: Vec<SubjectAverage>,
    pub overall_avg: f64,
}

/// Per-subject and overall grade averages.
///
/// Grouping keys on the display label as recorded on each record, not the
/// slug, so records carrying differently-cased labels for the same slug
/// split into separate groups. The overall average weights every record
/// equally regardless of subject; it is not a mean of the per-subject
/// averages. Groups keep first-seen order.
pub fn grade_summary(records: &[GradeRecord]) -> GradeSummary {
    let mut order: Vec<String> = Vec::new();
    let mut by_subject: HashMap<String, Vec<f64>> = HashMap::new();
    for g in records {
        by_subject
            .entry(g.subject.clone())
            .or_insert_with(|| {
                order.push(g.subject.clone());
                Vec::new()
            })
            .push(g.grade);
    }

    let mut per_subject = Vec::with_capacity(order.len());
    let mut overall_sum = 0.0;
    let mut overall_count = 0usize;
    for subject in order {
        let grades = &by_subject[&subject];
        let sum: f64 = grades.iter().sum();
        overall_sum += sum;
        overall_count += grades.len();
        per_subject.push(SubjectAverage {
            subject,
            avg: round2(sum / grades.len() as f64),
            count: grades.len(),
        });
    }
    let overall_avg = if overall_count == 0 {
        0.0
    } else {
        round2(overall_sum / overall_count as f64)
    };
    GradeSummary {
        per_subject,
        overall_avg,
    }
}
