//! Deterministic identifiers derived from natural-language labels and dates.
//!
//! Subject documents are keyed by `slugify(label)`, grade documents by
//! `grade_key(slug, date)`. Both are pure functions so re-deriving a key
//! for the same real-world entity always lands on the same document.

/// Normalize a display label into a storage slug.
///
/// Lower-case ASCII letters and digits only; every run of anything else
/// collapses to a single `-`; no leading or trailing `-`. Labels that differ
/// only in case, surrounding whitespace, or separator run-length map to the
/// same slug. Empty or all-punctuation input yields `""`, which callers must
/// treat as an invalid key.
pub fn slugify(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Document id for a grade: `{slug}_{date}`.
///
/// `_` is not producible by `slugify`, and dates are fixed-width ISO
/// (validated at the write boundary), so two distinct (subject, date) pairs
/// can never concatenate to the same key.
pub fn grade_key(slug: &str, date: &str) -> String {
    format!("{}_{}", slug, date)
}
