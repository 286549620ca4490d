//! crates/school_directory_core/src/rules.rs
//!
//! Grading and derivation rules shared by every backend, so the in-memory
//! store and the PostgreSQL adapter compute identical values.

use uuid::Uuid;

use crate::domain::{Billing, BillingCycle, Difficulty, Grade, PerformanceLevel, SubjectPerformance};
use crate::error::{StoreError, StoreResult};

/// Highest continuous-assessment score.
pub const MAX_CA: f64 = 40.0;
/// Highest exam score.
pub const MAX_EXAM: f64 = 60.0;
pub const MAX_GPA: f64 = 5.0;
/// First public id handed out when a directory has none.
pub const FIRST_PUBLIC_NUMBER: u32 = 1001;
pub const PUBLIC_ID_PREFIX: &str = "STU-";
/// Pass mark used when a subject's school cannot be resolved.
pub const DEFAULT_PASSING_GRADE: f64 = 40.0;

const SCORE_EPSILON: f64 = 1e-6;

pub fn grade_for_total(total: f64) -> Grade {
    match total {
        t if t >= 70.0 => Grade::A,
        t if t >= 60.0 => Grade::B,
        t if t >= 50.0 => Grade::C,
        t if t >= 45.0 => Grade::D,
        t if t >= 40.0 => Grade::E,
        _ => Grade::F,
    }
}

impl PerformanceLevel {
    pub fn from_gpa(gpa: f64) -> Self {
        match gpa {
            g if g >= 4.5 => PerformanceLevel::Excellent,
            g if g >= 3.5 => PerformanceLevel::Good,
            g if g >= 2.5 => PerformanceLevel::Average,
            g if g >= 1.5 => PerformanceLevel::BelowAverage,
            _ => PerformanceLevel::Poor,
        }
    }
}

impl Difficulty {
    /// `pass_rate` is a percentage.
    pub fn from_pass_rate(pass_rate: f64) -> Self {
        if pass_rate >= 75.0 {
            Difficulty::Easy
        } else if pass_rate >= 50.0 {
            Difficulty::Moderate
        } else {
            Difficulty::Hard
        }
    }
}

/// Checks score ranges and returns the total. A supplied total must equal `ca + exam`.
pub fn validate_scores(ca: f64, exam: f64, total: Option<f64>) -> StoreResult<f64> {
    if !(0.0..=MAX_CA).contains(&ca) {
        return Err(StoreError::invalid("ca", format!("must be between 0 and {MAX_CA}")));
    }
    if !(0.0..=MAX_EXAM).contains(&exam) {
        return Err(StoreError::invalid(
            "exam",
            format!("must be between 0 and {MAX_EXAM}"),
        ));
    }
    let computed = ca + exam;
    match total {
        Some(t) if (t - computed).abs() > SCORE_EPSILON => Err(StoreError::invalid(
            "total",
            format!("{t} does not equal ca + exam ({computed})"),
        )),
        _ => Ok(computed),
    }
}

pub fn validate_gpa(gpa: f64) -> StoreResult<()> {
    if (0.0..=MAX_GPA).contains(&gpa) {
        Ok(())
    } else {
        Err(StoreError::invalid("currentGpa", format!("must be between 0 and {MAX_GPA}")))
    }
}

/// Sessions are written "2023/2024": two consecutive years.
pub fn validate_session(session: &str) -> StoreResult<()> {
    let malformed = || StoreError::invalid("session", format!("'{session}' is not like 2023/2024"));
    let (start, end) = session.split_once('/').ok_or_else(malformed)?;
    let start: u32 = start.parse().map_err(|_| malformed())?;
    let end: u32 = end.parse().map_err(|_| malformed())?;
    if start.checked_add(1) != Some(end) {
        return Err(malformed());
    }
    Ok(())
}

pub fn require_text(field: &'static str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        Err(StoreError::invalid(field, "must not be empty"))
    } else {
        Ok(())
    }
}

/// Next "STU-NNNN" id after the largest numeric suffix already in use.
///
/// Fails once the largest suffix is `u32::MAX`; there is no next number to hand out.
pub fn next_public_id<'a>(existing: impl IntoIterator<Item = &'a str>) -> StoreResult<String> {
    let highest = existing
        .into_iter()
        .filter_map(|id| id.strip_prefix(PUBLIC_ID_PREFIX))
        .filter_map(|n| n.parse::<u32>().ok())
        .max();
    let next = match highest {
        Some(n) if n >= FIRST_PUBLIC_NUMBER => n.checked_add(1).ok_or_else(|| {
            StoreError::invalid("studentId", format!("no public id follows {PUBLIC_ID_PREFIX}{n}"))
        })?,
        _ => FIRST_PUBLIC_NUMBER,
    };
    Ok(format!("{PUBLIC_ID_PREFIX}{next}"))
}

/// Twelve uppercase hex characters grouped in fours, e.g. `3F9A-0C1B-77D2`.
pub fn generate_token() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}-{}-{}", &raw[0..4], &raw[4..8], &raw[8..12])
}

/// Case-insensitive substring match against any of the haystacks.
pub fn matches_search(needle: &str, haystacks: &[&str]) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    haystacks
        .iter()
        .any(|h| h.to_lowercase().contains(&needle))
}

/// Billing amount normalized to one month.
pub fn monthly_amount(billing: &Billing) -> f64 {
    match billing.cycle {
        BillingCycle::Monthly => billing.amount,
        BillingCycle::Termly => billing.amount / 4.0,
        BillingCycle::Annually => billing.amount / 12.0,
    }
}

/// Competition ranking ("1224") for totals already sorted from highest to lowest.
pub fn competition_ranks(sorted_totals: &[f64]) -> Vec<u32> {
    let mut ranks = Vec::with_capacity(sorted_totals.len());
    for (i, total) in sorted_totals.iter().enumerate() {
        let rank = match (i, ranks.last()) {
            (0, _) => 1,
            (_, Some(&prev)) if (sorted_totals[i - 1] - total).abs() <= SCORE_EPSILON => prev,
            _ => i as u32 + 1,
        };
        ranks.push(rank);
    }
    ranks
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregates a subject's `(ca, exam, total)` rows against the school's pass mark.
pub fn subject_performance(scores: &[(f64, f64, f64)], passing_grade: f64) -> SubjectPerformance {
    if scores.is_empty() {
        return SubjectPerformance::default();
    }
    let count = scores.len() as f64;
    let passed = scores.iter().filter(|(_, _, total)| *total >= passing_grade).count() as f64;
    let pass_rate = round2(passed / count * 100.0);
    SubjectPerformance {
        average_ca: round2(scores.iter().map(|(ca, _, _)| ca).sum::<f64>() / count),
        average_exam: round2(scores.iter().map(|(_, exam, _)| exam).sum::<f64>() / count),
        pass_rate,
        difficulty: Some(Difficulty::from_pass_rate(pass_rate)),
    }
}
