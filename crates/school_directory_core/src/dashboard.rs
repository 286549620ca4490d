//! crates/school_directory_core/src/dashboard.rs
//!
//! The admin dashboard snapshot. Built by a pure function over entity slices so
//! that every backend produces the same numbers from the same records.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    ActivityEntry, ClassRoom, NotificationItem, PerformanceLevel, ResultEntry, School, Student,
    Subject, Teacher, Term,
};
use crate::rules;

/// How many activity entries the dashboard shows.
pub const RECENT_ACTIVITY_LEN: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
    pub schools: u32,
    pub active_schools: u32,
    pub students: u32,
    pub active_students: u32,
    pub teachers: u32,
    pub classes: u32,
    pub subjects: u32,
    pub results: u32,
    pub published_results: u32,
    pub notifications: u32,
    pub monthly_revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LevelCount {
    pub level: String,
    pub students: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject_id: String,
    pub code: String,
    pub name: String,
    pub average_total: f64,
    pub result_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceShare {
    pub level: PerformanceLevel,
    pub students: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboard {
    pub school_id: Option<String>,
    pub totals: DashboardTotals,
    pub grade_levels: Vec<LevelCount>,
    pub subject_averages: Vec<SubjectAverage>,
    pub enrollment_trend: Vec<TrendPoint>,
    pub performance_trend: Vec<TrendPoint>,
    pub performance_distribution: Vec<PerformanceShare>,
    pub recent_activity: Vec<ActivityEntry>,
    pub generated_at: DateTime<Utc>,
}

/// Everything the dashboard reads. Classes and schools must already carry their
/// computed counters; activity must be newest first.
pub struct DashboardInput<'a> {
    pub schools: &'a [School],
    pub students: &'a [Student],
    pub teachers: &'a [Teacher],
    pub classes: &'a [ClassRoom],
    pub subjects: &'a [Subject],
    pub results: &'a [ResultEntry],
    pub notifications: &'a [NotificationItem],
    pub activity: &'a [ActivityEntry],
}

pub fn build_admin_dashboard(input: DashboardInput<'_>, school_id: Option<&str>) -> AdminDashboard {
    let in_scope = |id: &str| school_id.map_or(true, |scope| scope == id);

    let schools: Vec<&School> = input.schools.iter().filter(|s| in_scope(s.id.as_str())).collect();
    let students: Vec<&Student> = input.students.iter().filter(|s| in_scope(s.school_id.as_str())).collect();
    let teachers = input.teachers.iter().filter(|t| in_scope(t.school_id.as_str())).count();
    let classes: Vec<&ClassRoom> = input.classes.iter().filter(|c| in_scope(c.school_id.as_str())).collect();
    let subjects: Vec<&Subject> = input.subjects.iter().filter(|s| in_scope(s.school_id.as_str())).collect();
    let notifications = input
        .notifications
        .iter()
        .filter(|n| in_scope(n.school_id.as_str()))
        .count();

    // Results reach their school through the student.
    let student_ids: HashSet<&str> = students.iter().map(|s| s.id.as_str()).collect();
    let results: Vec<&ResultEntry> = input
        .results
        .iter()
        .filter(|r| school_id.is_none() || student_ids.contains(r.student_id.as_str()))
        .collect();

    let totals = DashboardTotals {
        schools: schools.len() as u32,
        active_schools: schools.iter().filter(|s| s.active).count() as u32,
        students: students.len() as u32,
        active_students: students.iter().filter(|s| s.active).count() as u32,
        teachers: teachers as u32,
        classes: classes.len() as u32,
        subjects: subjects.len() as u32,
        results: results.len() as u32,
        published_results: results.iter().filter(|r| r.published).count() as u32,
        notifications: notifications as u32,
        monthly_revenue: rules::round2(
            schools
                .iter()
                .filter(|s| s.active)
                .map(|s| rules::monthly_amount(&s.billing))
                .sum(),
        ),
    };

    AdminDashboard {
        school_id: school_id.map(str::to_string),
        totals,
        grade_levels: grade_levels(&classes),
        subject_averages: subject_averages(&subjects, &results),
        enrollment_trend: enrollment_trend(&students),
        performance_trend: performance_trend(&results),
        performance_distribution: performance_distribution(&students),
        recent_activity: input
            .activity
            .iter()
            .filter(|a| school_id.is_none() || a.school_id.as_deref() == school_id)
            .take(RECENT_ACTIVITY_LEN)
            .cloned()
            .collect(),
        generated_at: Utc::now(),
    }
}

/// Sum of class rosters per level, levels in first-seen order.
fn grade_levels(classes: &[&ClassRoom]) -> Vec<LevelCount> {
    let mut levels: Vec<LevelCount> = Vec::new();
    for class in classes {
        match levels.iter_mut().find(|l| l.level == class.level) {
            Some(level) => level.students += class.student_count,
            None => levels.push(LevelCount {
                level: class.level.clone(),
                students: class.student_count,
            }),
        }
    }
    levels
}

fn subject_averages(subjects: &[&Subject], results: &[&ResultEntry]) -> Vec<SubjectAverage> {
    let mut by_subject: HashMap<&str, Vec<f64>> = HashMap::new();
    for result in results {
        by_subject
            .entry(result.subject_id.as_str())
            .or_default()
            .push(result.total);
    }
    subjects
        .iter()
        .filter_map(|subject| {
            let totals = by_subject.get(subject.id.as_str())?;
            let average = rules::mean(totals.iter().copied())?;
            Some(SubjectAverage {
                subject_id: subject.id.clone(),
                code: subject.code.clone(),
                name: subject.name.clone(),
                average_total: rules::round2(average),
                result_count: totals.len() as u32,
            })
        })
        .collect()
}

fn enrollment_trend(students: &[&Student]) -> Vec<TrendPoint> {
    let mut by_month: BTreeMap<String, u32> = BTreeMap::new();
    for student in students {
        *by_month
            .entry(student.enrolled_at.format("%Y-%m").to_string())
            .or_default() += 1;
    }
    by_month
        .into_iter()
        .map(|(label, count)| TrendPoint {
            label,
            value: f64::from(count),
        })
        .collect()
}

fn performance_trend(results: &[&ResultEntry]) -> Vec<TrendPoint> {
    let mut by_sitting: BTreeMap<(&str, Term), Vec<f64>> = BTreeMap::new();
    for result in results {
        by_sitting
            .entry((result.session.as_str(), result.term))
            .or_default()
            .push(result.total);
    }
    by_sitting
        .into_iter()
        .filter_map(|((session, term), totals)| {
            rules::mean(totals).map(|average| TrendPoint {
                label: format!("{} {}", session, term.label()),
                value: rules::round2(average),
            })
        })
        .collect()
}

fn performance_distribution(students: &[&Student]) -> Vec<PerformanceShare> {
    [
        PerformanceLevel::Excellent,
        PerformanceLevel::Good,
        PerformanceLevel::Average,
        PerformanceLevel::BelowAverage,
        PerformanceLevel::Poor,
    ]
    .into_iter()
    .map(|level| PerformanceShare {
        level,
        students: students.iter().filter(|s| s.performance_level == level).count() as u32,
    })
    .collect()
}
