//! crates/school_directory_core/src/domain.rs
//!
//! Defines the core data structures of the school directory: the entities,
//! the payloads used to create and patch them, and the list filters.
//! These structs are independent of any particular storage backend.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// Shared Enums
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Brand {
    Acme,
    Contoso,
    Globex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum PlanTier {
    Basic,
    Standard,
    Premium,
    Enterprise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BillingCycle {
    Monthly,
    Termly,
    Annually,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BillingStatus {
    Active,
    Trial,
    PastDue,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum GradingScale {
    Percentage,
    Letter,
    GradePoint,
}

/// Academic term. Serialized the way the portals display it ("Term 1").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Term {
    #[serde(rename = "Term 1")]
    Term1,
    #[serde(rename = "Term 2")]
    Term2,
    #[serde(rename = "Term 3")]
    Term3,
}

impl Term {
    pub const ALL: [Term; 3] = [Term::Term1, Term::Term2, Term::Term3];

    pub fn label(self) -> &'static str {
        match self {
            Term::Term1 => "Term 1",
            Term::Term2 => "Term 2",
            Term::Term3 => "Term 3",
        }
    }
}

/// Delivery channel, shared by school settings and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum NotificationChannel {
    Email,
    #[serde(rename = "SMS")]
    Sms,
    App,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Average,
    BelowAverage,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Audience {
    School,
    Class,
    Student,
    Teacher,
    Parent,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum NotificationStatus {
    Draft,
    Scheduled,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

//=========================================================================================
// School
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Billing {
    pub amount: f64,
    pub cycle: BillingCycle,
    pub status: BillingStatus,
}

/// Aggregates shown on a school card. Always computed from the collections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchoolStats {
    pub students: u32,
    pub teachers: u32,
    pub classes: u32,
    pub subjects: u32,
    pub average_performance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSettings {
    pub grading_scale: GradingScale,
    pub terms: Vec<Term>,
    pub academic_year: String,
    pub passing_grade: f64,
    pub notification_channels: Vec<NotificationChannel>,
}

impl Default for SchoolSettings {
    fn default() -> Self {
        Self {
            grading_scale: GradingScale::Percentage,
            terms: Term::ALL.to_vec(),
            academic_year: "2024/2025".to_string(),
            passing_grade: 40.0,
            notification_channels: vec![NotificationChannel::Email, NotificationChannel::App],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    pub name: String,
    pub brand: Brand,
    pub contact: ContactInfo,
    pub active: bool,
    pub plan: PlanTier,
    pub max_students: u32,
    pub current_student_count: u32,
    pub billing: Billing,
    pub stats: SchoolStats,
    pub settings: SchoolSettings,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSchool {
    pub name: String,
    pub brand: Brand,
    pub contact: ContactInfo,
    #[serde(default = "default_true")]
    pub active: bool,
    pub plan: PlanTier,
    pub max_students: u32,
    pub billing: Billing,
    #[serde(default)]
    pub settings: SchoolSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchoolPatch {
    pub name: Option<String>,
    pub brand: Option<Brand>,
    pub contact: Option<ContactInfo>,
    pub active: Option<bool>,
    pub plan: Option<PlanTier>,
    pub max_students: Option<u32>,
    pub billing: Option<Billing>,
    pub settings: Option<SchoolSettings>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SchoolFilter {
    pub search: Option<String>,
    pub brand: Option<Brand>,
    pub active: Option<bool>,
    pub plan: Option<PlanTier>,
}

//=========================================================================================
// Student
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Guardian {
    pub name: String,
    pub relationship: String,
    pub phone: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicalRecord {
    pub blood_group: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    pub emergency_contact: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentDocument {
    pub name: String,
    pub kind: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    /// Public, human-readable id used by the result checker.
    pub student_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub school_id: String,
    pub class_id: String,
    pub primary_guardian: Guardian,
    pub secondary_guardian: Option<Guardian>,
    pub active: bool,
    pub performance_level: PerformanceLevel,
    pub current_gpa: f64,
    pub medical: Option<MedicalRecord>,
    pub documents: Vec<StudentDocument>,
    pub enrolled_at: DateTime<Utc>,
}

impl Student {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    /// Generated when absent.
    pub student_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub school_id: String,
    pub class_id: String,
    pub primary_guardian: Guardian,
    pub secondary_guardian: Option<Guardian>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub current_gpa: f64,
    pub medical: Option<MedicalRecord>,
    #[serde(default)]
    pub documents: Vec<StudentDocument>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub date_of_birth: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    pub school_id: Option<String>,
    pub class_id: Option<String>,
    pub primary_guardian: Option<Guardian>,
    #[serde(default, deserialize_with = "nullable")]
    pub secondary_guardian: Option<Option<Guardian>>,
    pub active: Option<bool>,
    pub current_gpa: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub medical: Option<Option<MedicalRecord>>,
    pub documents: Option<Vec<StudentDocument>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StudentFilter {
    pub school_id: Option<String>,
    pub class_id: Option<String>,
    pub search: Option<String>,
    pub active: Option<bool>,
    pub performance_level: Option<PerformanceLevel>,
}

//=========================================================================================
// Teacher
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPerformance {
    pub class_average: f64,
    pub feedback_score: f64,
    pub submission_timeliness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub school_id: String,
    pub subjects: Vec<String>,
    pub class_ids: Vec<String>,
    pub active: bool,
    pub performance: TeacherPerformance,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTeacher {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub school_id: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub class_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub performance: TeacherPerformance,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeacherPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    pub school_id: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub class_ids: Option<Vec<String>>,
    pub active: Option<bool>,
    pub performance: Option<TeacherPerformance>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TeacherFilter {
    pub school_id: Option<String>,
    pub class_id: Option<String>,
    pub subject: Option<String>,
    pub search: Option<String>,
    pub active: Option<bool>,
}

//=========================================================================================
// ClassRoom
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoom {
    pub id: String,
    pub name: String,
    pub level: String,
    pub school_id: String,
    pub teacher_id: Option<String>,
    pub subject_ids: Vec<String>,
    pub student_count: u32,
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewClassRoom {
    pub name: String,
    pub level: String,
    pub school_id: String,
    pub teacher_id: Option<String>,
    #[serde(default)]
    pub subject_ids: Vec<String>,
    pub capacity: u32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassRoomPatch {
    pub name: Option<String>,
    pub level: Option<String>,
    pub school_id: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub teacher_id: Option<Option<String>>,
    pub subject_ids: Option<Vec<String>>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ClassRoomFilter {
    pub school_id: Option<String>,
    pub level: Option<String>,
    pub teacher_id: Option<String>,
    pub search: Option<String>,
}

//=========================================================================================
// Subject
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub average_ca: f64,
    pub average_exam: f64,
    pub pass_rate: f64,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub code: String,
    pub name: String,
    pub school_id: String,
    pub teacher_ids: Vec<String>,
    pub performance: SubjectPerformance,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSubject {
    pub code: String,
    pub name: String,
    pub school_id: String,
    #[serde(default)]
    pub teacher_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub school_id: Option<String>,
    pub teacher_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SubjectFilter {
    pub school_id: Option<String>,
    pub teacher_id: Option<String>,
    pub search: Option<String>,
}

//=========================================================================================
// ResultEntry
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub id: String,
    /// Internal id of the student, not the public one.
    pub student_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    pub term: Term,
    pub session: String,
    pub ca: f64,
    pub exam: f64,
    pub total: f64,
    pub grade: Grade,
    pub position: Option<u32>,
    pub published: bool,
    pub remarks: Option<String>,
    pub skills: BTreeMap<String, u8>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewResult {
    pub student_id: String,
    pub subject_id: String,
    pub teacher_id: String,
    pub term: Term,
    pub session: String,
    pub ca: f64,
    pub exam: f64,
    /// Optional; when present it must equal `ca + exam`.
    pub total: Option<f64>,
    #[serde(default)]
    pub published: bool,
    pub remarks: Option<String>,
    #[serde(default)]
    pub skills: BTreeMap<String, u8>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultPatch {
    pub term: Option<Term>,
    pub session: Option<String>,
    pub ca: Option<f64>,
    pub exam: Option<f64>,
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "nullable")]
    pub position: Option<Option<u32>>,
    pub published: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub remarks: Option<Option<String>>,
    pub skills: Option<BTreeMap<String, u8>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ResultFilter {
    pub student_id: Option<String>,
    pub subject_id: Option<String>,
    pub teacher_id: Option<String>,
    pub class_id: Option<String>,
    pub term: Option<Term>,
    pub session: Option<String>,
    pub published: Option<bool>,
}

/// What the public result checker returns for one student.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResultSheet {
    pub student: Student,
    pub results: Vec<ResultEntry>,
    pub attempts_remaining: u32,
}

//=========================================================================================
// NotificationItem
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMetrics {
    pub sent: u32,
    pub delivered: u32,
    pub opened: u32,
    pub clicked: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    pub id: String,
    pub school_id: String,
    pub title: String,
    pub message: String,
    pub audience: Audience,
    pub channel: NotificationChannel,
    pub status: NotificationStatus,
    pub priority: Priority,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub metrics: DeliveryMetrics,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub school_id: String,
    pub title: String,
    pub message: String,
    pub audience: Audience,
    pub channel: NotificationChannel,
    #[serde(default = "default_status")]
    pub status: NotificationStatus,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metrics: DeliveryMetrics,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    pub audience: Option<Audience>,
    pub channel: Option<NotificationChannel>,
    pub status: Option<NotificationStatus>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "nullable")]
    pub scheduled_for: Option<Option<DateTime<Utc>>>,
    pub metrics: Option<DeliveryMetrics>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct NotificationFilter {
    pub school_id: Option<String>,
    pub audience: Option<Audience>,
    pub channel: Option<NotificationChannel>,
    pub status: Option<NotificationStatus>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
}

//=========================================================================================
// Result-access tokens
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    pub id: String,
    /// Public student id the token unlocks.
    pub student_id: String,
    pub token: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl TokenRecord {
    /// A token is usable only while flagged active, not exhausted and not expired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.attempts < self.max_attempts && self.expires_at > now
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

//=========================================================================================
// Activity log
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ActivityKind {
    Created,
    Updated,
    Deleted,
    Imported,
    TokenIssued,
    ResultsChecked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub entity: String,
    pub entity_id: String,
    /// School the touched record belongs to, when it resolves to one.
    pub school_id: Option<String>,
    pub description: String,
    pub at: DateTime<Utc>,
}

//=========================================================================================
// Serde helpers
//=========================================================================================

fn default_true() -> bool {
    true
}

fn default_status() -> NotificationStatus {
    NotificationStatus::Draft
}

fn default_priority() -> Priority {
    Priority::Medium
}

/// Lets a patch tell "leave untouched" (field missing) apart from "clear" (`null`).
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_distinguishes_missing_from_null() {
        let patch: StudentPatch = serde_json::from_value(json!({ "email": null })).unwrap();
        assert_eq!(patch.email, Some(None));
        assert_eq!(patch.phone, None);

        let patch: StudentPatch =
            serde_json::from_value(json!({ "phone": "0801" })).unwrap();
        assert_eq!(patch.phone, Some(Some("0801".to_string())));
    }

    #[test]
    fn term_and_channel_use_display_names() {
        assert_eq!(serde_json::to_value(Term::Term2).unwrap(), json!("Term 2"));
        assert_eq!(
            serde_json::to_value(NotificationChannel::Sms).unwrap(),
            json!("SMS")
        );
    }

    #[test]
    fn new_school_defaults_to_active_with_default_settings() {
        let payload: NewSchool = serde_json::from_value(json!({
            "name": "Acme High",
            "brand": "Acme",
            "contact": { "email": "info@acme.test", "phone": "1", "address": "A" },
            "plan": "Premium",
            "maxStudents": 500,
            "billing": { "amount": 1200.0, "cycle": "Annually", "status": "Active" }
        }))
        .unwrap();
        assert!(payload.active);
        assert_eq!(payload.settings.passing_grade, 40.0);
        assert_eq!(payload.settings.terms.len(), 3);
    }
}
