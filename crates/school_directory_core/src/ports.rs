//! crates/school_directory_core/src/ports.rs
//!
//! Defines the service contract (trait) for the directory.
//! The trait forms the boundary of the hexagonal architecture: the in-memory
//! store and the hosted relational backend both implement it, so callers can
//! swap one for the other without changing filter semantics or result shapes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::dashboard::AdminDashboard;
use crate::domain::{
    ActivityEntry, ClassRoom, ClassRoomFilter, ClassRoomPatch, NewClassRoom, NewNotification,
    NewResult, NewSchool, NewStudent, NewSubject, NewTeacher, NotificationFilter,
    NotificationItem, NotificationPatch, ResultEntry, ResultFilter, ResultPatch, ResultSheet,
    School, SchoolFilter, SchoolPatch, Student, StudentFilter, StudentPatch, Subject,
    SubjectFilter, SubjectPatch, Teacher, TeacherFilter, TeacherPatch, Term, TokenRecord,
};
use crate::error::StoreError;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The directory refused the operation (validation, references, tokens).
    #[error(transparent)]
    Rejected(#[from] StoreError),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Port (Trait)
//=========================================================================================

/// Unknown ids are not errors: lookups return `None`, deletes return `false`.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    // --- Schools ---
    async fn list_schools(&self, filter: &SchoolFilter) -> PortResult<Vec<School>>;
    async fn get_school(&self, id: &str) -> PortResult<Option<School>>;
    async fn add_school(&self, payload: NewSchool) -> PortResult<School>;
    async fn update_school(&self, id: &str, patch: SchoolPatch) -> PortResult<Option<School>>;
    async fn delete_school(&self, id: &str) -> PortResult<bool>;

    // --- Students ---
    async fn list_students(&self, filter: &StudentFilter) -> PortResult<Vec<Student>>;
    async fn get_student(&self, id: &str) -> PortResult<Option<Student>>;
    async fn get_student_by_public_id(&self, student_id: &str) -> PortResult<Option<Student>>;
    async fn add_student(&self, payload: NewStudent) -> PortResult<Student>;
    async fn update_student(&self, id: &str, patch: StudentPatch) -> PortResult<Option<Student>>;
    async fn delete_student(&self, id: &str) -> PortResult<bool>;

    /// One outcome per payload, in order; a rejected item does not undo earlier ones.
    async fn bulk_import_students(
        &self,
        payloads: Vec<NewStudent>,
    ) -> PortResult<Vec<Result<Student, StoreError>>>;

    // --- Teachers ---
    async fn list_teachers(&self, filter: &TeacherFilter) -> PortResult<Vec<Teacher>>;
    async fn get_teacher(&self, id: &str) -> PortResult<Option<Teacher>>;
    async fn add_teacher(&self, payload: NewTeacher) -> PortResult<Teacher>;
    async fn update_teacher(&self, id: &str, patch: TeacherPatch) -> PortResult<Option<Teacher>>;
    async fn delete_teacher(&self, id: &str) -> PortResult<bool>;

    // --- Classes ---
    async fn list_classes(&self, filter: &ClassRoomFilter) -> PortResult<Vec<ClassRoom>>;
    async fn get_class(&self, id: &str) -> PortResult<Option<ClassRoom>>;
    async fn add_class(&self, payload: NewClassRoom) -> PortResult<ClassRoom>;
    async fn update_class(&self, id: &str, patch: ClassRoomPatch) -> PortResult<Option<ClassRoom>>;
    async fn delete_class(&self, id: &str) -> PortResult<bool>;

    // --- Subjects ---
    async fn list_subjects(&self, filter: &SubjectFilter) -> PortResult<Vec<Subject>>;
    async fn get_subject(&self, id: &str) -> PortResult<Option<Subject>>;
    async fn add_subject(&self, payload: NewSubject) -> PortResult<Subject>;
    async fn update_subject(&self, id: &str, patch: SubjectPatch) -> PortResult<Option<Subject>>;
    async fn delete_subject(&self, id: &str) -> PortResult<bool>;

    // --- Results ---
    async fn list_results(&self, filter: &ResultFilter) -> PortResult<Vec<ResultEntry>>;
    async fn get_result(&self, id: &str) -> PortResult<Option<ResultEntry>>;
    async fn add_result(&self, payload: NewResult) -> PortResult<ResultEntry>;
    async fn update_result(&self, id: &str, patch: ResultPatch) -> PortResult<Option<ResultEntry>>;
    async fn delete_result(&self, id: &str) -> PortResult<bool>;
    async fn rank_results(
        &self,
        class_id: &str,
        subject_id: &str,
        term: Term,
        session: &str,
    ) -> PortResult<usize>;

    // --- Notifications ---
    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> PortResult<Vec<NotificationItem>>;
    async fn get_notification(&self, id: &str) -> PortResult<Option<NotificationItem>>;
    async fn add_notification(&self, payload: NewNotification) -> PortResult<NotificationItem>;
    async fn update_notification(
        &self,
        id: &str,
        patch: NotificationPatch,
    ) -> PortResult<Option<NotificationItem>>;
    async fn delete_notification(&self, id: &str) -> PortResult<bool>;
    async fn due_notifications(&self, now: DateTime<Utc>) -> PortResult<Vec<NotificationItem>>;

    // --- Result-access tokens ---
    async fn find_token_by_student_id(&self, student_id: &str) -> PortResult<Option<TokenRecord>>;
    async fn list_tokens(&self, student_id: Option<&str>) -> PortResult<Vec<TokenRecord>>;
    async fn create_token(&self, student_id: &str) -> PortResult<TokenRecord>;
    async fn increment_attempt(&self, token_id: &str) -> PortResult<Option<TokenRecord>>;
    async fn check_results(
        &self,
        student_id: &str,
        token: &str,
        term: Option<Term>,
        session: Option<&str>,
    ) -> PortResult<ResultSheet>;

    // --- Activity & dashboard ---
    async fn list_activity(&self, limit: Option<usize>) -> PortResult<Vec<ActivityEntry>>;
    async fn admin_dashboard(&self, school_id: Option<&str>) -> PortResult<AdminDashboard>;
}
