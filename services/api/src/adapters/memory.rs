//! services/api/src/adapters/memory.rs
//!
//! The in-process backend: a `DirectoryStore` behind an async read/write lock.
//! Reads share the lock; every mutation takes it exclusively, so each operation
//! is applied atomically with respect to the others.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use school_directory_core::dashboard::AdminDashboard;
use school_directory_core::domain::{
    ActivityEntry, ClassRoom, ClassRoomFilter, ClassRoomPatch, NewClassRoom, NewNotification,
    NewResult, NewSchool, NewStudent, NewSubject, NewTeacher, NotificationFilter,
    NotificationItem, NotificationPatch, ResultEntry, ResultFilter, ResultPatch, ResultSheet,
    School, SchoolFilter, SchoolPatch, Student, StudentFilter, StudentPatch, Subject,
    SubjectFilter, SubjectPatch, Teacher, TeacherFilter, TeacherPatch, Term, TokenRecord,
};
use school_directory_core::ports::{DirectoryService, PortResult};
use school_directory_core::{DirectoryStore, StoreError};
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct MemoryDirectory {
    store: Arc<RwLock<DirectoryStore>>,
}

impl MemoryDirectory {
    pub fn new(store: DirectoryStore) -> Self {
        Self {
            store: Arc::new(RwLock::new(store)),
        }
    }
}

#[async_trait]
impl DirectoryService for MemoryDirectory {
    // --- Schools ---

    async fn list_schools(&self, filter: &SchoolFilter) -> PortResult<Vec<School>> {
        Ok(self.store.read().await.list_schools(filter))
    }

    async fn get_school(&self, id: &str) -> PortResult<Option<School>> {
        Ok(self.store.read().await.get_school(id))
    }

    async fn add_school(&self, payload: NewSchool) -> PortResult<School> {
        Ok(self.store.write().await.add_school(payload)?)
    }

    async fn update_school(&self, id: &str, patch: SchoolPatch) -> PortResult<Option<School>> {
        Ok(self.store.write().await.update_school(id, patch)?)
    }

    async fn delete_school(&self, id: &str) -> PortResult<bool> {
        Ok(self.store.write().await.delete_school(id))
    }

    // --- Students ---

    async fn list_students(&self, filter: &StudentFilter) -> PortResult<Vec<Student>> {
        Ok(self.store.read().await.list_students(filter))
    }

    async fn get_student(&self, id: &str) -> PortResult<Option<Student>> {
        Ok(self.store.read().await.get_student(id))
    }

    async fn get_student_by_public_id(&self, student_id: &str) -> PortResult<Option<Student>> {
        Ok(self.store.read().await.get_student_by_public_id(student_id))
    }

    async fn add_student(&self, payload: NewStudent) -> PortResult<Student> {
        Ok(self.store.write().await.add_student(payload)?)
    }

    async fn update_student(&self, id: &str, patch: StudentPatch) -> PortResult<Option<Student>> {
        Ok(self.store.write().await.update_student(id, patch)?)
    }

    async fn delete_student(&self, id: &str) -> PortResult<bool> {
        Ok(self.store.write().await.delete_student(id))
    }

    async fn bulk_import_students(
        &self,
        payloads: Vec<NewStudent>,
    ) -> PortResult<Vec<Result<Student, StoreError>>> {
        Ok(self.store.write().await.bulk_import_students(payloads))
    }

    // --- Teachers ---

    async fn list_teachers(&self, filter: &TeacherFilter) -> PortResult<Vec<Teacher>> {
        Ok(self.store.read().await.list_teachers(filter))
    }

    async fn get_teacher(&self, id: &str) -> PortResult<Option<Teacher>> {
        Ok(self.store.read().await.get_teacher(id))
    }

    async fn add_teacher(&self, payload: NewTeacher) -> PortResult<Teacher> {
        Ok(self.store.write().await.add_teacher(payload)?)
    }

    async fn update_teacher(&self, id: &str, patch: TeacherPatch) -> PortResult<Option<Teacher>> {
        Ok(self.store.write().await.update_teacher(id, patch)?)
    }

    async fn delete_teacher(&self, id: &str) -> PortResult<bool> {
        Ok(self.store.write().await.delete_teacher(id))
    }

    // --- Classes ---

    async fn list_classes(&self, filter: &ClassRoomFilter) -> PortResult<Vec<ClassRoom>> {
        Ok(self.store.read().await.list_classes(filter))
    }

    async fn get_class(&self, id: &str) -> PortResult<Option<ClassRoom>> {
        Ok(self.store.read().await.get_class(id))
    }

    async fn add_class(&self, payload: NewClassRoom) -> PortResult<ClassRoom> {
        Ok(self.store.write().await.add_class(payload)?)
    }

    async fn update_class(&self, id: &str, patch: ClassRoomPatch) -> PortResult<Option<ClassRoom>> {
        Ok(self.store.write().await.update_class(id, patch)?)
    }

    async fn delete_class(&self, id: &str) -> PortResult<bool> {
        Ok(self.store.write().await.delete_class(id))
    }

    // --- Subjects ---

    async fn list_subjects(&self, filter: &SubjectFilter) -> PortResult<Vec<Subject>> {
        Ok(self.store.read().await.list_subjects(filter))
    }

    async fn get_subject(&self, id: &str) -> PortResult<Option<Subject>> {
        Ok(self.store.read().await.get_subject(id))
    }

    async fn add_subject(&self, payload: NewSubject) -> PortResult<Subject> {
        Ok(self.store.write().await.add_subject(payload)?)
    }

    async fn update_subject(&self, id: &str, patch: SubjectPatch) -> PortResult<Option<Subject>> {
        Ok(self.store.write().await.update_subject(id, patch)?)
    }

    async fn delete_subject(&self, id: &str) -> PortResult<bool> {
        Ok(self.store.write().await.delete_subject(id))
    }

    // --- Results ---

    async fn list_results(&self, filter: &ResultFilter) -> PortResult<Vec<ResultEntry>> {
        Ok(self.store.read().await.list_results(filter))
    }

    async fn get_result(&self, id: &str) -> PortResult<Option<ResultEntry>> {
        Ok(self.store.read().await.get_result(id))
    }

    async fn add_result(&self, payload: NewResult) -> PortResult<ResultEntry> {
        Ok(self.store.write().await.add_result(payload)?)
    }

    async fn update_result(&self, id: &str, patch: ResultPatch) -> PortResult<Option<ResultEntry>> {
        Ok(self.store.write().await.update_result(id, patch)?)
    }

    async fn delete_result(&self, id: &str) -> PortResult<bool> {
        Ok(self.store.write().await.delete_result(id))
    }

    async fn rank_results(
        &self,
        class_id: &str,
        subject_id: &str,
        term: Term,
        session: &str,
    ) -> PortResult<usize> {
        Ok(self
            .store
            .write()
            .await
            .rank_results(class_id, subject_id, term, session))
    }

    // --- Notifications ---

    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> PortResult<Vec<NotificationItem>> {
        Ok(self.store.read().await.list_notifications(filter))
    }

    async fn get_notification(&self, id: &str) -> PortResult<Option<NotificationItem>> {
        Ok(self.store.read().await.get_notification(id))
    }

    async fn add_notification(&self, payload: NewNotification) -> PortResult<NotificationItem> {
        Ok(self.store.write().await.add_notification(payload)?)
    }

    async fn update_notification(
        &self,
        id: &str,
        patch: NotificationPatch,
    ) -> PortResult<Option<NotificationItem>> {
        Ok(self.store.write().await.update_notification(id, patch)?)
    }

    async fn delete_notification(&self, id: &str) -> PortResult<bool> {
        Ok(self.store.write().await.delete_notification(id))
    }

    async fn due_notifications(&self, now: DateTime<Utc>) -> PortResult<Vec<NotificationItem>> {
        Ok(self.store.read().await.due_notifications(now))
    }

    // --- Result-access tokens ---

    async fn find_token_by_student_id(&self, student_id: &str) -> PortResult<Option<TokenRecord>> {
        Ok(self.store.read().await.find_token_by_student_id(student_id))
    }

    async fn list_tokens(&self, student_id: Option<&str>) -> PortResult<Vec<TokenRecord>> {
        Ok(self.store.read().await.list_tokens(student_id))
    }

    async fn create_token(&self, student_id: &str) -> PortResult<TokenRecord> {
        Ok(self.store.write().await.create_token(student_id)?)
    }

    async fn increment_attempt(&self, token_id: &str) -> PortResult<Option<TokenRecord>> {
        Ok(self.store.write().await.increment_attempt(token_id))
    }

    async fn check_results(
        &self,
        student_id: &str,
        token: &str,
        term: Option<Term>,
        session: Option<&str>,
    ) -> PortResult<ResultSheet> {
        Ok(self
            .store
            .write()
            .await
            .check_results(student_id, token, term, session)?)
    }

    // --- Activity & dashboard ---

    async fn list_activity(&self, limit: Option<usize>) -> PortResult<Vec<ActivityEntry>> {
        Ok(self.store.read().await.list_activity(limit))
    }

    async fn admin_dashboard(&self, school_id: Option<&str>) -> PortResult<AdminDashboard> {
        Ok(self.store.read().await.admin_dashboard(school_id))
    }
}
