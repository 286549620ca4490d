//! crates/school_directory_core/src/store.rs
//!
//! The in-memory directory store.
//!
//! `DirectoryStore` owns flat collections of every entity and exposes list, get,
//! add, update and delete operations over them. It is constructed explicitly
//! (one per process or per test) and is never shared through globals.
//!
//! Counters shown on parent records (`School::stats`, `ClassRoom::student_count`,
//! `Subject::performance`) are not stored: they are computed from the
//! collections every time a record is read, so adding and deleting children
//! moves them symmetrically by construction.

use std::collections::{HashSet, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dashboard::{self, AdminDashboard, DashboardInput};
use crate::domain::{
    ActivityEntry, ActivityKind, ClassRoom, ClassRoomFilter, ClassRoomPatch, NewClassRoom,
    NewNotification, NewResult, NewSchool, NewStudent, NewSubject, NewTeacher,
    NotificationFilter, NotificationItem, NotificationPatch, NotificationStatus, ResultEntry,
    ResultFilter, ResultPatch, ResultSheet, School, SchoolFilter, SchoolPatch, SchoolStats,
    Student, StudentFilter, StudentPatch, Subject,
    SubjectFilter, SubjectPatch, Teacher, TeacherFilter, TeacherPatch, Term, TokenRecord,
};
use crate::error::{StoreError, StoreResult};
use crate::rules;

//=========================================================================================
// Settings
//=========================================================================================

/// Tunables for a store instance.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Reject records whose school/class/subject/student/teacher ids do not resolve.
    /// When off, such records are accepted and simply never counted or joined.
    pub referential_checks: bool,
    pub token_ttl: Duration,
    pub max_token_attempts: u32,
    pub activity_log_limit: usize,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            referential_checks: true,
            token_ttl: Duration::days(7),
            max_token_attempts: 3,
            activity_log_limit: 500,
        }
    }
}

//=========================================================================================
// The Store
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct DirectoryStore {
    settings: StoreSettings,
    schools: Vec<School>,
    students: Vec<Student>,
    teachers: Vec<Teacher>,
    classes: Vec<ClassRoom>,
    subjects: Vec<Subject>,
    results: Vec<ResultEntry>,
    notifications: Vec<NotificationItem>,
    tokens: Vec<TokenRecord>,
    activity: VecDeque<ActivityEntry>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl DirectoryStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    // --- Schools ---

    pub fn list_schools(&self, filter: &SchoolFilter) -> Vec<School> {
        self.schools
            .iter()
            .filter(|s| filter.matches(s))
            .map(|s| self.hydrate_school(s))
            .collect()
    }

    pub fn get_school(&self, id: &str) -> Option<School> {
        self.schools
            .iter()
            .find(|s| s.id == id)
            .map(|s| self.hydrate_school(s))
    }

    pub fn add_school(&mut self, payload: NewSchool) -> StoreResult<School> {
        let school = payload.into_record(new_id(), Utc::now())?;
        info!("School '{}' created with id {}", school.name, school.id);
        self.record(
            ActivityKind::Created,
            "School",
            &school.id,
            Some(school.id.clone()),
            format!("School {} registered", school.name),
        );
        self.schools.push(school);
        Ok(self.hydrate_school(&self.schools[self.schools.len() - 1]))
    }

    pub fn update_school(&mut self, id: &str, patch: SchoolPatch) -> StoreResult<Option<School>> {
        let Some(index) = self.schools.iter().position(|s| s.id == id) else {
            return Ok(None);
        };
        let mut school = self.schools[index].clone();
        patch.apply(&mut school)?;

        self.record(
            ActivityKind::Updated,
            "School",
            id,
            Some(id.to_string()),
            format!("School {} updated", school.name),
        );
        self.schools[index] = school;
        Ok(Some(self.hydrate_school(&self.schools[index])))
    }

    /// Removes only the school record; children keep their (now dangling) back-reference.
    pub fn delete_school(&mut self, id: &str) -> bool {
        let Some(index) = self.schools.iter().position(|s| s.id == id) else {
            debug!("delete_school: {} not found", id);
            return false;
        };
        let school = self.schools.remove(index);
        info!("School '{}' deleted", school.name);
        self.record(
            ActivityKind::Deleted,
            "School",
            id,
            Some(id.to_string()),
            format!("School {} removed", school.name),
        );
        true
    }

    // --- Students ---

    pub fn list_students(&self, filter: &StudentFilter) -> Vec<Student> {
        self.students
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect()
    }

    pub fn get_student(&self, id: &str) -> Option<Student> {
        self.students.iter().find(|s| s.id == id).cloned()
    }

    pub fn get_student_by_public_id(&self, student_id: &str) -> Option<Student> {
        self.students
            .iter()
            .find(|s| s.student_id == student_id)
            .cloned()
    }

    pub fn add_student(&mut self, payload: NewStudent) -> StoreResult<Student> {
        let mut student = payload.into_record(new_id(), Utc::now())?;
        self.check_placement(&student.school_id, &student.class_id)?;
        if student.student_id.is_empty() {
            student.student_id =
                rules::next_public_id(self.students.iter().map(|s| s.student_id.as_str()))?;
        } else {
            self.check_public_id_free(&student.student_id)?;
        }

        info!(
            "Student {} ({}) enrolled in class {}",
            student.student_id, student.id, student.class_id
        );
        self.record(
            ActivityKind::Created,
            "Student",
            &student.id,
            Some(student.school_id.clone()),
            format!("{} enrolled as {}", student.full_name(), student.student_id),
        );
        self.students.push(student.clone());
        Ok(student)
    }

    pub fn update_student(&mut self, id: &str, patch: StudentPatch) -> StoreResult<Option<Student>> {
        let Some(index) = self.students.iter().position(|s| s.id == id) else {
            return Ok(None);
        };
        let mut student = self.students[index].clone();
        let moved = patch.moves_student();
        patch.apply(&mut student)?;
        if moved {
            self.check_placement(&student.school_id, &student.class_id)?;
        }

        self.record(
            ActivityKind::Updated,
            "Student",
            id,
            Some(student.school_id.clone()),
            format!("{} updated", student.full_name()),
        );
        self.students[index] = student.clone();
        Ok(Some(student))
    }

    pub fn delete_student(&mut self, id: &str) -> bool {
        let Some(index) = self.students.iter().position(|s| s.id == id) else {
            debug!("delete_student: {} not found", id);
            return false;
        };
        let student = self.students.remove(index);
        info!("Student {} ({}) deleted", student.student_id, student.id);
        self.record(
            ActivityKind::Deleted,
            "Student",
            id,
            Some(student.school_id.clone()),
            format!("{} withdrawn", student.full_name()),
        );
        true
    }

    /// Adds each payload in order. A rejected item does not undo earlier inserts.
    pub fn bulk_import_students(&mut self, payloads: Vec<NewStudent>) -> Vec<StoreResult<Student>> {
        let total = payloads.len();
        let outcomes: Vec<StoreResult<Student>> = payloads
            .into_iter()
            .map(|payload| self.add_student(payload))
            .collect();
        let imported = outcomes.iter().filter(|o| o.is_ok()).count();
        if imported < total {
            warn!("Bulk import: {} of {} students rejected", total - imported, total);
        }
        info!("Bulk import: {} of {} students imported", imported, total);
        self.record(
            ActivityKind::Imported,
            "Student",
            "bulk",
            None,
            format!("Imported {imported} of {total} students"),
        );
        outcomes
    }

    // --- Teachers ---

    pub fn list_teachers(&self, filter: &TeacherFilter) -> Vec<Teacher> {
        self.teachers
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    pub fn get_teacher(&self, id: &str) -> Option<Teacher> {
        self.teachers.iter().find(|t| t.id == id).cloned()
    }

    pub fn add_teacher(&mut self, payload: NewTeacher) -> StoreResult<Teacher> {
        let teacher = payload.into_record(new_id(), Utc::now())?;
        self.check_school(&teacher.school_id)?;
        for class_id in &teacher.class_ids {
            self.check_class(class_id)?;
        }

        info!("Teacher {} {} added ({})", teacher.first_name, teacher.last_name, teacher.id);
        self.record(
            ActivityKind::Created,
            "Teacher",
            &teacher.id,
            Some(teacher.school_id.clone()),
            format!("{} {} joined the staff", teacher.first_name, teacher.last_name),
        );
        self.teachers.push(teacher.clone());
        Ok(teacher)
    }

    pub fn update_teacher(&mut self, id: &str, patch: TeacherPatch) -> StoreResult<Option<Teacher>> {
        let Some(index) = self.teachers.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        let mut teacher = self.teachers[index].clone();
        let school_changed = patch.school_id.is_some();
        let classes_changed = patch.class_ids.is_some();
        patch.apply(&mut teacher)?;
        if school_changed {
            self.check_school(&teacher.school_id)?;
        }
        if classes_changed {
            for class_id in &teacher.class_ids {
                self.check_class(class_id)?;
            }
        }

        self.record(
            ActivityKind::Updated,
            "Teacher",
            id,
            Some(teacher.school_id.clone()),
            format!("{} {} updated", teacher.first_name, teacher.last_name),
        );
        self.teachers[index] = teacher.clone();
        Ok(Some(teacher))
    }

    pub fn delete_teacher(&mut self, id: &str) -> bool {
        let Some(index) = self.teachers.iter().position(|t| t.id == id) else {
            debug!("delete_teacher: {} not found", id);
            return false;
        };
        let teacher = self.teachers.remove(index);
        info!("Teacher {} deleted", teacher.id);
        self.record(
            ActivityKind::Deleted,
            "Teacher",
            id,
            Some(teacher.school_id.clone()),
            format!("{} {} left the staff", teacher.first_name, teacher.last_name),
        );
        true
    }

    // --- Classes ---

    pub fn list_classes(&self, filter: &ClassRoomFilter) -> Vec<ClassRoom> {
        self.classes
            .iter()
            .filter(|c| filter.matches(c))
            .map(|c| self.hydrate_class(c))
            .collect()
    }

    pub fn get_class(&self, id: &str) -> Option<ClassRoom> {
        self.classes
            .iter()
            .find(|c| c.id == id)
            .map(|c| self.hydrate_class(c))
    }

    pub fn add_class(&mut self, payload: NewClassRoom) -> StoreResult<ClassRoom> {
        let class = payload.into_record(new_id())?;
        self.check_school(&class.school_id)?;
        if let Some(teacher_id) = &class.teacher_id {
            self.check_teacher(teacher_id)?;
        }
        for subject_id in &class.subject_ids {
            self.check_subject(subject_id)?;
        }

        info!("Class {} added ({})", class.name, class.id);
        self.record(
            ActivityKind::Created,
            "ClassRoom",
            &class.id,
            Some(class.school_id.clone()),
            format!("Class {} opened", class.name),
        );
        self.classes.push(class);
        Ok(self.hydrate_class(&self.classes[self.classes.len() - 1]))
    }

    pub fn update_class(&mut self, id: &str, patch: ClassRoomPatch) -> StoreResult<Option<ClassRoom>> {
        let Some(index) = self.classes.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let mut class = self.classes[index].clone();
        let school_changed = patch.school_id.is_some();
        let teacher_changed = matches!(patch.teacher_id, Some(Some(_)));
        let subjects_changed = patch.subject_ids.is_some();
        patch.apply(&mut class)?;
        if school_changed {
            self.check_school(&class.school_id)?;
        }
        if let (true, Some(teacher_id)) = (teacher_changed, &class.teacher_id) {
            self.check_teacher(teacher_id)?;
        }
        if subjects_changed {
            for subject_id in &class.subject_ids {
                self.check_subject(subject_id)?;
            }
        }

        self.record(
            ActivityKind::Updated,
            "ClassRoom",
            id,
            Some(class.school_id.clone()),
            format!("Class {} updated", class.name),
        );
        self.classes[index] = class;
        Ok(Some(self.hydrate_class(&self.classes[index])))
    }

    /// Students of the class keep their `class_id`; they simply drop off every roster.
    pub fn delete_class(&mut self, id: &str) -> bool {
        let Some(index) = self.classes.iter().position(|c| c.id == id) else {
            debug!("delete_class: {} not found", id);
            return false;
        };
        let class = self.classes.remove(index);
        info!("Class {} deleted", class.name);
        self.record(
            ActivityKind::Deleted,
            "ClassRoom",
            id,
            Some(class.school_id.clone()),
            format!("Class {} closed", class.name),
        );
        true
    }

    // --- Subjects ---

    pub fn list_subjects(&self, filter: &SubjectFilter) -> Vec<Subject> {
        self.subjects
            .iter()
            .filter(|s| filter.matches(s))
            .map(|s| self.hydrate_subject(s))
            .collect()
    }

    pub fn get_subject(&self, id: &str) -> Option<Subject> {
        self.subjects
            .iter()
            .find(|s| s.id == id)
            .map(|s| self.hydrate_subject(s))
    }

    pub fn add_subject(&mut self, payload: NewSubject) -> StoreResult<Subject> {
        let subject = payload.into_record(new_id())?;
        self.check_school(&subject.school_id)?;
        for teacher_id in &subject.teacher_ids {
            self.check_teacher(teacher_id)?;
        }
        self.check_subject_code_free(&subject.school_id, &subject.code, None)?;

        info!("Subject {} added ({})", subject.code, subject.id);
        self.record(
            ActivityKind::Created,
            "Subject",
            &subject.id,
            Some(subject.school_id.clone()),
            format!("Subject {} ({}) added", subject.name, subject.code),
        );
        self.subjects.push(subject);
        Ok(self.hydrate_subject(&self.subjects[self.subjects.len() - 1]))
    }

    pub fn update_subject(&mut self, id: &str, patch: SubjectPatch) -> StoreResult<Option<Subject>> {
        let Some(index) = self.subjects.iter().position(|s| s.id == id) else {
            return Ok(None);
        };
        let mut subject = self.subjects[index].clone();
        let school_changed = patch.school_id.is_some();
        let teachers_changed = patch.teacher_ids.is_some();
        patch.apply(&mut subject)?;
        if school_changed {
            self.check_school(&subject.school_id)?;
        }
        if teachers_changed {
            for teacher_id in &subject.teacher_ids {
                self.check_teacher(teacher_id)?;
            }
        }
        self.check_subject_code_free(&subject.school_id, &subject.code, Some(id))?;

        self.record(
            ActivityKind::Updated,
            "Subject",
            id,
            Some(subject.school_id.clone()),
            format!("Subject {} updated", subject.code),
        );
        self.subjects[index] = subject;
        Ok(Some(self.hydrate_subject(&self.subjects[index])))
    }

    pub fn delete_subject(&mut self, id: &str) -> bool {
        let Some(index) = self.subjects.iter().position(|s| s.id == id) else {
            debug!("delete_subject: {} not found", id);
            return false;
        };
        let subject = self.subjects.remove(index);
        info!("Subject {} deleted", subject.code);
        self.record(
            ActivityKind::Deleted,
            "Subject",
            id,
            Some(subject.school_id.clone()),
            format!("Subject {} removed", subject.code),
        );
        true
    }

    // --- Results ---

    pub fn list_results(&self, filter: &ResultFilter) -> Vec<ResultEntry> {
        let roster: Option<HashSet<&str>> = filter.class_id.as_deref().map(|class_id| {
            self.students
                .iter()
                .filter(|s| s.class_id == class_id)
                .map(|s| s.id.as_str())
                .collect()
        });
        self.results
            .iter()
            .filter(|r| filter.matches(r))
            .filter(|r| {
                roster
                    .as_ref()
                    .map_or(true, |ids| ids.contains(r.student_id.as_str()))
            })
            .cloned()
            .collect()
    }

    pub fn get_result(&self, id: &str) -> Option<ResultEntry> {
        self.results.iter().find(|r| r.id == id).cloned()
    }

    pub fn add_result(&mut self, payload: NewResult) -> StoreResult<ResultEntry> {
        let result = payload.into_record(new_id(), Utc::now())?;
        self.check_student(&result.student_id)?;
        self.check_subject(&result.subject_id)?;
        self.check_teacher(&result.teacher_id)?;
        self.check_result_free(&result, None)?;

        debug!(
            "Result {} recorded: student {} subject {} total {}",
            result.id, result.student_id, result.subject_id, result.total
        );
        let school_id = self.school_of_student(&result.student_id);
        self.record(
            ActivityKind::Created,
            "Result",
            &result.id,
            school_id,
            format!("{} result entered ({})", result.term.label(), result.session),
        );
        self.results.push(result.clone());
        Ok(result)
    }

    pub fn update_result(&mut self, id: &str, patch: ResultPatch) -> StoreResult<Option<ResultEntry>> {
        let Some(index) = self.results.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let mut result = self.results[index].clone();
        patch.apply(&mut result)?;
        self.check_result_free(&result, Some(id))?;

        let school_id = self.school_of_student(&result.student_id);
        self.record(
            ActivityKind::Updated,
            "Result",
            id,
            school_id,
            format!("{} result updated ({})", result.term.label(), result.session),
        );
        self.results[index] = result.clone();
        Ok(Some(result))
    }

    pub fn delete_result(&mut self, id: &str) -> bool {
        let Some(index) = self.results.iter().position(|r| r.id == id) else {
            debug!("delete_result: {} not found", id);
            return false;
        };
        let result = self.results.remove(index);
        let school_id = self.school_of_student(&result.student_id);
        self.record(
            ActivityKind::Deleted,
            "Result",
            id,
            school_id,
            format!("{} result removed ({})", result.term.label(), result.session),
        );
        true
    }

    /// Assigns class positions for one subject sitting by descending total.
    /// Equal totals share a position. Returns the number of results ranked.
    pub fn rank_results(&mut self, class_id: &str, subject_id: &str, term: Term, session: &str) -> usize {
        let roster: HashSet<String> = self
            .students
            .iter()
            .filter(|s| s.class_id == class_id)
            .map(|s| s.id.clone())
            .collect();
        let mut indices: Vec<usize> = self
            .results
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.subject_id == subject_id
                    && r.term == term
                    && r.session == session
                    && roster.contains(&r.student_id)
            })
            .map(|(i, _)| i)
            .collect();
        indices.sort_by(|a, b| self.results[*b].total.total_cmp(&self.results[*a].total));

        let totals: Vec<f64> = indices.iter().map(|i| self.results[*i].total).collect();
        let ranks = rules::competition_ranks(&totals);
        for (index, rank) in indices.iter().zip(ranks) {
            self.results[*index].position = Some(rank);
        }
        info!(
            "Ranked {} results for class {} subject {} ({} {})",
            indices.len(),
            class_id,
            subject_id,
            term.label(),
            session
        );
        indices.len()
    }

    // --- Notifications ---

    pub fn list_notifications(&self, filter: &NotificationFilter) -> Vec<NotificationItem> {
        self.notifications
            .iter()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect()
    }

    pub fn get_notification(&self, id: &str) -> Option<NotificationItem> {
        self.notifications.iter().find(|n| n.id == id).cloned()
    }

    pub fn add_notification(&mut self, payload: NewNotification) -> StoreResult<NotificationItem> {
        let notification = payload.into_record(new_id(), Utc::now())?;
        self.check_school(&notification.school_id)?;

        info!("Notification '{}' created ({:?})", notification.title, notification.status);
        self.record(
            ActivityKind::Created,
            "Notification",
            &notification.id,
            Some(notification.school_id.clone()),
            format!("Notification '{}' drafted", notification.title),
        );
        self.notifications.push(notification.clone());
        Ok(notification)
    }

    pub fn update_notification(
        &mut self,
        id: &str,
        patch: NotificationPatch,
    ) -> StoreResult<Option<NotificationItem>> {
        let Some(index) = self.notifications.iter().position(|n| n.id == id) else {
            return Ok(None);
        };
        let mut notification = self.notifications[index].clone();
        patch.apply(&mut notification)?;

        self.record(
            ActivityKind::Updated,
            "Notification",
            id,
            Some(notification.school_id.clone()),
            format!("Notification '{}' is {:?}", notification.title, notification.status),
        );
        self.notifications[index] = notification.clone();
        Ok(Some(notification))
    }

    pub fn delete_notification(&mut self, id: &str) -> bool {
        let Some(index) = self.notifications.iter().position(|n| n.id == id) else {
            debug!("delete_notification: {} not found", id);
            return false;
        };
        let notification = self.notifications.remove(index);
        self.record(
            ActivityKind::Deleted,
            "Notification",
            id,
            Some(notification.school_id.clone()),
            format!("Notification '{}' removed", notification.title),
        );
        true
    }

    /// Scheduled notifications whose send time has arrived.
    pub fn due_notifications(&self, now: DateTime<Utc>) -> Vec<NotificationItem> {
        self.notifications
            .iter()
            .filter(|n| {
                n.status == NotificationStatus::Scheduled
                    && n.scheduled_for.map_or(false, |at| at <= now)
            })
            .cloned()
            .collect()
    }

    // --- Result-access tokens ---

    /// The single usable token for a public student id, if any.
    pub fn find_token_by_student_id(&self, student_id: &str) -> Option<TokenRecord> {
        let now = Utc::now();
        self.tokens
            .iter()
            .rev()
            .find(|t| t.student_id == student_id && t.is_usable(now))
            .cloned()
    }

    pub fn list_tokens(&self, student_id: Option<&str>) -> Vec<TokenRecord> {
        self.tokens
            .iter()
            .filter(|t| student_id.map_or(true, |id| t.student_id == id))
            .cloned()
            .collect()
    }

    /// Issues a fresh token and deactivates every earlier one for the same student.
    pub fn create_token(&mut self, student_id: &str) -> StoreResult<TokenRecord> {
        rules::require_text("studentId", student_id)?;
        let school_id = self
            .students
            .iter()
            .find(|s| s.student_id == student_id)
            .map(|s| s.school_id.clone());
        if school_id.is_none() {
            if self.settings.referential_checks {
                return Err(StoreError::missing("Student", student_id));
            }
            warn!("Issuing a result token for unknown student {}", student_id);
        }

        let mut revoked = 0;
        for token in self.tokens.iter_mut().filter(|t| t.student_id == student_id && t.active) {
            token.active = false;
            revoked += 1;
        }
        let now = Utc::now();
        let token = TokenRecord {
            id: new_id(),
            student_id: student_id.to_string(),
            token: rules::generate_token(),
            attempts: 0,
            max_attempts: self.settings.max_token_attempts,
            expires_at: now + self.settings.token_ttl,
            active: true,
            created_at: now,
        };
        info!(
            "Result token issued for {} (revoked {} earlier token(s))",
            student_id, revoked
        );
        self.record(
            ActivityKind::TokenIssued,
            "Token",
            &token.id,
            school_id,
            format!("Result token issued for {student_id}"),
        );
        self.tokens.push(token.clone());
        Ok(token)
    }

    /// Counts one use of a token; it deactivates once its attempts are spent.
    pub fn increment_attempt(&mut self, token_id: &str) -> Option<TokenRecord> {
        let token = self.tokens.iter_mut().find(|t| t.id == token_id)?;
        token.attempts = token.attempts.saturating_add(1);
        if token.attempts >= token.max_attempts && token.active {
            token.active = false;
            info!(
                "Result token for {} exhausted after {} attempts",
                token.student_id, token.attempts
            );
        }
        Some(token.clone())
    }

    /// The public result-checking flow: validates the student's token, spends one
    /// attempt and returns the student's published results.
    pub fn check_results(
        &mut self,
        student_id: &str,
        token: &str,
        term: Option<Term>,
        session: Option<&str>,
    ) -> StoreResult<ResultSheet> {
        let now = Utc::now();
        let latest = self
            .tokens
            .iter()
            .rev()
            .find(|t| t.student_id == student_id)
            .cloned()
            .ok_or_else(|| StoreError::TokenNotFound(student_id.to_string()))?;
        if latest.attempts >= latest.max_attempts {
            return Err(StoreError::TokenExhausted(student_id.to_string()));
        }
        if !latest.is_usable(now) {
            return Err(StoreError::TokenNotFound(student_id.to_string()));
        }

        let spent = self
            .increment_attempt(&latest.id)
            .ok_or_else(|| StoreError::TokenNotFound(student_id.to_string()))?;
        if !latest.token.eq_ignore_ascii_case(token.trim()) {
            warn!(
                "Result check for {} used a wrong token ({} attempt(s) left)",
                student_id,
                spent.attempts_remaining()
            );
            return Err(StoreError::TokenMismatch(student_id.to_string()));
        }

        let student = self
            .get_student_by_public_id(student_id)
            .ok_or_else(|| StoreError::missing("Student", student_id))?;
        let results = self
            .results
            .iter()
            .filter(|r| r.student_id == student.id && r.published)
            .filter(|r| term.map_or(true, |t| r.term == t))
            .filter(|r| session.map_or(true, |s| r.session == s))
            .cloned()
            .collect();
        self.record(
            ActivityKind::ResultsChecked,
            "Student",
            &student.id,
            Some(student.school_id.clone()),
            format!("Results checked for {student_id}"),
        );
        Ok(ResultSheet {
            student,
            results,
            attempts_remaining: spent.attempts_remaining(),
        })
    }

    // --- Activity & dashboard ---

    /// Activity entries, newest first.
    pub fn list_activity(&self, limit: Option<usize>) -> Vec<ActivityEntry> {
        let mut entries: Vec<ActivityEntry> = self.activity.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.at.cmp(&a.at));
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    }

    /// Recomputed from the collections on every call.
    pub fn admin_dashboard(&self, school_id: Option<&str>) -> AdminDashboard {
        let schools = self.list_schools(&SchoolFilter::default());
        let classes = self.list_classes(&ClassRoomFilter::default());
        let subjects = self.list_subjects(&SubjectFilter::default());
        let activity = self.list_activity(None);
        dashboard::build_admin_dashboard(
            DashboardInput {
                schools: &schools,
                students: &self.students,
                teachers: &self.teachers,
                classes: &classes,
                subjects: &subjects,
                results: &self.results,
                notifications: &self.notifications,
                activity: &activity,
            },
            school_id,
        )
    }

    //=====================================================================================
    // Derived values
    //=====================================================================================

    fn hydrate_school(&self, school: &School) -> School {
        let roster: HashSet<&str> = self
            .students
            .iter()
            .filter(|s| s.school_id == school.id)
            .map(|s| s.id.as_str())
            .collect();
        let average = rules::mean(
            self.results
                .iter()
                .filter(|r| roster.contains(r.student_id.as_str()))
                .map(|r| r.total),
        );
        let stats = SchoolStats {
            students: roster.len() as u32,
            teachers: self.teachers.iter().filter(|t| t.school_id == school.id).count() as u32,
            classes: self.classes.iter().filter(|c| c.school_id == school.id).count() as u32,
            subjects: self.subjects.iter().filter(|s| s.school_id == school.id).count() as u32,
            average_performance: rules::round2(average.unwrap_or(0.0)),
        };
        School {
            current_student_count: stats.students,
            stats,
            ..school.clone()
        }
    }

    fn hydrate_class(&self, class: &ClassRoom) -> ClassRoom {
        ClassRoom {
            student_count: self.students.iter().filter(|s| s.class_id == class.id).count() as u32,
            ..class.clone()
        }
    }

    fn hydrate_subject(&self, subject: &Subject) -> Subject {
        let scores: Vec<(f64, f64, f64)> = self
            .results
            .iter()
            .filter(|r| r.subject_id == subject.id)
            .map(|r| (r.ca, r.exam, r.total))
            .collect();
        let passing_grade = self
            .schools
            .iter()
            .find(|s| s.id == subject.school_id)
            .map_or(rules::DEFAULT_PASSING_GRADE, |s| s.settings.passing_grade);
        Subject {
            performance: rules::subject_performance(&scores, passing_grade),
            ..subject.clone()
        }
    }

    fn school_of_student(&self, id: &str) -> Option<String> {
        self.students
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.school_id.clone())
    }

    //=====================================================================================
    // Referential checks
    //=====================================================================================

    fn check_reference(&self, entity: &'static str, id: &str, exists: bool) -> StoreResult<()> {
        if exists {
            return Ok(());
        }
        if self.settings.referential_checks {
            return Err(StoreError::missing(entity, id));
        }
        warn!("{} {} does not exist; keeping the dangling reference", entity, id);
        Ok(())
    }

    fn check_school(&self, id: &str) -> StoreResult<()> {
        self.check_reference("School", id, self.schools.iter().any(|s| s.id == id))
    }

    fn check_class(&self, id: &str) -> StoreResult<()> {
        self.check_reference("ClassRoom", id, self.classes.iter().any(|c| c.id == id))
    }

    fn check_subject(&self, id: &str) -> StoreResult<()> {
        self.check_reference("Subject", id, self.subjects.iter().any(|s| s.id == id))
    }

    fn check_teacher(&self, id: &str) -> StoreResult<()> {
        self.check_reference("Teacher", id, self.teachers.iter().any(|t| t.id == id))
    }

    fn check_student(&self, id: &str) -> StoreResult<()> {
        self.check_reference("Student", id, self.students.iter().any(|s| s.id == id))
    }

    /// A student's class must exist and belong to the student's school.
    fn check_placement(&self, school_id: &str, class_id: &str) -> StoreResult<()> {
        self.check_school(school_id)?;
        self.check_class(class_id)?;
        let class_school = self
            .classes
            .iter()
            .find(|c| c.id == class_id)
            .map(|c| c.school_id.as_str());
        match class_school {
            Some(owner) if owner != school_id && self.settings.referential_checks => Err(
                StoreError::invalid("classId", format!("class {class_id} belongs to another school")),
            ),
            _ => Ok(()),
        }
    }

    fn check_public_id_free(&self, student_id: &str) -> StoreResult<()> {
        let taken = self.students.iter().any(|s| s.student_id == student_id);
        if taken && self.settings.referential_checks {
            return Err(StoreError::Duplicate {
                entity: "Student",
                field: "studentId",
                value: student_id.to_string(),
            });
        }
        Ok(())
    }

    fn check_subject_code_free(&self, school_id: &str, code: &str, except: Option<&str>) -> StoreResult<()> {
        let taken = self.subjects.iter().any(|s| {
            s.school_id == school_id && s.code == code && Some(s.id.as_str()) != except
        });
        if taken && self.settings.referential_checks {
            return Err(StoreError::Duplicate {
                entity: "Subject",
                field: "code",
                value: code.to_string(),
            });
        }
        Ok(())
    }

    /// One result per student, subject, term and session.
    fn check_result_free(&self, result: &ResultEntry, except: Option<&str>) -> StoreResult<()> {
        let taken = self.results.iter().any(|r| {
            r.student_id == result.student_id
                && r.subject_id == result.subject_id
                && r.term == result.term
                && r.session == result.session
                && Some(r.id.as_str()) != except
        });
        if taken && self.settings.referential_checks {
            return Err(StoreError::Duplicate {
                entity: "Result",
                field: "studentId/subjectId/term/session",
                value: format!(
                    "{}/{}/{}/{}",
                    result.student_id,
                    result.subject_id,
                    result.term.label(),
                    result.session
                ),
            });
        }
        Ok(())
    }

    fn record(
        &mut self,
        kind: ActivityKind,
        entity: &'static str,
        entity_id: &str,
        school_id: Option<String>,
        description: String,
    ) {
        self.activity.push_back(ActivityEntry {
            kind,
            entity: entity.to_string(),
            entity_id: entity_id.to_string(),
            school_id,
            description,
            at: Utc::now(),
        });
        while self.activity.len() > self.settings.activity_log_limit {
            self.activity.pop_front();
        }
    }
}
