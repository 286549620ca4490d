//! crates/school_directory_core/src/records.rs
//!
//! Payload to record conversion and shallow patch merging.
//!
//! Everything here checks field values only. Whether a referenced school,
//! class, subject, teacher or student exists is a question for the backend
//! holding the data, so the caller runs those checks after the merge.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::{
    Billing, ClassRoom, ClassRoomPatch, NewClassRoom, NewNotification, NewResult, NewSchool,
    NewStudent, NewSubject, NewTeacher, NotificationItem, NotificationPatch, NotificationStatus,
    PerformanceLevel, ResultEntry, ResultPatch, School, SchoolPatch, SchoolSettings, SchoolStats,
    Student, StudentPatch, Subject, SubjectPatch, Teacher, TeacherPatch,
};
use crate::error::{StoreError, StoreResult};
use crate::rules;

//=========================================================================================
// Schools
//=========================================================================================

impl NewSchool {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> StoreResult<School> {
        rules::require_text("name", &self.name)?;
        validate_capacity("maxStudents", self.max_students)?;
        validate_billing(&self.billing)?;
        validate_settings(&self.settings)?;
        Ok(School {
            id,
            name: self.name.trim().to_string(),
            brand: self.brand,
            contact: self.contact,
            active: self.active,
            plan: self.plan,
            max_students: self.max_students,
            current_student_count: 0,
            billing: self.billing,
            stats: SchoolStats::default(),
            settings: self.settings,
            created_at: now,
        })
    }
}

impl SchoolPatch {
    pub fn apply(self, school: &mut School) -> StoreResult<()> {
        if let Some(name) = self.name {
            rules::require_text("name", &name)?;
            school.name = name.trim().to_string();
        }
        if let Some(brand) = self.brand {
            school.brand = brand;
        }
        if let Some(contact) = self.contact {
            school.contact = contact;
        }
        if let Some(active) = self.active {
            school.active = active;
        }
        if let Some(plan) = self.plan {
            school.plan = plan;
        }
        if let Some(max_students) = self.max_students {
            validate_capacity("maxStudents", max_students)?;
            school.max_students = max_students;
        }
        if let Some(billing) = self.billing {
            validate_billing(&billing)?;
            school.billing = billing;
        }
        if let Some(settings) = self.settings {
            validate_settings(&settings)?;
            school.settings = settings;
        }
        Ok(())
    }
}

//=========================================================================================
// Students
//=========================================================================================

impl NewStudent {
    /// The public id is copied from the payload (trimmed) and left empty when absent;
    /// the backend assigns the next free one.
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> StoreResult<Student> {
        rules::require_text("firstName", &self.first_name)?;
        rules::require_text("lastName", &self.last_name)?;
        rules::require_text("schoolId", &self.school_id)?;
        rules::require_text("classId", &self.class_id)?;
        rules::require_text("primaryGuardian.name", &self.primary_guardian.name)?;
        rules::validate_gpa(self.current_gpa)?;
        let student_id = self
            .student_id
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        Ok(Student {
            id,
            student_id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            address: self.address,
            school_id: self.school_id,
            class_id: self.class_id,
            primary_guardian: self.primary_guardian,
            secondary_guardian: self.secondary_guardian,
            active: self.active,
            performance_level: PerformanceLevel::from_gpa(self.current_gpa),
            current_gpa: self.current_gpa,
            medical: self.medical,
            documents: self.documents,
            enrolled_at: now,
        })
    }
}

impl StudentPatch {
    /// True when the patch changes the student's school or class.
    pub fn moves_student(&self) -> bool {
        self.school_id.is_some() || self.class_id.is_some()
    }

    pub fn apply(self, student: &mut Student) -> StoreResult<()> {
        if let Some(first_name) = self.first_name {
            rules::require_text("firstName", &first_name)?;
            student.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = self.last_name {
            rules::require_text("lastName", &last_name)?;
            student.last_name = last_name.trim().to_string();
        }
        if let Some(email) = self.email {
            student.email = email;
        }
        if let Some(phone) = self.phone {
            student.phone = phone;
        }
        if let Some(date_of_birth) = self.date_of_birth {
            student.date_of_birth = date_of_birth;
        }
        if let Some(address) = self.address {
            student.address = address;
        }
        if let Some(school_id) = self.school_id {
            rules::require_text("schoolId", &school_id)?;
            student.school_id = school_id;
        }
        if let Some(class_id) = self.class_id {
            rules::require_text("classId", &class_id)?;
            student.class_id = class_id;
        }
        if let Some(guardian) = self.primary_guardian {
            rules::require_text("primaryGuardian.name", &guardian.name)?;
            student.primary_guardian = guardian;
        }
        if let Some(guardian) = self.secondary_guardian {
            student.secondary_guardian = guardian;
        }
        if let Some(active) = self.active {
            student.active = active;
        }
        if let Some(gpa) = self.current_gpa {
            rules::validate_gpa(gpa)?;
            student.current_gpa = gpa;
            student.performance_level = PerformanceLevel::from_gpa(gpa);
        }
        if let Some(medical) = self.medical {
            student.medical = medical;
        }
        if let Some(documents) = self.documents {
            student.documents = documents;
        }
        Ok(())
    }
}

//=========================================================================================
// Teachers
//=========================================================================================

impl NewTeacher {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> StoreResult<Teacher> {
        rules::require_text("firstName", &self.first_name)?;
        rules::require_text("lastName", &self.last_name)?;
        rules::require_text("email", &self.email)?;
        Ok(Teacher {
            id,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone,
            school_id: self.school_id,
            subjects: self.subjects,
            class_ids: self.class_ids,
            active: self.active,
            performance: self.performance,
            joined_at: now,
        })
    }
}

impl TeacherPatch {
    pub fn apply(self, teacher: &mut Teacher) -> StoreResult<()> {
        if let Some(first_name) = self.first_name {
            rules::require_text("firstName", &first_name)?;
            teacher.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = self.last_name {
            rules::require_text("lastName", &last_name)?;
            teacher.last_name = last_name.trim().to_string();
        }
        if let Some(email) = self.email {
            rules::require_text("email", &email)?;
            teacher.email = email.trim().to_string();
        }
        if let Some(phone) = self.phone {
            teacher.phone = phone;
        }
        if let Some(school_id) = self.school_id {
            teacher.school_id = school_id;
        }
        if let Some(subjects) = self.subjects {
            teacher.subjects = subjects;
        }
        if let Some(class_ids) = self.class_ids {
            teacher.class_ids = class_ids;
        }
        if let Some(active) = self.active {
            teacher.active = active;
        }
        if let Some(performance) = self.performance {
            teacher.performance = performance;
        }
        Ok(())
    }
}

//=========================================================================================
// Classes
//=========================================================================================

impl NewClassRoom {
    pub fn into_record(self, id: String) -> StoreResult<ClassRoom> {
        rules::require_text("name", &self.name)?;
        rules::require_text("level", &self.level)?;
        validate_capacity("capacity", self.capacity)?;
        Ok(ClassRoom {
            id,
            name: self.name.trim().to_string(),
            level: self.level.trim().to_string(),
            school_id: self.school_id,
            teacher_id: self.teacher_id,
            subject_ids: self.subject_ids,
            student_count: 0,
            capacity: self.capacity,
        })
    }
}

impl ClassRoomPatch {
    pub fn apply(self, class: &mut ClassRoom) -> StoreResult<()> {
        if let Some(name) = self.name {
            rules::require_text("name", &name)?;
            class.name = name.trim().to_string();
        }
        if let Some(level) = self.level {
            rules::require_text("level", &level)?;
            class.level = level.trim().to_string();
        }
        if let Some(school_id) = self.school_id {
            class.school_id = school_id;
        }
        if let Some(teacher_id) = self.teacher_id {
            class.teacher_id = teacher_id;
        }
        if let Some(subject_ids) = self.subject_ids {
            class.subject_ids = subject_ids;
        }
        if let Some(capacity) = self.capacity {
            validate_capacity("capacity", capacity)?;
            class.capacity = capacity;
        }
        Ok(())
    }
}

//=========================================================================================
// Subjects
//=========================================================================================

impl NewSubject {
    /// Subject codes are stored upper-cased.
    pub fn into_record(self, id: String) -> StoreResult<Subject> {
        rules::require_text("code", &self.code)?;
        rules::require_text("name", &self.name)?;
        Ok(Subject {
            id,
            code: self.code.trim().to_uppercase(),
            name: self.name.trim().to_string(),
            school_id: self.school_id,
            teacher_ids: self.teacher_ids,
            performance: Default::default(),
        })
    }
}

impl SubjectPatch {
    pub fn apply(self, subject: &mut Subject) -> StoreResult<()> {
        if let Some(code) = self.code {
            rules::require_text("code", &code)?;
            subject.code = code.trim().to_uppercase();
        }
        if let Some(name) = self.name {
            rules::require_text("name", &name)?;
            subject.name = name.trim().to_string();
        }
        if let Some(school_id) = self.school_id {
            subject.school_id = school_id;
        }
        if let Some(teacher_ids) = self.teacher_ids {
            subject.teacher_ids = teacher_ids;
        }
        Ok(())
    }
}

//=========================================================================================
// Results
//=========================================================================================

impl NewResult {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> StoreResult<ResultEntry> {
        let total = rules::validate_scores(self.ca, self.exam, self.total)?;
        rules::validate_session(&self.session)?;
        validate_skills(&self.skills)?;
        Ok(ResultEntry {
            id,
            student_id: self.student_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            term: self.term,
            session: self.session,
            ca: self.ca,
            exam: self.exam,
            total,
            grade: rules::grade_for_total(total),
            position: None,
            published: self.published,
            remarks: self.remarks,
            skills: self.skills,
            created_at: now,
        })
    }
}

impl ResultPatch {
    /// Score changes re-derive the total and the grade.
    pub fn apply(self, result: &mut ResultEntry) -> StoreResult<()> {
        if self.ca.is_some() || self.exam.is_some() || self.total.is_some() {
            let ca = self.ca.unwrap_or(result.ca);
            let exam = self.exam.unwrap_or(result.exam);
            let total = rules::validate_scores(ca, exam, self.total)?;
            result.ca = ca;
            result.exam = exam;
            result.total = total;
            result.grade = rules::grade_for_total(total);
        }
        if let Some(term) = self.term {
            result.term = term;
        }
        if let Some(session) = self.session {
            rules::validate_session(&session)?;
            result.session = session;
        }
        if let Some(position) = self.position {
            result.position = position;
        }
        if let Some(published) = self.published {
            result.published = published;
        }
        if let Some(remarks) = self.remarks {
            result.remarks = remarks;
        }
        if let Some(skills) = self.skills {
            validate_skills(&skills)?;
            result.skills = skills;
        }
        Ok(())
    }
}

//=========================================================================================
// Notifications
//=========================================================================================

impl NewNotification {
    pub fn into_record(self, id: String, now: DateTime<Utc>) -> StoreResult<NotificationItem> {
        rules::require_text("title", &self.title)?;
        rules::require_text("message", &self.message)?;
        validate_schedule(self.status, self.scheduled_for)?;
        Ok(NotificationItem {
            id,
            school_id: self.school_id,
            title: self.title.trim().to_string(),
            message: self.message,
            audience: self.audience,
            channel: self.channel,
            status: self.status,
            priority: self.priority,
            scheduled_for: self.scheduled_for,
            metrics: self.metrics,
            created_at: now,
        })
    }
}

impl NotificationPatch {
    pub fn apply(self, notification: &mut NotificationItem) -> StoreResult<()> {
        if let Some(title) = self.title {
            rules::require_text("title", &title)?;
            notification.title = title.trim().to_string();
        }
        if let Some(message) = self.message {
            rules::require_text("message", &message)?;
            notification.message = message;
        }
        if let Some(audience) = self.audience {
            notification.audience = audience;
        }
        if let Some(channel) = self.channel {
            notification.channel = channel;
        }
        if let Some(status) = self.status {
            notification.status = status;
        }
        if let Some(priority) = self.priority {
            notification.priority = priority;
        }
        if let Some(scheduled_for) = self.scheduled_for {
            notification.scheduled_for = scheduled_for;
        }
        if let Some(metrics) = self.metrics {
            notification.metrics = metrics;
        }
        validate_schedule(notification.status, notification.scheduled_for)
    }
}

//=========================================================================================
// Field validation
//=========================================================================================

fn validate_capacity(field: &'static str, value: u32) -> StoreResult<()> {
    if value == 0 {
        return Err(StoreError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

fn validate_billing(billing: &Billing) -> StoreResult<()> {
    if !billing.amount.is_finite() || billing.amount < 0.0 {
        return Err(StoreError::invalid("billing.amount", "must be zero or more"));
    }
    Ok(())
}

fn validate_settings(settings: &SchoolSettings) -> StoreResult<()> {
    if !(0.0..=100.0).contains(&settings.passing_grade) {
        return Err(StoreError::invalid(
            "settings.passingGrade",
            "must be between 0 and 100",
        ));
    }
    if settings.terms.is_empty() {
        return Err(StoreError::invalid("settings.terms", "must list at least one term"));
    }
    rules::validate_session(&settings.academic_year)
        .map_err(|_| StoreError::invalid("settings.academicYear", "must look like 2024/2025"))
}

fn validate_skills(skills: &BTreeMap<String, u8>) -> StoreResult<()> {
    match skills.iter().find(|(_, rating)| !(1..=5).contains(*rating)) {
        Some((skill, _)) => Err(StoreError::invalid(
            "skills",
            format!("rating for '{skill}' must be between 1 and 5"),
        )),
        None => Ok(()),
    }
}

fn validate_schedule(status: NotificationStatus, scheduled_for: Option<DateTime<Utc>>) -> StoreResult<()> {
    if status == NotificationStatus::Scheduled && scheduled_for.is_none() {
        return Err(StoreError::invalid(
            "scheduledFor",
            "required when status is Scheduled",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Audience, DeliveryMetrics, NotificationChannel, Priority, Term};

    fn result_payload(ca: f64, exam: f64) -> NewResult {
        NewResult {
            student_id: "s".into(),
            subject_id: "m".into(),
            teacher_id: "t".into(),
            term: Term::Term2,
            session: "2024/2025".into(),
            ca,
            exam,
            total: None,
            published: false,
            remarks: None,
            skills: BTreeMap::new(),
        }
    }

    #[test]
    fn result_patch_recomputes_total_and_grade() {
        let mut result = result_payload(35.0, 40.0).into_record("r1".into(), Utc::now()).unwrap();
        assert_eq!(result.total, 75.0);

        ResultPatch {
            ca: Some(10.0),
            ..Default::default()
        }
        .apply(&mut result)
        .unwrap();
        assert_eq!(result.exam, 40.0);
        assert_eq!(result.total, 50.0);
        assert_eq!(result.grade, crate::domain::Grade::C);
    }

    #[test]
    fn skill_ratings_must_be_one_to_five() {
        let mut payload = result_payload(10.0, 10.0);
        payload.skills.insert("Punctuality".into(), 6);
        let err = payload.into_record("r1".into(), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "skills", .. }));
    }

    #[test]
    fn failed_patch_reports_the_field() {
        let mut result = result_payload(10.0, 10.0).into_record("r1".into(), Utc::now()).unwrap();
        let err = ResultPatch {
            session: Some("2024-2025".into()),
            ..Default::default()
        }
        .apply(&mut result)
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "session", .. }));
    }

    #[test]
    fn clearing_the_schedule_of_a_scheduled_notification_fails() {
        let mut notification = NewNotification {
            school_id: "school".into(),
            title: "Exams".into(),
            message: "Exams start Monday".into(),
            audience: Audience::Student,
            channel: NotificationChannel::Push,
            status: NotificationStatus::Scheduled,
            priority: Priority::Urgent,
            scheduled_for: Some(Utc::now()),
            metrics: DeliveryMetrics::default(),
        }
        .into_record("n1".into(), Utc::now())
        .unwrap();

        let err = NotificationPatch {
            scheduled_for: Some(None),
            ..Default::default()
        }
        .apply(&mut notification)
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "scheduledFor", .. }));
    }

    #[test]
    fn subject_codes_are_upper_cased() {
        let subject = NewSubject {
            code: " phy ".into(),
            name: "Physics".into(),
            school_id: "school".into(),
            teacher_ids: Vec::new(),
        }
        .into_record("sub".into())
        .unwrap();
        assert_eq!(subject.code, "PHY");
    }

    #[test]
    fn subject_patch_normalizes_the_code_and_keeps_other_fields() {
        let mut subject = NewSubject {
            code: "PHY".into(),
            name: "Physics".into(),
            school_id: "school".into(),
            teacher_ids: vec!["t1".into()],
        }
        .into_record("sub".into())
        .unwrap();

        SubjectPatch {
            code: Some(" chem ".into()),
            ..Default::default()
        }
        .apply(&mut subject)
        .unwrap();
        assert_eq!(subject.code, "CHEM");
        assert_eq!(subject.name, "Physics");
        assert_eq!(subject.teacher_ids, vec!["t1".to_string()]);

        let err = SubjectPatch {
            name: Some("  ".into()),
            ..Default::default()
        }
        .apply(&mut subject)
        .unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "name", .. }));
    }
}
