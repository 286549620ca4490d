//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DirectoryService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Field validation and patch merging are shared with the in-memory store through
//! the core `records` and `filters` modules. Reference checks and counters are
//! answered by SQL against the live tables.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use school_directory_core::dashboard::{build_admin_dashboard, AdminDashboard, DashboardInput};
use school_directory_core::domain::{
    ActivityEntry, ActivityKind, Billing, ClassRoom, ClassRoomFilter, ClassRoomPatch,
    ContactInfo, DeliveryMetrics, Guardian, MedicalRecord, NewClassRoom, NewNotification,
    NewResult, NewSchool, NewStudent, NewSubject, NewTeacher, NotificationFilter,
    NotificationItem, NotificationPatch, NotificationStatus, ResultEntry, ResultFilter,
    ResultPatch, ResultSheet, School, SchoolFilter, SchoolPatch, SchoolSettings, SchoolStats,
    Student, StudentDocument, StudentFilter, StudentPatch, Subject, SubjectFilter, SubjectPatch,
    Teacher, TeacherFilter, TeacherPatch, TeacherPerformance, Term, TokenRecord,
};
use school_directory_core::ports::{DirectoryService, PortError, PortResult};
use school_directory_core::{rules, StoreError, StoreSettings};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, info, warn};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DirectoryService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
    settings: StoreSettings,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool, settings: StoreSettings) -> Self {
        Self { pool, settings }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Column mapping helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Enums are stored as the same text they serialize to in JSON.
fn enum_text<T: Serialize>(value: &T) -> PortResult<String> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(text)) => Ok(text),
        Ok(other) => Err(PortError::Unexpected(format!(
            "expected an enum name, got {other}"
        ))),
        Err(e) => Err(PortError::Unexpected(e.to_string())),
    }
}

fn parse_enum<T: DeserializeOwned>(column: &str, raw: String) -> PortResult<T> {
    serde_json::from_value(serde_json::Value::String(raw))
        .map_err(|e| PortError::Unexpected(format!("bad value in column {column}: {e}")))
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const SELECT_SCHOOLS: &str = "SELECT s.id, s.name, s.brand, s.contact, s.active, s.plan, \
    s.max_students, s.billing, s.settings, s.created_at, \
    (SELECT COUNT(*) FROM students st WHERE st.school_id = s.id) AS student_total, \
    (SELECT COUNT(*) FROM teachers t WHERE t.school_id = s.id) AS teacher_total, \
    (SELECT COUNT(*) FROM classes c WHERE c.school_id = s.id) AS class_total, \
    (SELECT COUNT(*) FROM subjects sj WHERE sj.school_id = s.id) AS subject_total, \
    (SELECT AVG(r.total) FROM results r JOIN students st ON st.id = r.student_id \
        WHERE st.school_id = s.id) AS average_total \
    FROM schools s";

#[derive(FromRow)]
struct SchoolRecord {
    id: String,
    name: String,
    brand: String,
    contact: Json<ContactInfo>,
    active: bool,
    plan: String,
    max_students: i64,
    billing: Json<Billing>,
    settings: Json<SchoolSettings>,
    created_at: DateTime<Utc>,
    student_total: i64,
    teacher_total: i64,
    class_total: i64,
    subject_total: i64,
    average_total: Option<f64>,
}
impl SchoolRecord {
    fn to_domain(self) -> PortResult<School> {
        let stats = SchoolStats {
            students: count(self.student_total),
            teachers: count(self.teacher_total),
            classes: count(self.class_total),
            subjects: count(self.subject_total),
            average_performance: rules::round2(self.average_total.unwrap_or(0.0)),
        };
        Ok(School {
            id: self.id,
            name: self.name,
            brand: parse_enum("brand", self.brand)?,
            contact: self.contact.0,
            active: self.active,
            plan: parse_enum("plan", self.plan)?,
            max_students: count(self.max_students),
            current_student_count: stats.students,
            billing: self.billing.0,
            stats,
            settings: self.settings.0,
            created_at: self.created_at,
        })
    }
}

const SELECT_STUDENTS: &str = "SELECT id, student_id, first_name, last_name, email, phone, \
    date_of_birth, address, school_id, class_id, primary_guardian, secondary_guardian, active, \
    performance_level, current_gpa, medical, documents, enrolled_at FROM students";

#[derive(FromRow)]
struct StudentRecord {
    id: String,
    student_id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    phone: Option<String>,
    date_of_birth: Option<NaiveDate>,
    address: Option<String>,
    school_id: String,
    class_id: String,
    primary_guardian: Json<Guardian>,
    secondary_guardian: Option<Json<Guardian>>,
    active: bool,
    performance_level: String,
    current_gpa: f64,
    medical: Option<Json<MedicalRecord>>,
    documents: Json<Vec<StudentDocument>>,
    enrolled_at: DateTime<Utc>,
}
impl StudentRecord {
    fn to_domain(self) -> PortResult<Student> {
        Ok(Student {
            id: self.id,
            student_id: self.student_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            date_of_birth: self.date_of_birth,
            address: self.address,
            school_id: self.school_id,
            class_id: self.class_id,
            primary_guardian: self.primary_guardian.0,
            secondary_guardian: self.secondary_guardian.map(|g| g.0),
            active: self.active,
            performance_level: parse_enum("performance_level", self.performance_level)?,
            current_gpa: self.current_gpa,
            medical: self.medical.map(|m| m.0),
            documents: self.documents.0,
            enrolled_at: self.enrolled_at,
        })
    }
}

const SELECT_TEACHERS: &str = "SELECT id, first_name, last_name, email, phone, school_id, \
    subjects, class_ids, active, performance, joined_at FROM teachers";

#[derive(FromRow)]
struct TeacherRecord {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    school_id: String,
    subjects: Json<Vec<String>>,
    class_ids: Json<Vec<String>>,
    active: bool,
    performance: Json<TeacherPerformance>,
    joined_at: DateTime<Utc>,
}
impl TeacherRecord {
    fn to_domain(self) -> Teacher {
        Teacher {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            school_id: self.school_id,
            subjects: self.subjects.0,
            class_ids: self.class_ids.0,
            active: self.active,
            performance: self.performance.0,
            joined_at: self.joined_at,
        }
    }
}

const SELECT_CLASSES: &str = "SELECT c.id, c.name, c.level, c.school_id, c.teacher_id, \
    c.subject_ids, c.capacity, \
    (SELECT COUNT(*) FROM students st WHERE st.class_id = c.id) AS student_total \
    FROM classes c";

#[derive(FromRow)]
struct ClassRecord {
    id: String,
    name: String,
    level: String,
    school_id: String,
    teacher_id: Option<String>,
    subject_ids: Json<Vec<String>>,
    capacity: i64,
    student_total: i64,
}
impl ClassRecord {
    fn to_domain(self) -> ClassRoom {
        ClassRoom {
            id: self.id,
            name: self.name,
            level: self.level,
            school_id: self.school_id,
            teacher_id: self.teacher_id,
            subject_ids: self.subject_ids.0,
            student_count: count(self.student_total),
            capacity: count(self.capacity),
        }
    }
}

const SELECT_SUBJECTS: &str = "SELECT id, code, name, school_id, teacher_ids FROM subjects";

#[derive(FromRow)]
struct SubjectRecord {
    id: String,
    code: String,
    name: String,
    school_id: String,
    teacher_ids: Json<Vec<String>>,
}

const SELECT_RESULTS: &str = "SELECT r.id, r.student_id, r.subject_id, r.teacher_id, r.term, \
    r.session, r.ca, r.exam, r.total, r.grade, r.position, r.published, r.remarks, r.skills, \
    r.created_at FROM results r";

#[derive(FromRow)]
struct ResultRecord {
    id: String,
    student_id: String,
    subject_id: String,
    teacher_id: String,
    term: String,
    session: String,
    ca: f64,
    exam: f64,
    total: f64,
    grade: String,
    position: Option<i64>,
    published: bool,
    remarks: Option<String>,
    skills: Json<BTreeMap<String, u8>>,
    created_at: DateTime<Utc>,
}
impl ResultRecord {
    fn to_domain(self) -> PortResult<ResultEntry> {
        Ok(ResultEntry {
            id: self.id,
            student_id: self.student_id,
            subject_id: self.subject_id,
            teacher_id: self.teacher_id,
            term: parse_enum("term", self.term)?,
            session: self.session,
            ca: self.ca,
            exam: self.exam,
            total: self.total,
            grade: parse_enum("grade", self.grade)?,
            position: self.position.map(count),
            published: self.published,
            remarks: self.remarks,
            skills: self.skills.0,
            created_at: self.created_at,
        })
    }
}

const SELECT_NOTIFICATIONS: &str = "SELECT id, school_id, title, message, audience, channel, \
    status, priority, scheduled_for, metrics, created_at FROM notifications";

#[derive(FromRow)]
struct NotificationRecord {
    id: String,
    school_id: String,
    title: String,
    message: String,
    audience: String,
    channel: String,
    status: String,
    priority: String,
    scheduled_for: Option<DateTime<Utc>>,
    metrics: Json<DeliveryMetrics>,
    created_at: DateTime<Utc>,
}
impl NotificationRecord {
    fn to_domain(self) -> PortResult<NotificationItem> {
        Ok(NotificationItem {
            id: self.id,
            school_id: self.school_id,
            title: self.title,
            message: self.message,
            audience: parse_enum("audience", self.audience)?,
            channel: parse_enum("channel", self.channel)?,
            status: parse_enum("status", self.status)?,
            priority: parse_enum("priority", self.priority)?,
            scheduled_for: self.scheduled_for,
            metrics: self.metrics.0,
            created_at: self.created_at,
        })
    }
}

const TOKEN_COLUMNS: &str =
    "id, student_id, token, attempts, max_attempts, expires_at, active, created_at";

#[derive(FromRow)]
struct ResultTokenRecord {
    id: String,
    student_id: String,
    token: String,
    attempts: i64,
    max_attempts: i64,
    expires_at: DateTime<Utc>,
    active: bool,
    created_at: DateTime<Utc>,
}
impl ResultTokenRecord {
    fn to_domain(self) -> TokenRecord {
        TokenRecord {
            id: self.id,
            student_id: self.student_id,
            token: self.token,
            attempts: count(self.attempts),
            max_attempts: count(self.max_attempts),
            expires_at: self.expires_at,
            active: self.active,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ActivityRecord {
    kind: String,
    entity: String,
    entity_id: String,
    school_id: Option<String>,
    description: String,
    at: DateTime<Utc>,
}
impl ActivityRecord {
    fn to_domain(self) -> PortResult<ActivityEntry> {
        Ok(ActivityEntry {
            kind: parse_enum("kind", self.kind)?,
            entity: self.entity,
            entity_id: self.entity_id,
            school_id: self.school_id,
            description: self.description,
            at: self.at,
        })
    }
}

//=========================================================================================
// Shared queries
//=========================================================================================

/// Appends one activity entry and trims the log to `limit` entries.
async fn record_activity(
    conn: &mut PgConnection,
    limit: usize,
    kind: ActivityKind,
    entity: &str,
    entity_id: &str,
    school_id: Option<&str>,
    description: String,
) -> PortResult<()> {
    sqlx::query(
        "INSERT INTO activity_log (kind, entity, entity_id, school_id, description, at) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(enum_text(&kind)?)
    .bind(entity)
    .bind(entity_id)
    .bind(school_id)
    .bind(description)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(unexpected)?;

    sqlx::query("DELETE FROM activity_log WHERE seq <= (SELECT MAX(seq) FROM activity_log) - $1")
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .execute(&mut *conn)
        .await
        .map_err(unexpected)?;
    Ok(())
}

impl DbAdapter {
    async fn record(
        &self,
        conn: &mut PgConnection,
        kind: ActivityKind,
        entity: &str,
        entity_id: &str,
        school_id: Option<&str>,
        description: String,
    ) -> PortResult<()> {
        record_activity(
            conn,
            self.settings.activity_log_limit,
            kind,
            entity,
            entity_id,
            school_id,
            description,
        )
        .await
    }

    async fn exists(&self, table: &'static str, id: &str) -> PortResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
        sqlx::query_scalar::<_, bool>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)
    }

    /// Strict mode rejects a missing reference; lenient mode keeps it and warns.
    fn dangling(&self, entity: &'static str, id: &str) -> PortResult<()> {
        if self.settings.referential_checks {
            return Err(StoreError::missing(entity, id).into());
        }
        warn!("{} {} does not exist; keeping the dangling reference", entity, id);
        Ok(())
    }

    async fn check_reference(&self, entity: &'static str, table: &'static str, id: &str) -> PortResult<()> {
        if self.exists(table, id).await? {
            return Ok(());
        }
        self.dangling(entity, id)
    }

    async fn check_references(
        &self,
        entity: &'static str,
        table: &'static str,
        ids: &[String],
    ) -> PortResult<()> {
        for id in ids {
            self.check_reference(entity, table, id).await?;
        }
        Ok(())
    }

    /// A student's class must exist and belong to the student's school.
    async fn check_placement(&self, school_id: &str, class_id: &str) -> PortResult<()> {
        self.check_reference("School", "schools", school_id).await?;
        let owner: Option<String> = sqlx::query_scalar("SELECT school_id FROM classes WHERE id = $1")
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match owner {
            None => self.dangling("ClassRoom", class_id),
            Some(owner) if owner != school_id && self.settings.referential_checks => {
                Err(StoreError::invalid(
                    "classId",
                    format!("class {class_id} belongs to another school"),
                )
                .into())
            }
            Some(_) => Ok(()),
        }
    }

    async fn check_subject_code_free(&self, subject: &Subject) -> PortResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE school_id = $1 AND code = $2 AND id <> $3)",
        )
        .bind(&subject.school_id)
        .bind(&subject.code)
        .bind(&subject.id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        if taken && self.settings.referential_checks {
            return Err(StoreError::Duplicate {
                entity: "Subject",
                field: "code",
                value: subject.code.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn check_result_free(&self, result: &ResultEntry) -> PortResult<()> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM results WHERE student_id = $1 AND subject_id = $2 \
             AND term = $3 AND session = $4 AND id <> $5)",
        )
        .bind(&result.student_id)
        .bind(&result.subject_id)
        .bind(enum_text(&result.term)?)
        .bind(&result.session)
        .bind(&result.id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
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
            }
            .into());
        }
        Ok(())
    }

    async fn school_of_student(&self, id: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar("SELECT school_id FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)
    }

    /// Attaches computed performance to subject rows.
    async fn hydrate_subjects(&self, records: Vec<SubjectRecord>) -> PortResult<Vec<Subject>> {
        let subject_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
        let school_ids: Vec<String> = records.iter().map(|r| r.school_id.clone()).collect();

        let scores: Vec<(String, f64, f64, f64)> = sqlx::query_as(
            "SELECT subject_id, ca, exam, total FROM results WHERE subject_id = ANY($1)",
        )
        .bind(&subject_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        let mut by_subject: HashMap<String, Vec<(f64, f64, f64)>> = HashMap::new();
        for (subject_id, ca, exam, total) in scores {
            by_subject.entry(subject_id).or_default().push((ca, exam, total));
        }

        let settings: Vec<(String, Json<SchoolSettings>)> =
            sqlx::query_as("SELECT id, settings FROM schools WHERE id = ANY($1)")
                .bind(&school_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        let passing: HashMap<String, f64> = settings
            .into_iter()
            .map(|(id, s)| (id, s.0.passing_grade))
            .collect();

        Ok(records
            .into_iter()
            .map(|r| {
                let rows = by_subject.get(&r.id).map(Vec::as_slice).unwrap_or_default();
                let passing_grade = passing
                    .get(&r.school_id)
                    .copied()
                    .unwrap_or(rules::DEFAULT_PASSING_GRADE);
                Subject {
                    performance: rules::subject_performance(rows, passing_grade),
                    id: r.id,
                    code: r.code,
                    name: r.name,
                    school_id: r.school_id,
                    teacher_ids: r.teacher_ids.0,
                }
            })
            .collect())
    }

    async fn fetch_student_by_public_id(
        &self,
        conn: &mut PgConnection,
        student_id: &str,
    ) -> PortResult<Option<Student>> {
        let sql = format!("{SELECT_STUDENTS} WHERE student_id = $1 ORDER BY seq LIMIT 1");
        sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(student_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(unexpected)?
            .map(StudentRecord::to_domain)
            .transpose()
    }

    async fn insert_student(&self, payload: NewStudent) -> PortResult<Student> {
        let mut student = payload.into_record(new_id(), Utc::now())?;
        self.check_placement(&student.school_id, &student.class_id).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        // Serializes public id assignment between concurrent inserts.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('students.student_id'))")
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        let taken: Vec<String> = sqlx::query_scalar("SELECT student_id FROM students")
            .fetch_all(&mut *tx)
            .await
            .map_err(unexpected)?;
        if student.student_id.is_empty() {
            student.student_id = rules::next_public_id(taken.iter().map(String::as_str))?;
        } else if self.settings.referential_checks && taken.contains(&student.student_id) {
            return Err(StoreError::Duplicate {
                entity: "Student",
                field: "studentId",
                value: student.student_id,
            }
            .into());
        }

        sqlx::query(
            "INSERT INTO students (id, student_id, first_name, last_name, email, phone, \
             date_of_birth, address, school_id, class_id, primary_guardian, secondary_guardian, \
             active, performance_level, current_gpa, medical, documents, enrolled_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(&student.id)
        .bind(&student.student_id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(student.date_of_birth)
        .bind(&student.address)
        .bind(&student.school_id)
        .bind(&student.class_id)
        .bind(Json(&student.primary_guardian))
        .bind(student.secondary_guardian.as_ref().map(Json))
        .bind(student.active)
        .bind(enum_text(&student.performance_level)?)
        .bind(student.current_gpa)
        .bind(student.medical.as_ref().map(Json))
        .bind(Json(&student.documents))
        .bind(student.enrolled_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        self.record(
            &mut tx,
            ActivityKind::Created,
            "Student",
            &student.id,
            Some(&student.school_id),
            format!("{} enrolled as {}", student.full_name(), student.student_id),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        info!(
            "Student {} ({}) enrolled in class {}",
            student.student_id, student.id, student.class_id
        );
        Ok(student)
    }

    /// Deletes one row and records its `Deleted` entry in the same transaction.
    /// Nothing is logged when the row is already gone.
    async fn delete_row(
        &self,
        table: &'static str,
        entity: &str,
        id: &str,
        school_id: Option<&str>,
        description: String,
    ) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let deleted = sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        if deleted == 0 {
            debug!("delete from {}: {} not found", table, id);
            return Ok(false);
        }
        self.record(&mut tx, ActivityKind::Deleted, entity, id, school_id, description)
            .await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(true)
    }
}

//=========================================================================================
// `DirectoryService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DirectoryService for DbAdapter {
    // --- Schools ---

    async fn list_schools(&self, filter: &SchoolFilter) -> PortResult<Vec<School>> {
        let sql = format!("{SELECT_SCHOOLS} ORDER BY s.seq");
        let records = sqlx::query_as::<_, SchoolRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        let mut schools = Vec::with_capacity(records.len());
        for record in records {
            let school = record.to_domain()?;
            if filter.matches(&school) {
                schools.push(school);
            }
        }
        Ok(schools)
    }

    async fn get_school(&self, id: &str) -> PortResult<Option<School>> {
        let sql = format!("{SELECT_SCHOOLS} WHERE s.id = $1");
        sqlx::query_as::<_, SchoolRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(SchoolRecord::to_domain)
            .transpose()
    }

    async fn add_school(&self, payload: NewSchool) -> PortResult<School> {
        let school = payload.into_record(new_id(), Utc::now())?;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO schools (id, name, brand, contact, active, plan, max_students, billing, \
             settings, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&school.id)
        .bind(&school.name)
        .bind(enum_text(&school.brand)?)
        .bind(Json(&school.contact))
        .bind(school.active)
        .bind(enum_text(&school.plan)?)
        .bind(i64::from(school.max_students))
        .bind(Json(&school.billing))
        .bind(Json(&school.settings))
        .bind(school.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Created,
            "School",
            &school.id,
            Some(&school.id),
            format!("School {} registered", school.name),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        info!("School '{}' created with id {}", school.name, school.id);
        self.get_school(&school.id)
            .await?
            .ok_or_else(|| PortError::Unexpected(format!("School {} vanished after insert", school.id)))
    }

    async fn update_school(&self, id: &str, patch: SchoolPatch) -> PortResult<Option<School>> {
        let Some(mut school) = self.get_school(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut school)?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "UPDATE schools SET name = $2, brand = $3, contact = $4, active = $5, plan = $6, \
             max_students = $7, billing = $8, settings = $9 WHERE id = $1",
        )
        .bind(id)
        .bind(&school.name)
        .bind(enum_text(&school.brand)?)
        .bind(Json(&school.contact))
        .bind(school.active)
        .bind(enum_text(&school.plan)?)
        .bind(i64::from(school.max_students))
        .bind(Json(&school.billing))
        .bind(Json(&school.settings))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Updated,
            "School",
            id,
            Some(id),
            format!("School {} updated", school.name),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        self.get_school(id).await
    }

    async fn delete_school(&self, id: &str) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let name: Option<String> = sqlx::query_scalar("DELETE FROM schools WHERE id = $1 RETURNING name")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?;
        let Some(name) = name else {
            debug!("delete_school: {} not found", id);
            return Ok(false);
        };
        self.record(
            &mut tx,
            ActivityKind::Deleted,
            "School",
            id,
            Some(id),
            format!("School {name} removed"),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        info!("School '{}' deleted", name);
        Ok(true)
    }

    // --- Students ---

    async fn list_students(&self, filter: &StudentFilter) -> PortResult<Vec<Student>> {
        let sql = format!("{SELECT_STUDENTS} WHERE ($1::text IS NULL OR school_id = $1) ORDER BY seq");
        let records = sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(filter.school_id.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        let mut students = Vec::with_capacity(records.len());
        for record in records {
            let student = record.to_domain()?;
            if filter.matches(&student) {
                students.push(student);
            }
        }
        Ok(students)
    }

    async fn get_student(&self, id: &str) -> PortResult<Option<Student>> {
        let sql = format!("{SELECT_STUDENTS} WHERE id = $1");
        sqlx::query_as::<_, StudentRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(StudentRecord::to_domain)
            .transpose()
    }

    async fn get_student_by_public_id(&self, student_id: &str) -> PortResult<Option<Student>> {
        let mut conn = self.pool.acquire().await.map_err(unexpected)?;
        self.fetch_student_by_public_id(&mut conn, student_id).await
    }

    async fn add_student(&self, payload: NewStudent) -> PortResult<Student> {
        self.insert_student(payload).await
    }

    async fn update_student(&self, id: &str, patch: StudentPatch) -> PortResult<Option<Student>> {
        let Some(mut student) = self.get_student(id).await? else {
            return Ok(None);
        };
        let moved = patch.moves_student();
        patch.apply(&mut student)?;
        if moved {
            self.check_placement(&student.school_id, &student.class_id).await?;
        }

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "UPDATE students SET first_name = $2, last_name = $3, email = $4, phone = $5, \
             date_of_birth = $6, address = $7, school_id = $8, class_id = $9, \
             primary_guardian = $10, secondary_guardian = $11, active = $12, \
             performance_level = $13, current_gpa = $14, medical = $15, documents = $16 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&student.first_name)
        .bind(&student.last_name)
        .bind(&student.email)
        .bind(&student.phone)
        .bind(student.date_of_birth)
        .bind(&student.address)
        .bind(&student.school_id)
        .bind(&student.class_id)
        .bind(Json(&student.primary_guardian))
        .bind(student.secondary_guardian.as_ref().map(Json))
        .bind(student.active)
        .bind(enum_text(&student.performance_level)?)
        .bind(student.current_gpa)
        .bind(student.medical.as_ref().map(Json))
        .bind(Json(&student.documents))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Updated,
            "Student",
            id,
            Some(&student.school_id),
            format!("{} updated", student.full_name()),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(Some(student))
    }

    async fn delete_student(&self, id: &str) -> PortResult<bool> {
        let Some(student) = self.get_student(id).await? else {
            debug!("delete_student: {} not found", id);
            return Ok(false);
        };
        let removed = self
            .delete_row(
                "students",
                "Student",
                id,
                Some(&student.school_id),
                format!("{} withdrawn", student.full_name()),
            )
            .await?;
        if removed {
            info!("Student {} ({}) deleted", student.student_id, student.id);
        }
        Ok(removed)
    }

    async fn bulk_import_students(
        &self,
        payloads: Vec<NewStudent>,
    ) -> PortResult<Vec<Result<Student, StoreError>>> {
        let total = payloads.len();
        let mut outcomes = Vec::with_capacity(total);
        for payload in payloads {
            match self.insert_student(payload).await {
                Ok(student) => outcomes.push(Ok(student)),
                Err(PortError::Rejected(e)) => outcomes.push(Err(e)),
                Err(e) => return Err(e),
            }
        }
        let imported = outcomes.iter().filter(|o| o.is_ok()).count();
        if imported < total {
            warn!("Bulk import: {} of {} students rejected", total - imported, total);
        }
        info!("Bulk import: {} of {} students imported", imported, total);
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Imported,
            "Student",
            "bulk",
            None,
            format!("Imported {imported} of {total} students"),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(outcomes)
    }

    // --- Teachers ---

    async fn list_teachers(&self, filter: &TeacherFilter) -> PortResult<Vec<Teacher>> {
        let sql = format!("{SELECT_TEACHERS} WHERE ($1::text IS NULL OR school_id = $1) ORDER BY seq");
        let records = sqlx::query_as::<_, TeacherRecord>(&sql)
            .bind(filter.school_id.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(TeacherRecord::to_domain)
            .filter(|t| filter.matches(t))
            .collect())
    }

    async fn get_teacher(&self, id: &str) -> PortResult<Option<Teacher>> {
        let sql = format!("{SELECT_TEACHERS} WHERE id = $1");
        Ok(sqlx::query_as::<_, TeacherRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(TeacherRecord::to_domain))
    }

    async fn add_teacher(&self, payload: NewTeacher) -> PortResult<Teacher> {
        let teacher = payload.into_record(new_id(), Utc::now())?;
        self.check_reference("School", "schools", &teacher.school_id).await?;
        self.check_references("ClassRoom", "classes", &teacher.class_ids).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO teachers (id, first_name, last_name, email, phone, school_id, subjects, \
             class_ids, active, performance, joined_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&teacher.id)
        .bind(&teacher.first_name)
        .bind(&teacher.last_name)
        .bind(&teacher.email)
        .bind(&teacher.phone)
        .bind(&teacher.school_id)
        .bind(Json(&teacher.subjects))
        .bind(Json(&teacher.class_ids))
        .bind(teacher.active)
        .bind(Json(&teacher.performance))
        .bind(teacher.joined_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Created,
            "Teacher",
            &teacher.id,
            Some(&teacher.school_id),
            format!("{} {} joined the staff", teacher.first_name, teacher.last_name),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        info!("Teacher {} {} added ({})", teacher.first_name, teacher.last_name, teacher.id);
        Ok(teacher)
    }

    async fn update_teacher(&self, id: &str, patch: TeacherPatch) -> PortResult<Option<Teacher>> {
        let Some(mut teacher) = self.get_teacher(id).await? else {
            return Ok(None);
        };
        let school_changed = patch.school_id.is_some();
        let classes_changed = patch.class_ids.is_some();
        patch.apply(&mut teacher)?;
        if school_changed {
            self.check_reference("School", "schools", &teacher.school_id).await?;
        }
        if classes_changed {
            self.check_references("ClassRoom", "classes", &teacher.class_ids).await?;
        }

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "UPDATE teachers SET first_name = $2, last_name = $3, email = $4, phone = $5, \
             school_id = $6, subjects = $7, class_ids = $8, active = $9, performance = $10 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&teacher.first_name)
        .bind(&teacher.last_name)
        .bind(&teacher.email)
        .bind(&teacher.phone)
        .bind(&teacher.school_id)
        .bind(Json(&teacher.subjects))
        .bind(Json(&teacher.class_ids))
        .bind(teacher.active)
        .bind(Json(&teacher.performance))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Updated,
            "Teacher",
            id,
            Some(&teacher.school_id),
            format!("{} {} updated", teacher.first_name, teacher.last_name),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(Some(teacher))
    }

    async fn delete_teacher(&self, id: &str) -> PortResult<bool> {
        let Some(teacher) = self.get_teacher(id).await? else {
            debug!("delete_teacher: {} not found", id);
            return Ok(false);
        };
        let removed = self
            .delete_row(
                "teachers",
                "Teacher",
                id,
                Some(&teacher.school_id),
                format!("{} {} left the staff", teacher.first_name, teacher.last_name),
            )
            .await?;
        if removed {
            info!("Teacher {} deleted", teacher.id);
        }
        Ok(removed)
    }

    // --- Classes ---

    async fn list_classes(&self, filter: &ClassRoomFilter) -> PortResult<Vec<ClassRoom>> {
        let sql = format!("{SELECT_CLASSES} WHERE ($1::text IS NULL OR c.school_id = $1) ORDER BY c.seq");
        let records = sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(filter.school_id.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records
            .into_iter()
            .map(ClassRecord::to_domain)
            .filter(|c| filter.matches(c))
            .collect())
    }

    async fn get_class(&self, id: &str) -> PortResult<Option<ClassRoom>> {
        let sql = format!("{SELECT_CLASSES} WHERE c.id = $1");
        Ok(sqlx::query_as::<_, ClassRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(ClassRecord::to_domain))
    }

    async fn add_class(&self, payload: NewClassRoom) -> PortResult<ClassRoom> {
        let class = payload.into_record(new_id())?;
        self.check_reference("School", "schools", &class.school_id).await?;
        if let Some(teacher_id) = &class.teacher_id {
            self.check_reference("Teacher", "teachers", teacher_id).await?;
        }
        self.check_references("Subject", "subjects", &class.subject_ids).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO classes (id, name, level, school_id, teacher_id, subject_ids, capacity) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&class.id)
        .bind(&class.name)
        .bind(&class.level)
        .bind(&class.school_id)
        .bind(&class.teacher_id)
        .bind(Json(&class.subject_ids))
        .bind(i64::from(class.capacity))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Created,
            "ClassRoom",
            &class.id,
            Some(&class.school_id),
            format!("Class {} opened", class.name),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        info!("Class {} added ({})", class.name, class.id);
        Ok(class)
    }

    async fn update_class(&self, id: &str, patch: ClassRoomPatch) -> PortResult<Option<ClassRoom>> {
        let Some(mut class) = self.get_class(id).await? else {
            return Ok(None);
        };
        let school_changed = patch.school_id.is_some();
        let teacher_changed = matches!(patch.teacher_id, Some(Some(_)));
        let subjects_changed = patch.subject_ids.is_some();
        patch.apply(&mut class)?;
        if school_changed {
            self.check_reference("School", "schools", &class.school_id).await?;
        }
        if let (true, Some(teacher_id)) = (teacher_changed, &class.teacher_id) {
            self.check_reference("Teacher", "teachers", teacher_id).await?;
        }
        if subjects_changed {
            self.check_references("Subject", "subjects", &class.subject_ids).await?;
        }

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "UPDATE classes SET name = $2, level = $3, school_id = $4, teacher_id = $5, \
             subject_ids = $6, capacity = $7 WHERE id = $1",
        )
        .bind(id)
        .bind(&class.name)
        .bind(&class.level)
        .bind(&class.school_id)
        .bind(&class.teacher_id)
        .bind(Json(&class.subject_ids))
        .bind(i64::from(class.capacity))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Updated,
            "ClassRoom",
            id,
            Some(&class.school_id),
            format!("Class {} updated", class.name),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        self.get_class(id).await
    }

    async fn delete_class(&self, id: &str) -> PortResult<bool> {
        let Some(class) = self.get_class(id).await? else {
            debug!("delete_class: {} not found", id);
            return Ok(false);
        };
        let removed = self
            .delete_row(
                "classes",
                "ClassRoom",
                id,
                Some(&class.school_id),
                format!("Class {} closed", class.name),
            )
            .await?;
        if removed {
            info!("Class {} deleted", class.name);
        }
        Ok(removed)
    }

    // --- Subjects ---

    async fn list_subjects(&self, filter: &SubjectFilter) -> PortResult<Vec<Subject>> {
        let sql = format!("{SELECT_SUBJECTS} WHERE ($1::text IS NULL OR school_id = $1) ORDER BY seq");
        let records = sqlx::query_as::<_, SubjectRecord>(&sql)
            .bind(filter.school_id.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        let subjects = self.hydrate_subjects(records).await?;
        Ok(subjects.into_iter().filter(|s| filter.matches(s)).collect())
    }

    async fn get_subject(&self, id: &str) -> PortResult<Option<Subject>> {
        let sql = format!("{SELECT_SUBJECTS} WHERE id = $1");
        let records = sqlx::query_as::<_, SubjectRecord>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(self.hydrate_subjects(records).await?.into_iter().next())
    }

    async fn add_subject(&self, payload: NewSubject) -> PortResult<Subject> {
        let subject = payload.into_record(new_id())?;
        self.check_reference("School", "schools", &subject.school_id).await?;
        self.check_references("Teacher", "teachers", &subject.teacher_ids).await?;
        self.check_subject_code_free(&subject).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO subjects (id, code, name, school_id, teacher_ids) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&subject.id)
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(&subject.school_id)
        .bind(Json(&subject.teacher_ids))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Created,
            "Subject",
            &subject.id,
            Some(&subject.school_id),
            format!("Subject {} ({}) added", subject.name, subject.code),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        info!("Subject {} added ({})", subject.code, subject.id);
        Ok(subject)
    }

    async fn update_subject(&self, id: &str, patch: SubjectPatch) -> PortResult<Option<Subject>> {
        let Some(mut subject) = self.get_subject(id).await? else {
            return Ok(None);
        };
        let school_changed = patch.school_id.is_some();
        let teachers_changed = patch.teacher_ids.is_some();
        patch.apply(&mut subject)?;
        if school_changed {
            self.check_reference("School", "schools", &subject.school_id).await?;
        }
        if teachers_changed {
            self.check_references("Teacher", "teachers", &subject.teacher_ids).await?;
        }
        self.check_subject_code_free(&subject).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "UPDATE subjects SET code = $2, name = $3, school_id = $4, teacher_ids = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(&subject.school_id)
        .bind(Json(&subject.teacher_ids))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Updated,
            "Subject",
            id,
            Some(&subject.school_id),
            format!("Subject {} updated", subject.code),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        self.get_subject(id).await
    }

    async fn delete_subject(&self, id: &str) -> PortResult<bool> {
        let Some(subject) = self.get_subject(id).await? else {
            debug!("delete_subject: {} not found", id);
            return Ok(false);
        };
        let removed = self
            .delete_row(
                "subjects",
                "Subject",
                id,
                Some(&subject.school_id),
                format!("Subject {} removed", subject.code),
            )
            .await?;
        if removed {
            info!("Subject {} deleted", subject.code);
        }
        Ok(removed)
    }

    // --- Results ---

    async fn list_results(&self, filter: &ResultFilter) -> PortResult<Vec<ResultEntry>> {
        let sql = format!(
            "{SELECT_RESULTS} WHERE ($1::text IS NULL OR r.student_id IN \
             (SELECT st.id FROM students st WHERE st.class_id = $1)) ORDER BY r.seq"
        );
        let records = sqlx::query_as::<_, ResultRecord>(&sql)
            .bind(filter.class_id.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let result = record.to_domain()?;
            if filter.matches(&result) {
                results.push(result);
            }
        }
        Ok(results)
    }

    async fn get_result(&self, id: &str) -> PortResult<Option<ResultEntry>> {
        let sql = format!("{SELECT_RESULTS} WHERE r.id = $1");
        sqlx::query_as::<_, ResultRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(ResultRecord::to_domain)
            .transpose()
    }

    async fn add_result(&self, payload: NewResult) -> PortResult<ResultEntry> {
        let result = payload.into_record(new_id(), Utc::now())?;
        self.check_reference("Student", "students", &result.student_id).await?;
        self.check_reference("Subject", "subjects", &result.subject_id).await?;
        self.check_reference("Teacher", "teachers", &result.teacher_id).await?;
        self.check_result_free(&result).await?;
        let school_id = self.school_of_student(&result.student_id).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO results (id, student_id, subject_id, teacher_id, term, session, ca, exam, \
             total, grade, position, published, remarks, skills, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&result.id)
        .bind(&result.student_id)
        .bind(&result.subject_id)
        .bind(&result.teacher_id)
        .bind(enum_text(&result.term)?)
        .bind(&result.session)
        .bind(result.ca)
        .bind(result.exam)
        .bind(result.total)
        .bind(enum_text(&result.grade)?)
        .bind(result.position.map(i64::from))
        .bind(result.published)
        .bind(&result.remarks)
        .bind(Json(&result.skills))
        .bind(result.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Created,
            "Result",
            &result.id,
            school_id.as_deref(),
            format!("{} result entered ({})", result.term.label(), result.session),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        debug!(
            "Result {} recorded: student {} subject {} total {}",
            result.id, result.student_id, result.subject_id, result.total
        );
        Ok(result)
    }

    async fn update_result(&self, id: &str, patch: ResultPatch) -> PortResult<Option<ResultEntry>> {
        let Some(mut result) = self.get_result(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut result)?;
        self.check_result_free(&result).await?;
        let school_id = self.school_of_student(&result.student_id).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "UPDATE results SET term = $2, session = $3, ca = $4, exam = $5, total = $6, \
             grade = $7, position = $8, published = $9, remarks = $10, skills = $11 WHERE id = $1",
        )
        .bind(id)
        .bind(enum_text(&result.term)?)
        .bind(&result.session)
        .bind(result.ca)
        .bind(result.exam)
        .bind(result.total)
        .bind(enum_text(&result.grade)?)
        .bind(result.position.map(i64::from))
        .bind(result.published)
        .bind(&result.remarks)
        .bind(Json(&result.skills))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Updated,
            "Result",
            id,
            school_id.as_deref(),
            format!("{} result updated ({})", result.term.label(), result.session),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(Some(result))
    }

    async fn delete_result(&self, id: &str) -> PortResult<bool> {
        let Some(result) = self.get_result(id).await? else {
            debug!("delete_result: {} not found", id);
            return Ok(false);
        };
        let school_id = self.school_of_student(&result.student_id).await?;
        self.delete_row(
            "results",
            "Result",
            id,
            school_id.as_deref(),
            format!("{} result removed ({})", result.term.label(), result.session),
        )
        .await
    }

    async fn rank_results(
        &self,
        class_id: &str,
        subject_id: &str,
        term: Term,
        session: &str,
    ) -> PortResult<usize> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "SELECT r.id, r.total FROM results r JOIN students st ON st.id = r.student_id \
             WHERE st.class_id = $1 AND r.subject_id = $2 AND r.term = $3 AND r.session = $4 \
             ORDER BY r.total DESC, r.seq FOR UPDATE OF r",
        )
        .bind(class_id)
        .bind(subject_id)
        .bind(enum_text(&term)?)
        .bind(session)
        .fetch_all(&mut *tx)
        .await
        .map_err(unexpected)?;

        let totals: Vec<f64> = rows.iter().map(|(_, total)| *total).collect();
        let ranks = rules::competition_ranks(&totals);
        for ((id, _), rank) in rows.iter().zip(ranks) {
            sqlx::query("UPDATE results SET position = $2 WHERE id = $1")
                .bind(id)
                .bind(i64::from(rank))
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;

        info!(
            "Ranked {} results for class {} subject {} ({} {})",
            rows.len(),
            class_id,
            subject_id,
            term.label(),
            session
        );
        Ok(rows.len())
    }

    // --- Notifications ---

    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> PortResult<Vec<NotificationItem>> {
        let sql = format!("{SELECT_NOTIFICATIONS} WHERE ($1::text IS NULL OR school_id = $1) ORDER BY seq");
        let records = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(filter.school_id.as_deref())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        let mut notifications = Vec::with_capacity(records.len());
        for record in records {
            let notification = record.to_domain()?;
            if filter.matches(&notification) {
                notifications.push(notification);
            }
        }
        Ok(notifications)
    }

    async fn get_notification(&self, id: &str) -> PortResult<Option<NotificationItem>> {
        let sql = format!("{SELECT_NOTIFICATIONS} WHERE id = $1");
        sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(NotificationRecord::to_domain)
            .transpose()
    }

    async fn add_notification(&self, payload: NewNotification) -> PortResult<NotificationItem> {
        let notification = payload.into_record(new_id(), Utc::now())?;
        self.check_reference("School", "schools", &notification.school_id).await?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "INSERT INTO notifications (id, school_id, title, message, audience, channel, status, \
             priority, scheduled_for, metrics, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(&notification.id)
        .bind(&notification.school_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(enum_text(&notification.audience)?)
        .bind(enum_text(&notification.channel)?)
        .bind(enum_text(&notification.status)?)
        .bind(enum_text(&notification.priority)?)
        .bind(notification.scheduled_for)
        .bind(Json(&notification.metrics))
        .bind(notification.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Created,
            "Notification",
            &notification.id,
            Some(&notification.school_id),
            format!("Notification '{}' drafted", notification.title),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        info!("Notification '{}' created ({:?})", notification.title, notification.status);
        Ok(notification)
    }

    async fn update_notification(
        &self,
        id: &str,
        patch: NotificationPatch,
    ) -> PortResult<Option<NotificationItem>> {
        let Some(mut notification) = self.get_notification(id).await? else {
            return Ok(None);
        };
        patch.apply(&mut notification)?;

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        sqlx::query(
            "UPDATE notifications SET title = $2, message = $3, audience = $4, channel = $5, \
             status = $6, priority = $7, scheduled_for = $8, metrics = $9 WHERE id = $1",
        )
        .bind(id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(enum_text(&notification.audience)?)
        .bind(enum_text(&notification.channel)?)
        .bind(enum_text(&notification.status)?)
        .bind(enum_text(&notification.priority)?)
        .bind(notification.scheduled_for)
        .bind(Json(&notification.metrics))
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::Updated,
            "Notification",
            id,
            Some(&notification.school_id),
            format!("Notification '{}' is {:?}", notification.title, notification.status),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;
        Ok(Some(notification))
    }

    async fn delete_notification(&self, id: &str) -> PortResult<bool> {
        let Some(notification) = self.get_notification(id).await? else {
            debug!("delete_notification: {} not found", id);
            return Ok(false);
        };
        self.delete_row(
            "notifications",
            "Notification",
            id,
            Some(&notification.school_id),
            format!("Notification '{}' removed", notification.title),
        )
        .await
    }

    async fn due_notifications(&self, now: DateTime<Utc>) -> PortResult<Vec<NotificationItem>> {
        let sql = format!(
            "{SELECT_NOTIFICATIONS} WHERE status = $1 AND scheduled_for <= $2 ORDER BY seq"
        );
        sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(enum_text(&NotificationStatus::Scheduled)?)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(NotificationRecord::to_domain)
            .collect()
    }

    // --- Result-access tokens ---

    async fn find_token_by_student_id(&self, student_id: &str) -> PortResult<Option<TokenRecord>> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM result_tokens WHERE student_id = $1 AND active \
             AND attempts < max_attempts AND expires_at > $2 ORDER BY seq DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, ResultTokenRecord>(&sql)
            .bind(student_id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(ResultTokenRecord::to_domain))
    }

    async fn list_tokens(&self, student_id: Option<&str>) -> PortResult<Vec<TokenRecord>> {
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM result_tokens \
             WHERE ($1::text IS NULL OR student_id = $1) ORDER BY seq"
        );
        Ok(sqlx::query_as::<_, ResultTokenRecord>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?
            .into_iter()
            .map(ResultTokenRecord::to_domain)
            .collect())
    }

    async fn create_token(&self, student_id: &str) -> PortResult<TokenRecord> {
        rules::require_text("studentId", student_id)?;
        let school_id: Option<String> = sqlx::query_scalar(
            "SELECT school_id FROM students WHERE student_id = $1 ORDER BY seq LIMIT 1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        if school_id.is_none() {
            if self.settings.referential_checks {
                return Err(StoreError::missing("Student", student_id).into());
            }
            warn!("Issuing a result token for unknown student {}", student_id);
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

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let revoked = sqlx::query("UPDATE result_tokens SET active = FALSE WHERE student_id = $1 AND active")
            .bind(student_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?
            .rows_affected();
        sqlx::query(
            "INSERT INTO result_tokens (id, student_id, token, attempts, max_attempts, expires_at, \
             active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&token.id)
        .bind(&token.student_id)
        .bind(&token.token)
        .bind(i64::from(token.attempts))
        .bind(i64::from(token.max_attempts))
        .bind(token.expires_at)
        .bind(token.active)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;
        self.record(
            &mut tx,
            ActivityKind::TokenIssued,
            "Token",
            &token.id,
            school_id.as_deref(),
            format!("Result token issued for {student_id}"),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        info!(
            "Result token issued for {} (revoked {} earlier token(s))",
            student_id, revoked
        );
        Ok(token)
    }

    async fn increment_attempt(&self, token_id: &str) -> PortResult<Option<TokenRecord>> {
        let sql = format!(
            "UPDATE result_tokens SET attempts = attempts + 1, \
             active = active AND attempts + 1 < max_attempts \
             WHERE id = $1 RETURNING {TOKEN_COLUMNS}"
        );
        let token = sqlx::query_as::<_, ResultTokenRecord>(&sql)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .map(ResultTokenRecord::to_domain);
        if let Some(token) = &token {
            if token.attempts == token.max_attempts {
                info!(
                    "Result token for {} exhausted after {} attempts",
                    token.student_id, token.attempts
                );
            }
        }
        Ok(token)
    }

    async fn check_results(
        &self,
        student_id: &str,
        token: &str,
        term: Option<Term>,
        session: Option<&str>,
    ) -> PortResult<ResultSheet> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let sql = format!(
            "SELECT {TOKEN_COLUMNS} FROM result_tokens WHERE student_id = $1 \
             ORDER BY seq DESC LIMIT 1 FOR UPDATE"
        );
        let latest = sqlx::query_as::<_, ResultTokenRecord>(&sql)
            .bind(student_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?
            .map(ResultTokenRecord::to_domain)
            .ok_or_else(|| StoreError::TokenNotFound(student_id.to_string()))?;
        if latest.attempts >= latest.max_attempts {
            return Err(StoreError::TokenExhausted(student_id.to_string()).into());
        }
        if !latest.is_usable(now) {
            return Err(StoreError::TokenNotFound(student_id.to_string()).into());
        }

        let sql = format!(
            "UPDATE result_tokens SET attempts = attempts + 1, \
             active = active AND attempts + 1 < max_attempts \
             WHERE id = $1 RETURNING {TOKEN_COLUMNS}"
        );
        let spent = sqlx::query_as::<_, ResultTokenRecord>(&sql)
            .bind(&latest.id)
            .fetch_one(&mut *tx)
            .await
            .map_err(unexpected)?
            .to_domain();
        // The attempt counts whether or not the token matches.
        tx.commit().await.map_err(unexpected)?;

        if !latest.token.eq_ignore_ascii_case(token.trim()) {
            warn!(
                "Result check for {} used a wrong token ({} attempt(s) left)",
                student_id,
                spent.attempts_remaining()
            );
            return Err(StoreError::TokenMismatch(student_id.to_string()).into());
        }

        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let student = self
            .fetch_student_by_public_id(&mut tx, student_id)
            .await?
            .ok_or_else(|| StoreError::missing("Student", student_id))?;
        let sql = format!("{SELECT_RESULTS} WHERE r.student_id = $1 AND r.published ORDER BY r.seq");
        let records = sqlx::query_as::<_, ResultRecord>(&sql)
            .bind(&student.id)
            .fetch_all(&mut *tx)
            .await
            .map_err(unexpected)?;
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            let result = record.to_domain()?;
            if term.map_or(true, |t| result.term == t) && session.map_or(true, |s| result.session == s) {
                results.push(result);
            }
        }
        self.record(
            &mut tx,
            ActivityKind::ResultsChecked,
            "Student",
            &student.id,
            Some(&student.school_id),
            format!("Results checked for {student_id}"),
        )
        .await?;
        tx.commit().await.map_err(unexpected)?;

        Ok(ResultSheet {
            student,
            results,
            attempts_remaining: spent.attempts_remaining(),
        })
    }

    // --- Activity & dashboard ---

    async fn list_activity(&self, limit: Option<usize>) -> PortResult<Vec<ActivityEntry>> {
        let records = sqlx::query_as::<_, ActivityRecord>(
            "SELECT kind, entity, entity_id, school_id, description, at FROM activity_log \
             ORDER BY seq DESC LIMIT $1",
        )
        .bind(limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(ActivityRecord::to_domain).collect()
    }

    async fn admin_dashboard(&self, school_id: Option<&str>) -> PortResult<AdminDashboard> {
        let schools = self.list_schools(&SchoolFilter::default()).await?;
        let students = self.list_students(&StudentFilter::default()).await?;
        let teachers = self.list_teachers(&TeacherFilter::default()).await?;
        let classes = self.list_classes(&ClassRoomFilter::default()).await?;
        let subjects = self.list_subjects(&SubjectFilter::default()).await?;
        let results = self.list_results(&ResultFilter::default()).await?;
        let notifications = self.list_notifications(&NotificationFilter::default()).await?;
        let activity = self.list_activity(None).await?;
        Ok(build_admin_dashboard(
            DashboardInput {
                schools: &schools,
                students: &students,
                teachers: &teachers,
                classes: &classes,
                subjects: &subjects,
                results: &results,
                notifications: &notifications,
                activity: &activity,
            },
            school_id,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_directory_core::domain::{Brand, Grade, NotificationChannel};

    #[test]
    fn enums_round_trip_through_their_column_text() {
        assert_eq!(enum_text(&Term::Term3).unwrap(), "Term 3");
        assert_eq!(enum_text(&NotificationChannel::Sms).unwrap(), "SMS");
        assert_eq!(parse_enum::<Brand>("brand", "Globex".to_string()).unwrap(), Brand::Globex);
        assert_eq!(parse_enum::<Grade>("grade", "B".to_string()).unwrap(), Grade::B);
    }

    #[test]
    fn unknown_column_text_is_an_unexpected_error() {
        let err = parse_enum::<Term>("term", "Term 9".to_string()).unwrap_err();
        assert!(matches!(err, PortError::Unexpected(msg) if msg.contains("term")));
    }

    #[test]
    fn counts_saturate_instead_of_wrapping() {
        assert_eq!(count(7), 7);
        assert_eq!(count(-1), u32::MAX);
        assert_eq!(count(i64::MAX), u32::MAX);
    }
}
