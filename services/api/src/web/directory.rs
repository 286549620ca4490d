//! services/api/src/web/directory.rs
//!
//! CRUD endpoints for schools, students, teachers, classes, subjects, results
//! and notifications. List filters come from the query string (camelCase keys).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use school_directory_core::domain::{
    ClassRoom, ClassRoomFilter, ClassRoomPatch, NewClassRoom, NewNotification, NewResult,
    NewSchool, NewStudent, NewSubject, NewTeacher, NotificationFilter, NotificationItem,
    NotificationPatch, ResultEntry, ResultFilter, ResultPatch, School, SchoolFilter,
    SchoolPatch, Student, StudentFilter, StudentPatch, Subject, SubjectFilter, SubjectPatch,
    Teacher, TeacherFilter, TeacherPatch, Term,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::web::rest::{deleted, not_found, reject, HandlerError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// One line of a bulk import report, in payload order.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportOutcome {
    pub index: usize,
    pub student: Option<Student>,
    pub error: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportResponse {
    pub imported: usize,
    pub rejected: usize,
    pub outcomes: Vec<BulkImportOutcome>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    pub class_id: String,
    pub subject_id: String,
    pub term: Term,
    pub session: String,
}

#[derive(Serialize, ToSchema)]
pub struct RankResponse {
    pub ranked: usize,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DueQuery {
    /// Reference time; defaults to now.
    pub at: Option<DateTime<Utc>>,
}

//=========================================================================================
// Schools
//=========================================================================================

#[utoipa::path(
    get,
    path = "/schools",
    params(SchoolFilter),
    responses(
        (status = 200, description = "Schools matching every supplied filter", body = [School]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Schools"
)]
pub async fn list_schools_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SchoolFilter>,
) -> Result<Json<Vec<School>>, HandlerError> {
    let schools = state
        .directory
        .list_schools(&filter)
        .await
        .map_err(|e| reject("list schools", e))?;
    Ok(Json(schools))
}

#[utoipa::path(
    get,
    path = "/schools/{id}",
    params(("id" = String, Path, description = "Internal school id")),
    responses(
        (status = 200, description = "The school with its computed statistics", body = School),
        (status = 404, description = "No such school")
    ),
    tag = "Schools"
)]
pub async fn get_school_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<School>, HandlerError> {
    state
        .directory
        .get_school(&id)
        .await
        .map_err(|e| reject("load school", e))?
        .map(Json)
        .ok_or_else(|| not_found("School", &id))
}

#[utoipa::path(
    post,
    path = "/schools",
    request_body = NewSchool,
    responses(
        (status = 201, description = "School created", body = School),
        (status = 422, description = "Invalid payload")
    ),
    tag = "Schools"
)]
pub async fn create_school_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewSchool>,
) -> Result<impl IntoResponse, HandlerError> {
    let school = state
        .directory
        .add_school(payload)
        .await
        .map_err(|e| reject("create school", e))?;
    Ok((StatusCode::CREATED, Json(school)))
}

#[utoipa::path(
    patch,
    path = "/schools/{id}",
    params(("id" = String, Path, description = "Internal school id")),
    request_body = SchoolPatch,
    responses(
        (status = 200, description = "School updated", body = School),
        (status = 404, description = "No such school"),
        (status = 422, description = "Invalid patch")
    ),
    tag = "Schools"
)]
pub async fn update_school_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<SchoolPatch>,
) -> Result<Json<School>, HandlerError> {
    state
        .directory
        .update_school(&id, patch)
        .await
        .map_err(|e| reject("update school", e))?
        .map(Json)
        .ok_or_else(|| not_found("School", &id))
}

#[utoipa::path(
    delete,
    path = "/schools/{id}",
    params(("id" = String, Path, description = "Internal school id")),
    responses(
        (status = 204, description = "School deleted"),
        (status = 404, description = "No such school")
    ),
    tag = "Schools"
)]
pub async fn delete_school_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let removed = state
        .directory
        .delete_school(&id)
        .await
        .map_err(|e| reject("delete school", e))?;
    deleted(removed, "School", &id)
}

//=========================================================================================
// Students
//=========================================================================================

#[utoipa::path(
    get,
    path = "/students",
    params(StudentFilter),
    responses(
        (status = 200, description = "Students matching every supplied filter", body = [Student]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Students"
)]
pub async fn list_students_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StudentFilter>,
) -> Result<Json<Vec<Student>>, HandlerError> {
    let students = state
        .directory
        .list_students(&filter)
        .await
        .map_err(|e| reject("list students", e))?;
    Ok(Json(students))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    params(("id" = String, Path, description = "Internal student id")),
    responses(
        (status = 200, description = "The student", body = Student),
        (status = 404, description = "No such student")
    ),
    tag = "Students"
)]
pub async fn get_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Student>, HandlerError> {
    state
        .directory
        .get_student(&id)
        .await
        .map_err(|e| reject("load student", e))?
        .map(Json)
        .ok_or_else(|| not_found("Student", &id))
}

/// Looks a student up by the public id printed on result slips ("STU-1001").
#[utoipa::path(
    get,
    path = "/students/by-public-id/{student_id}",
    params(("student_id" = String, Path, description = "Public student id")),
    responses(
        (status = 200, description = "The student", body = Student),
        (status = 404, description = "No student carries that public id")
    ),
    tag = "Students"
)]
pub async fn get_student_by_public_id_handler(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Result<Json<Student>, HandlerError> {
    state
        .directory
        .get_student_by_public_id(&student_id)
        .await
        .map_err(|e| reject("load student", e))?
        .map(Json)
        .ok_or_else(|| not_found("Student", &student_id))
}

#[utoipa::path(
    post,
    path = "/students",
    request_body = NewStudent,
    responses(
        (status = 201, description = "Student enrolled", body = Student),
        (status = 422, description = "Invalid payload or unknown school/class")
    ),
    tag = "Students"
)]
pub async fn create_student_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewStudent>,
) -> Result<impl IntoResponse, HandlerError> {
    let student = state
        .directory
        .add_student(payload)
        .await
        .map_err(|e| reject("enroll student", e))?;
    Ok((StatusCode::CREATED, Json(student)))
}

/// Imports students one by one. A rejected item is reported and does not
/// stop the rest of the batch.
#[utoipa::path(
    post,
    path = "/students/bulk",
    request_body = Vec<NewStudent>,
    responses(
        (status = 200, description = "Per-item import report", body = BulkImportResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Students"
)]
pub async fn bulk_import_students_handler(
    State(state): State<Arc<AppState>>,
    Json(payloads): Json<Vec<NewStudent>>,
) -> Result<Json<BulkImportResponse>, HandlerError> {
    let outcomes = state
        .directory
        .bulk_import_students(payloads)
        .await
        .map_err(|e| reject("import students", e))?;

    let outcomes: Vec<BulkImportOutcome> = outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| match outcome {
            Ok(student) => BulkImportOutcome {
                index,
                student: Some(student),
                error: None,
            },
            Err(e) => BulkImportOutcome {
                index,
                student: None,
                error: Some(e.to_string()),
            },
        })
        .collect();
    let imported = outcomes.iter().filter(|o| o.student.is_some()).count();
    info!("Bulk import request finished: {} of {} imported", imported, outcomes.len());

    Ok(Json(BulkImportResponse {
        imported,
        rejected: outcomes.len() - imported,
        outcomes,
    }))
}

#[utoipa::path(
    patch,
    path = "/students/{id}",
    params(("id" = String, Path, description = "Internal student id")),
    request_body = StudentPatch,
    responses(
        (status = 200, description = "Student updated", body = Student),
        (status = 404, description = "No such student"),
        (status = 422, description = "Invalid patch")
    ),
    tag = "Students"
)]
pub async fn update_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<StudentPatch>,
) -> Result<Json<Student>, HandlerError> {
    state
        .directory
        .update_student(&id, patch)
        .await
        .map_err(|e| reject("update student", e))?
        .map(Json)
        .ok_or_else(|| not_found("Student", &id))
}

#[utoipa::path(
    delete,
    path = "/students/{id}",
    params(("id" = String, Path, description = "Internal student id")),
    responses(
        (status = 204, description = "Student deleted"),
        (status = 404, description = "No such student")
    ),
    tag = "Students"
)]
pub async fn delete_student_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let removed = state
        .directory
        .delete_student(&id)
        .await
        .map_err(|e| reject("delete student", e))?;
    deleted(removed, "Student", &id)
}

//=========================================================================================
// Teachers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/teachers",
    params(TeacherFilter),
    responses((status = 200, description = "Teachers matching every supplied filter", body = [Teacher])),
    tag = "Teachers"
)]
pub async fn list_teachers_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TeacherFilter>,
) -> Result<Json<Vec<Teacher>>, HandlerError> {
    let teachers = state
        .directory
        .list_teachers(&filter)
        .await
        .map_err(|e| reject("list teachers", e))?;
    Ok(Json(teachers))
}

#[utoipa::path(
    get,
    path = "/teachers/{id}",
    params(("id" = String, Path, description = "Teacher id")),
    responses(
        (status = 200, description = "The teacher", body = Teacher),
        (status = 404, description = "No such teacher")
    ),
    tag = "Teachers"
)]
pub async fn get_teacher_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Teacher>, HandlerError> {
    state
        .directory
        .get_teacher(&id)
        .await
        .map_err(|e| reject("load teacher", e))?
        .map(Json)
        .ok_or_else(|| not_found("Teacher", &id))
}

#[utoipa::path(
    post,
    path = "/teachers",
    request_body = NewTeacher,
    responses(
        (status = 201, description = "Teacher added", body = Teacher),
        (status = 422, description = "Invalid payload or unknown school/class")
    ),
    tag = "Teachers"
)]
pub async fn create_teacher_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewTeacher>,
) -> Result<impl IntoResponse, HandlerError> {
    let teacher = state
        .directory
        .add_teacher(payload)
        .await
        .map_err(|e| reject("add teacher", e))?;
    Ok((StatusCode::CREATED, Json(teacher)))
}

#[utoipa::path(
    patch,
    path = "/teachers/{id}",
    params(("id" = String, Path, description = "Teacher id")),
    request_body = TeacherPatch,
    responses(
        (status = 200, description = "Teacher updated", body = Teacher),
        (status = 404, description = "No such teacher"),
        (status = 422, description = "Invalid patch")
    ),
    tag = "Teachers"
)]
pub async fn update_teacher_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<TeacherPatch>,
) -> Result<Json<Teacher>, HandlerError> {
    state
        .directory
        .update_teacher(&id, patch)
        .await
        .map_err(|e| reject("update teacher", e))?
        .map(Json)
        .ok_or_else(|| not_found("Teacher", &id))
}

#[utoipa::path(
    delete,
    path = "/teachers/{id}",
    params(("id" = String, Path, description = "Teacher id")),
    responses(
        (status = 204, description = "Teacher deleted"),
        (status = 404, description = "No such teacher")
    ),
    tag = "Teachers"
)]
pub async fn delete_teacher_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let removed = state
        .directory
        .delete_teacher(&id)
        .await
        .map_err(|e| reject("delete teacher", e))?;
    deleted(removed, "Teacher", &id)
}

//=========================================================================================
// Classes
//=========================================================================================

#[utoipa::path(
    get,
    path = "/classes",
    params(ClassRoomFilter),
    responses((status = 200, description = "Classes with live student counts", body = [ClassRoom])),
    tag = "Classes"
)]
pub async fn list_classes_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ClassRoomFilter>,
) -> Result<Json<Vec<ClassRoom>>, HandlerError> {
    let classes = state
        .directory
        .list_classes(&filter)
        .await
        .map_err(|e| reject("list classes", e))?;
    Ok(Json(classes))
}

#[utoipa::path(
    get,
    path = "/classes/{id}",
    params(("id" = String, Path, description = "Class id")),
    responses(
        (status = 200, description = "The class", body = ClassRoom),
        (status = 404, description = "No such class")
    ),
    tag = "Classes"
)]
pub async fn get_class_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ClassRoom>, HandlerError> {
    state
        .directory
        .get_class(&id)
        .await
        .map_err(|e| reject("load class", e))?
        .map(Json)
        .ok_or_else(|| not_found("ClassRoom", &id))
}

#[utoipa::path(
    post,
    path = "/classes",
    request_body = NewClassRoom,
    responses(
        (status = 201, description = "Class opened", body = ClassRoom),
        (status = 422, description = "Invalid payload or unknown reference")
    ),
    tag = "Classes"
)]
pub async fn create_class_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewClassRoom>,
) -> Result<impl IntoResponse, HandlerError> {
    let class = state
        .directory
        .add_class(payload)
        .await
        .map_err(|e| reject("add class", e))?;
    Ok((StatusCode::CREATED, Json(class)))
}

#[utoipa::path(
    patch,
    path = "/classes/{id}",
    params(("id" = String, Path, description = "Class id")),
    request_body = ClassRoomPatch,
    responses(
        (status = 200, description = "Class updated", body = ClassRoom),
        (status = 404, description = "No such class"),
        (status = 422, description = "Invalid patch")
    ),
    tag = "Classes"
)]
pub async fn update_class_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ClassRoomPatch>,
) -> Result<Json<ClassRoom>, HandlerError> {
    state
        .directory
        .update_class(&id, patch)
        .await
        .map_err(|e| reject("update class", e))?
        .map(Json)
        .ok_or_else(|| not_found("ClassRoom", &id))
}

#[utoipa::path(
    delete,
    path = "/classes/{id}",
    params(("id" = String, Path, description = "Class id")),
    responses(
        (status = 204, description = "Class deleted"),
        (status = 404, description = "No such class")
    ),
    tag = "Classes"
)]
pub async fn delete_class_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let removed = state
        .directory
        .delete_class(&id)
        .await
        .map_err(|e| reject("delete class", e))?;
    deleted(removed, "ClassRoom", &id)
}

//=========================================================================================
// Subjects
//=========================================================================================

#[utoipa::path(
    get,
    path = "/subjects",
    params(SubjectFilter),
    responses((status = 200, description = "Subjects with computed performance", body = [Subject])),
    tag = "Subjects"
)]
pub async fn list_subjects_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<SubjectFilter>,
) -> Result<Json<Vec<Subject>>, HandlerError> {
    let subjects = state
        .directory
        .list_subjects(&filter)
        .await
        .map_err(|e| reject("list subjects", e))?;
    Ok(Json(subjects))
}

#[utoipa::path(
    get,
    path = "/subjects/{id}",
    params(("id" = String, Path, description = "Subject id")),
    responses(
        (status = 200, description = "The subject", body = Subject),
        (status = 404, description = "No such subject")
    ),
    tag = "Subjects"
)]
pub async fn get_subject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Subject>, HandlerError> {
    state
        .directory
        .get_subject(&id)
        .await
        .map_err(|e| reject("load subject", e))?
        .map(Json)
        .ok_or_else(|| not_found("Subject", &id))
}

#[utoipa::path(
    post,
    path = "/subjects",
    request_body = NewSubject,
    responses(
        (status = 201, description = "Subject added", body = Subject),
        (status = 422, description = "Invalid payload, unknown school or duplicate code")
    ),
    tag = "Subjects"
)]
pub async fn create_subject_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewSubject>,
) -> Result<impl IntoResponse, HandlerError> {
    let subject = state
        .directory
        .add_subject(payload)
        .await
        .map_err(|e| reject("add subject", e))?;
    Ok((StatusCode::CREATED, Json(subject)))
}

#[utoipa::path(
    patch,
    path = "/subjects/{id}",
    params(("id" = String, Path, description = "Subject id")),
    request_body = SubjectPatch,
    responses(
        (status = 200, description = "Subject updated", body = Subject),
        (status = 404, description = "No such subject"),
        (status = 422, description = "Invalid patch")
    ),
    tag = "Subjects"
)]
pub async fn update_subject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<SubjectPatch>,
) -> Result<Json<Subject>, HandlerError> {
    state
        .directory
        .update_subject(&id, patch)
        .await
        .map_err(|e| reject("update subject", e))?
        .map(Json)
        .ok_or_else(|| not_found("Subject", &id))
}

#[utoipa::path(
    delete,
    path = "/subjects/{id}",
    params(("id" = String, Path, description = "Subject id")),
    responses(
        (status = 204, description = "Subject deleted"),
        (status = 404, description = "No such subject")
    ),
    tag = "Subjects"
)]
pub async fn delete_subject_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let removed = state
        .directory
        .delete_subject(&id)
        .await
        .map_err(|e| reject("delete subject", e))?;
    deleted(removed, "Subject", &id)
}

//=========================================================================================
// Results
//=========================================================================================

#[utoipa::path(
    get,
    path = "/results",
    params(ResultFilter),
    responses((status = 200, description = "Result entries matching every supplied filter", body = [ResultEntry])),
    tag = "Results"
)]
pub async fn list_results_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ResultFilter>,
) -> Result<Json<Vec<ResultEntry>>, HandlerError> {
    let results = state
        .directory
        .list_results(&filter)
        .await
        .map_err(|e| reject("list results", e))?;
    Ok(Json(results))
}

#[utoipa::path(
    get,
    path = "/results/{id}",
    params(("id" = String, Path, description = "Result id")),
    responses(
        (status = 200, description = "The result entry", body = ResultEntry),
        (status = 404, description = "No such result")
    ),
    tag = "Results"
)]
pub async fn get_result_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ResultEntry>, HandlerError> {
    state
        .directory
        .get_result(&id)
        .await
        .map_err(|e| reject("load result", e))?
        .map(Json)
        .ok_or_else(|| not_found("Result", &id))
}

#[utoipa::path(
    post,
    path = "/results",
    request_body = NewResult,
    responses(
        (status = 201, description = "Result recorded with its derived grade", body = ResultEntry),
        (status = 422, description = "Scores out of range, unknown reference or duplicate sitting")
    ),
    tag = "Results"
)]
pub async fn create_result_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewResult>,
) -> Result<impl IntoResponse, HandlerError> {
    let result = state
        .directory
        .add_result(payload)
        .await
        .map_err(|e| reject("record result", e))?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[utoipa::path(
    patch,
    path = "/results/{id}",
    params(("id" = String, Path, description = "Result id")),
    request_body = ResultPatch,
    responses(
        (status = 200, description = "Result updated", body = ResultEntry),
        (status = 404, description = "No such result"),
        (status = 422, description = "Invalid patch")
    ),
    tag = "Results"
)]
pub async fn update_result_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<ResultPatch>,
) -> Result<Json<ResultEntry>, HandlerError> {
    state
        .directory
        .update_result(&id, patch)
        .await
        .map_err(|e| reject("update result", e))?
        .map(Json)
        .ok_or_else(|| not_found("Result", &id))
}

#[utoipa::path(
    delete,
    path = "/results/{id}",
    params(("id" = String, Path, description = "Result id")),
    responses(
        (status = 204, description = "Result deleted"),
        (status = 404, description = "No such result")
    ),
    tag = "Results"
)]
pub async fn delete_result_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let removed = state
        .directory
        .delete_result(&id)
        .await
        .map_err(|e| reject("delete result", e))?;
    deleted(removed, "Result", &id)
}

/// Assigns class positions for one subject sitting.
#[utoipa::path(
    post,
    path = "/results/rank",
    request_body = RankRequest,
    responses((status = 200, description = "Number of results ranked", body = RankResponse)),
    tag = "Results"
)]
pub async fn rank_results_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RankRequest>,
) -> Result<Json<RankResponse>, HandlerError> {
    let ranked = state
        .directory
        .rank_results(&req.class_id, &req.subject_id, req.term, &req.session)
        .await
        .map_err(|e| reject("rank results", e))?;
    Ok(Json(RankResponse { ranked }))
}

//=========================================================================================
// Notifications
//=========================================================================================

#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationFilter),
    responses((status = 200, description = "Notifications matching every supplied filter", body = [NotificationItem])),
    tag = "Notifications"
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<NotificationItem>>, HandlerError> {
    let notifications = state
        .directory
        .list_notifications(&filter)
        .await
        .map_err(|e| reject("list notifications", e))?;
    Ok(Json(notifications))
}

/// Scheduled notifications whose send time has passed.
#[utoipa::path(
    get,
    path = "/notifications/due",
    params(DueQuery),
    responses((status = 200, description = "Notifications ready to send", body = [NotificationItem])),
    tag = "Notifications"
)]
pub async fn due_notifications_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DueQuery>,
) -> Result<Json<Vec<NotificationItem>>, HandlerError> {
    let due = state
        .directory
        .due_notifications(query.at.unwrap_or_else(Utc::now))
        .await
        .map_err(|e| reject("list due notifications", e))?;
    Ok(Json(due))
}

#[utoipa::path(
    get,
    path = "/notifications/{id}",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 200, description = "The notification", body = NotificationItem),
        (status = 404, description = "No such notification")
    ),
    tag = "Notifications"
)]
pub async fn get_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NotificationItem>, HandlerError> {
    state
        .directory
        .get_notification(&id)
        .await
        .map_err(|e| reject("load notification", e))?
        .map(Json)
        .ok_or_else(|| not_found("Notification", &id))
}

#[utoipa::path(
    post,
    path = "/notifications",
    request_body = NewNotification,
    responses(
        (status = 201, description = "Notification created", body = NotificationItem),
        (status = 422, description = "Invalid payload or unknown school")
    ),
    tag = "Notifications"
)]
pub async fn create_notification_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewNotification>,
) -> Result<impl IntoResponse, HandlerError> {
    let notification = state
        .directory
        .add_notification(payload)
        .await
        .map_err(|e| reject("create notification", e))?;
    Ok((StatusCode::CREATED, Json(notification)))
}

#[utoipa::path(
    patch,
    path = "/notifications/{id}",
    params(("id" = String, Path, description = "Notification id")),
    request_body = NotificationPatch,
    responses(
        (status = 200, description = "Notification updated", body = NotificationItem),
        (status = 404, description = "No such notification"),
        (status = 422, description = "Invalid patch")
    ),
    tag = "Notifications"
)]
pub async fn update_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<NotificationPatch>,
) -> Result<Json<NotificationItem>, HandlerError> {
    state
        .directory
        .update_notification(&id, patch)
        .await
        .map_err(|e| reject("update notification", e))?
        .map(Json)
        .ok_or_else(|| not_found("Notification", &id))
}

#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    params(("id" = String, Path, description = "Notification id")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "No such notification")
    ),
    tag = "Notifications"
)]
pub async fn delete_notification_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, HandlerError> {
    let removed = state
        .directory
        .delete_notification(&id)
        .await
        .map_err(|e| reject("delete notification", e))?;
    deleted(removed, "Notification", &id)
}
