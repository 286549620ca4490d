//! services/api/src/web/rest.rs
//!
//! Contains the router for the REST API, the shared error mapping for its
//! handlers and the master definition for the OpenAPI specification.

use crate::web::state::AppState;
use crate::web::{directory, reports, results_access};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use school_directory_core::dashboard::AdminDashboard;
use school_directory_core::domain::{
    ActivityEntry, ClassRoom, NotificationItem, ResultEntry, ResultSheet, School, Student,
    Subject, Teacher, TokenRecord,
};
use school_directory_core::ports::PortError;
use school_directory_core::StoreError;
use std::sync::Arc;
use tracing::{debug, error, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        directory::list_schools_handler,
        directory::get_school_handler,
        directory::create_school_handler,
        directory::update_school_handler,
        directory::delete_school_handler,
        directory::list_students_handler,
        directory::get_student_handler,
        directory::get_student_by_public_id_handler,
        directory::create_student_handler,
        directory::bulk_import_students_handler,
        directory::update_student_handler,
        directory::delete_student_handler,
        directory::list_teachers_handler,
        directory::get_teacher_handler,
        directory::create_teacher_handler,
        directory::update_teacher_handler,
        directory::delete_teacher_handler,
        directory::list_classes_handler,
        directory::get_class_handler,
        directory::create_class_handler,
        directory::update_class_handler,
        directory::delete_class_handler,
        directory::list_subjects_handler,
        directory::get_subject_handler,
        directory::create_subject_handler,
        directory::update_subject_handler,
        directory::delete_subject_handler,
        directory::list_results_handler,
        directory::get_result_handler,
        directory::create_result_handler,
        directory::update_result_handler,
        directory::delete_result_handler,
        directory::rank_results_handler,
        directory::list_notifications_handler,
        directory::due_notifications_handler,
        directory::get_notification_handler,
        directory::create_notification_handler,
        directory::update_notification_handler,
        directory::delete_notification_handler,
        results_access::create_token_handler,
        results_access::list_tokens_handler,
        results_access::active_token_handler,
        results_access::increment_attempt_handler,
        results_access::result_check_handler,
        reports::dashboard_handler,
        reports::activity_handler,
    ),
    components(
        schemas(
            School, Student, Teacher, ClassRoom, Subject, ResultEntry, NotificationItem,
            TokenRecord, ResultSheet, ActivityEntry, AdminDashboard,
            directory::BulkImportResponse, directory::RankRequest, directory::RankResponse,
            results_access::CreateTokenRequest, results_access::ResultCheckRequest,
        )
    ),
    tags(
        (name = "Schools", description = "Tenant schools and their live statistics."),
        (name = "Students", description = "Enrolment, lookups by public id and bulk import."),
        (name = "Teachers", description = "Teaching staff."),
        (name = "Classes", description = "Class rooms and their rosters."),
        (name = "Subjects", description = "Subjects and computed performance."),
        (name = "Results", description = "Term results, grading and class ranking."),
        (name = "Notifications", description = "Announcements and scheduled delivery."),
        (name = "Result access", description = "Result-checking tokens and the public result check."),
        (name = "Reports", description = "Admin dashboard and activity feed.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Error half of every handler's return type.
pub type HandlerError = (StatusCode, String);

/// Maps a port failure to a response. `action` completes "Failed to ...".
pub fn reject(action: &str, e: PortError) -> HandlerError {
    match e {
        PortError::Rejected(rejection) => {
            let status = match &rejection {
                StoreError::TokenNotFound(_)
                | StoreError::TokenMismatch(_)
                | StoreError::TokenExhausted(_) => StatusCode::FORBIDDEN,
                StoreError::Validation { .. }
                | StoreError::MissingReference { .. }
                | StoreError::Duplicate { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            };
            warn!("Refused to {}: {}", action, rejection);
            (status, rejection.to_string())
        }
        PortError::Unexpected(msg) => {
            error!("Failed to {}: {}", action, msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to {action}"),
            )
        }
    }
}

pub fn not_found(entity: &str, id: &str) -> HandlerError {
    debug!("{} {} not found", entity, id);
    (StatusCode::NOT_FOUND, format!("{entity} {id} not found"))
}

pub fn deleted(removed: bool, entity: &str, id: &str) -> Result<StatusCode, HandlerError> {
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(entity, id))
    }
}

//=========================================================================================
// Router
//=========================================================================================

/// Every REST route, bound to the shared state. CORS and Swagger UI are
/// layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    use directory::*;
    use reports::*;
    use results_access::*;

    Router::new()
        .route("/schools", get(list_schools_handler).post(create_school_handler))
        .route(
            "/schools/{id}",
            get(get_school_handler)
                .patch(update_school_handler)
                .delete(delete_school_handler),
        )
        .route("/students", get(list_students_handler).post(create_student_handler))
        .route("/students/bulk", post(bulk_import_students_handler))
        .route(
            "/students/by-public-id/{student_id}",
            get(get_student_by_public_id_handler),
        )
        .route(
            "/students/{id}",
            get(get_student_handler)
                .patch(update_student_handler)
                .delete(delete_student_handler),
        )
        .route("/teachers", get(list_teachers_handler).post(create_teacher_handler))
        .route(
            "/teachers/{id}",
            get(get_teacher_handler)
                .patch(update_teacher_handler)
                .delete(delete_teacher_handler),
        )
        .route("/classes", get(list_classes_handler).post(create_class_handler))
        .route(
            "/classes/{id}",
            get(get_class_handler)
                .patch(update_class_handler)
                .delete(delete_class_handler),
        )
        .route("/subjects", get(list_subjects_handler).post(create_subject_handler))
        .route(
            "/subjects/{id}",
            get(get_subject_handler)
                .patch(update_subject_handler)
                .delete(delete_subject_handler),
        )
        .route("/results", get(list_results_handler).post(create_result_handler))
        .route("/results/rank", post(rank_results_handler))
        .route(
            "/results/{id}",
            get(get_result_handler)
                .patch(update_result_handler)
                .delete(delete_result_handler),
        )
        .route(
            "/notifications",
            get(list_notifications_handler).post(create_notification_handler),
        )
        .route("/notifications/due", get(due_notifications_handler))
        .route(
            "/notifications/{id}",
            get(get_notification_handler)
                .patch(update_notification_handler)
                .delete(delete_notification_handler),
        )
        .route("/tokens", get(list_tokens_handler).post(create_token_handler))
        .route("/tokens/active/{student_id}", get(active_token_handler))
        .route("/tokens/{id}/attempts", post(increment_attempt_handler))
        .route("/result-check", post(result_check_handler))
        .route("/dashboard", get(dashboard_handler))
        .route("/activity", get(activity_handler))
        .with_state(state)
}
