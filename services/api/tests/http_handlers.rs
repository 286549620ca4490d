use std::sync::Arc;

use api_lib::adapters::MemoryDirectory;
use api_lib::web::directory::{
    bulk_import_students_handler, create_result_handler, create_school_handler,
    delete_student_handler, get_school_handler, get_student_by_public_id_handler,
    list_classes_handler, list_schools_handler, list_students_handler, list_subjects_handler,
    list_teachers_handler, update_school_handler,
};
use api_lib::web::reports::{activity_handler, dashboard_handler, ActivityQuery, DashboardQuery};
use api_lib::web::rest::reject;
use api_lib::web::results_access::{
    active_token_handler, create_token_handler, result_check_handler, CreateTokenRequest,
    ResultCheckRequest,
};
use api_lib::web::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use school_directory_core::domain::{
    ClassRoomFilter, NewResult, NewSchool, NewStudent, SchoolFilter, SchoolPatch, StudentFilter,
    SubjectFilter, TeacherFilter, Term,
};
use school_directory_core::ports::PortError;
use school_directory_core::{seed, DirectoryStore, StoreSettings};
use serde_json::{json, Value};

fn state_with(store: DirectoryStore) -> Arc<AppState> {
    Arc::new(AppState {
        directory: Arc::new(MemoryDirectory::new(store)),
    })
}

fn demo_state() -> Arc<AppState> {
    state_with(seed::demo_store(StoreSettings::default()).expect("demo data"))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn new_school() -> NewSchool {
    serde_json::from_value(json!({
        "name": "Northwind Academy",
        "brand": "Contoso",
        "contact": {"email": "office@northwind.test", "phone": "0800", "address": "2 Hill Rd"},
        "plan": "Premium",
        "maxStudents": 250,
        "billing": {"amount": 900.0, "cycle": "Termly", "status": "Trial"}
    }))
    .expect("school payload")
}

fn new_student(school_id: &str, class_id: &str, first_name: &str) -> NewStudent {
    serde_json::from_value(json!({
        "firstName": first_name,
        "lastName": "Okafor",
        "schoolId": school_id,
        "classId": class_id,
        "primaryGuardian": {"name": "Chi Okafor", "relationship": "Father", "phone": "0803"}
    }))
    .expect("student payload")
}

#[tokio::test]
async fn created_school_is_returned_with_201_and_fetchable() {
    let state = state_with(DirectoryStore::default());

    let response = create_school_handler(State(state.clone()), Json(new_school()))
        .await
        .expect("created")
        .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Northwind Academy");
    assert_eq!(body["active"], true);
    assert_eq!(body["currentStudentCount"], 0);

    let id = body["id"].as_str().expect("id").to_string();
    let Json(school) = get_school_handler(State(state.clone()), Path(id.clone()))
        .await
        .expect("found");
    assert_eq!(school.id, id);
    assert_eq!(school.max_students, 250);
}

#[tokio::test]
async fn unknown_ids_map_to_404() {
    let state = demo_state();

    let (status, _) = get_school_handler(State(state.clone()), Path("nope".to_string()))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let patch = SchoolPatch {
        name: Some("Renamed".to_string()),
        ..SchoolPatch::default()
    };
    let (status, _) = update_school_handler(State(state.clone()), Path("nope".to_string()), Json(patch))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = delete_student_handler(State(state), Path("nope".to_string()))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_student_returns_204_and_updates_the_school() {
    let state = demo_state();
    let Json(schools) = list_schools_handler(State(state.clone()), Query(SchoolFilter::default()))
        .await
        .expect("schools");
    let school = &schools[0];
    let Json(students) = list_students_handler(
        State(state.clone()),
        Query(StudentFilter {
            school_id: Some(school.id.clone()),
            ..StudentFilter::default()
        }),
    )
    .await
    .expect("students");

    let status = delete_student_handler(State(state.clone()), Path(students[0].id.clone()))
        .await
        .expect("deleted");
    assert_eq!(status, StatusCode::NO_CONTENT);

    let Json(after) = get_school_handler(State(state), Path(school.id.clone()))
        .await
        .expect("school");
    assert_eq!(after.current_student_count, school.current_student_count - 1);
    assert_eq!(after.stats.students, school.stats.students - 1);
}

#[tokio::test]
async fn rejected_payloads_map_to_422() {
    let state = demo_state();
    let Json(students) = list_students_handler(State(state.clone()), Query(StudentFilter::default()))
        .await
        .expect("students");
    let Json(subjects) = list_subjects_handler(
        State(state.clone()),
        Query(SubjectFilter {
            school_id: Some(students[0].school_id.clone()),
            ..SubjectFilter::default()
        }),
    )
    .await
    .expect("subjects");
    let Json(teachers) = list_teachers_handler(State(state.clone()), Query(TeacherFilter::default()))
        .await
        .expect("teachers");

    let payload = NewResult {
        student_id: students[0].id.clone(),
        subject_id: subjects[0].id.clone(),
        teacher_id: teachers[0].id.clone(),
        term: Term::Term2,
        session: seed::DEMO_SESSION.to_string(),
        ca: 55.0,
        exam: 30.0,
        total: None,
        published: false,
        remarks: None,
        skills: Default::default(),
    };
    let (status, message) = create_result_handler(State(state.clone()), Json(payload))
        .await
        .map(|_| ())
        .unwrap_err();
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(message.contains("ca"), "unexpected message: {message}");

    let (status, _) = create_school_handler(
        State(state),
        Json(NewSchool {
            name: "   ".to_string(),
            ..new_school()
        }),
    )
    .await
    .map(|_| ())
    .unwrap_err();
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bulk_import_reports_each_item() {
    let state = demo_state();
    let Json(classes) = list_classes_handler(State(state.clone()), Query(ClassRoomFilter::default()))
        .await
        .expect("classes");
    let class = &classes[0];

    let Json(report) = bulk_import_students_handler(
        State(state.clone()),
        Json(vec![
            new_student(&class.school_id, &class.id, "Amaka"),
            new_student(&class.school_id, "missing-class", "Bayo"),
            new_student(&class.school_id, &class.id, "Chidi"),
        ]),
    )
    .await
    .expect("report");

    assert_eq!(report.imported, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.outcomes.len(), 3);
    assert!(report.outcomes[0].student.is_some());
    assert!(report.outcomes[1].error.is_some());
    assert_eq!(report.outcomes[2].index, 2);

    let public_id = report.outcomes[2]
        .student
        .as_ref()
        .map(|s| s.student_id.clone())
        .expect("imported student");
    let Json(found) = get_student_by_public_id_handler(State(state), Path(public_id.clone()))
        .await
        .expect("lookup by public id");
    assert_eq!(found.first_name, "Chidi");
    assert_eq!(found.student_id, public_id);
}

#[tokio::test]
async fn result_check_spends_attempts_until_the_token_is_exhausted() {
    let state = demo_state();
    let Json(students) = list_students_handler(State(state.clone()), Query(StudentFilter::default()))
        .await
        .expect("students");
    let public_id = students[0].student_id.clone();

    let response = create_token_handler(
        State(state.clone()),
        Json(CreateTokenRequest {
            student_id: public_id.clone(),
        }),
    )
    .await
    .expect("token")
    .into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = body_json(response).await["token"]
        .as_str()
        .expect("token text")
        .to_string();

    let check = |token: &str| ResultCheckRequest {
        student_id: public_id.clone(),
        token: token.to_string(),
        term: Some(Term::Term1),
        session: None,
    };

    let Json(sheet) = result_check_handler(State(state.clone()), Json(check(&token)))
        .await
        .expect("results");
    assert_eq!(sheet.attempts_remaining, 2);
    assert_eq!(sheet.results.len(), 3);
    assert!(sheet.results.iter().all(|r| r.published && r.term == Term::Term1));

    let (status, _) = result_check_handler(State(state.clone()), Json(check("0000-0000-0000")))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);

    result_check_handler(State(state.clone()), Json(check(&token)))
        .await
        .expect("last attempt");
    let (status, message) = result_check_handler(State(state.clone()), Json(check(&token)))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(message.contains(&public_id));

    let (status, _) = active_token_handler(State(state), Path(public_id))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_and_activity_follow_the_directory() {
    let state = demo_state();
    let Json(schools) = list_schools_handler(State(state.clone()), Query(SchoolFilter::default()))
        .await
        .expect("schools");

    let Json(all) = dashboard_handler(State(state.clone()), Query(DashboardQuery { school_id: None }))
        .await
        .expect("dashboard");
    assert_eq!(all.totals.schools, schools.len() as u32);

    let Json(one) = dashboard_handler(
        State(state.clone()),
        Query(DashboardQuery {
            school_id: Some(schools[0].id.clone()),
        }),
    )
    .await
    .expect("scoped dashboard");
    assert_eq!(one.totals.schools, 1);
    assert_eq!(one.totals.students, schools[0].stats.students);

    create_school_handler(State(state.clone()), Json(new_school()))
        .await
        .expect("created");
    let Json(activity) = activity_handler(State(state), Query(ActivityQuery { limit: Some(1) }))
        .await
        .expect("activity");
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].entity, "School");
}

#[test]
fn unexpected_port_errors_map_to_500_without_details() {
    let (status, message) = reject(
        "list schools",
        PortError::Unexpected("connection refused".to_string()),
    );
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(message, "Failed to list schools");
}
