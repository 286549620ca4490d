//! Runs against a real PostgreSQL server. Each test works in its own scratch
//! schema, dropped at the end.
//!
//! `TEST_DATABASE_URL=postgres://... cargo test -p api --test postgres_adapter -- --ignored`

use api_lib::adapters::DbAdapter;
use school_directory_core::domain::{ActivityKind, NewClassRoom, NewSchool, NewStudent};
use school_directory_core::ports::{DirectoryService, PortError};
use school_directory_core::StoreSettings;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

struct Scratch {
    admin: PgPool,
    pool: PgPool,
    schema: String,
    adapter: DbAdapter,
}

impl Scratch {
    async fn new() -> Self {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL");
        let schema = format!("directory_test_{}", Uuid::new_v4().simple());
        let admin = PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .expect("connect");
        admin
            .execute(format!("CREATE SCHEMA {schema}").as_str())
            .await
            .expect("create schema");

        let search_path = format!("SET search_path TO {schema}");
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let search_path = search_path.clone();
                Box::pin(async move {
                    conn.execute(search_path.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await
            .expect("connect to scratch schema");
        let adapter = DbAdapter::new(pool.clone(), StoreSettings::default());
        adapter.run_migrations().await.expect("migrations");
        Self {
            admin,
            pool,
            schema,
            adapter,
        }
    }

    async fn teardown(self) {
        self.pool.close().await;
        self.admin
            .execute(format!("DROP SCHEMA {} CASCADE", self.schema).as_str())
            .await
            .expect("drop schema");
    }

    /// Makes every `Deleted` activity insert fail until `allow_deletion_entries`.
    async fn refuse_deletion_entries(&self) {
        self.pool
            .execute("ALTER TABLE activity_log ADD CONSTRAINT refuse_deleted CHECK (kind <> 'Deleted')")
            .await
            .expect("add constraint");
    }

    async fn allow_deletion_entries(&self) {
        self.pool
            .execute("ALTER TABLE activity_log DROP CONSTRAINT refuse_deleted")
            .await
            .expect("drop constraint");
    }
}

fn new_school() -> NewSchool {
    serde_json::from_value(json!({
        "name": "Harbour College",
        "brand": "Acme",
        "contact": {"email": "office@harbour.test", "phone": "0800", "address": "3 Quay St"},
        "plan": "Standard",
        "maxStudents": 100,
        "billing": {"amount": 120.0, "cycle": "Monthly", "status": "Active"}
    }))
    .expect("school payload")
}

fn new_class(school_id: &str) -> NewClassRoom {
    NewClassRoom {
        name: "JSS 2A".to_string(),
        level: "JSS 2".to_string(),
        school_id: school_id.to_string(),
        teacher_id: None,
        subject_ids: Vec::new(),
        capacity: 25,
    }
}

fn new_student(school_id: &str, class_id: &str) -> NewStudent {
    serde_json::from_value(json!({
        "firstName": "Ngozi",
        "lastName": "Eze",
        "schoolId": school_id,
        "classId": class_id,
        "primaryGuardian": {"name": "Obi Eze", "relationship": "Father", "phone": "0805"}
    }))
    .expect("student payload")
}

#[tokio::test]
#[ignore = "needs a PostgreSQL server in TEST_DATABASE_URL"]
async fn a_failed_activity_entry_rolls_the_delete_back() {
    let scratch = Scratch::new().await;
    let directory = &scratch.adapter;
    let school = directory.add_school(new_school()).await.expect("school");
    let class = directory.add_class(new_class(&school.id)).await.expect("class");
    let student = directory
        .add_student(new_student(&school.id, &class.id))
        .await
        .expect("student");

    scratch.refuse_deletion_entries().await;
    let err = directory.delete_student(&student.id).await.unwrap_err();
    assert!(matches!(err, PortError::Unexpected(_)));
    assert!(directory.get_student(&student.id).await.expect("read").is_some());
    let err = directory.delete_school(&school.id).await.unwrap_err();
    assert!(matches!(err, PortError::Unexpected(_)));
    assert!(directory.get_school(&school.id).await.expect("read").is_some());

    scratch.allow_deletion_entries().await;
    assert!(directory.delete_student(&student.id).await.expect("delete"));
    assert!(directory.get_student(&student.id).await.expect("read").is_none());
    let latest = directory.list_activity(Some(1)).await.expect("activity");
    assert_eq!(latest[0].kind, ActivityKind::Deleted);
    assert_eq!(latest[0].entity_id, student.id);

    scratch.teardown().await;
}

#[tokio::test]
#[ignore = "needs a PostgreSQL server in TEST_DATABASE_URL"]
async fn deleting_a_missing_row_logs_nothing() {
    let scratch = Scratch::new().await;
    let directory = &scratch.adapter;
    directory.add_school(new_school()).await.expect("school");
    let before = directory.list_activity(None).await.expect("activity").len();

    assert!(!directory.delete_class("no-such-class").await.expect("delete"));
    assert!(!directory.delete_school("no-such-school").await.expect("delete"));
    assert_eq!(directory.list_activity(None).await.expect("activity").len(), before);

    scratch.teardown().await;
}
