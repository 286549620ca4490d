use chrono::{Duration, Utc};
use school_directory_core::domain::{
    ActivityKind, Billing, BillingCycle, BillingStatus, Brand, ClassRoomFilter, ClassRoomPatch,
    ContactInfo, Guardian, NewClassRoom, NewNotification, NewResult, NewSchool, NewStudent,
    NewSubject, NewTeacher, NotificationChannel, NotificationFilter, NotificationStatus,
    PerformanceLevel, PlanTier, Priority, ResultFilter, ResultPatch, SchoolFilter, SchoolSettings,
    StudentFilter, StudentPatch, SubjectFilter, TeacherFilter, Term, Audience, DeliveryMetrics,
    TeacherPerformance,
};
use school_directory_core::{DirectoryStore, StoreError, StoreSettings};

const SESSION: &str = "2024/2025";

fn school(name: &str, brand: Brand) -> NewSchool {
    NewSchool {
        name: name.to_string(),
        brand,
        contact: ContactInfo {
            email: format!("office@{}.test", name.to_lowercase().replace(' ', "-")),
            phone: "0800 000 0000".to_string(),
            address: "1 School Lane".to_string(),
        },
        active: true,
        plan: PlanTier::Standard,
        max_students: 500,
        billing: Billing {
            amount: 300.0,
            cycle: BillingCycle::Monthly,
            status: BillingStatus::Active,
        },
        settings: SchoolSettings::default(),
    }
}

fn class(name: &str, school_id: &str) -> NewClassRoom {
    NewClassRoom {
        name: name.to_string(),
        level: "JSS 1".to_string(),
        school_id: school_id.to_string(),
        teacher_id: None,
        subject_ids: Vec::new(),
        capacity: 30,
    }
}

fn student(first: &str, school_id: &str, class_id: &str) -> NewStudent {
    NewStudent {
        student_id: None,
        first_name: first.to_string(),
        last_name: "Doe".to_string(),
        email: None,
        phone: None,
        date_of_birth: None,
        address: None,
        school_id: school_id.to_string(),
        class_id: class_id.to_string(),
        primary_guardian: Guardian {
            name: "Jane Doe".to_string(),
            relationship: "Mother".to_string(),
            phone: "0801 111 2222".to_string(),
            email: None,
        },
        secondary_guardian: None,
        active: true,
        current_gpa: 3.6,
        medical: None,
        documents: Vec::new(),
    }
}

fn teacher(school_id: &str) -> NewTeacher {
    NewTeacher {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@school.test".to_string(),
        phone: None,
        school_id: school_id.to_string(),
        subjects: vec!["Mathematics".to_string()],
        class_ids: Vec::new(),
        active: true,
        performance: TeacherPerformance::default(),
    }
}

fn result(student_id: &str, subject_id: &str, teacher_id: &str, ca: f64, exam: f64) -> NewResult {
    NewResult {
        student_id: student_id.to_string(),
        subject_id: subject_id.to_string(),
        teacher_id: teacher_id.to_string(),
        term: Term::Term1,
        session: SESSION.to_string(),
        ca,
        exam,
        total: None,
        published: true,
        remarks: None,
        skills: Default::default(),
    }
}

/// One school with one class, one teacher and one subject.
struct Fixture {
    store: DirectoryStore,
    school_id: String,
    class_id: String,
    teacher_id: String,
    subject_id: String,
}

fn fixture(settings: StoreSettings) -> Fixture {
    let mut store = DirectoryStore::new(settings);
    let school_id = store.add_school(school("Acme High", Brand::Acme)).unwrap().id;
    let class_id = store.add_class(class("JSS 1A", &school_id)).unwrap().id;
    let teacher_id = store.add_teacher(teacher(&school_id)).unwrap().id;
    let subject_id = store
        .add_subject(NewSubject {
            code: "mth".to_string(),
            name: "Mathematics".to_string(),
            school_id: school_id.clone(),
            teacher_ids: vec![teacher_id.clone()],
        })
        .unwrap()
        .id;
    Fixture {
        store,
        school_id,
        class_id,
        teacher_id,
        subject_id,
    }
}

// --- Counters ---

#[test]
fn adding_a_student_moves_school_and_class_counters_by_one() {
    let mut f = fixture(StoreSettings::default());
    let before_school = f.store.get_school(&f.school_id).unwrap();
    let before_class = f.store.get_class(&f.class_id).unwrap();

    f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();

    let school = f.store.get_school(&f.school_id).unwrap();
    let class = f.store.get_class(&f.class_id).unwrap();
    assert_eq!(school.stats.students, before_school.stats.students + 1);
    assert_eq!(school.current_student_count, school.stats.students);
    assert_eq!(class.student_count, before_class.student_count + 1);
}

#[test]
fn add_then_delete_restores_counters() {
    let mut f = fixture(StoreSettings::default());
    f.store.add_student(student("Kept", &f.school_id, &f.class_id)).unwrap();
    let school_before = f.store.get_school(&f.school_id).unwrap().stats;
    let class_before = f.store.get_class(&f.class_id).unwrap().student_count;

    for name in ["One", "Two", "Three"] {
        let added = f.store.add_student(student(name, &f.school_id, &f.class_id)).unwrap();
        assert!(f.store.delete_student(&added.id));
    }

    assert_eq!(f.store.get_school(&f.school_id).unwrap().stats, school_before);
    assert_eq!(f.store.get_class(&f.class_id).unwrap().student_count, class_before);
}

#[test]
fn deleting_an_unknown_student_is_a_no_op() {
    let mut f = fixture(StoreSettings::default());
    f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();
    let school_before = f.store.get_school(&f.school_id).unwrap();
    let class_before = f.store.get_class(&f.class_id).unwrap();

    assert!(!f.store.delete_student("no-such-student"));

    assert_eq!(f.store.get_school(&f.school_id).unwrap().stats, school_before.stats);
    assert_eq!(f.store.get_class(&f.class_id).unwrap(), class_before);
}

#[test]
fn moving_a_student_between_classes_moves_the_counts() {
    let mut f = fixture(StoreSettings::default());
    let other = f.store.add_class(class("JSS 1B", &f.school_id)).unwrap();
    let sam = f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();

    f.store
        .update_student(
            &sam.id,
            StudentPatch {
                class_id: Some(other.id.clone()),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

    assert_eq!(f.store.get_class(&f.class_id).unwrap().student_count, 0);
    assert_eq!(f.store.get_class(&other.id).unwrap().student_count, 1);
    assert_eq!(f.store.get_school(&f.school_id).unwrap().stats.students, 1);
}

#[test]
fn subject_performance_and_school_average_follow_results() {
    let mut f = fixture(StoreSettings::default());
    let a = f.store.add_student(student("A", &f.school_id, &f.class_id)).unwrap();
    let b = f.store.add_student(student("B", &f.school_id, &f.class_id)).unwrap();
    f.store.add_result(result(&a.id, &f.subject_id, &f.teacher_id, 30.0, 50.0)).unwrap();
    f.store.add_result(result(&b.id, &f.subject_id, &f.teacher_id, 10.0, 20.0)).unwrap();

    let subject = f.store.get_subject(&f.subject_id).unwrap();
    assert_eq!(subject.code, "MTH");
    assert_eq!(subject.performance.average_ca, 20.0);
    assert_eq!(subject.performance.average_exam, 35.0);
    assert_eq!(subject.performance.pass_rate, 50.0);
    assert_eq!(f.store.get_school(&f.school_id).unwrap().stats.average_performance, 55.0);
}

// --- Filters ---

#[test]
fn listing_by_school_keeps_insertion_order() {
    let mut store = DirectoryStore::new(StoreSettings::default());
    let first = store.add_school(school("Acme High", Brand::Acme)).unwrap();
    let second = store.add_school(school("Contoso Academy", Brand::Contoso)).unwrap();
    let first_class = store.add_class(class("A", &first.id)).unwrap();
    let second_class = store.add_class(class("B", &second.id)).unwrap();

    let mut expected = Vec::new();
    for (i, name) in ["Ann", "Ben", "Cal", "Dee", "Eve"].into_iter().enumerate() {
        let (school_id, class_id) = if i % 2 == 0 {
            (&first.id, &first_class.id)
        } else {
            (&second.id, &second_class.id)
        };
        let added = store.add_student(student(name, school_id, class_id)).unwrap();
        if school_id == &first.id {
            expected.push(added.id);
        }
    }

    let listed: Vec<String> = store
        .list_students(&StudentFilter {
            school_id: Some(first.id.clone()),
            ..Default::default()
        })
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(listed, expected);
}

#[test]
fn filters_are_conjunctive() {
    let mut f = fixture(StoreSettings::default());
    let other_class = f.store.add_class(class("JSS 1B", &f.school_id)).unwrap();
    f.store.add_student(student("Amaka", &f.school_id, &f.class_id)).unwrap();
    f.store.add_student(student("Amaka", &f.school_id, &other_class.id)).unwrap();
    let mut inactive = student("Bola", &f.school_id, &f.class_id);
    inactive.active = false;
    f.store.add_student(inactive).unwrap();

    let combined = StudentFilter {
        class_id: Some(f.class_id.clone()),
        search: Some("amaka".to_string()),
        active: Some(true),
        ..Default::default()
    };
    let everything = f.store.list_students(&StudentFilter::default());
    let narrowed: Vec<_> = everything
        .iter()
        .filter(|s| s.class_id == f.class_id)
        .filter(|s| s.active)
        .filter(|s| s.first_name.to_lowercase().contains("amaka"))
        .cloned()
        .collect();

    let listed = f.store.list_students(&combined);
    assert_eq!(listed, narrowed);
    assert_eq!(listed.len(), 1);
}

#[test]
fn result_filter_by_class_goes_through_the_roster() {
    let mut f = fixture(StoreSettings::default());
    let other_class = f.store.add_class(class("JSS 1B", &f.school_id)).unwrap();
    let inside = f.store.add_student(student("In", &f.school_id, &f.class_id)).unwrap();
    let outside = f.store.add_student(student("Out", &f.school_id, &other_class.id)).unwrap();
    f.store.add_result(result(&inside.id, &f.subject_id, &f.teacher_id, 20.0, 30.0)).unwrap();
    f.store.add_result(result(&outside.id, &f.subject_id, &f.teacher_id, 20.0, 30.0)).unwrap();

    let listed = f.store.list_results(&ResultFilter {
        class_id: Some(f.class_id.clone()),
        ..Default::default()
    });
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].student_id, inside.id);
}

#[test]
fn teacher_filter_matches_class_and_subject_name() {
    let mut f = fixture(StoreSettings::default());
    let mut form_teacher = teacher(&f.school_id);
    form_teacher.first_name = "Grace".to_string();
    form_teacher.last_name = "Hopper".to_string();
    form_teacher.email = "grace@school.test".to_string();
    form_teacher.subjects = vec!["Basic Science".to_string()];
    form_teacher.class_ids = vec![f.class_id.clone()];
    let grace = f.store.add_teacher(form_teacher).unwrap();
    let mut retired = teacher(&f.school_id);
    retired.subjects = vec!["Basic Science".to_string()];
    retired.class_ids = vec![f.class_id.clone()];
    retired.active = false;
    f.store.add_teacher(retired).unwrap();

    let listed = f.store.list_teachers(&TeacherFilter {
        class_id: Some(f.class_id.clone()),
        subject: Some(" basic science ".to_string()),
        active: Some(true),
        ..Default::default()
    });
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, grace.id);

    let by_email = f.store.list_teachers(&TeacherFilter {
        search: Some("GRACE@".to_string()),
        ..Default::default()
    });
    assert_eq!(by_email.len(), 1);
    assert!(f
        .store
        .list_teachers(&TeacherFilter {
            class_id: Some("no-such-class".to_string()),
            ..Default::default()
        })
        .is_empty());
}

#[test]
fn class_filter_matches_level_and_form_teacher() {
    let mut f = fixture(StoreSettings::default());
    let mut senior = class("SS 2 Gold", &f.school_id);
    senior.level = "SS 2".to_string();
    senior.teacher_id = Some(f.teacher_id.clone());
    let gold = f.store.add_class(senior).unwrap();
    let mut untaught = class("SS 2 Blue", &f.school_id);
    untaught.level = "SS 2".to_string();
    f.store.add_class(untaught).unwrap();

    let level_only = f.store.list_classes(&ClassRoomFilter {
        level: Some("ss 2".to_string()),
        ..Default::default()
    });
    assert_eq!(level_only.len(), 2);

    let listed = f.store.list_classes(&ClassRoomFilter {
        level: Some("SS 2".to_string()),
        teacher_id: Some(f.teacher_id.clone()),
        search: Some("gold".to_string()),
        ..Default::default()
    });
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, gold.id);
}

#[test]
fn subject_filter_matches_teacher_and_code() {
    let mut f = fixture(StoreSettings::default());
    f.store
        .add_subject(NewSubject {
            code: "eng".to_string(),
            name: "English Language".to_string(),
            school_id: f.school_id.clone(),
            teacher_ids: Vec::new(),
        })
        .unwrap();

    let by_code = f.store.list_subjects(&SubjectFilter {
        search: Some("MTH".to_string()),
        ..Default::default()
    });
    assert_eq!(by_code.len(), 1);
    assert_eq!(by_code[0].id, f.subject_id);

    let taught = f.store.list_subjects(&SubjectFilter {
        school_id: Some(f.school_id.clone()),
        teacher_id: Some(f.teacher_id.clone()),
        ..Default::default()
    });
    assert_eq!(taught.len(), 1);
    assert_eq!(taught[0].code, "MTH");
    assert!(f
        .store
        .list_subjects(&SubjectFilter {
            teacher_id: Some(f.teacher_id.clone()),
            search: Some("english".to_string()),
            ..Default::default()
        })
        .is_empty());
}

#[test]
fn notification_filter_matches_every_key() {
    let mut f = fixture(StoreSettings::default());
    let notice = |title: &str, audience, channel, priority| NewNotification {
        school_id: f.school_id.clone(),
        title: title.to_string(),
        message: "Fees are due before the end of term.".to_string(),
        audience,
        channel,
        status: NotificationStatus::Draft,
        priority,
        scheduled_for: None,
        metrics: DeliveryMetrics::default(),
    };
    let fees = f
        .store
        .add_notification(notice("Fees reminder", Audience::Parent, NotificationChannel::Sms, Priority::High))
        .unwrap();
    f.store
        .add_notification(notice("Fees reminder", Audience::Parent, NotificationChannel::Email, Priority::High))
        .unwrap();
    f.store
        .add_notification(notice("Staff meeting", Audience::Teacher, NotificationChannel::Sms, Priority::High))
        .unwrap();
    f.store
        .add_notification(notice("Fees reminder", Audience::Parent, NotificationChannel::Sms, Priority::Low))
        .unwrap();

    let listed = f.store.list_notifications(&NotificationFilter {
        audience: Some(Audience::Parent),
        channel: Some(NotificationChannel::Sms),
        status: Some(NotificationStatus::Draft),
        priority: Some(Priority::High),
        search: Some("FEES".to_string()),
        ..Default::default()
    });
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, fees.id);

    let by_message = f.store.list_notifications(&NotificationFilter {
        search: Some("end of term".to_string()),
        ..Default::default()
    });
    assert_eq!(by_message.len(), 4);
    assert!(f
        .store
        .list_notifications(&NotificationFilter {
            status: Some(NotificationStatus::Sent),
            ..Default::default()
        })
        .is_empty());
}

#[test]
fn get_does_not_mutate() {
    let mut f = fixture(StoreSettings::default());
    let sam = f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();
    let activity_before = f.store.list_activity(None).len();

    assert_eq!(f.store.get_student(&sam.id), f.store.get_student(&sam.id));
    assert_eq!(f.store.get_school(&f.school_id), f.store.get_school(&f.school_id));
    assert_eq!(f.store.list_activity(None).len(), activity_before);
}

// --- Updates ---

#[test]
fn update_merges_shallowly_and_clears_with_null() {
    let mut f = fixture(StoreSettings::default());
    let mut payload = student("Sam", &f.school_id, &f.class_id);
    payload.email = Some("sam@home.test".to_string());
    payload.phone = Some("0809".to_string());
    let sam = f.store.add_student(payload).unwrap();

    let updated = f
        .store
        .update_student(
            &sam.id,
            StudentPatch {
                email: Some(None),
                current_gpa: Some(4.8),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();

    assert_eq!(updated.email, None);
    assert_eq!(updated.phone.as_deref(), Some("0809"));
    assert_eq!(updated.first_name, "Sam");
    assert_eq!(updated.performance_level, PerformanceLevel::Excellent);
    assert_eq!(updated.student_id, sam.student_id);
}

#[test]
fn update_of_unknown_id_is_absent() {
    let mut f = fixture(StoreSettings::default());
    let outcome = f.store.update_student("missing", StudentPatch::default()).unwrap();
    assert!(outcome.is_none());
    let outcome = f.store.update_class("missing", ClassRoomPatch::default()).unwrap();
    assert!(outcome.is_none());
}

#[test]
fn rejected_update_leaves_the_record_untouched() {
    let mut f = fixture(StoreSettings::default());
    let sam = f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();
    let err = f
        .store
        .update_student(
            &sam.id,
            StudentPatch {
                first_name: Some("Samuel".to_string()),
                class_id: Some("ghost".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingReference { entity: "ClassRoom", .. }));
    assert_eq!(f.store.get_student(&sam.id).unwrap().first_name, "Sam");
}

// --- Referential checks ---

#[test]
fn strict_mode_rejects_dangling_references() {
    let mut f = fixture(StoreSettings::default());
    let err = f.store.add_student(student("Sam", &f.school_id, "ghost")).unwrap_err();
    assert_eq!(err, StoreError::missing("ClassRoom", "ghost"));

    let other = f.store.add_school(school("Globex", Brand::Globex)).unwrap();
    let err = f.store.add_student(student("Sam", &other.id, &f.class_id)).unwrap_err();
    assert!(matches!(err, StoreError::Validation { field: "classId", .. }));
}

#[test]
fn lenient_mode_keeps_dangling_references_out_of_counters() {
    let settings = StoreSettings {
        referential_checks: false,
        ..Default::default()
    };
    let mut f = fixture(settings);
    let orphan = f.store.add_student(student("Sam", &f.school_id, "ghost")).unwrap();
    assert_eq!(orphan.class_id, "ghost");
    assert_eq!(f.store.get_class(&f.class_id).unwrap().student_count, 0);
    assert_eq!(f.store.get_school(&f.school_id).unwrap().stats.students, 1);
}

#[test]
fn public_ids_are_sequential_and_unique() {
    let mut f = fixture(StoreSettings::default());
    let first = f.store.add_student(student("A", &f.school_id, &f.class_id)).unwrap();
    let second = f.store.add_student(student("B", &f.school_id, &f.class_id)).unwrap();
    assert_eq!(first.student_id, "STU-1001");
    assert_eq!(second.student_id, "STU-1002");

    let mut clash = student("C", &f.school_id, &f.class_id);
    clash.student_id = Some("STU-1001".to_string());
    let err = f.store.add_student(clash).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate { field: "studentId", .. }));
    assert_eq!(
        f.store.get_student_by_public_id("STU-1002").map(|s| s.id),
        Some(second.id)
    );
}

#[test]
fn auto_assignment_refuses_to_wrap_past_the_largest_public_id() {
    let mut f = fixture(StoreSettings::default());
    let mut last = student("Max", &f.school_id, &f.class_id);
    last.student_id = Some("STU-4294967295".to_string());
    f.store.add_student(last).unwrap();

    let err = f
        .store
        .add_student(student("Next", &f.school_id, &f.class_id))
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation { field: "studentId", .. }));
    assert_eq!(f.store.list_students(&StudentFilter::default()).len(), 1);
    assert!(f.store.get_student_by_public_id("STU-0").is_none());
}

#[test]
fn sessions_with_an_overflowing_start_year_are_rejected() {
    let mut f = fixture(StoreSettings::default());
    let sam = f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();
    let mut payload = result(&sam.id, &f.subject_id, &f.teacher_id, 20.0, 30.0);
    payload.session = "4294967295/0".to_string();
    assert!(matches!(
        f.store.add_result(payload).unwrap_err(),
        StoreError::Validation { field: "session", .. }
    ));
}

#[test]
fn bulk_import_reports_each_item() {
    let mut f = fixture(StoreSettings::default());
    let outcomes = f.store.bulk_import_students(vec![
        student("A", &f.school_id, &f.class_id),
        student("B", &f.school_id, "ghost"),
        student("C", &f.school_id, &f.class_id),
    ]);
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert!(outcomes[1].is_err());
    assert!(outcomes[2].is_ok());
    assert_eq!(f.store.get_class(&f.class_id).unwrap().student_count, 2);
    assert_eq!(f.store.list_activity(Some(1))[0].kind, ActivityKind::Imported);
}

// --- Results ---

#[test]
fn results_validate_scores_and_derive_grades() {
    let mut f = fixture(StoreSettings::default());
    let sam = f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();

    let mut wrong_total = result(&sam.id, &f.subject_id, &f.teacher_id, 20.0, 30.0);
    wrong_total.total = Some(60.0);
    assert!(matches!(
        f.store.add_result(wrong_total).unwrap_err(),
        StoreError::Validation { field: "total", .. }
    ));
    assert!(f.store.add_result(result(&sam.id, &f.subject_id, &f.teacher_id, 41.0, 30.0)).is_err());

    let entry = f.store.add_result(result(&sam.id, &f.subject_id, &f.teacher_id, 30.0, 45.0)).unwrap();
    assert_eq!(entry.total, 75.0);
    assert_eq!(entry.grade, school_directory_core::domain::Grade::A);

    let duplicate = f.store.add_result(result(&sam.id, &f.subject_id, &f.teacher_id, 10.0, 10.0));
    assert!(matches!(duplicate, Err(StoreError::Duplicate { entity: "Result", .. })));

    let updated = f
        .store
        .update_result(
            &entry.id,
            ResultPatch {
                exam: Some(20.0),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.total, 50.0);
    assert_eq!(updated.grade, school_directory_core::domain::Grade::C);
}

#[test]
fn ranking_shares_positions_on_ties() {
    let mut f = fixture(StoreSettings::default());
    let mut ids = Vec::new();
    for (name, exam) in [("A", 50.0), ("B", 40.0), ("C", 50.0), ("D", 20.0)] {
        let s = f.store.add_student(student(name, &f.school_id, &f.class_id)).unwrap();
        f.store.add_result(result(&s.id, &f.subject_id, &f.teacher_id, 20.0, exam)).unwrap();
        ids.push(s.id);
    }

    let ranked = f.store.rank_results(&f.class_id, &f.subject_id, Term::Term1, SESSION);
    assert_eq!(ranked, 4);

    let position_of = |student_id: &str| {
        f.store
            .list_results(&ResultFilter {
                student_id: Some(student_id.to_string()),
                ..Default::default()
            })[0]
            .position
    };
    assert_eq!(position_of(&ids[0]), Some(1));
    assert_eq!(position_of(&ids[2]), Some(1));
    assert_eq!(position_of(&ids[1]), Some(3));
    assert_eq!(position_of(&ids[3]), Some(4));
}

// --- Tokens ---

#[test]
fn a_new_token_revokes_earlier_ones() {
    let mut f = fixture(StoreSettings::default());
    f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();

    let first = f.store.create_token("STU-1001").unwrap();
    let second = f.store.create_token("STU-1001").unwrap();
    assert_ne!(first.token, second.token);

    let active: Vec<_> = f
        .store
        .list_tokens(Some("STU-1001"))
        .into_iter()
        .filter(|t| t.active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
    assert_eq!(f.store.find_token_by_student_id("STU-1001").map(|t| t.id), Some(second.id));
}

#[test]
fn exhausting_attempts_deactivates_the_token() {
    let settings = StoreSettings {
        max_token_attempts: 3,
        ..Default::default()
    };
    let mut f = fixture(settings);
    f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();
    let token = f.store.create_token("STU-1001").unwrap();

    for expected in 1..=3 {
        let after = f.store.increment_attempt(&token.id).unwrap();
        assert_eq!(after.attempts, expected);
    }
    let spent = f.store.list_tokens(Some("STU-1001")).remove(0);
    assert!(!spent.active);
    assert!(f.store.find_token_by_student_id("STU-1001").is_none());
    assert!(f.store.increment_attempt("no-such-token").is_none());
}

#[test]
fn tokens_require_a_known_student_in_strict_mode() {
    let mut f = fixture(StoreSettings::default());
    assert_eq!(
        f.store.create_token("STU-9999").unwrap_err(),
        StoreError::missing("Student", "STU-9999")
    );

    let mut lenient = fixture(StoreSettings {
        referential_checks: false,
        ..Default::default()
    });
    assert!(lenient.store.create_token("STU-9999").is_ok());
}

#[test]
fn expired_tokens_are_not_found() {
    let mut f = fixture(StoreSettings {
        token_ttl: Duration::zero(),
        ..Default::default()
    });
    f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();
    let token = f.store.create_token("STU-1001").unwrap();
    assert!(f.store.find_token_by_student_id("STU-1001").is_none());
    assert_eq!(
        f.store.check_results("STU-1001", &token.token, None, None).unwrap_err(),
        StoreError::TokenNotFound("STU-1001".to_string())
    );
}

#[test]
fn result_check_spends_attempts_and_returns_published_results() {
    let mut f = fixture(StoreSettings::default());
    let sam = f.store.add_student(student("Sam", &f.school_id, &f.class_id)).unwrap();
    f.store.add_result(result(&sam.id, &f.subject_id, &f.teacher_id, 30.0, 40.0)).unwrap();
    let mut hidden = result(&sam.id, &f.subject_id, &f.teacher_id, 10.0, 10.0);
    hidden.term = Term::Term2;
    hidden.published = false;
    f.store.add_result(hidden).unwrap();

    let token = f.store.create_token(&sam.student_id).unwrap();

    let err = f.store.check_results(&sam.student_id, "0000-0000-0000", None, None).unwrap_err();
    assert_eq!(err, StoreError::TokenMismatch(sam.student_id.clone()));

    let sheet = f
        .store
        .check_results(&sam.student_id, &token.token.to_lowercase(), None, None)
        .unwrap();
    assert_eq!(sheet.student.id, sam.id);
    assert_eq!(sheet.results.len(), 1);
    assert_eq!(sheet.results[0].term, Term::Term1);
    assert_eq!(sheet.attempts_remaining, 1);

    f.store.check_results(&sam.student_id, &token.token, None, None).unwrap();
    let err = f.store.check_results(&sam.student_id, &token.token, None, None).unwrap_err();
    assert_eq!(err, StoreError::TokenExhausted(sam.student_id.clone()));
    assert_eq!(
        f.store.list_activity(Some(1))[0].kind,
        ActivityKind::ResultsChecked
    );
}

#[test]
fn result_check_without_a_token_is_rejected() {
    let mut f = fixture(StoreSettings::default());
    let err = f.store.check_results("STU-1001", "ABCD-EF01-2345", None, None).unwrap_err();
    assert_eq!(err, StoreError::TokenNotFound("STU-1001".to_string()));
}

// --- Notifications ---

#[test]
fn scheduled_notifications_need_a_time_and_become_due() {
    let mut f = fixture(StoreSettings::default());
    let payload = |scheduled_for| NewNotification {
        school_id: f.school_id.clone(),
        title: "Open day".to_string(),
        message: "Parents are welcome on Saturday.".to_string(),
        audience: Audience::Parent,
        channel: NotificationChannel::Sms,
        status: NotificationStatus::Scheduled,
        priority: Priority::Medium,
        scheduled_for,
        metrics: DeliveryMetrics::default(),
    };
    let missing_time = payload(None);
    let past = payload(Some(Utc::now() - Duration::hours(1)));
    let future = payload(Some(Utc::now() + Duration::hours(1)));

    assert!(f.store.add_notification(missing_time).is_err());
    let due = f.store.add_notification(past).unwrap();
    f.store.add_notification(future).unwrap();

    let listed = f.store.due_notifications(Utc::now());
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, due.id);
}

// --- Activity & dashboard ---

#[test]
fn activity_is_newest_first_and_capped() {
    let mut store = DirectoryStore::new(StoreSettings {
        activity_log_limit: 3,
        ..Default::default()
    });
    for name in ["One", "Two", "Three", "Four"] {
        store.add_school(school(name, Brand::Acme)).unwrap();
    }
    let entries = store.list_activity(None);
    assert_eq!(entries.len(), 3);
    assert!(entries[0].description.contains("Four"));
    assert!(entries[2].description.contains("Two"));
    assert_eq!(store.list_activity(Some(2)).len(), 2);
}

#[test]
fn dashboard_is_scoped_to_one_school() {
    let mut f = fixture(StoreSettings::default());
    let a = f.store.add_student(student("A", &f.school_id, &f.class_id)).unwrap();
    f.store.add_result(result(&a.id, &f.subject_id, &f.teacher_id, 30.0, 40.0)).unwrap();

    let other = f.store.add_school(school("Globex", Brand::Globex)).unwrap();
    let other_class = f.store.add_class(class("SS 1", &other.id)).unwrap();
    f.store.add_student(student("B", &other.id, &other_class.id)).unwrap();

    let all = f.store.admin_dashboard(None);
    assert_eq!(all.totals.schools, 2);
    assert_eq!(all.totals.students, 2);
    assert_eq!(all.totals.monthly_revenue, 600.0);

    let scoped = f.store.admin_dashboard(Some(&f.school_id));
    assert_eq!(scoped.totals.schools, 1);
    assert_eq!(scoped.totals.students, 1);
    assert_eq!(scoped.totals.results, 1);
    assert_eq!(scoped.subject_averages.len(), 1);
    assert_eq!(scoped.subject_averages[0].average_total, 70.0);
    assert_eq!(scoped.grade_levels[0].students, 1);
    assert!(scoped
        .recent_activity
        .iter()
        .all(|e| e.school_id.as_deref() == Some(f.school_id.as_str())));
    let good = scoped
        .performance_distribution
        .iter()
        .find(|share| share.level == PerformanceLevel::Good)
        .unwrap();
    assert_eq!(good.students, 1);
}

#[test]
fn school_filter_matches_name_search() {
    let mut store = DirectoryStore::new(StoreSettings::default());
    store.add_school(school("Acme High", Brand::Acme)).unwrap();
    store.add_school(school("Contoso Academy", Brand::Contoso)).unwrap();
    let found = store.list_schools(&SchoolFilter {
        search: Some("CONTOSO".to_string()),
        ..Default::default()
    });
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].brand, Brand::Contoso);
}

#[test]
fn grade_levels_sum_every_class_at_a_level() {
    let mut f = fixture(StoreSettings::default());
    let second = f.store.add_class(class("JSS 1B", &f.school_id)).unwrap();
    let mut senior = class("SS 1A", &f.school_id);
    senior.level = "SS 1".to_string();
    let senior = f.store.add_class(senior).unwrap();
    for (name, class_id) in [
        ("A", &f.class_id),
        ("B", &f.class_id),
        ("C", &second.id),
        ("D", &senior.id),
    ] {
        f.store.add_student(student(name, &f.school_id, class_id)).unwrap();
    }

    let levels = f.store.admin_dashboard(Some(&f.school_id)).grade_levels;
    assert_eq!(levels.len(), 2);
    assert_eq!((levels[0].level.as_str(), levels[0].students), ("JSS 1", 3));
    assert_eq!((levels[1].level.as_str(), levels[1].students), ("SS 1", 1));
}
