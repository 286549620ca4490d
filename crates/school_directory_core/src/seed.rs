//! crates/school_directory_core/src/seed.rs
//!
//! Demo data for the in-memory directory. Everything goes through the public
//! `add_*` operations so the seeded store obeys the same rules as live data.

use chrono::{Duration, NaiveDate, Utc};

use crate::domain::{
    Audience, Billing, BillingCycle, BillingStatus, Brand, ContactInfo, DeliveryMetrics,
    Guardian, NewClassRoom, NewNotification, NewResult, NewSchool, NewStudent, NewSubject,
    NewTeacher, NotificationChannel, NotificationStatus, PlanTier, Priority, SchoolSettings,
    TeacherPerformance, Term,
};
use crate::error::StoreResult;
use crate::store::{DirectoryStore, StoreSettings};

pub const DEMO_SESSION: &str = "2024/2025";

struct DemoSchool {
    name: &'static str,
    brand: Brand,
    domain: &'static str,
    city: &'static str,
    plan: PlanTier,
    max_students: u32,
    billing: (f64, BillingCycle),
}

const SCHOOLS: [DemoSchool; 3] = [
    DemoSchool {
        name: "Acme High School",
        brand: Brand::Acme,
        domain: "acmehigh.edu",
        city: "Lagos",
        plan: PlanTier::Premium,
        max_students: 500,
        billing: (1_200.0, BillingCycle::Annually),
    },
    DemoSchool {
        name: "Contoso Academy",
        brand: Brand::Contoso,
        domain: "contoso-academy.edu",
        city: "Abuja",
        plan: PlanTier::Standard,
        max_students: 350,
        billing: (150.0, BillingCycle::Termly),
    },
    DemoSchool {
        name: "Globex International College",
        brand: Brand::Globex,
        domain: "globex-college.edu",
        city: "Port Harcourt",
        plan: PlanTier::Enterprise,
        max_students: 800,
        billing: (250.0, BillingCycle::Monthly),
    },
];

const CLASSES: [(&str, &str); 3] = [("JSS 1A", "JSS 1"), ("JSS 1B", "JSS 1"), ("JSS 2A", "JSS 2")];

const SUBJECTS: [(&str, &str); 3] = [
    ("MTH", "Mathematics"),
    ("ENG", "English Language"),
    ("BSC", "Basic Science"),
];

const TEACHERS: [(&str, &str, &str); 2] = [
    ("Grace", "Okafor", "Mathematics"),
    ("Daniel", "Adeyemi", "English Language"),
];

const STUDENTS: [(&str, &str); 6] = [
    ("Amina", "Bello"),
    ("Chidi", "Eze"),
    ("Tolu", "Adebayo"),
    ("Ngozi", "Nwosu"),
    ("Ibrahim", "Musa"),
    ("Funke", "Ogun"),
];

/// A store preloaded with three schools and their classes, staff, students and results.
pub fn demo_store(settings: StoreSettings) -> StoreResult<DirectoryStore> {
    let mut store = DirectoryStore::new(settings);
    seed_demo_data(&mut store)?;
    Ok(store)
}

pub fn seed_demo_data(store: &mut DirectoryStore) -> StoreResult<()> {
    for (school_index, demo) in SCHOOLS.iter().enumerate() {
        let school = store.add_school(NewSchool {
            name: demo.name.to_string(),
            brand: demo.brand,
            contact: ContactInfo {
                email: format!("info@{}", demo.domain),
                phone: format!("+234 80{} 000 {:04}", school_index + 1, 1000 + school_index),
                address: format!("{} Campus Road, {}", 10 + school_index, demo.city),
            },
            active: true,
            plan: demo.plan,
            max_students: demo.max_students,
            billing: Billing {
                amount: demo.billing.0,
                cycle: demo.billing.1,
                status: BillingStatus::Active,
            },
            settings: SchoolSettings {
                academic_year: DEMO_SESSION.to_string(),
                notification_channels: vec![
                    NotificationChannel::Email,
                    NotificationChannel::Sms,
                    NotificationChannel::App,
                ],
                ..SchoolSettings::default()
            },
        })?;

        let mut subject_ids = Vec::new();
        for (code, name) in SUBJECTS {
            let subject = store.add_subject(NewSubject {
                code: code.to_string(),
                name: name.to_string(),
                school_id: school.id.clone(),
                teacher_ids: Vec::new(),
            })?;
            subject_ids.push(subject.id);
        }

        let mut teacher_ids = Vec::new();
        for (i, (first, last, subject)) in TEACHERS.iter().enumerate() {
            let teacher = store.add_teacher(NewTeacher {
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: format!("{}.{}@{}", first.to_lowercase(), last.to_lowercase(), demo.domain),
                phone: None,
                school_id: school.id.clone(),
                subjects: vec![subject.to_string()],
                class_ids: Vec::new(),
                active: true,
                performance: TeacherPerformance {
                    class_average: 62.0 + (i * 5) as f64,
                    feedback_score: 4.1 + i as f64 * 0.3,
                    submission_timeliness: 90.0 - (i * 4) as f64,
                },
            })?;
            teacher_ids.push(teacher.id);
        }

        let mut class_ids = Vec::new();
        for (i, (name, level)) in CLASSES.iter().enumerate() {
            let class = store.add_class(NewClassRoom {
                name: name.to_string(),
                level: level.to_string(),
                school_id: school.id.clone(),
                teacher_id: Some(teacher_ids[i % teacher_ids.len()].clone()),
                subject_ids: subject_ids.clone(),
                capacity: 40,
            })?;
            class_ids.push(class.id);
        }

        for (i, (first, last)) in STUDENTS.iter().enumerate() {
            let gpa = 1.8 + ((i + school_index) % 5) as f64 * 0.7;
            let student = store.add_student(NewStudent {
                student_id: None,
                first_name: first.to_string(),
                last_name: last.to_string(),
                email: Some(format!("{}.{}@students.{}", first.to_lowercase(), last.to_lowercase(), demo.domain)),
                phone: None,
                date_of_birth: NaiveDate::from_ymd_opt(2011 + (i % 3) as i32, 1 + i as u32, 10),
                address: None,
                school_id: school.id.clone(),
                class_id: class_ids[i % class_ids.len()].clone(),
                primary_guardian: Guardian {
                    name: format!("Mr. {last}"),
                    relationship: "Father".to_string(),
                    phone: format!("+234 81{} 555 {:04}", school_index, 2000 + i),
                    email: None,
                },
                secondary_guardian: None,
                active: true,
                current_gpa: gpa.min(5.0),
                medical: None,
                documents: Vec::new(),
            })?;

            for (j, subject_id) in subject_ids.iter().enumerate() {
                let ca = 15.0 + ((i * 7 + j * 3 + school_index) % 25) as f64;
                let exam = 20.0 + ((i * 11 + j * 5 + school_index * 2) % 40) as f64;
                store.add_result(NewResult {
                    student_id: student.id.clone(),
                    subject_id: subject_id.clone(),
                    teacher_id: teacher_ids[j % teacher_ids.len()].clone(),
                    term: Term::Term1,
                    session: DEMO_SESSION.to_string(),
                    ca,
                    exam,
                    total: None,
                    published: true,
                    remarks: None,
                    skills: Default::default(),
                })?;
            }
        }

        for class_id in &class_ids {
            for subject_id in &subject_ids {
                store.rank_results(class_id, subject_id, Term::Term1, DEMO_SESSION);
            }
        }

        store.add_notification(NewNotification {
            school_id: school.id.clone(),
            title: "First term results published".to_string(),
            message: format!("Results for {} Term 1 are now available.", DEMO_SESSION),
            audience: Audience::Parent,
            channel: NotificationChannel::Email,
            status: NotificationStatus::Sent,
            priority: Priority::High,
            scheduled_for: None,
            metrics: DeliveryMetrics {
                sent: 6,
                delivered: 6,
                opened: 4,
                clicked: 2,
            },
        })?;
        store.add_notification(NewNotification {
            school_id: school.id.clone(),
            title: "Mid-term break".to_string(),
            message: "School closes for the mid-term break on Friday.".to_string(),
            audience: Audience::School,
            channel: NotificationChannel::App,
            status: NotificationStatus::Scheduled,
            priority: Priority::Medium,
            scheduled_for: Some(Utc::now() + Duration::days(3)),
            metrics: DeliveryMetrics::default(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClassRoomFilter, SchoolFilter, StudentFilter};

    #[test]
    fn demo_store_counters_match_collections() {
        let store = demo_store(StoreSettings::default()).unwrap();
        let schools = store.list_schools(&SchoolFilter::default());
        assert_eq!(schools.len(), 3);
        for school in &schools {
            let students = store.list_students(&StudentFilter {
                school_id: Some(school.id.clone()),
                ..Default::default()
            });
            assert_eq!(school.stats.students as usize, students.len());
            assert_eq!(school.current_student_count, school.stats.students);
            assert_eq!(school.stats.classes, 3);
            assert_eq!(school.stats.subjects, 3);
            assert_eq!(school.stats.teachers, 2);
            assert!(school.stats.average_performance > 0.0);
        }
        let rostered: u32 = store
            .list_classes(&ClassRoomFilter::default())
            .iter()
            .map(|c| c.student_count)
            .sum();
        assert_eq!(rostered, 18);
    }

    #[test]
    fn demo_scores_stay_in_range() {
        let store = demo_store(StoreSettings::default()).unwrap();
        let results = store.list_results(&Default::default());
        assert_eq!(results.len(), 54);
        assert!(results.iter().all(|r| r.position.is_some()));
        assert!(results.iter().all(|r| (r.total - (r.ca + r.exam)).abs() < 1e-9));
    }
}
