//! crates/school_directory_core/src/filters.rs
//!
//! List filters. Every supplied key must hold (logical AND); an empty filter
//! matches everything. `search` is a case-insensitive substring match.

use crate::domain::{
    ClassRoom, ClassRoomFilter, NotificationFilter, NotificationItem, ResultEntry, ResultFilter,
    School, SchoolFilter, Student, StudentFilter, Subject, SubjectFilter, Teacher, TeacherFilter,
};
use crate::rules;

fn eq_opt(expected: Option<&str>, actual: &str) -> bool {
    expected.map_or(true, |e| e == actual)
}

impl SchoolFilter {
    /// Searches the name and contact email.
    pub fn matches(&self, s: &School) -> bool {
        self.brand.map_or(true, |b| s.brand == b)
            && self.active.map_or(true, |a| s.active == a)
            && self.plan.map_or(true, |p| s.plan == p)
            && self.search.as_deref().map_or(true, |q| {
                rules::matches_search(q, &[s.name.as_str(), s.contact.email.as_str()])
            })
    }
}

impl StudentFilter {
    /// Searches the full name, public id and email.
    pub fn matches(&self, s: &Student) -> bool {
        eq_opt(self.school_id.as_deref(), &s.school_id)
            && eq_opt(self.class_id.as_deref(), &s.class_id)
            && self.active.map_or(true, |a| s.active == a)
            && self.performance_level.map_or(true, |l| s.performance_level == l)
            && self.search.as_deref().map_or(true, |q| {
                let full_name = s.full_name();
                rules::matches_search(
                    q,
                    &[
                        full_name.as_str(),
                        s.student_id.as_str(),
                        s.email.as_deref().unwrap_or_default(),
                    ],
                )
            })
    }
}

impl TeacherFilter {
    pub fn matches(&self, t: &Teacher) -> bool {
        eq_opt(self.school_id.as_deref(), &t.school_id)
            && self
                .class_id
                .as_deref()
                .map_or(true, |c| t.class_ids.iter().any(|id| id == c))
            && self.subject.as_deref().map_or(true, |name| {
                t.subjects.iter().any(|s| s.eq_ignore_ascii_case(name.trim()))
            })
            && self.active.map_or(true, |a| t.active == a)
            && self.search.as_deref().map_or(true, |q| {
                let full_name = format!("{} {}", t.first_name, t.last_name);
                rules::matches_search(q, &[full_name.as_str(), t.email.as_str()])
            })
    }
}

impl ClassRoomFilter {
    pub fn matches(&self, c: &ClassRoom) -> bool {
        eq_opt(self.school_id.as_deref(), &c.school_id)
            && self
                .level
                .as_deref()
                .map_or(true, |l| c.level.eq_ignore_ascii_case(l.trim()))
            && self
                .teacher_id
                .as_deref()
                .map_or(true, |t| c.teacher_id.as_deref() == Some(t))
            && self
                .search
                .as_deref()
                .map_or(true, |q| rules::matches_search(q, &[c.name.as_str()]))
    }
}

impl SubjectFilter {
    pub fn matches(&self, s: &Subject) -> bool {
        eq_opt(self.school_id.as_deref(), &s.school_id)
            && self
                .teacher_id
                .as_deref()
                .map_or(true, |t| s.teacher_ids.iter().any(|id| id == t))
            && self
                .search
                .as_deref()
                .map_or(true, |q| rules::matches_search(q, &[s.name.as_str(), s.code.as_str()]))
    }
}

impl ResultFilter {
    /// `class_id` is not checked here: it needs the class roster, which only
    /// the backend holding the students can resolve.
    pub fn matches(&self, r: &ResultEntry) -> bool {
        eq_opt(self.student_id.as_deref(), &r.student_id)
            && eq_opt(self.subject_id.as_deref(), &r.subject_id)
            && eq_opt(self.teacher_id.as_deref(), &r.teacher_id)
            && self.term.map_or(true, |t| r.term == t)
            && eq_opt(self.session.as_deref(), &r.session)
            && self.published.map_or(true, |p| r.published == p)
    }
}

impl NotificationFilter {
    pub fn matches(&self, n: &NotificationItem) -> bool {
        eq_opt(self.school_id.as_deref(), &n.school_id)
            && self.audience.map_or(true, |a| n.audience == a)
            && self.channel.map_or(true, |c| n.channel == c)
            && self.status.map_or(true, |s| n.status == s)
            && self.priority.map_or(true, |p| n.priority == p)
            && self.search.as_deref().map_or(true, |q| {
                rules::matches_search(q, &[n.title.as_str(), n.message.as_str()])
            })
    }
}
