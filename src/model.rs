//! Entity documents as stored in the hosted document database.
//!
//! Field names on the wire are camelCase. The document id is the storage
//! key, not a body field; `from_doc` attaches it after decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CLASSES: &str = "classes";
pub const STUDENTS: &str = "students";
pub const TEACHERS: &str = "teachers";

/// Shown when a teacher declares no subjects at all.
pub const PLACEHOLDER_SUBJECT: &str = "Brans";

/// A typed view over one collection's documents.
pub trait Entity: Sized {
    const COLLECTION: &'static str;
    const ORDER_KEY: &'static str = "name";

    fn from_doc(id: &str, body: &Value) -> Result<Self, serde_json::Error>;
}

/// One lesson embedded in a class: subject, assigned teacher and weekly
/// hours. `teacher` is a denormalized display copy; `teacher_id` is the
/// authoritative reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAssignment {
    pub name: String,
    #[serde(default)]
    pub teacher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<String>,
    #[serde(default = "default_hours")]
    pub hours: u32,
}

fn default_hours() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecord {
    #[serde(skip)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub grade_label: String,
    #[serde(default)]
    pub student_count: i64,
    #[serde(default)]
    pub lesson_count: i64,
    #[serde(default)]
    pub subjects: Vec<SubjectAssignment>,
}

impl Entity for ClassRecord {
    const COLLECTION: &'static str = CLASSES;

    fn from_doc(id: &str, body: &Value) -> Result<Self, serde_json::Error> {
        let mut record: ClassRecord = serde_json::from_value(body.clone())?;
        record.id = Some(id.to_string());
        // Documents written before the stored count existed carry only
        // the subject list.
        if record.lesson_count == 0 && !record.subjects.is_empty() {
            record.lesson_count = record.subjects.len() as i64;
        }
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    #[serde(skip)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub main_subject: String,
    #[serde(default)]
    pub lesson_count: i64,
    #[serde(default)]
    pub class_count: i64,
    /// Declared capability list, not derived from assignments.
    #[serde(default)]
    pub subjects: Vec<String>,
}

impl Entity for TeacherRecord {
    const COLLECTION: &'static str = TEACHERS;

    fn from_doc(id: &str, body: &Value) -> Result<Self, serde_json::Error> {
        let mut record: TeacherRecord = serde_json::from_value(body.clone())?;
        record.id = Some(id.to_string());
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    #[serde(skip)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Weak reference by display name; goes stale if the class is
    /// renamed.
    #[serde(default)]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_number: Option<String>,
    /// Snapshot copy of the class's subject list, taken at write time.
    #[serde(default)]
    pub courses: Vec<SubjectAssignment>,
    #[serde(default)]
    pub course_count: i64,
}

impl Entity for StudentRecord {
    const COLLECTION: &'static str = STUDENTS;

    fn from_doc(id: &str, body: &Value) -> Result<Self, serde_json::Error> {
        let mut record: StudentRecord = serde_json::from_value(body.clone())?;
        record.id = Some(id.to_string());
        Ok(record)
    }
}

/// Split a comma-separated subject declaration into trimmed, non-empty
/// entries. Duplicates are kept as declared.
pub fn parse_subjects(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The teacher's primary subject is simply the first declared one.
pub fn main_subject(subjects: &[String]) -> String {
    subjects
        .first()
        .cloned()
        .unwrap_or_else(|| PLACEHOLDER_SUBJECT.to_string())
}

/// Weekly hours are always at least 1, whatever the form submitted.
pub fn clamp_hours(hours: i64) -> u32 {
    if hours < 1 {
        1
    } else {
        hours as u32
    }
}
