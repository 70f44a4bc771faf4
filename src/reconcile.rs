//! Cross-reference reconciler: pure computation of the compensating
//! writes that keep denormalized counters coherent across collections.
//! No I/O happens here; `orchestrate` turns the output into backend
//! calls.
//!
//! Deltas are computed strictly from the change (old vs new), never by
//! rescanning, so a single mutation stays O(1). The full recount in
//! [`recount`] is the separately triggerable repair path for drift left
//! behind by failed compensations.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{ClassRecord, StudentRecord, SubjectAssignment, TeacherRecord, CLASSES, TEACHERS};

/// A compensating write against one related document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    /// Adjust `studentCount` on the class with this display name. The
    /// class is located by name at apply time; a missing class makes
    /// this a no-op.
    ClassStudentDelta { class_name: String, delta: i64 },
    /// Adjust the workload counters on one teacher.
    TeacherCounts {
        teacher_id: String,
        lesson_delta: i64,
        class_delta: i64,
    },
}

pub fn on_student_created(student: &StudentRecord) -> Vec<Compensation> {
    vec![Compensation::ClassStudentDelta {
        class_name: student.class_name.clone(),
        delta: 1,
    }]
}

pub fn on_student_deleted(student: &StudentRecord) -> Vec<Compensation> {
    vec![Compensation::ClassStudentDelta {
        class_name: student.class_name.clone(),
        delta: -1,
    }]
}

/// Both sides adjust; an unchanged affiliation produces nothing.
pub fn on_student_class_changed(old_class: &str, new_class: &str) -> Vec<Compensation> {
    if old_class == new_class {
        return Vec::new();
    }
    vec![
        Compensation::ClassStudentDelta {
            class_name: old_class.to_string(),
            delta: -1,
        },
        Compensation::ClassStudentDelta {
            class_name: new_class.to_string(),
            delta: 1,
        },
    ]
}

/// One grouped decrement per distinct teacher: a teacher with three
/// assignments in the deleted class loses three lessons but one class.
pub fn on_class_deleted(class: &ClassRecord) -> Vec<Compensation> {
    let mut per_teacher: BTreeMap<&str, i64> = BTreeMap::new();
    for subject in &class.subjects {
        if let Some(teacher_id) = subject.teacher_id.as_deref() {
            *per_teacher.entry(teacher_id).or_insert(0) += 1;
        }
    }
    per_teacher
        .into_iter()
        .map(|(teacher_id, assignments)| Compensation::TeacherCounts {
            teacher_id: teacher_id.to_string(),
            lesson_delta: -assignments,
            class_delta: -1,
        })
        .collect()
}

/// Reassignment must never double-count or skip: only the side that
/// actually changed gets a delta, and an unchanged teacher produces
/// nothing at all.
pub fn on_lesson_assigned(
    new: &SubjectAssignment,
    previous: Option<&SubjectAssignment>,
) -> Vec<Compensation> {
    let old_id = previous.and_then(|p| p.teacher_id.as_deref());
    let new_id = new.teacher_id.as_deref();
    if old_id == new_id {
        return Vec::new();
    }
    let mut out = Vec::new();
    if let Some(teacher_id) = old_id {
        out.push(Compensation::TeacherCounts {
            teacher_id: teacher_id.to_string(),
            lesson_delta: -1,
            class_delta: 0,
        });
    }
    if let Some(teacher_id) = new_id {
        out.push(Compensation::TeacherCounts {
            teacher_id: teacher_id.to_string(),
            lesson_delta: 1,
            class_delta: 0,
        });
    }
    out
}

pub fn on_lesson_removed(removed: &SubjectAssignment) -> Vec<Compensation> {
    match removed.teacher_id.as_deref() {
        Some(teacher_id) => vec![Compensation::TeacherCounts {
            teacher_id: teacher_id.to_string(),
            lesson_delta: -1,
            class_delta: 0,
        }],
        None => Vec::new(),
    }
}

/// A corrective set-write produced by the full recount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub collection: &'static str,
    pub id: String,
    pub field: &'static str,
    pub value: i64,
}

/// A weak reference pointing at nothing. Reported, never repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Orphan {
    StudentClass {
        student_id: String,
        class_name: String,
    },
    LessonTeacher {
        class_id: String,
        subject: String,
        teacher_id: String,
    },
}

#[derive(Debug, Default)]
pub struct RecountReport {
    pub corrections: Vec<Correction>,
    pub orphans: Vec<Orphan>,
}

/// Recompute every denormalized counter from the ground truth and list
/// the writes needed to repair drift. O(classes × subjects + students),
/// run on explicit request only.
pub fn recount(
    classes: &[ClassRecord],
    students: &[StudentRecord],
    teachers: &[TeacherRecord],
) -> RecountReport {
    let mut report = RecountReport::default();

    let mut students_per_class: BTreeMap<&str, i64> = BTreeMap::new();
    for student in students {
        *students_per_class
            .entry(student.class_name.as_str())
            .or_insert(0) += 1;
    }

    let known_teachers: BTreeSet<&str> =
        teachers.iter().filter_map(|t| t.id.as_deref()).collect();
    let mut lessons_per_teacher: BTreeMap<&str, i64> = BTreeMap::new();
    let mut classes_per_teacher: BTreeMap<&str, i64> = BTreeMap::new();

    for class in classes {
        let Some(class_id) = class.id.as_deref() else {
            continue;
        };

        let expected_students = students_per_class
            .get(class.name.as_str())
            .copied()
            .unwrap_or(0);
        if class.student_count != expected_students {
            report.corrections.push(Correction {
                collection: CLASSES,
                id: class_id.to_string(),
                field: "studentCount",
                value: expected_students,
            });
        }

        let expected_lessons = class.subjects.len() as i64;
        if class.lesson_count != expected_lessons {
            report.corrections.push(Correction {
                collection: CLASSES,
                id: class_id.to_string(),
                field: "lessonCount",
                value: expected_lessons,
            });
        }

        let mut seen_in_class: BTreeSet<&str> = BTreeSet::new();
        for subject in &class.subjects {
            let Some(teacher_id) = subject.teacher_id.as_deref() else {
                continue;
            };
            *lessons_per_teacher.entry(teacher_id).or_insert(0) += 1;
            if seen_in_class.insert(teacher_id) {
                *classes_per_teacher.entry(teacher_id).or_insert(0) += 1;
            }
            if !known_teachers.contains(teacher_id) {
                report.orphans.push(Orphan::LessonTeacher {
                    class_id: class_id.to_string(),
                    subject: subject.name.clone(),
                    teacher_id: teacher_id.to_string(),
                });
            }
        }
    }

    for student in students {
        let referenced = classes.iter().any(|c| c.name == student.class_name);
        if !referenced {
            if let Some(student_id) = student.id.as_deref() {
                report.orphans.push(Orphan::StudentClass {
                    student_id: student_id.to_string(),
                    class_name: student.class_name.clone(),
                });
            }
        }
    }

    for teacher in teachers {
        let Some(teacher_id) = teacher.id.as_deref() else {
            continue;
        };
        let expected_lessons = lessons_per_teacher.get(teacher_id).copied().unwrap_or(0);
        if teacher.lesson_count != expected_lessons {
            report.corrections.push(Correction {
                collection: TEACHERS,
                id: teacher_id.to_string(),
                field: "lessonCount",
                value: expected_lessons,
            });
        }
        let expected_classes = classes_per_teacher.get(teacher_id).copied().unwrap_or(0);
        if teacher.class_count != expected_classes {
            report.corrections.push(Correction {
                collection: TEACHERS,
                id: teacher_id.to_string(),
                field: "classCount",
                value: expected_classes,
            });
        }
    }

    report
}
