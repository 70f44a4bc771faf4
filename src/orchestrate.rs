//! Mutation orchestrator: every staff intent lands here. Each use case
//! issues its primary write, awaits the acknowledgement, then fans the
//! compensating writes out concurrently. Compensations are best-effort:
//! a failure is logged and dropped, never retried, and never rolls the
//! primary write back. The [`reconcile_counts`] sweep is the repair path
//! for whatever drift that leaves behind.

use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::context::AppContext;
use crate::error::{OpError, PersistError};
use crate::model::{
    clamp_hours, main_subject, parse_subjects, ClassRecord, Entity, StudentRecord,
    SubjectAssignment, TeacherRecord, CLASSES, PLACEHOLDER_SUBJECT, STUDENTS, TEACHERS,
};
use crate::reconcile::{self, Compensation, RecountReport};

#[derive(Debug, Clone)]
pub struct ClassForm {
    pub name: String,
    pub grade_label: String,
}

#[derive(Debug, Clone)]
pub struct LessonForm {
    pub subject_name: String,
    pub teacher_id: String,
    pub hours: i64,
}

#[derive(Debug, Clone)]
pub struct StudentForm {
    pub name: String,
    pub email: String,
    pub class_name: String,
    pub student_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TeacherForm {
    pub name: String,
    pub email: String,
    /// Comma-separated declaration, exactly as submitted.
    pub subjects: String,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn stamped(mut body: Value) -> Value {
    if let Value::Object(fields) = &mut body {
        fields.insert("updatedAt".to_string(), json!(now()));
    }
    body
}

pub async fn create_class(ctx: &AppContext, form: &ClassForm) -> Result<String, OpError> {
    let body = stamped(json!({
        "name": form.name.trim(),
        "gradeLabel": form.grade_label.trim(),
        "studentCount": 0,
        "lessonCount": 0,
        "subjects": [],
    }));
    let id = ctx.persist.create(CLASSES, body).await?;
    debug!(class_id = %id, "class created");
    Ok(id)
}

/// Name and grade only. The subject list and both counters belong to the
/// lesson and student flows and are never touched from here.
pub async fn update_class(ctx: &AppContext, class_id: &str, form: &ClassForm) -> Result<(), OpError> {
    let patch = stamped(json!({
        "name": form.name.trim(),
        "gradeLabel": form.grade_label.trim(),
    }));
    ctx.persist.update(CLASSES, class_id, patch).await?;
    Ok(())
}

/// Add a lesson (`index: None`) or replace the one at `index`. The
/// subject sequence and the recomputed `lessonCount` go out in a single
/// write; teacher counter compensations follow separately.
pub async fn upsert_lesson(
    ctx: &AppContext,
    class_id: &str,
    index: Option<usize>,
    form: &LessonForm,
) -> Result<(), OpError> {
    let class = fetch_class(ctx, class_id).await?;

    let teacher_name = match ctx.persist.get(TEACHERS, &form.teacher_id).await? {
        Some(doc) => doc
            .body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        None => String::new(),
    };
    let assignment = SubjectAssignment {
        name: form.subject_name.trim().to_string(),
        teacher: teacher_name,
        teacher_id: Some(form.teacher_id.clone()),
        hours: clamp_hours(form.hours),
    };

    let mut subjects = class.subjects;
    let previous = match index {
        Some(i) => {
            if i >= subjects.len() {
                return Err(OpError::LessonIndex {
                    class_id: class_id.to_string(),
                    index: i,
                });
            }
            Some(std::mem::replace(&mut subjects[i], assignment.clone()))
        }
        None => {
            subjects.push(assignment.clone());
            None
        }
    };

    write_subjects(ctx, class_id, &subjects).await?;

    let comps = reconcile::on_lesson_assigned(&assignment, previous.as_ref());
    apply_compensations(ctx, &comps).await;
    Ok(())
}

/// Remove the lesson at `index`; the rest of the sequence keeps its
/// order.
pub async fn delete_lesson(
    ctx: &AppContext,
    class_id: &str,
    index: usize,
) -> Result<(), OpError> {
    let class = fetch_class(ctx, class_id).await?;
    let mut subjects = class.subjects;
    if index >= subjects.len() {
        return Err(OpError::LessonIndex {
            class_id: class_id.to_string(),
            index,
        });
    }
    let removed = subjects.remove(index);

    write_subjects(ctx, class_id, &subjects).await?;

    let comps = reconcile::on_lesson_removed(&removed);
    apply_compensations(ctx, &comps).await;
    Ok(())
}

/// The grouped teacher decrements go out first, while the subject list
/// is still readable, then the document is removed. Students keep their
/// `className` reference; nothing cascades.
pub async fn delete_class(ctx: &AppContext, class_id: &str) -> Result<(), OpError> {
    let class = fetch_class(ctx, class_id).await?;
    let comps = reconcile::on_class_deleted(&class);
    apply_compensations(ctx, &comps).await;
    ctx.persist.delete(CLASSES, class_id).await?;
    Ok(())
}

pub async fn create_student(ctx: &AppContext, form: &StudentForm) -> Result<String, OpError> {
    let class_name = form.class_name.trim().to_string();
    let courses = match find_class_by_name(ctx, &class_name).await? {
        Some((_, class)) => class.subjects,
        None => Vec::new(),
    };

    let student = StudentRecord {
        id: None,
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        class_name,
        student_number: form.student_number.clone(),
        course_count: courses.len() as i64,
        courses,
    };
    let body = stamped(serde_json::to_value(&student)?);
    let id = ctx.persist.create(STUDENTS, body).await?;

    apply_compensations(ctx, &reconcile::on_student_created(&student)).await;
    Ok(id)
}

/// The course snapshot is refreshed from whatever class the (possibly
/// new) name resolves to; count compensations go out only when the
/// affiliation actually changed.
pub async fn update_student(
    ctx: &AppContext,
    student_id: &str,
    form: &StudentForm,
) -> Result<(), OpError> {
    let existing = fetch_student(ctx, student_id).await?;
    let class_name = form.class_name.trim().to_string();
    let courses = match find_class_by_name(ctx, &class_name).await? {
        Some((_, class)) => class.subjects,
        None => Vec::new(),
    };

    let updated = StudentRecord {
        id: None,
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        class_name: class_name.clone(),
        student_number: form.student_number.clone(),
        course_count: courses.len() as i64,
        courses,
    };
    let patch = stamped(serde_json::to_value(&updated)?);
    ctx.persist.update(STUDENTS, student_id, patch).await?;

    let comps = reconcile::on_student_class_changed(&existing.class_name, &class_name);
    apply_compensations(ctx, &comps).await;
    Ok(())
}

pub async fn delete_student(ctx: &AppContext, student_id: &str) -> Result<(), OpError> {
    let existing = fetch_student(ctx, student_id).await?;
    ctx.persist.delete(STUDENTS, student_id).await?;
    apply_compensations(ctx, &reconcile::on_student_deleted(&existing)).await;
    Ok(())
}

pub async fn create_teacher(ctx: &AppContext, form: &TeacherForm) -> Result<String, OpError> {
    let subjects = declared_subjects(&form.subjects);
    let teacher = TeacherRecord {
        id: None,
        name: form.name.trim().to_string(),
        email: form.email.trim().to_string(),
        main_subject: main_subject(&subjects),
        lesson_count: 0,
        class_count: 0,
        subjects,
    };
    let body = stamped(serde_json::to_value(&teacher)?);
    let id = ctx.persist.create(TEACHERS, body).await?;
    Ok(id)
}

/// Profile fields only. The workload counters are owned by the lesson
/// and class-deletion compensations and are never written from here.
pub async fn update_teacher(
    ctx: &AppContext,
    teacher_id: &str,
    form: &TeacherForm,
) -> Result<(), OpError> {
    let subjects = declared_subjects(&form.subjects);
    let patch = stamped(json!({
        "name": form.name.trim(),
        "email": form.email.trim(),
        "mainSubject": main_subject(&subjects),
        "subjects": subjects,
    }));
    ctx.persist.update(TEACHERS, teacher_id, patch).await?;
    Ok(())
}

/// Classes that still reference this teacher keep their `teacherId`;
/// the recount sweep reports those as orphans.
pub async fn delete_teacher(ctx: &AppContext, teacher_id: &str) -> Result<(), OpError> {
    ctx.persist.delete(TEACHERS, teacher_id).await?;
    Ok(())
}

/// Recompute every denormalized counter from scratch and write back the
/// ones that drifted. Corrective writes are plain sets, so this also
/// converges after lost compensations.
pub async fn reconcile_counts(ctx: &AppContext) -> Result<RecountReport, OpError> {
    let classes = load_all::<ClassRecord>(ctx).await?;
    let students = load_all::<StudentRecord>(ctx).await?;
    let teachers = load_all::<TeacherRecord>(ctx).await?;

    let report = reconcile::recount(&classes, &students, &teachers);
    for orphan in &report.orphans {
        warn!(?orphan, "dangling reference");
    }
    for correction in &report.corrections {
        let mut patch = Map::new();
        patch.insert(correction.field.to_string(), json!(correction.value));
        ctx.persist
            .update(correction.collection, &correction.id, Value::Object(patch))
            .await?;
    }
    Ok(report)
}

fn declared_subjects(raw: &str) -> Vec<String> {
    let subjects = parse_subjects(raw);
    if subjects.is_empty() {
        vec![PLACEHOLDER_SUBJECT.to_string()]
    } else {
        subjects
    }
}

async fn fetch_class(ctx: &AppContext, class_id: &str) -> Result<ClassRecord, OpError> {
    let doc = ctx
        .persist
        .get(CLASSES, class_id)
        .await?
        .ok_or_else(|| PersistError::NotFound {
            collection: CLASSES.to_string(),
            id: class_id.to_string(),
        })?;
    Ok(ClassRecord::from_doc(&doc.id, &doc.body)?)
}

async fn fetch_student(ctx: &AppContext, student_id: &str) -> Result<StudentRecord, OpError> {
    let doc = ctx
        .persist
        .get(STUDENTS, student_id)
        .await?
        .ok_or_else(|| PersistError::NotFound {
            collection: STUDENTS.to_string(),
            id: student_id.to_string(),
        })?;
    Ok(StudentRecord::from_doc(&doc.id, &doc.body)?)
}

/// First match wins; class names are not enforced unique, so duplicates
/// are possible and get logged.
async fn find_class_by_name(
    ctx: &AppContext,
    name: &str,
) -> Result<Option<(String, ClassRecord)>, PersistError> {
    let docs = ctx
        .persist
        .query(CLASSES, Some(("name", json!(name))), Some(2))
        .await?;
    if docs.len() > 1 {
        debug!(name, "multiple classes share this name; using the first");
    }
    let Some(doc) = docs.into_iter().next() else {
        return Ok(None);
    };
    let class = ClassRecord::from_doc(&doc.id, &doc.body).map_err(|e| {
        PersistError::BadDocument {
            collection: CLASSES.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(Some((doc.id, class)))
}

async fn write_subjects(
    ctx: &AppContext,
    class_id: &str,
    subjects: &[SubjectAssignment],
) -> Result<(), OpError> {
    let patch = stamped(json!({
        "subjects": serde_json::to_value(subjects)?,
        "lessonCount": subjects.len() as i64,
    }));
    ctx.persist.update(CLASSES, class_id, patch).await?;
    Ok(())
}

async fn load_all<T: Entity>(ctx: &AppContext) -> Result<Vec<T>, OpError> {
    let docs = ctx.persist.query(T::COLLECTION, None, None).await?;
    let mut out = Vec::with_capacity(docs.len());
    for doc in &docs {
        match T::from_doc(&doc.id, &doc.body) {
            Ok(entity) => out.push(entity),
            Err(err) => warn!(
                collection = T::COLLECTION,
                id = %doc.id,
                %err,
                "skipping undecodable document"
            ),
        }
    }
    Ok(out)
}

/// Fan the compensations out concurrently and await each independently.
/// A failed one is logged and dropped; the primary write has already
/// been acknowledged and stays.
async fn apply_compensations(ctx: &AppContext, comps: &[Compensation]) {
    let pending: Vec<_> = comps.iter().map(|comp| apply_one(ctx, comp)).collect();
    for (comp, result) in comps.iter().zip(join_all(pending).await) {
        if let Err(err) = result {
            warn!(
                ?comp,
                %err,
                "compensating write failed; counters drift until the next recount"
            );
        }
    }
}

async fn apply_one(ctx: &AppContext, comp: &Compensation) -> Result<(), PersistError> {
    match comp {
        Compensation::ClassStudentDelta { class_name, delta } => {
            let Some((class_id, _)) = find_class_by_name(ctx, class_name).await? else {
                debug!(%class_name, "no class with this name; student count compensation dropped");
                return Ok(());
            };
            ctx.persist
                .increment(CLASSES, &class_id, "studentCount", *delta)
                .await
        }
        Compensation::TeacherCounts {
            teacher_id,
            lesson_delta,
            class_delta,
        } => {
            if *lesson_delta != 0 {
                ctx.persist
                    .increment(TEACHERS, teacher_id, "lessonCount", *lesson_delta)
                    .await?;
            }
            if *class_delta != 0 {
                ctx.persist
                    .increment(TEACHERS, teacher_id, "classCount", *class_delta)
                    .await?;
            }
            Ok(())
        }
    }
}
