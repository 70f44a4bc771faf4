
use odevd_core::orchestrate;
use test_support::{class_record, lesson, seed_class, seed_teacher, teacher_record, test_context};

// The scenario from the original console: empty 9-A gains Matematik with
// t1 for four hours.
#[tokio::test]
async fn first_lesson_on_empty_class() {
    let (_backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "9-A", "9. Sinif").await;
    let t1 = seed_teacher(&ctx, "Yasemin Bahtiyar", "yasemin.bahtiyar@ogretmen.com", "Matematik").await;

    orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson("Matematik", &t1, 4))
        .await
        .expect("add lesson");

    let class = class_record(&ctx, &class_id).await;
    assert_eq!(class.subjects.len(), 1);
    assert_eq!(class.lesson_count, 1);
    assert_eq!(class.subjects[0].name, "Matematik");
    assert_eq!(class.subjects[0].teacher, "Yasemin Bahtiyar");
    assert_eq!(class.subjects[0].teacher_id.as_deref(), Some(t1.as_str()));
    assert_eq!(class.subjects[0].hours, 4);

    assert_eq!(teacher_record(&ctx, &t1).await.lesson_count, 1);
}

// Reading back after an edit-in-place at index i yields the edited
// values and an unchanged sequence length.
#[tokio::test]
async fn edit_in_place_replaces_not_appends() {
    let (_backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "10-B", "10. Sinif").await;
    let t1 = seed_teacher(&ctx, "Yasemin Bahtiyar", "yasemin.bahtiyar@ogretmen.com", "Kimya").await;

    orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson("Kimya", &t1, 2))
        .await
        .expect("add lesson");
    orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson("Biyoloji", &t1, 2))
        .await
        .expect("add lesson");

    orchestrate::upsert_lesson(&ctx, &class_id, Some(1), &lesson("Fen Bilimleri", &t1, 3))
        .await
        .expect("edit lesson");

    let class = class_record(&ctx, &class_id).await;
    assert_eq!(class.subjects.len(), 2);
    assert_eq!(class.lesson_count, 2);
    assert_eq!(class.subjects[1].name, "Fen Bilimleri");
    assert_eq!(class.subjects[1].hours, 3);
    // The untouched neighbor stays as it was.
    assert_eq!(class.subjects[0].name, "Kimya");
}

// Submitted hours below one are clamped, not rejected.
#[tokio::test]
async fn hours_below_one_clamp_to_one() {
    let (_backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "9-A", "9. Sinif").await;
    let t1 = seed_teacher(&ctx, "Mehmet Demir", "mehmet.demir@ogretmen.com", "Beden").await;

    orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson("Beden", &t1, 0))
        .await
        .expect("add lesson");

    let class = class_record(&ctx, &class_id).await;
    assert_eq!(class.subjects[0].hours, 1);
}

// Editing a class's name and grade never touches its subject list.
#[tokio::test]
async fn class_rename_preserves_subjects() {
    let (_backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "9-A", "9. Sinif").await;
    let t1 = seed_teacher(&ctx, "Yasemin Bahtiyar", "yasemin.bahtiyar@ogretmen.com", "Matematik").await;
    orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson("Matematik", &t1, 4))
        .await
        .expect("add lesson");

    orchestrate::update_class(
        &ctx,
        &class_id,
        &odevd_core::orchestrate::ClassForm {
            name: "9-C".to_string(),
            grade_label: "9. Sinif".to_string(),
        },
    )
    .await
    .expect("rename class");

    let class = class_record(&ctx, &class_id).await;
    assert_eq!(class.name, "9-C");
    assert_eq!(class.subjects.len(), 1);
    assert_eq!(class.lesson_count, 1);
}

// An out-of-range edit index is rejected without touching the document.
#[tokio::test]
async fn out_of_range_index_is_rejected() {
    let (_backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "9-A", "9. Sinif").await;
    let t1 = seed_teacher(&ctx, "Yasemin Bahtiyar", "yasemin.bahtiyar@ogretmen.com", "Matematik").await;

    let err = orchestrate::upsert_lesson(&ctx, &class_id, Some(3), &lesson("Matematik", &t1, 4))
        .await
        .expect_err("index past the end");
    assert!(matches!(err, odevd_core::OpError::LessonIndex { index: 3, .. }));

    let class = class_record(&ctx, &class_id).await;
    assert!(class.subjects.is_empty());
    assert_eq!(class.lesson_count, 0);
    assert_eq!(teacher_record(&ctx, &t1).await.lesson_count, 0);
}
