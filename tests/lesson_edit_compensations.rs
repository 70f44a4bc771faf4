
use odevd_core::orchestrate;
use odevd_core::persist::Op;
use test_support::{class_record, lesson, seed_class, seed_teacher, teacher_record, test_context};

fn teacher_increments(ops: &[Op]) -> Vec<(&str, &str, i64)> {
    ops.iter()
        .filter_map(|op| match op {
            Op::Increment {
                collection,
                id,
                field,
                delta,
            } if collection == "teachers" => Some((id.as_str(), field.as_str(), *delta)),
            _ => None,
        })
        .collect()
}

// Changing only the weekly hours leaves the assigned teacher alone: no
// teacher write of any kind goes out.
#[tokio::test]
async fn hours_only_edit_issues_no_teacher_writes() {
    let (backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "9-A", "9. Sinif").await;
    let t1 = seed_teacher(&ctx, "Yasemin Bahtiyar", "yasemin.bahtiyar@ogretmen.com", "Matematik").await;

    orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson("Matematik", &t1, 4))
        .await
        .expect("add lesson");

    backend.take_ops();
    orchestrate::upsert_lesson(&ctx, &class_id, Some(0), &lesson("Matematik", &t1, 6))
        .await
        .expect("edit hours");

    let ops = backend.take_ops();
    assert!(teacher_increments(&ops).is_empty());

    let class = class_record(&ctx, &class_id).await;
    assert_eq!(class.subjects[0].hours, 6);
    assert_eq!(teacher_record(&ctx, &t1).await.lesson_count, 1);
}

// Swapping the teacher from A to B issues exactly one decrement for A
// and one increment for B.
#[tokio::test]
async fn teacher_swap_issues_one_decrement_one_increment() {
    let (backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "9-A", "9. Sinif").await;
    let t_a = seed_teacher(&ctx, "Yasemin Bahtiyar", "yasemin.bahtiyar@ogretmen.com", "Matematik").await;
    let t_b = seed_teacher(&ctx, "Mehmet Demir", "mehmet.demir@ogretmen.com", "Matematik").await;

    orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson("Matematik", &t_a, 4))
        .await
        .expect("add lesson");

    backend.take_ops();
    orchestrate::upsert_lesson(&ctx, &class_id, Some(0), &lesson("Matematik", &t_b, 4))
        .await
        .expect("swap teacher");

    let ops = backend.take_ops();
    let mut increments = teacher_increments(&ops);
    increments.sort();
    let mut expected = vec![
        (t_a.as_str(), "lessonCount", -1),
        (t_b.as_str(), "lessonCount", 1),
    ];
    expected.sort();
    assert_eq!(increments, expected);

    assert_eq!(teacher_record(&ctx, &t_a).await.lesson_count, 0);
    assert_eq!(teacher_record(&ctx, &t_b).await.lesson_count, 1);
}

// Removing a lesson decrements its teacher once; the remaining entries
// keep their order.
#[tokio::test]
async fn lesson_removal_decrements_and_preserves_order() {
    let (_backend, ctx) = test_context();
    let class_id = seed_class(&ctx, "9-A", "9. Sinif").await;
    let t1 = seed_teacher(&ctx, "Yasemin Bahtiyar", "yasemin.bahtiyar@ogretmen.com", "Matematik").await;

    for subject in ["Matematik", "Fizik", "Kimya"] {
        orchestrate::upsert_lesson(&ctx, &class_id, None, &lesson(subject, &t1, 2))
            .await
            .expect("add lesson");
    }

    orchestrate::delete_lesson(&ctx, &class_id, 1).await.expect("remove lesson");

    let class = class_record(&ctx, &class_id).await;
    let names: Vec<&str> = class.subjects.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Matematik", "Kimya"]);
    assert_eq!(class.lesson_count, 2);
    assert_eq!(teacher_record(&ctx, &t1).await.lesson_count, 2);
}
