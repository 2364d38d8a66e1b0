mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_err, request_ok, spawn_sidecar, str_field, temp_dir};

/// Selects a fresh workspace and creates a one-hour theory course with two
/// sections. Returns the course id.
fn setup_course(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, prefix: &str) -> String {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        stdin,
        reader,
        "course",
        "courses.create",
        json!({
            "input": {
                "code": "MATH1",
                "name": "Calculus",
                "type": "theory",
                "academicHours": 1,
                "weeks": 15,
                "theorySections": 2,
                "theoryProfessors": ["Dr. Noether"]
            }
        }),
    );
    str_field(&created, "courseId")
}

fn place(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    section_id: &str,
    day: &str,
    week: i64,
    slot: i64,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        id,
        "schedule.place",
        json!({ "sectionId": section_id, "day": day, "week": week, "startSlot": slot }),
    )
}

#[test]
fn touching_placements_succeed_and_overlaps_are_rejected() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let course_id = setup_course(&mut stdin, &mut reader, "uniscan-schedule-conflicts");
    let s1 = format!("{}-theory-1", course_id);
    let s2 = format!("{}-theory-2", course_id);

    let first = place(&mut stdin, &mut reader, "1", &s1, "monday", 1, 0);
    let first_id = str_field(&first, "placementId");
    assert_eq!(first.pointer("/placement/startMinutes").and_then(|v| v.as_i64()), Some(480));
    assert_eq!(first.pointer("/placement/endMinutes").and_then(|v| v.as_i64()), Some(540));
    assert_eq!(first.pointer("/placement/color").and_then(|v| v.as_str()), Some("#4f46e5"));
    assert!(first_id.starts_with(&format!("{}-monday-0-", s1)));

    // 9:00 starts exactly where 8:00-9:00 ends.
    let _ = place(&mut stdin, &mut reader, "2", &s2, "monday", 1, 2);

    let (code, error) = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.place",
        json!({ "sectionId": s2, "day": "monday", "week": 1, "startSlot": 1 }),
    );
    assert_eq!(code, "conflict");
    assert_eq!(
        error.pointer("/details/placementId").and_then(|v| v.as_str()),
        Some(first_id.as_str())
    );

    // Same slot on another day or another week is free.
    let _ = place(&mut stdin, &mut reader, "4", &s1, "tuesday", 1, 1);
    let _ = place(&mut stdin, &mut reader, "5", &s1, "monday", 2, 1);

    let week1 = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "schedule.list",
        json!({ "week": 1, "day": "monday" }),
    );
    let rows = week1
        .get("placements")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("placements");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("startSlot").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(rows[1].get("startSlot").and_then(|v| v.as_i64()), Some(2));
    assert_eq!(str_field(&rows[0], "instructorName"), "Dr. Noether");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn bad_inputs_are_rejected_without_side_effects() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let course_id = setup_course(&mut stdin, &mut reader, "uniscan-schedule-inputs");
    let s1 = format!("{}-theory-1", course_id);

    let cases = [
        json!({ "sectionId": s1, "day": "monday", "week": 0, "startSlot": 0 }),
        json!({ "sectionId": s1, "day": "monday", "week": 16, "startSlot": 0 }),
        json!({ "sectionId": s1, "day": "monday", "week": 1, "startSlot": 17 }),
        json!({ "sectionId": s1, "day": "saturday", "week": 1, "startSlot": 0 }),
        json!({ "sectionId": s1, "day": "monday", "week": "one", "startSlot": 0 }),
    ];
    for (i, params) in cases.iter().enumerate() {
        let (code, _) = request_err(
            &mut stdin,
            &mut reader,
            &format!("bad{}", i),
            "schedule.place",
            params.clone(),
        );
        assert_eq!(code, "bad_params", "case {}", i);
    }

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "missing",
        "schedule.place",
        json!({ "sectionId": format!("{}-practical-1", course_id), "day": "monday", "week": 1, "startSlot": 0 }),
    );
    assert_eq!(code, "not_found");

    let listed = request_ok(&mut stdin, &mut reader, "list", "schedule.list", json!({}));
    assert_eq!(
        listed
            .get("placements")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn remove_then_replace_and_clear_week() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let course_id = setup_course(&mut stdin, &mut reader, "uniscan-schedule-remove");
    let s1 = format!("{}-theory-1", course_id);
    let s2 = format!("{}-theory-2", course_id);

    let first = place(&mut stdin, &mut reader, "1", &s1, "wednesday", 3, 6);
    let first_id = str_field(&first, "placementId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.remove",
        json!({ "placementId": first_id }),
    );
    let _ = place(&mut stdin, &mut reader, "3", &s2, "wednesday", 3, 6);

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.remove",
        json!({ "placementId": first_id }),
    );
    assert_eq!(code, "not_found");

    let _ = place(&mut stdin, &mut reader, "5", &s1, "friday", 3, 0);
    let _ = place(&mut stdin, &mut reader, "6", &s1, "friday", 4, 0);

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedule.clearWeek",
        json!({ "week": 3 }),
    );
    assert_eq!(cleared.get("removed").and_then(|v| v.as_i64()), Some(2));

    let remaining = request_ok(&mut stdin, &mut reader, "8", "schedule.list", json!({}));
    let rows = remaining
        .get("placements")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("placements");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("week").and_then(|v| v.as_i64()), Some(4));

    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "schedule.clearWeek",
        json!({ "week": 3 }),
    );
    assert_eq!(cleared.get("removed").and_then(|v| v.as_i64()), Some(0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn move_and_resize_revalidate_unless_disabled() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let course_id = setup_course(&mut stdin, &mut reader, "uniscan-schedule-edits");
    let s1 = format!("{}-theory-1", course_id);
    let s2 = format!("{}-theory-2", course_id);

    let a = place(&mut stdin, &mut reader, "1", &s1, "thursday", 5, 0);
    let a_id = str_field(&a, "placementId");
    let b = place(&mut stdin, &mut reader, "2", &s2, "thursday", 5, 4);
    let b_id = str_field(&b, "placementId");

    // Growing 8:00 into 10:00-11:00 collides.
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.resize",
        json!({ "placementId": a_id, "durationMinutes": 150 }),
    );
    assert_eq!(code, "conflict");

    // Growing up to the neighbour is fine.
    let resized = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.resize",
        json!({ "placementId": a_id, "durationMinutes": 120 }),
    );
    assert_eq!(resized.pointer("/placement/endMinutes").and_then(|v| v.as_i64()), Some(600));

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.resize",
        json!({ "placementId": a_id, "durationMinutes": 45 }),
    );
    assert_eq!(code, "bad_params");

    // Moving onto itself is never a conflict.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "schedule.move",
        json!({ "placementId": b_id, "day": "thursday", "startSlot": 5 }),
    );
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "schedule.move",
        json!({ "placementId": b_id, "day": "thursday", "startSlot": 1 }),
    );
    assert_eq!(code, "conflict");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "setup.update",
        json!({ "section": "schedule", "patch": { "revalidateOnEdit": false } }),
    );
    let moved = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "schedule.move",
        json!({ "placementId": b_id, "day": "thursday", "startSlot": 1 }),
    );
    assert_eq!(moved.pointer("/placement/startMinutes").and_then(|v| v.as_i64()), Some(510));

    // New placements are always checked.
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "schedule.place",
        json!({ "sectionId": s1, "day": "thursday", "week": 5, "startSlot": 0 }),
    );
    assert_eq!(code, "conflict");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn huge_durations_and_day_end_are_enforced_on_every_edit() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let course_id = setup_course(&mut stdin, &mut reader, "uniscan-schedule-limits");
    let s1 = format!("{}-theory-1", course_id);

    // 15:00-16:00, half an hour before the grid closes at 16:30.
    let a = place(&mut stdin, &mut reader, "1", &s1, "tuesday", 2, 14);
    let a_id = str_field(&a, "placementId");

    let huge = i64::MAX - i64::MAX % 30;
    for (i, minutes) in [huge, 600, -30].into_iter().enumerate() {
        let (code, _) = request_err(
            &mut stdin,
            &mut reader,
            &format!("big{}", i),
            "schedule.resize",
            json!({ "placementId": a_id, "durationMinutes": minutes }),
        );
        assert_eq!(code, "bad_params", "duration {}", minutes);
    }
    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert!(health.is_object());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "schedule", "patch": { "revalidateOnEdit": false, "enforceDayEnd": true } }),
    );
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.resize",
        json!({ "placementId": a_id, "durationMinutes": 120 }),
    );
    assert_eq!(code, "bad_params");
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.move",
        json!({ "placementId": a_id, "day": "tuesday", "startSlot": 16 }),
    );
    assert_eq!(code, "bad_params");

    let listed = request_ok(&mut stdin, &mut reader, "6", "schedule.list", json!({}));
    assert_eq!(
        listed.pointer("/placements/0/endMinutes").and_then(|v| v.as_i64()),
        Some(960)
    );

    drop(stdin);
    let _ = child.wait();
}
