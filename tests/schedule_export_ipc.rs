mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_field, temp_dir};

#[test]
fn export_writes_week_file_with_resolved_names() {
    let workspace = temp_dir("uniscan-schedule-export");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let prof = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.register",
        json!({ "role": "professor", "fullName": "Grace Hopper", "email": "grace@uni.test" }),
    );
    let prof_id = str_field(&prof, "userId");
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({
            "input": {
                "code": "SE200",
                "name": "Software Engineering",
                "type": "theory-practical",
                "academicHours": 2,
                "weeks": 15,
                "theorySections": 1,
                "theoryProfessors": [prof_id]
            }
        }),
    );
    let course_id = str_field(&created, "courseId");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.place",
        json!({ "sectionId": format!("{}-theory-1", course_id), "day": "monday", "week": 7, "startSlot": 2 }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.place",
        json!({ "sectionId": format!("{}-practical-1", course_id), "day": "monday", "week": 7, "startSlot": 6 }),
    );
    // Other weeks stay out of the file.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "schedule.place",
        json!({ "sectionId": format!("{}-practical-2", course_id), "day": "monday", "week": 8, "startSlot": 0 }),
    );

    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "schedule.export",
        json!({ "week": 7 }),
    );
    assert_eq!(str_field(&exported, "fileName"), "term-table-week-7.json");
    assert_eq!(exported.get("scheduledSections").and_then(|v| v.as_i64()), Some(2));
    let path = workspace.join("exports").join("term-table-week-7.json");
    assert_eq!(str_field(&exported, "path"), path.to_string_lossy());

    let text = std::fs::read_to_string(&path).expect("read export");
    let doc: serde_json::Value = serde_json::from_str(&text).expect("export json");
    assert_eq!(doc.get("weekNumber").and_then(|v| v.as_i64()), Some(7));
    assert!(doc.get("generatedAt").and_then(|v| v.as_str()).is_some());
    assert_eq!(doc.get("courses").and_then(|v| v.as_array()).map(|a| a.len()), Some(1));
    assert_eq!(doc.get("professors").and_then(|v| v.as_array()).map(|a| a.len()), Some(1));

    let rows = doc
        .get("scheduledSections")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("scheduledSections");
    assert_eq!(rows.len(), 2);
    assert_eq!(str_field(&rows[0], "instructorName"), "Grace Hopper");
    assert_eq!(str_field(&rows[0], "startTime"), "9:00 AM");
    assert_eq!(str_field(&rows[0], "endTime"), "11:00 AM");
    assert_eq!(str_field(&rows[1], "kind"), "practical");
    assert_eq!(str_field(&rows[1], "instructorName"), "Unassigned");
    assert_eq!(str_field(&rows[1], "startTime"), "11:00 AM");
    assert_eq!(str_field(&rows[1], "endTime"), "1:00 PM");

    // Compact output when pretty printing is switched off.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "setup.update",
        json!({ "section": "export", "patch": { "prettyJson": false } }),
    );
    let out_dir = temp_dir("uniscan-schedule-export-out");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "schedule.export",
        json!({ "week": 8, "outDir": out_dir.to_string_lossy() }),
    );
    let text = std::fs::read_to_string(out_dir.join("term-table-week-8.json")).expect("read");
    assert!(!text.contains('\n'));

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "schedule.export",
        json!({}),
    );
    assert_eq!(code, "bad_params");

    drop(stdin);
    let _ = child.wait();
}
