mod test_support;

use rusqlite::Connection;
use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, str_field, temp_dir};

#[test]
fn registration_rules_and_professor_directory() {
    let workspace = temp_dir("uniscan-users-registry");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.register",
        json!({ "role": "student", "fullName": "Sam Student", "email": "Sam@Uni.Test", "studentNumber": "S-001" }),
    );
    assert_eq!(student.pointer("/user/email").and_then(|v| v.as_str()), Some("sam@uni.test"));

    let rejected = [
        json!({ "role": "student", "fullName": "No Number", "email": "nn@uni.test" }),
        json!({ "role": "student", "fullName": "Dup Mail", "email": "sam@uni.test", "studentNumber": "S-002" }),
        json!({ "role": "student", "fullName": "Dup Number", "email": "dn@uni.test", "studentNumber": "S-001" }),
        json!({ "role": "professor", "fullName": "Prof Number", "email": "pn@uni.test", "studentNumber": "P-1" }),
        json!({ "role": "student", "fullName": "Bad Mail", "email": "not-an-email", "studentNumber": "S-003" }),
        json!({ "role": "dean", "fullName": "Who", "email": "who@uni.test" }),
    ];
    for (i, params) in rejected.iter().enumerate() {
        let (code, _) = request_err(
            &mut stdin,
            &mut reader,
            &format!("bad{}", i),
            "users.register",
            params.clone(),
        );
        assert_eq!(code, "bad_params", "case {}", i);
    }

    let prof = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.register",
        json!({ "role": "professor", "fullName": "Barbara Liskov", "email": "liskov@uni.test", "department": "CS" }),
    );
    let prof_id = str_field(&prof, "userId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "users.register",
        json!({ "role": "subAdmin", "fullName": "Alex Admin", "email": "admin@uni.test" }),
    );

    let professors = request_ok(&mut stdin, &mut reader, "5", "professors.list", json!({}));
    let professors = professors
        .get("professors")
        .and_then(|v| v.as_array())
        .cloned()
        .expect("professors");
    assert_eq!(professors.len(), 1);
    assert_eq!(str_field(&professors[0], "id"), prof_id);
    assert_eq!(str_field(&professors[0], "department"), "CS");

    let all = request_ok(&mut stdin, &mut reader, "6", "users.list", json!({}));
    assert_eq!(all.get("users").and_then(|v| v.as_array()).map(|a| a.len()), Some(3));
    let students = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "users.list",
        json!({ "role": "student" }),
    );
    assert_eq!(
        students.get("users").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "users.delete",
        json!({ "userId": prof_id }),
    );
    let professors = request_ok(&mut stdin, &mut reader, "9", "professors.list", json!({}));
    assert_eq!(
        professors.get("professors").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "users.delete",
        json!({ "userId": prof_id }),
    );
    assert_eq!(code, "not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unreadable_rows_surface_as_query_errors() {
    let workspace = temp_dir("uniscan-users-corrupt");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let user = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.register",
        json!({ "role": "professor", "fullName": "Rita Rows", "email": "rita@uni.test" }),
    );
    let user_id = str_field(&user, "userId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({ "input": { "code": "ART1", "name": "Drawing", "type": "theory", "academicHours": 1, "weeks": 8, "theorySections": 1 } }),
    );

    let conn = Connection::open(workspace.join("uniscan.sqlite3")).expect("open db");
    conn.execute("UPDATE users SET role = 'dean' WHERE id = ?", [&user_id])
        .expect("corrupt role");
    conn.execute("UPDATE courses SET course_type = 'seminar'", [])
        .expect("corrupt type");
    drop(conn);

    let (code, _) = request_err(&mut stdin, &mut reader, "4", "users.list", json!({}));
    assert_eq!(code, "db_query_failed");
    let (code, _) = request_err(&mut stdin, &mut reader, "5", "courses.list", json!({}));
    assert_eq!(code, "db_query_failed");

    drop(stdin);
    let _ = child.wait();
}
