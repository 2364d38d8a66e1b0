mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn setup_defaults_and_patch_validation() {
    let workspace = temp_dir("uniscan-setup-sections");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let defaults = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(
        defaults,
        json!({
            "schedule": { "revalidateOnEdit": true, "enforceDayEnd": false },
            "attendance": { "tokenTtlMinutes": 15 },
            "export": { "prettyJson": true }
        })
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "attendance", "patch": { "tokenTtlMinutes": 30 } }),
    );
    assert_eq!(
        updated.pointer("/attendance/tokenTtlMinutes").and_then(|v| v.as_i64()),
        Some(30)
    );

    let bad = [
        json!({ "section": "attendance", "patch": { "tokenTtlMinutes": 0 } }),
        json!({ "section": "attendance", "patch": { "tokenTtlMinutes": "soon" } }),
        json!({ "section": "schedule", "patch": { "revalidateOnEdit": "yes" } }),
        json!({ "section": "schedule", "patch": { "gridColor": "red" } }),
        json!({ "section": "planner", "patch": {} }),
        json!({ "section": "export" }),
    ];
    for (i, params) in bad.iter().enumerate() {
        let (code, _) = request_err(
            &mut stdin,
            &mut reader,
            &format!("bad{}", i),
            "setup.update",
            params.clone(),
        );
        assert_eq!(code, "bad_params", "case {}", i);
    }

    let after = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(
        after.pointer("/attendance/tokenTtlMinutes").and_then(|v| v.as_i64()),
        Some(30)
    );
    assert_eq!(
        after.pointer("/schedule/revalidateOnEdit").and_then(|v| v.as_bool()),
        Some(true)
    );

    drop(stdin);
    let _ = child.wait();
}
