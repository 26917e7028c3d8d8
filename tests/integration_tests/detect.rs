use std::fs;

use super::{ptview, stderr, stdout, testdata};

#[test]
fn test_detect_headerless_trace() {
    let output = ptview()
        .arg("--detect")
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(
        lines,
        [
            "Revision      5.4-5.6",
            "Columns       18 (classic layout, no header)",
            "Capabilities  duration",
        ]
    );
}

#[test]
fn test_detect_header_trace_as_json() {
    let output = ptview()
        .args(["--detect", "--json"])
        .arg(testdata("spanned.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "revision": "6.1-",
            "capabilities": {"duration": true, "traces": true, "spans": true},
            "source": {"kind": "header"},
            "width": 23,
        })
    );
}

#[test]
fn test_detect_names_unsupported_revision() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("old.csv");
    fs::write(&trace, "TIMESTAMP,TID,SESSION ID,CONTEXT,MESSAGE\n").unwrap();

    let output = ptview().arg("--detect").arg(&trace).output().unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.contains("Revision      -5.3"), "{stdout}");
    assert!(stdout.contains("Capabilities  none"), "{stdout}");
}

#[test]
fn test_detect_rejects_unknown_width() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("narrow.csv");
    fs::write(&trace, "a,b,c,d\n").unwrap();

    let output = ptview().arg("--detect").arg(&trace).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Unsupported number of columns in progress trace: 4"));
}

#[test]
fn test_json_requires_detect() {
    let output = ptview()
        .arg("--json")
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}
