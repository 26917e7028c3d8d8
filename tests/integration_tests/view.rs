use std::fs;
use std::io::Write;
use std::process::Stdio;

use insta::assert_snapshot;

use super::{ptview, stderr, stdout, testdata};

/// The row of `stdout` whose message is exactly `message`.
fn row<'a>(stdout: &'a str, message: &str) -> Option<&'a str> {
    stdout
        .lines()
        .find(|line| line.split("  ").any(|cell| cell.trim() == message))
}

#[test]
fn test_batch_correlates_spans() {
    let output = ptview().arg(testdata("classic.csv")).output().unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = stdout(&output);
    assert!(stdout.starts_with("Start"), "header first: {stdout}");
    assert!(stdout.lines().next().unwrap().contains("Span 3.100 s"));

    let lock = row(&stdout, "lock").expect("lock row");
    assert!(lock.starts_with("0.000"));
    assert!(lock.contains("0.500000"));

    let grab = row(&stdout, "grabbing transaction lock").expect("grab row");
    assert!(grab.contains("0.100000"));

    let holding = row(&stdout, "holding transaction lock").expect("synthesized row");
    assert!(holding.starts_with("1.100"));
    assert!(holding.contains("2.000000"));

    // Info events never become rows
    assert!(row(&stdout, "releasing transaction lock").is_none());
    assert!(stderr(&output).contains("Correlated 3 spans from 5 records"));
}

#[test]
fn test_batch_table_layout() {
    let output = ptview().arg(testdata("classic.csv")).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    assert_snapshot!(stdout(&output).trim_end(), @r"
    Start  Message                    Context  Node  Device  Tid  Duration  Span 3.100 s
    0.000  lock                       cli                    10   0.500000  ━━━━━━━━
    1.000  grabbing transaction lock  cli                    7    0.100000                 ━━
    1.100  holding transaction lock   cli                    7    2.000000                   ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    ");
    assert_snapshot!(stderr(&output).trim_end(), @"✅ Correlated 3 spans from 5 records");
}

#[test]
fn test_stdin_source() {
    let mut child = ptview()
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(&fs::read(testdata("classic.csv")).unwrap())
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(row(&stdout(&output), "holding transaction lock").is_some());
}

#[test]
fn test_malformed_row_is_reported_and_skipped() {
    let output = ptview().arg(testdata("malformed.csv")).output().unwrap();

    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = stdout(&output);
    let lock = row(&stdout, "lock").expect("lock row");
    assert!(lock.contains("0.500000"));

    let stderr = stderr(&output);
    assert!(stderr.contains("Skipped 1 malformed record"), "{stderr}");
    assert!(stderr.contains("line 2: expected 18 columns, found 4"), "{stderr}");
}

#[test]
fn test_header_trace_filters_bookkeeping_and_operational() {
    let output = ptview().arg(testdata("spanned.csv")).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = stdout(&output);

    assert!(row(&stdout, "applying transaction").unwrap().contains("1.000000"));
    let connects: Vec<_> = stdout.lines().filter(|l| l.contains("connect")).collect();
    assert_eq!(connects.len(), 2);
    assert!(connects[0].contains("ce0") && connects[0].contains("0.200000"));
    assert!(connects[1].contains("ce1") && connects[1].contains("0.300000"));

    assert!(row(&stdout, "check-sync").is_none());
    assert!(row(&stdout, "get stats").is_none());
}

#[test]
fn test_oper_includes_operational_spans() {
    let output = ptview()
        .arg("--oper")
        .arg(testdata("spanned.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    // No DURATION on the stop: timestamps decide
    let stdout = stdout(&output);
    let stats = row(&stdout, "get stats").expect("operational row");
    assert!(stats.contains("0.300000"));
}

#[test]
fn test_tid_selects_transactions() {
    let output = ptview()
        .args(["--tid", "10"])
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = stdout(&output);
    assert!(row(&stdout, "lock").is_some());
    assert!(row(&stdout, "grabbing transaction lock").is_none());
    assert!(row(&stdout, "holding transaction lock").is_none());
}

#[test]
fn test_message_filter_file() {
    let output = ptview()
        .arg("--filter")
        .arg(testdata("messages.txt"))
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = stdout(&output);
    assert!(row(&stdout, "holding transaction lock").is_some());
    assert!(row(&stdout, "lock").is_none());
    assert!(row(&stdout, "grabbing transaction lock").is_none());
}

#[test]
fn test_begin_end_window() {
    let output = ptview()
        .args(["--begin", "2024-01-01T00:00:00.900000"])
        .args(["--end", "2024-01-01T00:00:02"])
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = stdout(&output);
    assert!(row(&stdout, "lock").is_none());
    assert!(row(&stdout, "grabbing transaction lock").is_some());
}

#[test]
fn test_absolute_start_labels() {
    let output = ptview()
        .arg("--timestamp")
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = stdout(&output);
    let holding = row(&stdout, "holding transaction lock").unwrap();
    assert!(holding.starts_with("2024-01-01T00:00:01.100000"), "{holding}");
}

#[test]
fn test_write_copies_input_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let copy = dir.path().join("copy.csv");

    let output = ptview()
        .arg("--write")
        .arg(&copy)
        .arg(testdata("malformed.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    assert_eq!(
        fs::read(&copy).unwrap(),
        fs::read(testdata("malformed.csv")).unwrap()
    );
}

#[test]
fn test_realtime_replay_completes() {
    let output = ptview()
        .args(["--realtime", "--speedup", "1000"])
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
    let stdout = stdout(&output);
    let holding = row(&stdout, "holding transaction lock").unwrap();
    assert!(holding.contains("2.000000"), "{holding}");
}

#[test]
fn test_unsupported_width_fails() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("narrow.csv");
    fs::write(&trace, "start,2024-01-01T00:00:00,1\n").unwrap();

    let output = ptview().arg(&trace).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    let stderr = stderr(&output);
    assert!(
        stderr.contains("Unsupported number of columns in progress trace: 3"),
        "{stderr}"
    );
    assert!(stderr.contains("17, 18, 19 or 21 columns"));
}

#[test]
fn test_old_revision_header_fails() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("old.csv");
    fs::write(
        &trace,
        "TIMESTAMP,TID,SESSION ID,CONTEXT,SUBSYSTEM,PHASE,SERVICE,SERVICE PHASE,COMMIT QUEUE ID,NODE,DEVICE,DEVICE PHASE,PACKAGE,DURATION,MESSAGE\n",
    )
    .unwrap();

    let output = ptview().arg(&trace).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("is not supported"));
}

#[test]
fn test_empty_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("empty.csv");
    fs::write(&trace, "\n").unwrap();

    let output = ptview().arg(&trace).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("No records in"));
}

#[test]
fn test_missing_file_fails() {
    let output = ptview()
        .arg("/nonexistent/path/to/trace.csv")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Cannot read"));
}

#[test]
fn test_speedup_requires_realtime() {
    let output = ptview()
        .args(["--speedup", "2"])
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_explicit_broken_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "speedup = \"fast\"\n").unwrap();

    let output = ptview()
        .arg("--config")
        .arg(&config)
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Invalid config"));
}

#[test]
fn test_config_from_env_applies() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "min-bar-width = 30\n").unwrap();

    let output = ptview()
        .env("PTVIEW_CONFIG_PATH", &config)
        .arg(testdata("classic.csv"))
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));
}

#[cfg(unix)]
#[test]
fn test_follow_shows_appended_records_and_stops_on_interrupt() {
    use std::thread::sleep;
    use std::time::Duration;

    let rows: Vec<String> = fs::read_to_string(testdata("classic.csv"))
        .unwrap()
        .lines()
        .map(|l| format!("{l}\n"))
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("live.csv");
    fs::write(&trace, &rows[0]).unwrap();

    let child = ptview()
        .arg("--follow")
        .arg(&trace)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    // Let it reach the end of what already exists
    sleep(Duration::from_millis(800));
    let mut file = fs::OpenOptions::new().append(true).open(&trace).unwrap();
    for row in &rows[2..] {
        file.write_all(row.as_bytes()).unwrap();
    }
    file.flush().unwrap();
    sleep(Duration::from_millis(800));

    let status = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = stdout(&output);
    // The existing start was skipped, so no lock row
    assert!(row(&stdout, "lock").is_none());
    assert!(
        row(&stdout, "holding transaction lock")
            .unwrap()
            .contains("2.000000")
    );
    assert!(stderr(&output).contains("Stopped"));
}

#[cfg(unix)]
#[test]
fn test_follow_from_empty_file_keeps_first_records() {
    use std::thread::sleep;
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let trace = dir.path().join("live.csv");
    fs::write(&trace, "").unwrap();

    let child = ptview()
        .arg("--follow")
        .arg(&trace)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    sleep(Duration::from_millis(800));
    let mut file = fs::OpenOptions::new().append(true).open(&trace).unwrap();
    file.write_all(&fs::read(testdata("classic.csv")).unwrap())
        .unwrap();
    file.flush().unwrap();
    sleep(Duration::from_millis(800));

    let status = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let stdout = stdout(&output);
    let lock = row(&stdout, "lock").expect("first record kept");
    assert!(lock.contains("0.500000"), "{lock}");
    let holding = row(&stdout, "holding transaction lock").unwrap();
    assert!(holding.contains("2.000000"), "{holding}");
    assert!(stderr(&output).contains("Stopped"));
}
