#[path = "support/mylite_process.rs"]
mod mylite_process;

use mylite_process::run_mylite;

#[test]
fn help_lists_connection_and_engine_flags() {
    let output = run_mylite(&["--help"]);

    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--database",
        "--file",
        "--server-version",
        "--trace-file",
        "--max-retries",
        "--atomic-table",
    ] {
        assert!(stdout.contains(flag), "help should list {flag}: {stdout}");
    }
}

#[test]
fn rejects_unknown_flags_with_usage() {
    let output = run_mylite(&["--host", "localhost"]);

    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unexpected argument '--host'"));
    assert!(stderr.contains("Usage: mylite"));
}

#[test]
fn rejects_non_numeric_retry_count() {
    let output = run_mylite(&["--max-retries", "many"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--max-retries"));
}
