use std::{
    io::Write,
    process::{Command, Output, Stdio},
};

pub fn run_mylite(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mylite"))
        .args(args)
        .env_remove("MYLITE_DATABASE")
        .env_remove("MYLITE_MAX_RETRIES")
        .output()
        .unwrap_or_else(|error| panic!("failed to run mylite: {error}"))
}

pub fn run_mylite_with_stdin(args: &[&str], stdin_sql: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_mylite"))
        .args(args)
        .env_remove("MYLITE_DATABASE")
        .env_remove("MYLITE_MAX_RETRIES")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|error| panic!("failed to run mylite with stdin: {error}"));

    let mut stdin = child
        .stdin
        .take()
        .unwrap_or_else(|| panic!("failed to capture child stdin"));
    stdin
        .write_all(stdin_sql.as_bytes())
        .unwrap_or_else(|error| panic!("failed to write stdin payload: {error}"));
    drop(stdin);

    child
        .wait_with_output()
        .unwrap_or_else(|error| panic!("failed to wait for mylite: {error}"))
}
