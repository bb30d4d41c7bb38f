//! CLI Integration Tests
//!
//! These tests drive the `duplexcheck` binary end-to-end, including a real
//! TCP conversation for `serve`.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process::{Child, Command as StdCommand, Stdio};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn cli_cmd() -> Command {
    Command::cargo_bin("duplexcheck").expect("Failed to find duplexcheck binary")
}

fn write_script(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("script.txt");
    std::fs::write(&path, text).unwrap();
    path
}

/// Start `serve` on an ephemeral port and return the child plus its address
fn spawn_serve(script: &std::path::Path, extra: &[&str]) -> (Child, String) {
    let bin = assert_cmd::cargo::cargo_bin("duplexcheck");
    let mut child = StdCommand::new(bin)
        .args(["serve", "--bind", "127.0.0.1:0", "--write-delay-ms", "20"])
        .arg("--script")
        .arg(script)
        .args(extra)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let stdout = child.stdout.as_mut().unwrap();
    let mut first = String::new();
    // Read byte-wise so nothing past the first line is buffered away
    let mut byte = [0u8; 1];
    while std::io::Read::read(stdout, &mut byte).unwrap() == 1 && byte[0] != b'\n' {
        first.push(byte[0] as char);
    }
    let addr = first
        .strip_prefix("Listening on ")
        .expect("serve prints its address first")
        .trim()
        .to_string();
    (child, addr)
}

/// Read lines from the server until EOF, answering with `respond`
fn converse(addr: &str, respond: impl Fn(&str) -> Option<&'static str>) -> Vec<String> {
    let stream = TcpStream::connect(addr).unwrap();
    let mut writer = stream.try_clone().unwrap();
    let reader = BufReader::new(stream);

    let mut received = Vec::new();
    for line in reader.lines().map_while(Result::ok) {
        let line = line.trim_end_matches('\r').to_string();
        if let Some(answer) = respond(&line) {
            writeln!(writer, "{}", answer).unwrap();
        }
        received.push(line);
    }
    received
}

const HELLO: &str = "> Hello\n< Good\n> Great\n";

// ============================================================================
// Check Command Tests
// ============================================================================

#[test]
fn test_help() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("check"));
}

#[test]
fn test_check_lists_directives() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "# greeting\n> Hello\n< Good\n~ thanks\n");

    cli_cmd()
        .arg("check")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 directives"))
        .stdout(predicate::str::contains("1. INPUT (Hello)"))
        .stdout(predicate::str::contains("2. OUTPUT (Good)"))
        .stdout(predicate::str::contains("3. OUTPUT (containing \"thanks\")"));
}

#[test]
fn test_check_reports_bad_line() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, "> Hello\n! oops\n");

    cli_cmd()
        .arg("check")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2: unknown marker '!'"));
}

#[test]
fn test_check_missing_file() {
    cli_cmd()
        .args(["check", "/definitely/not/here.txt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load script"));
}

#[test]
fn test_serve_rejects_bad_log_level() {
    cli_cmd()
        .args(["serve", "--log-level", "loud"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown log category 'loud'"));
}

// ============================================================================
// Serve Command Tests
// ============================================================================

#[test]
fn test_serve_passing_conversation() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, HELLO);
    let transcript = dir.path().join("run.jsonl");

    let (child, addr) = spawn_serve(&script, &["--transcript", transcript.to_str().unwrap()]);
    let received = converse(&addr, |line| (line == "Hello").then_some("Good"));

    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");
    assert!(stdout.contains("PASSED"));

    assert!(received[0].starts_with("Starting duplexcheck test"));
    let tail: Vec<&str> = received.iter().skip(3).map(String::as_str).collect();
    assert_eq!(tail, vec!["Hello", "Great"]);

    let jsonl = std::fs::read_to_string(&transcript).unwrap();
    assert!(jsonl.contains("\"kind\":\"finished\""));
}

#[test]
fn test_serve_failing_conversation() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, HELLO);

    let (child, addr) = spawn_serve(&script, &[]);
    let received = converse(&addr, |line| (line == "Hello").then_some("Bad"));

    let output = child.wait_with_output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("FAILED"));
    assert!(!received.iter().any(|line| line == "Great"));
}
