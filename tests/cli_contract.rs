use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde_json::Value;
use tempfile::tempdir;

const PIXELS: usize = 102;

fn uniform_line(value: i32) -> String {
    vec![value.to_string(); PIXELS].join(" ")
}

fn ascending_line() -> String {
    (1..=PIXELS)
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_capture(path: &Path, lines: &[String]) {
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).expect("capture should write");
}

fn run_linecam(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_linecam"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("linecam command should run")
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn check_reports_frame_count() {
    let dir = tempdir().expect("tempdir should create");
    write_capture(
        &dir.path().join("cam.txt"),
        &[ascending_line(), uniform_line(200), uniform_line(0)],
    );

    let output = run_linecam(dir.path(), &["cam.txt", "--check"]);
    assert!(
        output.status.success(),
        "check should succeed: stderr={}",
        stderr_of(&output)
    );
    assert_eq!(stdout_of(&output).trim(), "OK: cam.txt (3 frames)");
}

#[test]
fn check_json_is_machine_readable() {
    let dir = tempdir().expect("tempdir should create");
    write_capture(&dir.path().join("cam.txt"), &[uniform_line(1), uniform_line(2)]);

    let output = run_linecam(dir.path(), &["cam.txt", "--check", "--json"]);
    assert!(output.status.success());
    let parsed: Value = serde_json::from_slice(&output.stdout).expect("json should parse");
    assert_eq!(parsed["ok"], Value::Bool(true));
    assert_eq!(parsed["frames"].as_u64(), Some(2));
}

#[test]
fn missing_file_is_fatal() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_linecam(dir.path(), &["nope.txt", "--check"]);
    assert!(!output.status.success());
    assert!(
        stderr_of(&output).contains("nope.txt"),
        "stderr should name the file: {}",
        stderr_of(&output)
    );
}

#[test]
fn empty_file_is_fatal() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(dir.path().join("empty.txt"), "").expect("write");
    let output = run_linecam(dir.path(), &["empty.txt", "--dump", "1"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("contains no frames"));
}

#[test]
fn non_positive_or_non_numeric_rate_is_rejected() {
    let dir = tempdir().expect("tempdir should create");
    write_capture(&dir.path().join("cam.txt"), &[uniform_line(1)]);

    for rate in ["0", "-5", "fast"] {
        let output = run_linecam(dir.path(), &["cam.txt", rate, "--dump", "1"]);
        assert!(!output.status.success(), "rate {rate} should be rejected");
        assert!(!stderr_of(&output).is_empty());
        assert!(output.stdout.is_empty());
    }
}

#[test]
fn dump_loops_back_to_first_frame() {
    let dir = tempdir().expect("tempdir should create");
    write_capture(
        &dir.path().join("cam.txt"),
        &[ascending_line(), uniform_line(200), uniform_line(0)],
    );

    let output = run_linecam(dir.path(), &["cam.txt", "25", "--dump", "4"]);
    assert!(output.status.success(), "stderr={}", stderr_of(&output));

    let stdout = stdout_of(&output);
    let blocks = stdout
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .collect::<Vec<_>>();
    assert_eq!(blocks.len(), 4);
    assert!(blocks[0].starts_with("frame number : 0 / 2"));
    assert!(blocks[1].contains("LEFT:   200  200"));
    assert!(blocks[2].contains("RIGHT:  000  000"));
    assert_eq!(blocks[3], blocks[0]);
    assert!(blocks[0].contains("MIDDLE: 035  036"));
}

#[test]
fn malformed_token_is_logged_and_skipped() {
    let dir = tempdir().expect("tempdir should create");
    let mut tokens = vec!["050".to_owned(); PIXELS];
    tokens[0] = "zz".to_owned();
    write_capture(&dir.path().join("cam.txt"), &[uniform_line(7), tokens.join(" ")]);

    let output = run_linecam(dir.path(), &["cam.txt", "--dump", "2"]);
    assert!(output.status.success());
    assert!(stderr_of(&output).contains("parse error at pixel 0"));

    let stdout = stdout_of(&output);
    let second = stdout
        .split("frame number : 1 / 1")
        .nth(1)
        .expect("second frame should print");
    assert!(second.contains("LEFT:   007  050  050"));
}

#[test]
fn live_stdin_dump_prints_frames_in_order() {
    let dir = tempdir().expect("tempdir should create");
    let mut child = Command::new(env!("CARGO_BIN_EXE_linecam"))
        .current_dir(dir.path())
        .args(["-", "--live", "--dump", "2"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("linecam should spawn");

    {
        let mut stdin = child.stdin.take().expect("stdin");
        write!(stdin, "{}\r\n{}\n", uniform_line(11), uniform_line(22)).expect("write stdin");
    }

    let output = child.wait_with_output().expect("linecam should exit");
    assert!(output.status.success(), "stderr={}", stderr_of(&output));
    let stdout = stdout_of(&output);
    let first = stdout.find("frame number : 1 (live)").expect("first live frame");
    let second = stdout.find("frame number : 2 (live)").expect("second live frame");
    assert!(first < second);
    assert!(stdout.contains("LEFT:   011  011"));
    assert!(stdout.contains("RIGHT:  022  022"));
}

#[test]
fn config_file_is_validated() {
    let dir = tempdir().expect("tempdir should create");
    write_capture(&dir.path().join("cam.txt"), &[uniform_line(1)]);
    fs::write(dir.path().join("viewer.yaml"), "cell_width: 0\n").expect("write config");

    let output = run_linecam(
        dir.path(),
        &["cam.txt", "--config", "viewer.yaml", "--dump", "1"],
    );
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("cell size must be positive"));
}
