//! CLI integration tests
//!
//! These tests run the built binary and check:
//! - Command parsing and help output
//! - Output formats and views
//! - Error reports and exit codes

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn buildpulse_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_buildpulse"))
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("logs")
        .join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(buildpulse_bin())
        .args(args)
        .env_remove("BUILDPULSE_MIN_SEVERITY")
        .env_remove("BUILDPULSE_TOTAL_TARGETS")
        .output()
        .expect("Failed to execute buildpulse")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("buildpulse"));
    assert!(text.contains("analyze"));
    assert!(text.contains("watch"));
    assert!(text.contains("strategy"));
}

#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_analyze_success_summary() {
    let path = fixture("xcode_success.log");
    let output = run(&["-q", "analyze", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.starts_with("\u{2713} Build succeeded"));
    assert!(text.contains("0 errors, 1 warnings"));
}

#[test]
fn test_analyze_failure_json_compact() {
    let path = fixture("xcode_failure.log");
    let output = run(&[
        "-q",
        "analyze",
        path.to_str().unwrap(),
        "--format",
        "json",
        "--view",
        "compact",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["status"], "failed");
    assert_eq!(value["error_count"], 2);
    assert_eq!(value["warning_count"], 2);
}

#[test]
fn test_analyze_reads_stdin() {
    let mut child = Command::new(buildpulse_bin())
        .args(["-q", "analyze", "-", "--format", "yaml", "--view", "detailed"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(std::fs::read(fixture("xcode_failure.log")).unwrap().as_slice())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let value: serde_yaml::Value = serde_yaml::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["status"], serde_yaml::Value::from("failed"));
    assert_eq!(value["diagnostics"].as_sequence().unwrap().len(), 4);
}

#[test]
fn test_analyze_min_severity_and_output_file() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("report.json");
    let path = fixture("xcode_failure.log");
    let output = run(&[
        "-q",
        "analyze",
        path.to_str().unwrap(),
        "-f",
        "json",
        "--view",
        "full",
        "--min-severity",
        "error",
        "-o",
        out.to_str().unwrap(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(value["result"]["diagnostics"].as_array().unwrap().len(), 2);
    assert_eq!(value["result"]["metrics"]["warning_count"], 2);
}

#[test]
fn test_analyze_empty_input_reports_error() {
    let dir = TempDir::new().unwrap();
    let empty = dir.path().join("empty.log");
    std::fs::write(&empty, "").unwrap();

    let output = run(&["-q", "analyze", empty.to_str().unwrap(), "-f", "json"]);
    assert_eq!(output.status.code(), Some(2));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["code"], "EMPTY_INPUT");
    assert!(!value["suggested_actions"].as_array().unwrap().is_empty());
}

#[test]
fn test_analyze_missing_file_reports_error() {
    let output = run(&["-q", "analyze", "/definitely/not/here.log"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("Error [IO_ERROR]"));
}

#[test]
fn test_watch_success_and_failure() {
    let path = fixture("xcode_success.log");
    let output = run(&[
        "-q",
        "watch",
        "--no-resources",
        "--",
        "cat",
        path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("Build succeeded"));

    let output = run(&[
        "-q",
        "watch",
        "--no-resources",
        "-f",
        "json",
        "--view",
        "summary",
        "--",
        "sh",
        "-c",
        "echo 'Planning build'; exit 3",
    ]);
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["termination"]["kind"], "non_zero_exit");
    assert_eq!(value["termination"]["code"], 3);
}

#[test]
fn test_watch_invalid_thresholds() {
    let output = run(&[
        "-q",
        "watch",
        "--suspect-after",
        "50",
        "--hang-after",
        "10",
        "--",
        "true",
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("CONFIG_ERROR"));
}

#[test]
fn test_strategy_json() {
    let output = run(&[
        "-q",
        "strategy",
        "--dependency-conflicts",
        "--format",
        "json",
        "--",
        "-workspace",
        "App.xcworkspace",
    ]);

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["strategy"]["name"], "Dependency Resolution Rebuild");
    let first = value["strategy"]["commands"][0]["arguments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a.as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(
        first,
        vec![
            "xcodebuild",
            "-resolvePackageDependencies",
            "-workspace",
            "App.xcworkspace"
        ]
    );
}

#[test]
fn test_strategy_rejects_bad_memory_pressure() {
    let output = run(&["strategy", "--memory-pressure", "2"]);
    assert!(!output.status.success());
}
