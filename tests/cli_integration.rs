//! Integration tests for the command-line interface
//!
//! Runs the built binary against temporary projects for the init, compile,
//! check and resolve commands

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONFIG: &str = r#"versions = ["1.7.10", "1.8", "1.8.9"]
patch_dir = "patches"
header = "name,description,side"

[tables]
alias_prefix = "raw_"
"#;

/// Helper to create a project directory with a config and optional patch files
fn setup_project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("forge-patcher.toml"), CONFIG).unwrap();

    let patches = dir.path().join("patches");
    fs::create_dir(&patches).unwrap();
    for (name, contents) in files {
        fs::write(patches.join(name), contents).unwrap();
    }
    dir
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_forge-patcher"))
        .arg("--config")
        .arg(dir.join("forge-patcher.toml"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("FORGE_PATCHER_LOG")
        .output()
        .unwrap()
}

#[test]
fn test_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_forge-patcher"))
        .arg("--help")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["compile", "check", "resolve", "init"] {
        assert!(stdout.contains(command), "help should list {command}");
    }
}

#[test]
fn test_missing_config() {
    let dir = TempDir::new().unwrap();
    let output = run(dir.path(), &["check"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config file not found"));
}

#[test]
fn test_init_scaffolds_patch_files() {
    let dir = setup_project(&[]);
    let output = run(dir.path(), &["init"]);
    assert!(output.status.success());

    let patches = dir.path().join("patches");
    for name in ["global.csv", "1.7.10.csv", "1.8.csv", "1.8.9.csv"] {
        let contents = fs::read_to_string(patches.join(name)).unwrap();
        assert_eq!(contents, "name,description,side\n");
    }

    let again = run(dir.path(), &["init"]);
    assert!(again.status.success());
    assert!(String::from_utf8_lossy(&again.stdout).contains("already exist"));
}

#[test]
fn test_compile_to_stdout() {
    let dir = setup_project(&[
        ("global.csv", "name,description,side\nFooEvent,Fired on foo,\n"),
        ("1.8.csv", "name,description,side\nFooEvent,,@+@1.7.10@\n"),
    ]);
    let output = run(dir.path(), &["compile"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("-- forge-patcher xxh3:"));
    assert!(stdout.contains("-- version 1.7.10"));
    assert!(stdout.contains("-- version 1.8.9"));
    assert!(stdout.contains("CROSS JOIN `1_7_10` AS `raw_1_7_10`"));
    assert_eq!(stdout.matches("UPDATE ").count(), 4);
}

#[test]
fn test_compile_only_restricts_versions() {
    let dir = setup_project(&[("global.csv", "name,description,side\nFoo,bar,\n")]);
    let output = run(dir.path(), &["compile", "--only", "1.8++"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("-- version 1.7.10"));
    assert!(stdout.contains("-- version 1.8\n"));
    assert!(stdout.contains("-- version 1.8.9"));
}

#[test]
fn test_compile_writes_output_once() {
    let dir = setup_project(&[("global.csv", "name,description,side\nFoo,bar,\n")]);
    let script = dir.path().join("out").join("patch.sql");
    fs::create_dir(dir.path().join("out")).unwrap();
    let script_arg = script.to_str().unwrap();

    let first = run(dir.path(), &["compile", "--output", script_arg]);
    assert!(first.status.success());
    assert!(String::from_utf8_lossy(&first.stderr).contains("Wrote"));
    let written = fs::read_to_string(&script).unwrap();
    assert!(written.contains("SET `description` = 'bar'"));

    let second = run(dir.path(), &["compile", "--output", script_arg]);
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("up to date"));
    assert_eq!(fs::read_to_string(&script).unwrap(), written);
}

#[test]
fn test_check_passes_on_clean_patches() {
    let dir = setup_project(&[("global.csv", "name,description,side\nFoo,bar,\n")]);
    let output = run(dir.path(), &["check"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("All patches compile"));
}

#[test]
fn test_check_reports_failures() {
    let dir = setup_project(&[(
        "global.csv",
        "name,description,side\nFoo,@1.8,\n@@1.9\nBar,x,\n",
    )]);
    let report = dir.path().join("report.json");
    let output = run(
        dir.path(),
        &["check", "--report", report.to_str().unwrap()],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("global.csv:2"));
    assert!(stderr.contains("were not applied"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["files"][0]["line"], 3);
    assert_eq!(json["rows"].as_array().unwrap().len(), 3);
}

#[test]
fn test_resolve() {
    let dir = setup_project(&[]);
    let output = run(dir.path(), &["resolve", "1.7.10-1.8;1.8.9"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "1.7.10\n1.8\n1.8.9\n"
    );

    let unknown = run(dir.path(), &["resolve", "1.8.8"]);
    assert!(!unknown.status.success());
    let stderr = String::from_utf8_lossy(&unknown.stderr);
    assert!(stderr.contains("1.8.8"));
}
