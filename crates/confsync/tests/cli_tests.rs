//! Tests for the `confsync` binary.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;

use common::{ObjectBuilder, SettingsBuilder, TestHarness};

fn confsync(harness: &TestHarness) -> Command {
    let mut cmd = Command::cargo_bin("confsync").unwrap();
    cmd.current_dir(harness.temp_path())
        .env_remove("CONFSYNC_SETTINGS")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_version() {
    let harness = TestHarness::new();
    confsync(&harness)
        .arg("version")
        .assert()
        .success()
        .stdout(format!("{}\n", env!("CARGO_PKG_VERSION")));

    confsync(&harness)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_get_prints_rendered_object() {
    let harness = TestHarness::new();
    let source = harness.write_source("config.yaml", "a: 1\n");
    let settings = harness.write_settings(&SettingsBuilder::new().object(
        ObjectBuilder::local("app", &source)
            .format("yaml")
            .dest(&harness.output_path("config.json"), "json"),
    ));

    confsync(&harness)
        .arg("--config")
        .arg(&settings)
        .args(["get", "app"])
        .assert()
        .success()
        .stdout("{\n  \"a\": 1\n}\n");
}

#[test]
fn test_apply_all_objects_creates_directories() {
    let harness = TestHarness::new();
    let source = harness.write_source("greeting.txt", "hello");
    let out_raw = harness.output_path("nested/greeting.txt");
    let out_yaml = harness.output_path("other/greeting.yaml");
    harness.write_settings(
        &SettingsBuilder::new()
            .object(ObjectBuilder::local("raw", &source).dest(&out_raw, "raw"))
            .object(ObjectBuilder::local("yaml", &source).dest(&out_yaml, "yaml")),
    );

    // Discovered from the working directory.
    confsync(&harness)
        .arg("apply")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "Apply raw: LocalBackend(path='{}') (raw) -> {} (raw)",
            source.display(),
            out_raw.display()
        )))
        .stdout(predicate::str::contains("Apply yaml:"));

    assert_eq!(std::fs::read_to_string(&out_raw).unwrap(), "hello");
    assert_eq!(
        std::fs::read_to_string(&out_yaml).unwrap(),
        "content: hello\n"
    );
}

#[test]
fn test_apply_named_object_only() {
    let harness = TestHarness::new();
    let source = harness.write_source("greeting.txt", "hello");
    let out_a = harness.output_path("a.txt");
    let out_b = harness.output_path("b.txt");
    harness.write_settings(
        &SettingsBuilder::new()
            .object(ObjectBuilder::local("a", &source).dest(&out_a, "raw"))
            .object(ObjectBuilder::local("b", &source).dest(&out_b, "raw")),
    );

    confsync(&harness).args(["apply", "b"]).assert().success();

    assert!(!out_a.exists());
    assert_eq!(std::fs::read_to_string(&out_b).unwrap(), "hello");
}

#[test]
fn test_missing_key_fails_with_message() {
    let harness = TestHarness::new();
    let source = harness.write_source("config.yaml", "a: 1\n");
    harness.write_settings(&SettingsBuilder::new().object(
        ObjectBuilder::local("example", &source)
            .dest(&harness.output_path("x"), "json")
            .without_dest_path(),
    ));

    confsync(&harness)
        .args(["get", "example"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "ERROR: Configuration error: Missing key: objects.example.dest.path",
        ));
}

#[test]
fn test_unknown_object_fails() {
    let harness = TestHarness::new();
    harness.write_settings(&SettingsBuilder::new());

    confsync(&harness)
        .args(["apply", "ghost"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No configuration object named 'ghost'"));
}

#[test]
fn test_self_print() {
    let harness = TestHarness::new();
    let source = harness.write_source("config.yaml", "a: 1\n");
    harness.write_settings(&SettingsBuilder::new().object(
        ObjectBuilder::local("app", &source).dest(&harness.output_path("x.json"), "json"),
    ));

    confsync(&harness)
        .args(["self", "print"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app:"))
        .stdout(predicate::str::contains("backend: local"));
}

#[test]
#[serial]
fn test_settings_from_environment() {
    let harness = TestHarness::new();
    let source = harness.write_source("greeting.txt", "hello");
    let settings = harness.write_settings(&SettingsBuilder::new().object(
        ObjectBuilder::local("greeting", &source).dest(&harness.output_path("g.txt"), "raw"),
    ));
    let elsewhere = TestHarness::new();

    confsync(&elsewhere)
        .env("CONFSYNC_SETTINGS", &settings)
        .args(["get", "greeting"])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
#[serial]
fn test_missing_settings_file() {
    let harness = TestHarness::new();

    confsync(&harness)
        .env("HOME", harness.temp_path())
        .args(["self", "print"])
        .assert()
        .success()
        .stderr(predicate::str::contains("WARNING: Could not find the settings file"));

    confsync(&harness)
        .env("HOME", harness.temp_path())
        .args(["get", "anything"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not find settings file"));
}
