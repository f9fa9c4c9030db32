//! CLI tests for the `waypoint` binary.
//!
//! Spawns the binary against a temporary runs directory and verifies exit
//! codes and printed output.

use std::path::Path;
use std::process::{Command, Output};

use waypoint::core::checkpoint::Checkpoint;
use waypoint::core::phase::Phase;
use waypoint::exit_codes;
use waypoint::test_support::WorkDirFixture;

fn waypoint(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_waypoint"))
        .current_dir(root)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("spawn waypoint")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn check_without_progress_exits_nothing_to_resume() {
    let fixture = WorkDirFixture::new("ITEM-1");
    let output = waypoint(fixture.root(), &["check", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOTHING_TO_RESUME));
    assert_eq!(stdout(&output).trim(), "init");
}

#[test]
fn check_resumable_item_prints_instructions() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture.research("notes.md");
    let output = waypoint(fixture.root(), &["check", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let text = stdout(&output);
    assert!(text.starts_with("tests\n"), "stdout: {text}");
    assert!(text.contains("SKIP research phase"), "stdout: {text}");
}

#[test]
fn check_complete_item_exits_complete() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture.report(120);
    let output = waypoint(fixture.root(), &["check", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::COMPLETE));
}

#[test]
fn check_with_explicit_dir_ignores_runs_dir() {
    let fixture = WorkDirFixture::new("ITEM-1");
    let elsewhere = fixture.sibling("elsewhere");
    elsewhere.test_file("test_x.py");
    let dir = elsewhere.path().to_string_lossy().into_owned();
    let output = waypoint(fixture.root(), &["check", "--item", "ITEM-1", "--dir", &dir]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).starts_with("execution\n"));
}

#[test]
fn sync_persists_reconciled_checkpoint() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture.test_file("test_a.py");
    let output = waypoint(fixture.root(), &["sync", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output).trim(), "execution");

    let saved = std::fs::read_to_string(fixture.sidecar_path()).expect("sidecar written");
    let checkpoint = Checkpoint::from_json(&saved).expect("decode");
    assert_eq!(checkpoint.phase(), Phase::Execution);
}

#[test]
fn inspect_does_not_write() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture.research("notes.md");
    let output = waypoint(fixture.root(), &["inspect", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json output");
    assert_eq!(value["phase"], "tests");
    assert!(!fixture.sidecar_path().exists());
}

#[test]
fn settle_validated_removes_sidecar() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture.research("notes.md");
    assert!(waypoint(fixture.root(), &["sync", "--item", "ITEM-1"]).status.success());

    let output = waypoint(fixture.root(), &["settle", "--item", "ITEM-1"]);
    assert_eq!(stdout(&output).trim(), "⏸️ Paused");
    assert!(fixture.sidecar_path().exists());

    let output = waypoint(fixture.root(), &["settle", "--item", "ITEM-1", "--validated"]);
    assert_eq!(stdout(&output).trim(), "✅ Completed");
    assert!(!fixture.sidecar_path().exists());
}

#[test]
fn validate_rejects_unknown_phase() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture.raw_sidecar(r#"{"item_id": "ITEM-1", "phase": "deploy"}"#);
    let output = waypoint(fixture.root(), &["validate", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown phase 'deploy'"), "stderr: {stderr}");

    // Lenient paths still recover.
    let output = waypoint(fixture.root(), &["check", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOTHING_TO_RESUME));
}

#[test]
fn validate_accepts_saved_checkpoint() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture
        .manager()
        .save(fixture.work_dir(), &Checkpoint::new("ITEM-1", Phase::Tests))
        .expect("save");
    let output = waypoint(fixture.root(), &["validate", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn pending_lists_resumable_items() {
    let fixture = WorkDirFixture::new("ITEM-1");
    fixture.research("notes.md");
    fixture.sibling("ITEM-2").result("results.json");
    fixture.sibling("ITEM-3");
    let output = waypoint(fixture.root(), &["pending"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "ITEM-2\treport\nITEM-1\ttests\n");
}

#[test]
fn init_writes_config_and_custom_runs_dir_is_honored() {
    let fixture = WorkDirFixture::new("ITEM-1");
    let output = waypoint(fixture.root(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let contents = std::fs::read_to_string(fixture.root().join("waypoint.toml")).expect("config");
    assert!(contents.contains("runs_dir = \"runs\""));

    std::fs::write(fixture.root().join("alt.toml"), "runs_dir = \"elsewhere\"\n").expect("write");
    let other = fixture.root().join("elsewhere/ITEM-9/research");
    std::fs::create_dir_all(&other).expect("mkdir");
    std::fs::write(other.join("n.md"), "# n").expect("write");
    let output = waypoint(fixture.root(), &["--config", "alt.toml", "check", "--item", "ITEM-9"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[test]
fn invalid_config_exits_invalid() {
    let fixture = WorkDirFixture::new("ITEM-1");
    std::fs::write(fixture.root().join("waypoint.toml"), "[layout]\nmin_report_bytes = 0\n")
        .expect("write");
    let output = waypoint(fixture.root(), &["check", "--item", "ITEM-1"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}
