//! Lifecycle harness for crash-and-resume scenarios.
//!
//! These tests play the part of a phase-execution driver: load, do one
//! phase's work on disk, save, and "crash" at different points to verify the
//! next load picks up from durable evidence without redoing or skipping work.

use std::fs;
use std::time::Duration;

use waypoint::core::outcome::ItemStatus;
use waypoint::core::phase::Phase;
use waypoint::manager::LoadOutcome;
use waypoint::test_support::WorkDirFixture;

/// Full lifecycle: every phase runs, each followed by a save, then settle.
///
/// Execution sequence:
/// 1. Load → INIT, nothing to resume
/// 2. Research notes written, save → TESTS
/// 3. Test files written, save → EXECUTION
/// 4. Results written, save → REPORT
/// 5. Report written → COMPLETE, settle(validated) removes the sidecar
#[test]
fn full_lifecycle_reaches_complete_and_clears_checkpoint() {
    let fixture = WorkDirFixture::new("ITEM-1");
    let manager = fixture.manager();
    let dir = fixture.work_dir();

    let checkpoint = manager.load(dir, "ITEM-1").expect("load");
    assert_eq!(checkpoint.phase(), Phase::Init);
    assert!(!manager.can_resume(dir, "ITEM-1").expect("can_resume"));

    let finish_phase = |expected: Phase| {
        let mut checkpoint = manager.load(dir, "ITEM-1").expect("load");
        checkpoint.add_elapsed(Duration::from_millis(250));
        manager.save(dir, &checkpoint).expect("save");
        assert_eq!(checkpoint.phase(), expected);
    };
    fixture.research("notes.md");
    finish_phase(Phase::Tests);
    fixture.test_file("test_feature.py");
    finish_phase(Phase::Execution);
    fixture.result("results.json");
    finish_phase(Phase::Report);
    fixture.report(400);
    finish_phase(Phase::Complete);

    let checkpoint = manager.load(dir, "ITEM-1").expect("load");
    assert_eq!(checkpoint.elapsed_ms(), 1_000);
    assert_eq!(checkpoint.artifacts_for("research"), ["research/notes.md"]);
    assert_eq!(checkpoint.artifacts_for("tests"), ["tests/test_feature.py"]);
    assert_eq!(checkpoint.artifacts_for("execution"), ["results/results.json"]);

    let status = manager.settle_item(dir, "ITEM-1", true).expect("settle");
    assert_eq!(status, ItemStatus::Completed);
    assert!(!fixture.sidecar_path().exists());
}

/// The driver crashed after writing test files but before saving: the
/// sidecar still says TESTS, the disk says EXECUTION.
#[test]
fn crash_before_save_resumes_from_disk_evidence() {
    let fixture = WorkDirFixture::new("ITEM-2");
    let manager = fixture.manager();
    let dir = fixture.work_dir();

    fixture.research("notes.md");
    let mut checkpoint = manager.load(dir, "ITEM-2").expect("load");
    checkpoint.add_error("research agent exited with status 137");
    manager.save(dir, &checkpoint).expect("save");

    fixture.test_file("example_test.rs");
    // No save here.

    let mut resumed = manager.load(dir, "ITEM-2").expect("reload");
    assert_eq!(resumed.phase(), Phase::Execution);
    assert!(manager.can_resume(dir, "ITEM-2").expect("can_resume"));
    assert!(
        manager
            .get_resume_instructions(&resumed)
            .contains("SKIP research and test creation phases")
    );
    assert_eq!(resumed.errors().len(), 1);
    assert_eq!(resumed.begin_attempt(), 2);
    manager.save(dir, &resumed).expect("save");

    let status = manager.settle_item(dir, "ITEM-2", false).expect("settle");
    assert_eq!(status, ItemStatus::Paused);
    assert_eq!(manager.load(dir, "ITEM-2").expect("load").attempt(), 2);
}

/// A sidecar torn by a crash mid-write is recovered from the artifacts that
/// survived.
#[test]
fn torn_sidecar_is_rebuilt_from_artifacts() {
    let fixture = WorkDirFixture::new("ITEM-3");
    let manager = fixture.manager();
    let dir = fixture.work_dir();

    fixture.research("a.md");
    fixture.test_file("test_a.py");
    fixture.result("output_results.json");
    fixture.raw_sidecar("{\"item_id\": \"ITEM-3\", \"phase\": \"exec");

    let outcome = manager.load_with_outcome(dir, "ITEM-3").expect("load");
    let LoadOutcome::Recovered { checkpoint, .. } = outcome else {
        panic!("expected recovery");
    };
    assert_eq!(checkpoint.phase(), Phase::Report);
    assert_eq!(checkpoint.attempt(), 1);
    assert!(checkpoint.errors().is_empty());

    manager.save(dir, &checkpoint).expect("save");
    let outcome = manager.load_with_outcome(dir, "ITEM-3").expect("reload");
    assert!(matches!(outcome, LoadOutcome::Loaded(_)));
}

/// Removing artifacts after they were recorded never rolls the item back.
#[test]
fn deleted_artifacts_do_not_regress_progress() {
    let fixture = WorkDirFixture::new("ITEM-4");
    let manager = fixture.manager();
    let dir = fixture.work_dir();

    let tests_file = fixture.test_file("test_a.py");
    let checkpoint = manager.load(dir, "ITEM-4").expect("load");
    manager.save(dir, &checkpoint).expect("save");
    assert_eq!(checkpoint.phase(), Phase::Execution);

    fs::remove_file(tests_file).expect("remove test file");
    let reloaded = manager.load(dir, "ITEM-4").expect("reload");
    assert_eq!(reloaded.phase(), Phase::Execution);
    assert_eq!(reloaded.artifacts_for("tests"), ["tests/test_a.py"]);
}

/// Failed items with no progress are not offered for resumption.
#[test]
fn pending_lists_only_interrupted_items() {
    let fixture = WorkDirFixture::new("ITEM-A");
    let manager = fixture.manager();
    fixture.result("results.json");

    let b = fixture.sibling("ITEM-B");
    b.research("notes.md");
    fixture.sibling("ITEM-C");
    let d = fixture.sibling("ITEM-D");
    d.report(150);

    let pending = manager.resumable_items().expect("pending");
    let ids: Vec<&str> = pending.iter().map(|item| item.item_id.as_str()).collect();
    assert_eq!(ids, vec!["ITEM-A", "ITEM-B"]);
    assert_eq!(pending[0].phase, Phase::Report);
    assert_eq!(pending[0].working_dir, fixture.work_dir());

    let status = manager
        .settle_item(&fixture.runs_dir().join("ITEM-C"), "ITEM-C", false)
        .expect("settle");
    assert_eq!(status, ItemStatus::Failed);
}
