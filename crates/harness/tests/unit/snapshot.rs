//! # Snapshot Tests
//!
//! Save/restore round trips on the pattern core, and rejection of truncated,
//! corrupt, foreign and unreachable snapshot files.

use std::fs;

use crate::common::harness::{TestContext, pattern_sim, test_config};
use crate::common::mocks::core::ScriptedCore;
use cosim_core::common::SnapshotError;
use cosim_core::cores::PatternCore;
use cosim_core::model::{Probe, SimCore};
use cosim_core::snapshot::SnapshotImage;
use cosim_core::{HarnessError, Simulator};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

/// Every externally observable core value: probe signals, RAM, video and bus lines.
fn observe(sim: &Simulator<PatternCore>) -> (Vec<Option<u64>>, Vec<u8>, String) {
    let core = sim.core();
    let probes = core.signals().iter().map(|s| core.read(&s.path)).collect();
    let lines = format!("{:?} {:?}", core.video(), core.bus_status());
    (probes, core.ram().to_vec(), lines)
}

fn warmed_up() -> Simulator<PatternCore> {
    let mut sim = pattern_sim(16, 8);
    let image: Vec<u8> = (0..200u8).collect();
    sim.queue_download(image, 0, 0, false).unwrap();
    let _ = sim.step_n(1000);
    sim
}

#[test]
fn restore_returns_to_the_saved_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mid.snap");
    let mut sim = warmed_up();

    sim.save_snapshot(&path).unwrap();
    let saved_counter = sim.counter();
    let before = observe(&sim);

    let _ = sim.step_n(777);
    assert_ne!(observe(&sim), before);

    let counter = sim.restore_snapshot(&path).unwrap();
    assert_eq!(counter, saved_counter);
    assert_eq!(sim.counter(), saved_counter);
    assert_eq!(sim.context().clocks.counter(), saved_counter);
    assert_eq!(observe(&sim), before);
}

#[test]
fn replay_after_restore_is_deterministic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("replay.snap");
    let mut sim = warmed_up();
    sim.save_snapshot(&path).unwrap();

    let _ = sim.step_n(5000);
    let first = observe(&sim);

    let _ = sim.restore_snapshot(&path).unwrap();
    let _ = sim.step_n(5000);

    assert_eq!(observe(&sim), first);
}

#[test]
fn stats_and_last_path_track_persistence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("s.snap");
    let mut sim = warmed_up();

    sim.save_snapshot(&path).unwrap();
    let _ = sim.restore_snapshot(&path).unwrap();

    let stats = sim.stats();
    assert_eq!(stats.snapshots_saved, 1);
    assert_eq!(stats.snapshots_restored, 1);
    assert_eq!(sim.context().snapshots.last_path(), Some(path.as_path()));
}

#[test]
fn truncated_header_is_a_format_error_and_changes_nothing() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.snap");
    let bad = dir.path().join("bad.snap");
    let mut sim = warmed_up();
    sim.save_snapshot(&good).unwrap();
    let bytes = fs::read(&good).unwrap();
    fs::write(&bad, &bytes[..10]).unwrap();

    let _ = sim.step_n(300);
    let counter = sim.counter();
    let before = observe(&sim);

    let err = sim.restore_snapshot(&bad).unwrap_err();

    assert!(matches!(err, HarnessError::Format(_)));
    assert_eq!(sim.counter(), counter);
    assert_eq!(observe(&sim), before);
}

#[test]
fn truncated_core_state_is_rejected_by_the_core() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.snap");
    let bad = dir.path().join("short.snap");
    let mut sim = warmed_up();
    sim.save_snapshot(&good).unwrap();
    let bytes = fs::read(&good).unwrap();
    fs::write(&bad, &bytes[..bytes.len() - 3]).unwrap();

    let _ = sim.step_n(300);
    let before = observe(&sim);

    assert!(matches!(
        sim.restore_snapshot(&bad),
        Err(HarnessError::Format(_))
    ));
    assert_eq!(observe(&sim), before);
}

#[test]
fn bad_magic_is_a_format_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("magic.snap");
    let mut sim = warmed_up();
    sim.save_snapshot(&path).unwrap();
    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, &bytes).unwrap();

    assert!(matches!(
        sim.restore_snapshot(&path),
        Err(HarnessError::Format(SnapshotError::Format(_)))
    ));
}

#[test]
fn snapshot_from_another_model_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("other.snap");
    let mut small = pattern_sim(16, 8);
    let _ = small.step_n(100);
    small.save_snapshot(&path).unwrap();

    let mut wide = pattern_sim(32, 8);
    let _ = wide.step_n(50);
    let err = wide.restore_snapshot(&path).unwrap_err();

    assert!(matches!(err, HarnessError::Format(_)));
    assert!(err.to_string().contains("pattern/16x8"));
    assert_eq!(wide.counter(), 50);
}

#[test]
fn unwritable_destination_is_an_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("dir").join("x.snap");
    let mut sim = pattern_sim(16, 8);

    let err = sim.save_snapshot(&path).unwrap_err();

    assert!(matches!(err, HarnessError::Io(SnapshotError::Io { .. })));
    assert!(!path.exists());
    assert_eq!(sim.stats().snapshots_saved, 0);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    let mut sim = pattern_sim(16, 8);
    let _ = sim.step_n(10);

    let err = sim.restore_snapshot(&dir.path().join("nope.snap")).unwrap_err();

    assert!(matches!(err, HarnessError::Io(_)));
    assert_eq!(sim.counter(), 10);
}

#[test]
fn resave_replaces_file_with_current_counter() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("keep.snap");
    let mut sim = warmed_up();
    sim.save_snapshot(&path).unwrap();
    let original = fs::read(&path).unwrap();

    let _ = sim.step_n(100);
    sim.save_snapshot(&path).unwrap();
    let updated = fs::read(&path).unwrap();

    assert_ne!(original, updated);
    let image = SnapshotImage::decode(&updated).unwrap();
    assert_eq!(image.counter, sim.counter());
    assert_eq!(image.model_id, sim.core().model_id());
}

#[test]
fn scripted_core_state_round_trips_through_the_stepper() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scripted.snap");
    let mut ctx = TestContext::with_core(ScriptedCore::new().with_memory(vec![5; 32]));
    let _ = ctx.sim.step_n(41);
    ctx.sim.save_snapshot(&path).unwrap();
    let evals = ctx.core().evals;

    let _ = ctx.sim.step_n(59);
    ctx.sim.core_mut().memory.fill(0);
    let counter = ctx.sim.restore_snapshot(&path).unwrap();

    assert_eq!(counter, 41);
    assert_eq!(ctx.core().evals, evals);
    assert_eq!(ctx.core().memory, vec![5; 32]);
    // Odd counter: the divide-by-one clock is high and reports no edge until the next tick.
    let clk = ctx.sim.context().host_clock;
    assert!(ctx.sim.context().clocks.level(clk));
    assert!(!ctx.sim.context().clocks.is_rising(clk));
}

#[test]
fn header_round_trip_preserves_fields() {
    let image = SnapshotImage {
        model_id: "m".into(),
        counter: 99,
        blob: vec![1, 2, 3],
    };
    assert_eq!(SnapshotImage::decode(&image.encode().unwrap()).unwrap(), image);
}

#[test]
fn quick_slot_uses_the_configured_path() {
    let dir = tempdir().unwrap();
    let slot = dir.path().join("quick.snap");
    let mut config = test_config();
    config.snapshot.path.clone_from(&slot);
    let mut ctx = TestContext::with(ScriptedCore::new(), &config);
    let _ = ctx.sim.step_n(30);

    ctx.sim.quick_save().unwrap();
    let _ = ctx.sim.step_n(20);
    let counter = ctx.sim.quick_restore().unwrap();

    assert!(slot.exists());
    assert_eq!(counter, 30);
    assert_eq!(ctx.sim.context().snapshots.default_path(), slot.as_path());
    assert_eq!(ctx.sim.context().snapshots.last_path(), Some(slot.as_path()));
}
