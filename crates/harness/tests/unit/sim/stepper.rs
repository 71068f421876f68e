//! # Stepper Tests
//!
//! Per-step call ordering, the reset window, run modes, host frames and core
//! completion, observed through the recording core.

use crate::common::harness::{TestContext, test_config};
use crate::common::mocks::core::{Event, ScriptedCore};
use crate::common::mocks::input::{MaskInput, MockInputSource};
use crate::common::mocks::video::MockRenderer;
use cosim_core::common::ProtocolViolation;
use cosim_core::model::VideoSignals;
use cosim_core::sim::{RunMode, StepOutcome};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn quiet_renderer() -> MockRenderer {
    let mut renderer = MockRenderer::new();
    let _ = renderer.expect_upload().times(0);
    renderer
}

/// One 8x4 frame: four active lines and two blanking lines, vsync on the first.
fn raster(enable: bool) -> Vec<VideoSignals> {
    let mut stream = Vec::new();
    for line in 0..6u8 {
        for x in 0..10u8 {
            stream.push(VideoSignals {
                pixel_enable: enable,
                h_blank: x >= 8,
                v_blank: line >= 4,
                h_sync: x == 9,
                v_sync: line == 4,
                r: x,
                g: line,
                b: 0,
            });
        }
    }
    stream
}

#[test]
fn host_edge_step_drives_bus_between_inputs_and_eval() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().recording());
    ctx.sim.queue_download(vec![7], 0, 0x10, false).unwrap();

    assert_eq!(ctx.sim.step(), StepOutcome::Continue);

    let events = &ctx.core().events;
    assert_eq!(events.len(), 6);
    assert_eq!(
        events[..4].to_vec(),
        vec![
            Event::Clock { domain: 0, level: true },
            Event::Clock { domain: 1, level: false },
            Event::Reset(false),
            Event::Inputs(0),
        ]
    );
    assert!(matches!(
        events[4],
        Event::Drive(d) if d.download && d.address == 0x10 && d.data_out == 7
    ));
    assert_eq!(events[5], Event::Eval);
}

#[test]
fn falling_host_edge_leaves_the_bus_alone() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().recording());
    ctx.sim.queue_download(vec![7, 8], 0, 0, false).unwrap();
    let _ = ctx.sim.step();
    ctx.sim.core_mut().events.clear();

    let _ = ctx.sim.step();

    assert_eq!(
        ctx.core().events,
        vec![
            Event::Clock { domain: 0, level: false },
            Event::Clock { domain: 1, level: true },
            Event::Reset(false),
            Event::Inputs(0),
            Event::Eval,
        ]
    );
}

#[test]
fn every_step_evaluates_exactly_once() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().recording());
    let _ = ctx.sim.step_n(250);

    let evals = ctx.core().events.iter().filter(|e| **e == Event::Eval).count();
    assert_eq!(evals, 250);
    assert_eq!(ctx.sim.counter(), 250);
    assert_eq!(ctx.host_edges(), 125);
}

#[test]
fn reset_is_held_for_the_configured_window() {
    let mut config = test_config();
    config.reset_cycles = 10;
    let mut ctx = TestContext::with(ScriptedCore::new().recording(), &config);

    let _ = ctx.sim.step_n(30);

    let resets: Vec<bool> = ctx
        .core()
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Reset(r) => Some(*r),
            _ => None,
        })
        .collect();
    assert_eq!(resets.len(), 30);
    assert!(resets[..10].iter().all(|r| *r));
    assert!(resets[10..].iter().all(|r| !*r));
    assert_eq!(ctx.core().reset_evals, 10);
    assert_eq!(ctx.sim.probe("core.reset"), Some(0));
}

#[test]
fn reset_restarts_the_counter_and_keeps_queued_transfers() {
    let mut config = test_config();
    config.reset_cycles = 10;
    let mut core = ScriptedCore::new();
    core.stuck_wait = true;
    let mut ctx = TestContext::with(core, &config);
    ctx.sim.queue_download(vec![1, 2], 0, 0, false).unwrap();
    ctx.sim.queue_download(vec![3], 0, 0, false).unwrap();
    let _ = ctx.sim.step_n(30);

    ctx.sim.reset();

    assert_eq!(ctx.sim.counter(), 0);
    assert_eq!(ctx.sim.context().clocks.counter(), 0);
    assert_eq!(ctx.sim.context().bus.pending(), 1);
    assert!(!ctx.sim.context().bus.is_idle());
    let _ = ctx.sim.step_n(5);
    assert_eq!(ctx.core().reset_evals, 15);
    assert!(ctx.core().reset);
}

#[test]
fn violation_is_counted_and_collected_once() {
    let mut core = ScriptedCore::new().with_wait_pattern(vec![true]);
    core.ack_with_wait = true;
    let mut ctx = TestContext::with_core(core);
    ctx.sim.queue_download(vec![1, 2, 3], 2, 0x80, false).unwrap();

    ctx.run_host_edges(1);

    assert_eq!(
        ctx.sim.take_violation(),
        Some(ProtocolViolation::WaitWithAck {
            index: 2,
            address: 0x80
        })
    );
    assert_eq!(ctx.sim.take_violation(), None);
    assert_eq!(ctx.sim.stats().protocol_violations, 1);
    assert_eq!(ctx.sim.stats().bus.transfers_aborted, 1);
    assert!(ctx.sim.context().bus.is_idle());
}

#[rstest]
#[case::stopped(RunMode::Stopped, 0, RunMode::Stopped)]
#[case::single_step(RunMode::SingleStep, 1, RunMode::Stopped)]
#[case::multi_step(RunMode::MultiStep, 64, RunMode::Stopped)]
#[case::running(RunMode::Running, 1000, RunMode::Running)]
fn host_frame_runs_what_the_mode_asks(
    #[case] mode: RunMode,
    #[case] steps: u64,
    #[case] after: RunMode,
) {
    let mut ctx = TestContext::new();
    ctx.sim.set_run_mode(mode);

    let frame = ctx.sim.host_frame(&MaskInput(0), &mut quiet_renderer());

    assert_eq!(frame.steps, steps);
    assert!(!frame.uploaded);
    assert!(!frame.finished);
    assert_eq!(ctx.sim.run_mode(), after);
    assert_eq!(ctx.sim.counter(), steps);
}

#[test]
fn step_amounts_never_drop_to_zero() {
    let mut ctx = TestContext::new();
    let mut renderer = quiet_renderer();
    ctx.sim.set_batch_size(0);
    ctx.sim.set_multi_step_amount(0);

    ctx.sim.set_run_mode(RunMode::Running);
    assert_eq!(ctx.sim.host_frame(&MaskInput(0), &mut renderer).steps, 1);
    ctx.sim.set_run_mode(RunMode::MultiStep);
    assert_eq!(ctx.sim.host_frame(&MaskInput(0), &mut renderer).steps, 1);
}

#[test]
fn inputs_are_latched_once_per_host_frame() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().recording());
    let mut source = MockInputSource::new();
    let _ = source
        .expect_is_active()
        .times(12)
        .returning(|index| index == 2);
    ctx.sim.set_run_mode(RunMode::Running);

    let _ = ctx.sim.host_frame(&source, &mut quiet_renderer());

    let inputs: Vec<u64> = ctx
        .core()
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Inputs(m) => Some(*m),
            _ => None,
        })
        .collect();
    assert_eq!(inputs.len(), 1000);
    assert!(inputs.iter().all(|m| *m == 0b100));

    let _ = ctx.sim.host_frame(&MaskInput(1), &mut quiet_renderer());
    assert_eq!(ctx.core().inputs, 1);
}

#[test]
fn new_frames_are_uploaded_once_per_host_frame() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().with_video(raster(true)));
    let mut renderer = MockRenderer::new();
    let _ = renderer
        .expect_upload()
        .withf(|frame, meta| frame.width() == 8 && frame.height() == 4 && meta.frame_count > 0)
        .times(2)
        .return_const(());

    ctx.sim.set_run_mode(RunMode::Running);
    assert!(ctx.sim.host_frame(&MaskInput(0), &mut renderer).uploaded);
    ctx.sim.set_run_mode(RunMode::Stopped);
    assert!(!ctx.sim.host_frame(&MaskInput(0), &mut renderer).uploaded);
    ctx.sim.set_run_mode(RunMode::Running);
    assert!(ctx.sim.host_frame(&MaskInput(0), &mut renderer).uploaded);

    let stats = ctx.sim.stats();
    assert_eq!(stats.host_frames, 3);
    assert_eq!(stats.frames_uploaded, 2);
    assert!(stats.frames_published >= 2);
    assert_eq!(ctx.sim.last_frame().get(3, 1), Some(0xFF00_0103));
}

#[test]
fn disabled_pixel_clock_is_not_sampled() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().with_video(raster(false)));
    ctx.sim.set_run_mode(RunMode::Running);

    let frame = ctx.sim.host_frame(&MaskInput(0), &mut quiet_renderer());

    assert_eq!(frame.steps, 1000);
    assert_eq!(ctx.sim.context().video.frame_count(), 0);
}

#[test]
fn finished_core_is_finalized_once() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().finishing_after(25));

    assert_eq!(ctx.sim.step_n(100), 25);
    assert!(ctx.sim.is_finished());
    assert_eq!(ctx.sim.step(), StepOutcome::Finished);
    ctx.sim.finalize();
    assert_eq!(ctx.core().finalize_calls, 1);
    assert_eq!(ctx.core().evals, 25);

    ctx.sim.set_run_mode(RunMode::Running);
    let frame = ctx.sim.host_frame(&MaskInput(0), &mut quiet_renderer());
    assert_eq!(frame.steps, 0);
    assert!(frame.finished);
}

#[test]
fn explicit_finalize_stops_stepping() {
    let mut ctx = TestContext::new();
    let _ = ctx.sim.step_n(10);

    ctx.sim.finalize();

    assert_eq!(ctx.sim.step_n(10), 0);
    assert_eq!(ctx.sim.counter(), 10);
    assert_eq!(ctx.core().finalize_calls, 1);
}

#[test]
fn probe_reads_core_signals() {
    let mut ctx = TestContext::new();
    let _ = ctx.sim.step_n(7);

    assert_eq!(ctx.sim.probe("evals"), Some(7));
    assert_eq!(ctx.sim.probe("core.bus.accepted"), Some(0));
    assert_eq!(ctx.sim.probe("nope"), None);
}

#[test]
fn reset_rearms_a_finished_run() {
    let mut ctx = TestContext::with_core(ScriptedCore::new().finishing_after(25));
    assert_eq!(ctx.sim.step_n(100), 25);
    assert!(ctx.sim.is_finished());

    ctx.sim.core_mut().finish_after_evals = None;
    ctx.sim.reset();

    assert!(!ctx.sim.is_finished());
    assert_eq!(ctx.sim.step_n(10), 10);
    assert_eq!(ctx.sim.counter(), 10);
    assert_eq!(ctx.core().finalize_calls, 1);
}
