//! Simulator: owns the core and the harness state side by side.
//!
//! Every step runs in a fixed order: clocks, reset and inputs are driven, the bus
//! presents its datum on host-clock rising edges, the core is evaluated once, then
//! the bus, video, audio and trace sample the results before the counter advances.
//! Keeping the core next to (not inside) the context lets the hooks borrow both at
//! once.

use std::path::Path;

use tracing::{info, warn};

use crate::bus::{CompletedUpload, TransferSource};
use crate::common::{HarnessError, ProtocolViolation, Result};
use crate::config::{BootImage, HarnessConfig};
use crate::input::InputSource;
use crate::model::SimCore;
use crate::sim::context::{RunMode, SimulationContext, StepOutcome};
use crate::sim::loader::{self, BootReport};
use crate::stats::SimStats;
use crate::video::{Frame, Renderer};

/// Result of one host frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostFrame {
    /// Steps executed.
    pub steps: u64,
    /// Whether a new frame was handed to the renderer.
    pub uploaded: bool,
    /// Whether the core has finished.
    pub finished: bool,
}

/// Top-level simulator: the core plus its harness context.
#[derive(Debug)]
pub struct Simulator<C: SimCore> {
    core: C,
    ctx: SimulationContext,
    finalized: bool,
}

impl<C: SimCore> Simulator<C> {
    /// Creates a simulator, queues the configured boot images and opens the trace
    /// if it starts enabled.
    ///
    /// Boot images and the trace file that cannot be opened are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Config`] if the configuration is invalid.
    pub fn new(core: C, config: &HarnessConfig) -> Result<Self> {
        let mut ctx = SimulationContext::new(config)?;
        if let Some(probe) = core.as_probe() {
            ctx.trace.declare(probe.signals());
        }
        let report = loader::queue_boot_images(&mut ctx.bus, &config.boot);
        if !report.is_complete() {
            warn!(failed = report.failed.len(), "some boot images were not queued");
        }
        if config.trace.enabled {
            if let Err(e) = ctx.trace.set_enabled(true) {
                warn!("trace disabled: {e}");
            }
        }
        info!(model = core.model_id(), "simulator ready");
        Ok(Self {
            core,
            ctx,
            finalized: false,
        })
    }

    /// Advances the simulation by one counter unit.
    pub fn step(&mut self) -> StepOutcome {
        if self.finalized {
            return StepOutcome::Finished;
        }
        if self.core.finished() {
            self.finalize();
            return StepOutcome::Finished;
        }

        let ctx = &mut self.ctx;
        let core = &mut self.core;

        ctx.clocks.tick();
        for (i, domain) in ctx.clocks.domains().iter().enumerate() {
            core.set_clock(i, domain.level());
        }
        let in_reset = ctx.in_reset();
        core.set_reset(in_reset);
        if in_reset {
            ctx.stats.reset_steps += 1;
        }
        core.set_inputs(ctx.input.compose_bus_value());

        let host_rising = ctx.clocks.is_rising(ctx.host_clock);
        if host_rising {
            ctx.stats.host_edges += 1;
            ctx.bus.before_evaluation(&mut *core);
        }

        core.eval();
        ctx.stats.evaluations += 1;

        if host_rising {
            if let Err(violation) = ctx.bus.after_evaluation(&*core) {
                ctx.stats.protocol_violations += 1;
                ctx.last_violation = Some(violation);
            }
        }

        if ctx.clocks.is_rising(ctx.pixel_clock) {
            let v = core.video();
            if v.pixel_enable {
                ctx.video
                    .clock(v.h_blank, v.v_blank, v.h_sync, v.v_sync, v.packed_colour());
            }
        }

        if let Some(audio) = ctx.audio_clock {
            if ctx.clocks.is_rising(audio) {
                ctx.audio.clock(core.audio());
            }
        }

        if ctx.trace.is_enabled() {
            if let Err(e) = ctx.trace.dump(ctx.counter, core.as_probe()) {
                warn!("trace write failed, disabling: {e}");
                if let Err(e) = ctx.trace.set_enabled(false) {
                    warn!("trace disable failed: {e}");
                }
            }
        }

        ctx.counter += 1;
        ctx.stats.steps += 1;
        StepOutcome::Continue
    }

    /// Runs up to `n` steps and returns how many executed.
    pub fn step_n(&mut self, n: u64) -> u64 {
        for done in 0..n {
            if self.step() == StepOutcome::Finished {
                return done;
            }
        }
        n
    }

    /// Runs the steps the current [`RunMode`] calls for and returns how many executed.
    ///
    /// One-shot modes revert to [`RunMode::Stopped`].
    pub fn run_batch(&mut self) -> u64 {
        let (steps, next) = self.ctx.run.plan();
        self.ctx.run.mode = next;
        self.step_n(steps)
    }

    /// One host frame: latch inputs, run a batch, present any new frame.
    pub fn host_frame<I, R>(&mut self, input: &I, renderer: &mut R) -> HostFrame
    where
        I: InputSource + ?Sized,
        R: Renderer + ?Sized,
    {
        self.ctx.input.read(input);
        let steps = self.run_batch();
        let uploaded = self.ctx.video.update_texture(renderer);
        self.ctx.stats.host_frames += 1;
        if uploaded {
            self.ctx.stats.frames_uploaded += 1;
        }
        HostFrame {
            steps,
            uploaded,
            finished: self.is_finished(),
        }
    }

    /// Restarts from counter zero with reset asserted for the configured window.
    ///
    /// Queued bus transfers are kept; the trace file, if open, is truncated. A
    /// finalized run is re-armed, as after a snapshot restore.
    pub fn reset(&mut self) {
        self.finalized = false;
        let ctx = &mut self.ctx;
        ctx.counter = 0;
        ctx.clocks.reset();
        ctx.video.reset();
        ctx.audio.reset();
        ctx.last_violation = None;
        if ctx.trace.is_open() {
            if let Err(e) = ctx.trace.rewind() {
                warn!("trace reopen after reset failed: {e}");
            }
        }
        info!("simulation reset");
    }

    /// Writes a snapshot of the counter and core state.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be written.
    pub fn save_snapshot(&mut self, path: &Path) -> Result<()> {
        self.ctx
            .snapshots
            .save(path, self.ctx.counter, &self.core)?;
        self.ctx.stats.snapshots_saved += 1;
        Ok(())
    }

    /// Restores a snapshot and realigns the clocks with the restored counter.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] or [`HarnessError::Format`]; the simulation is
    /// left as it was.
    pub fn restore_snapshot(&mut self, path: &Path) -> Result<u64> {
        let counter = self.ctx.snapshots.restore(path, &mut self.core)?;
        self.ctx.counter = counter;
        self.ctx.clocks.seek(counter);
        self.ctx.stats.snapshots_restored += 1;
        self.finalized = false;
        Ok(counter)
    }

    /// Saves to the configured snapshot path.
    ///
    /// # Errors
    ///
    /// As [`Simulator::save_snapshot`].
    pub fn quick_save(&mut self) -> Result<()> {
        let path = self.ctx.snapshots.default_path().to_path_buf();
        self.save_snapshot(&path)
    }

    /// Restores from the configured snapshot path.
    ///
    /// # Errors
    ///
    /// As [`Simulator::restore_snapshot`].
    pub fn quick_restore(&mut self) -> Result<u64> {
        let path = self.ctx.snapshots.default_path().to_path_buf();
        self.restore_snapshot(&path)
    }

    /// Queues a bus transfer.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidSource`] if the source is unreadable or empty.
    pub fn queue_download(
        &mut self,
        source: impl Into<TransferSource>,
        index: u8,
        base_address: u32,
        is_upload: bool,
    ) -> Result<()> {
        self.ctx
            .bus
            .queue_download(source, index, base_address, is_upload)
            .map_err(HarnessError::from)
    }

    /// Queues boot images as downloads.
    pub fn queue_boot_images(&mut self, images: &[BootImage]) -> BootReport {
        loader::queue_boot_images(&mut self.ctx.bus, images)
    }

    /// Drains uploads completed since the last call.
    pub fn take_uploads(&mut self) -> Vec<CompletedUpload> {
        self.ctx.bus.take_completed_uploads()
    }

    /// Takes the most recent bus protocol violation, if any.
    pub fn take_violation(&mut self) -> Option<ProtocolViolation> {
        self.ctx.last_violation.take()
    }

    /// Enables or disables the waveform trace.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Trace`] if the file cannot be opened.
    pub fn set_trace_enabled(&mut self, enabled: bool) -> Result<()> {
        Ok(self.ctx.trace.set_enabled(enabled)?)
    }

    /// Changes the traced hierarchy depth.
    pub fn set_trace_depth(&mut self, depth: usize) {
        self.ctx.trace.set_depth(depth);
    }

    /// Changes the trace file, reopening it if tracing is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Trace`] if the new file cannot be opened.
    pub fn set_trace_path(&mut self, path: &Path) -> Result<()> {
        Ok(self.ctx.trace.set_path(path)?)
    }

    /// Flushes the trace file.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Trace`] if the flush fails.
    pub fn flush_trace(&mut self) -> Result<()> {
        Ok(self.ctx.trace.flush()?)
    }

    /// Reads an internal core signal by path.
    pub fn probe(&self, path: &str) -> Option<u64> {
        self.core.as_probe()?.read(path)
    }

    /// Runs the core's final cleanup and closes the trace; later steps do nothing.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.core.finalize();
        if let Err(e) = self.ctx.trace.close() {
            warn!("trace close failed: {e}");
        }
        info!(counter = self.ctx.counter, "simulation finalized");
    }

    /// Whether the run has ended.
    pub fn is_finished(&self) -> bool {
        self.finalized || self.core.finished()
    }

    /// Switches the run mode.
    pub fn set_run_mode(&mut self, mode: RunMode) {
        self.ctx.run.mode = mode;
    }

    /// Current run mode.
    pub fn run_mode(&self) -> RunMode {
        self.ctx.run.mode
    }

    /// Sets the steps per host frame in running mode (at least one).
    pub fn set_batch_size(&mut self, steps: u64) {
        self.ctx.run.batch_size = steps.max(1);
    }

    /// Sets the steps per multi-step request (at least one).
    pub fn set_multi_step_amount(&mut self, steps: u64) {
        self.ctx.run.multi_step_amount = steps.max(1);
    }

    /// Steps since the last reset.
    pub fn counter(&self) -> u64 {
        self.ctx.counter
    }

    /// Latest published frame.
    pub fn last_frame(&self) -> &Frame {
        self.ctx.video.last_frame()
    }

    /// Statistics with bus, video, audio and trace totals folded in.
    pub fn stats(&self) -> SimStats {
        let mut stats = self.ctx.stats.clone();
        stats.bus = self.ctx.bus.counters();
        stats.frames_published = self.ctx.video.frame_count();
        stats.audio_samples = self.ctx.audio.total();
        stats.trace_samples = self.ctx.trace.samples();
        stats
    }

    /// Harness state.
    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    /// Mutable harness state.
    pub fn context_mut(&mut self) -> &mut SimulationContext {
        &mut self.ctx
    }

    /// The simulated core.
    pub fn core(&self) -> &C {
        &self.core
    }

    /// Mutable access to the simulated core.
    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }
}
