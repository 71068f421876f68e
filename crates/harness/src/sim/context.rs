//! Per-run simulation state.

use tracing::debug;

use crate::audio::AudioTap;
use crate::bus::BusController;
use crate::clock::{ClockId, ClockSequencer};
use crate::common::{ConfigError, ProtocolViolation};
use crate::config::HarnessConfig;
use crate::input::InputLatch;
use crate::snapshot::SnapshotStore;
use crate::stats::SimStats;
use crate::trace::TraceController;
use crate::video::VideoCompositor;

/// How many steps a host frame executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// No steps.
    #[default]
    Stopped,
    /// `batch_size` steps every host frame.
    Running,
    /// One step, then back to `Stopped`.
    SingleStep,
    /// `multi_step_amount` steps, then back to `Stopped`.
    MultiStep,
}

/// Result of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step executed.
    Continue,
    /// The core has finished; nothing was executed.
    Finished,
}

/// Run-control settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunControl {
    /// Current mode.
    pub mode: RunMode,
    /// Steps per host frame in [`RunMode::Running`].
    pub batch_size: u64,
    /// Steps per [`RunMode::MultiStep`] request.
    pub multi_step_amount: u64,
}

impl RunControl {
    /// Steps the current mode executes in one host frame, and the mode that follows.
    pub fn plan(&self) -> (u64, RunMode) {
        match self.mode {
            RunMode::Stopped => (0, RunMode::Stopped),
            RunMode::Running => (self.batch_size, RunMode::Running),
            RunMode::SingleStep => (1, RunMode::Stopped),
            RunMode::MultiStep => (self.multi_step_amount, RunMode::Stopped),
        }
    }
}

/// Everything the stepper owns apart from the core itself.
#[derive(Debug)]
pub struct SimulationContext {
    /// Steps since the last reset.
    pub counter: u64,
    /// Clock domains.
    pub clocks: ClockSequencer,
    /// Domain clocking the bus handshake.
    pub host_clock: ClockId,
    /// Domain sampling the pixel stream.
    pub pixel_clock: ClockId,
    /// Domain sampling audio, if any.
    pub audio_clock: Option<ClockId>,
    /// Steps reset stays asserted after start-up or reset.
    pub reset_cycles: u64,
    /// Host bus.
    pub bus: BusController,
    /// Latched inputs.
    pub input: InputLatch,
    /// Video compositor.
    pub video: VideoCompositor,
    /// Audio capture.
    pub audio: AudioTap,
    /// Waveform trace.
    pub trace: TraceController,
    /// Snapshot persistence.
    pub snapshots: SnapshotStore,
    /// Run statistics.
    pub stats: SimStats,
    /// Run control.
    pub run: RunControl,
    /// Most recent bus violation not yet collected.
    pub last_violation: Option<ProtocolViolation>,
}

impl SimulationContext {
    /// Builds a context from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn new(config: &HarnessConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let clocks = config.clock_sequencer()?;
        let lookup = |name: &str| {
            clocks
                .id(name)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown clock '{name}'")))
        };
        let host_clock = lookup(&config.host_clock)?;
        let pixel_clock = lookup(&config.pixel_clock)?;
        let audio_clock = config.audio_clock.as_deref().map(lookup).transpose()?;

        debug!(
            domains = clocks.domains().len(),
            reset_cycles = config.reset_cycles,
            "simulation context created"
        );
        Ok(Self {
            counter: 0,
            host_clock,
            pixel_clock,
            audio_clock,
            reset_cycles: config.reset_cycles,
            bus: BusController::new(config.bus.width, config.bus.max_wait_edges),
            input: InputLatch::new(config.input.count)?,
            video: VideoCompositor::new(
                config.video.width,
                config.video.height,
                config.video.rotation,
                config.video.vflip,
                config.video.fps_window,
            ),
            audio: AudioTap::new(config.audio.capacity),
            trace: TraceController::new(config.trace.path.clone(), config.trace.depth),
            snapshots: SnapshotStore::new(config.snapshot.path.clone()),
            stats: SimStats::default(),
            run: RunControl {
                mode: if config.run.autostart {
                    RunMode::Running
                } else {
                    RunMode::Stopped
                },
                batch_size: config.run.batch_size,
                multi_step_amount: config.run.multi_step_amount,
            },
            clocks,
            last_violation: None,
        })
    }

    /// Whether reset is asserted for the step about to run.
    pub fn in_reset(&self) -> bool {
        self.counter < self.reset_cycles
    }
}
