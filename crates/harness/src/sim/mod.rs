//! Simulation driver and program loading.
//!
//! Provides the stepper that sequences clocks, hooks and core evaluation, the
//! per-run context it owns, and utilities for queueing boot images onto the bus.

/// Per-run state and run control.
pub mod context;

/// Boot image queueing.
pub mod loader;

/// The top-level stepper.
pub mod simulator;

pub use context::{RunControl, RunMode, SimulationContext, StepOutcome};
pub use loader::{BootReport, queue_boot_images};
pub use simulator::{HostFrame, Simulator};
