//! Contract between the harness and the simulated core.
//!
//! The simulated core is an externally supplied synchronous hardware model. The
//! harness never looks inside it: it drives clocked inputs, calls [`SimCore::eval`],
//! and samples outputs afterwards. This module provides:
//! 1. **Core trait:** [`SimCore`], the clocked-model capability set.
//! 2. **Signal bundles:** Bus, video and audio wire groups.
//! 3. **Probing:** [`Probe`], symbolic access to internal signals for debug and tracing.

/// Named signal inspection capability.
pub mod probe;

/// Wire bundles exchanged with the core.
pub mod signals;

pub use probe::{Probe, SignalInfo};
pub use signals::{AudioSample, BusDrive, BusStatus, VideoSignals};

use crate::common::SnapshotError;

/// A synchronous hardware model stepped by the harness.
///
/// Inputs set through the `set_*`/`drive_*` methods become visible to the model on
/// the next [`SimCore::eval`]; outputs read through [`SimCore::bus_status`],
/// [`SimCore::video`] and [`SimCore::audio`] reflect the most recent evaluation.
pub trait SimCore {
    /// Identifies the model build; snapshots are only restorable into the same identifier.
    fn model_id(&self) -> &str;

    /// Sets the level of the clock input belonging to clock domain `domain`.
    fn set_clock(&mut self, domain: usize, level: bool);

    /// Drives the core's reset input.
    fn set_reset(&mut self, _asserted: bool) {}

    /// Presents the latched input bitmask.
    fn set_inputs(&mut self, mask: u64);

    /// Drives the host side of the bulk I/O bus.
    fn drive_bus(&mut self, drive: &BusDrive);

    /// Samples the core side of the bulk I/O bus.
    fn bus_status(&self) -> BusStatus;

    /// Evaluates the model once with the current inputs.
    fn eval(&mut self);

    /// Samples the video outputs.
    fn video(&self) -> VideoSignals;

    /// Samples the audio outputs.
    fn audio(&self) -> AudioSample {
        AudioSample::default()
    }

    /// Returns `true` once the model has signalled that simulation is over.
    fn finished(&self) -> bool {
        false
    }

    /// Final cleanup, called once when the run loop ends.
    fn finalize(&mut self) {}

    /// Serialises the complete model state.
    fn save_state(&self) -> Vec<u8>;

    /// Replaces the complete model state.
    ///
    /// Implementations must validate `blob` before mutating anything, so that a
    /// rejected blob leaves the model unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Format`] if the blob is truncated or does not belong
    /// to this model.
    fn restore_state(&mut self, blob: &[u8]) -> Result<(), SnapshotError>;

    /// Returns the probe capability if the model exposes its internal signals.
    fn as_probe(&self) -> Option<&dyn Probe> {
        None
    }
}
