//! Cycle-driven co-simulation harness library.
//!
//! This crate steps an externally supplied synchronous hardware model and bridges it
//! to host-side subsystems. It provides:
//! 1. **Clocking:** Phase-locked clock domains derived from one step counter.
//! 2. **Host bus:** A download/upload handshake fed from a FIFO of files and buffers.
//! 3. **Video:** Raster reconstruction from a pixel/sync stream with rotation and flip.
//! 4. **Persistence:** Snapshot save/restore and VCD waveform tracing.
//! 5. **Simulation:** The stepper, run control, boot loading and statistics.

/// Audio sample capture.
pub mod audio;
/// Host-to-core bulk I/O bus.
pub mod bus;
/// Clock domains and edge detection.
pub mod clock;
/// Common types and constants (errors, snapshot and trace constants).
pub mod common;
/// Harness configuration (defaults, sections, validation).
pub mod config;
/// Built-in reference hardware models.
pub mod cores;
/// Latched host inputs.
pub mod input;
/// Contract between the harness and the simulated core.
pub mod model;
/// Stepper, run control and boot image loading.
pub mod sim;
/// Snapshot image format and persistence.
pub mod snapshot;
/// Simulation statistics collection and reporting.
pub mod stats;
/// Waveform trace control.
pub mod trace;
/// Video compositor and framebuffers.
pub mod video;

/// Root configuration type; use `HarnessConfig::default()` or load it from JSON.
pub use crate::config::HarnessConfig;
/// Error type returned by fallible harness operations.
pub use crate::common::HarnessError;
/// Capability set every simulated core implements.
pub use crate::model::SimCore;
/// Top-level stepper; construct with `Simulator::new`.
pub use crate::sim::Simulator;
