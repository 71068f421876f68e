//! Harness error taxonomy.
//!
//! This module defines every recoverable failure the harness can report. It provides:
//! 1. **Load errors:** `InvalidSource` for unreadable or empty transfer sources.
//! 2. **Snapshot errors:** `Io` for unwritable/unreadable files and `Format` for corrupt images.
//! 3. **Trace errors:** `Io` failures while creating or writing waveform files.
//! 4. **Bus errors:** `ProtocolViolation` for contradictory or stuck core handshake lines.
//! 5. **Configuration errors:** Validation failures for harness configuration.
//!
//! None of these conditions is fatal to the host process; callers report them and
//! keep simulating.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading a transfer source for the host bus.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be opened or read.
    #[error("cannot read load source '{path}': {source}")]
    Unreadable {
        /// Path that was requested.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The source contained no bytes, so there is nothing to transfer.
    #[error("load source '{0}' is empty")]
    Empty(String),
}

/// Errors raised by the bus handshake when the core drives the lines inconsistently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// The core asserted wait-state and acknowledge on the same edge.
    #[error("core asserted wait and ack together at address {address:#06x} (index {index})")]
    WaitWithAck {
        /// Target index of the aborted transfer.
        index: u8,
        /// Address presented when the violation was observed.
        address: u32,
    },

    /// The core held wait-state for longer than the configured stall limit.
    #[error("core stalled the bus for {edges} edges at address {address:#06x} (index {index})")]
    StallLimit {
        /// Target index of the aborted transfer.
        index: u8,
        /// Address presented when the limit was exceeded.
        address: u32,
        /// Number of consecutive stalled edges.
        edges: u64,
    },
}

/// Errors raised while saving or restoring a snapshot image.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot file could not be created, written or read.
    #[error("snapshot I/O on '{path}': {source}")]
    Io {
        /// Snapshot path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The snapshot stream is truncated, corrupt, or belongs to a different core build.
    #[error("snapshot format error: {0}")]
    Format(String),
}

/// Errors raised by the waveform tracer.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be created or written.
    #[error("trace I/O on '{path}': {source}")]
    Io {
        /// Trace path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Errors raised while loading or validating the harness configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config '{path}': {source}")]
    Io {
        /// Configuration path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The JSON document did not match the configuration schema.
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is outside its permitted range or refers to an unknown item.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level harness error; every component error converts into it.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A load request referred to an unreadable or empty source.
    #[error(transparent)]
    InvalidSource(#[from] SourceError),

    /// A snapshot could not be written or read.
    #[error("I/O error: {0}")]
    Io(#[source] SnapshotError),

    /// A snapshot stream was corrupt or incompatible.
    #[error("format error: {0}")]
    Format(#[source] SnapshotError),

    /// The waveform file could not be written.
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// The core violated the bus handshake.
    #[error(transparent)]
    ProtocolViolation(#[from] ProtocolViolation),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<SnapshotError> for HarnessError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Io { .. } => Self::Io(err),
            SnapshotError::Format(_) => Self::Format(err),
        }
    }
}

/// Convenience result alias used throughout the harness.
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
