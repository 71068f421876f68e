//! Common types and constants used throughout the harness.
//!
//! This module provides building blocks that are shared across all components:
//! 1. **Constants:** Packed colour, snapshot container, trace and input limits.
//! 2. **Error Handling:** The recoverable error taxonomy reported to callers.

/// Common constants used throughout the harness.
pub mod constants;

/// Error types for loads, snapshots, bus handshakes and configuration.
pub mod error;

pub use error::{
    ConfigError, HarnessError, ProtocolViolation, Result, SnapshotError, SourceError, TraceError,
};
