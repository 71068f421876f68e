//! Global Harness Constants.
//!
//! This module defines constants shared between harness components. It includes:
//! 1. **Video Constants:** Alpha mask for packed colour samples.
//! 2. **Snapshot Constants:** Magic bytes and format version of snapshot images.
//! 3. **Trace Constants:** Scope and variable names used in waveform dumps.
//! 4. **Input Constants:** Width limit of the input bitmask.

/// Alpha channel bits forced on every packed colour sample (`0xAABBGGRR`).
pub const ALPHA_OPAQUE: u32 = 0xFF00_0000;

/// Magic bytes at the start of every snapshot image.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"CSNP";

/// Snapshot container format version written by this build.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Size of the cycle counter field inside a snapshot image.
pub const SNAPSHOT_COUNTER_BYTES: usize = 8;

/// Top-level scope name in waveform dumps.
pub const TRACE_TOP_SCOPE: &str = "TOP";

/// Name of the cycle counter variable in waveform dumps.
pub const TRACE_CYCLE_VAR: &str = "cycle";

/// Maximum number of logical inputs that fit in the core's input bitmask.
pub const MAX_INPUTS: usize = 64;
