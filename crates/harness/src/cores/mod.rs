//! Built-in hardware models.
//!
//! External models implement [`SimCore`](crate::model::SimCore) themselves; the
//! models here let the harness run end to end on its own.

/// Synthetic RAM-backed video core.
pub mod pattern;

pub use pattern::{BusFaults, PatternConfig, PatternCore};
