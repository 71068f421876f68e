//! Host input latch.
//!
//! Inputs are sampled from the host once per host frame and held constant for every
//! simulation step of that frame, so the core never sees an input change mid-batch.

use crate::common::ConfigError;
use crate::common::constants::MAX_INPUTS;

/// Host-side input device (keyboard, gamepad, scripted driver).
pub trait InputSource {
    /// Returns whether input `index` is currently pressed.
    fn is_active(&self, index: usize) -> bool;
}

/// Latched boolean inputs presented to the core as a bitmask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLatch {
    states: Vec<bool>,
}

impl InputLatch {
    /// Creates a latch with `count` released inputs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] unless `1 <= count <= 64`.
    pub fn new(count: usize) -> Result<Self, ConfigError> {
        if count == 0 || count > MAX_INPUTS {
            return Err(ConfigError::Invalid(format!(
                "input count must be between 1 and {MAX_INPUTS}, got {count}"
            )));
        }
        Ok(Self {
            states: vec![false; count],
        })
    }

    /// Captures every input from `source`.
    pub fn read<S: InputSource + ?Sized>(&mut self, source: &S) {
        for (i, state) in self.states.iter_mut().enumerate() {
            *state = source.is_active(i);
        }
    }

    /// Sets one input directly; out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: bool) {
        if let Some(state) = self.states.get_mut(index) {
            *state = value;
        }
    }

    /// Latched state of input `index`.
    pub fn get(&self, index: usize) -> bool {
        self.states.get(index).copied().unwrap_or(false)
    }

    /// Number of inputs.
    pub fn count(&self) -> usize {
        self.states.len()
    }

    /// Releases every input.
    pub fn clear(&mut self) {
        self.states.fill(false);
    }

    /// Bit `i` is set iff input `i` is pressed.
    pub fn compose_bus_value(&self) -> u64 {
        self.states
            .iter()
            .enumerate()
            .filter(|&(_, &on)| on)
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }
}
