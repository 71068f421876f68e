//! Rolling frame-rate estimate.

use std::collections::VecDeque;
use std::time::Instant;

/// Frames-per-second averaged over the last `window` published frames.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: usize,
    stamps: VecDeque<Instant>,
}

impl FpsCounter {
    /// Creates a counter averaging over `window` frames (at least 2).
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        Self {
            window,
            stamps: VecDeque::with_capacity(window),
        }
    }

    /// Records the publication time of one frame.
    pub fn record(&mut self, at: Instant) {
        if self.stamps.len() == self.window {
            let _ = self.stamps.pop_front();
        }
        self.stamps.push_back(at);
    }

    /// Current estimate; zero until two frames have been recorded.
    pub fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.stamps.front(), self.stamps.back()) else {
            return 0.0;
        };
        let span = last.duration_since(*first).as_secs_f64();
        if self.stamps.len() < 2 || span <= 0.0 {
            return 0.0;
        }
        (self.stamps.len() - 1) as f64 / span
    }

    /// Forgets every recorded frame.
    pub fn reset(&mut self) {
        self.stamps.clear();
    }
}
