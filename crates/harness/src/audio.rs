//! Audio sample tap.

use std::collections::VecDeque;

use crate::model::AudioSample;

/// One stereo sample normalised to `[-1.0, 1.0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StereoFrame {
    /// Left channel.
    pub left: f32,
    /// Right channel.
    pub right: f32,
}

impl From<AudioSample> for StereoFrame {
    fn from(s: AudioSample) -> Self {
        let scale = f32::from(i16::MAX) + 1.0;
        Self {
            left: f32::from(s.left) / scale,
            right: f32::from(s.right) / scale,
        }
    }
}

/// Keeps the most recent `capacity` samples taken on audio-clock rising edges.
#[derive(Debug, Clone)]
pub struct AudioTap {
    capacity: usize,
    samples: VecDeque<StereoFrame>,
    total: u64,
}

impl AudioTap {
    /// Creates an empty tap; a zero capacity disables sample storage.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
            total: 0,
        }
    }

    /// Records one sample, evicting the oldest when full.
    pub fn clock(&mut self, sample: AudioSample) {
        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            let _ = self.samples.pop_front();
        }
        self.samples.push_back(sample.into());
    }

    /// Stored samples, oldest first.
    pub fn samples(&self) -> impl ExactSizeIterator<Item = &StereoFrame> {
        self.samples.iter()
    }

    /// Removes and returns every stored sample, oldest first.
    pub fn drain(&mut self) -> Vec<StereoFrame> {
        self.samples.drain(..).collect()
    }

    /// Samples seen since creation or reset, including evicted ones.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Drops stored samples and the running total.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.total = 0;
    }
}
