//! Named signal inspection.
//!
//! Debug views and the waveform tracer read internal core signals through the
//! [`Probe`] capability instead of reaching into the model's layout. Signals are
//! addressed by dotted hierarchical paths such as `top.cpu.pc`; the number of path
//! segments is the signal's hierarchy depth.

/// Description of one probe-visible signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    /// Dotted hierarchical path (`scope.scope.name`).
    pub path: String,
    /// Width in bits, 1..=64.
    pub width: u32,
}

impl SignalInfo {
    /// Creates a signal description; widths are clamped to 1..=64.
    pub fn new(path: impl Into<String>, width: u32) -> Self {
        Self {
            path: path.into(),
            width: width.clamp(1, 64),
        }
    }

    /// Number of hierarchy levels in the path (a bare name has depth 1).
    pub fn depth(&self) -> usize {
        self.path.split('.').count()
    }

    /// Scope segments above the signal name, outermost first.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        let mut parts: Vec<&str> = self.path.split('.').collect();
        let _ = parts.pop();
        parts.into_iter()
    }

    /// Final path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or(&self.path)
    }

    /// Masks `value` to the signal width.
    #[inline]
    pub fn mask(&self, value: u64) -> u64 {
        if self.width >= 64 {
            value
        } else {
            value & ((1u64 << self.width) - 1)
        }
    }
}

/// Capability for reading internal core signals by symbolic path.
pub trait Probe {
    /// Lists every signal the model exposes, in a stable order.
    fn signals(&self) -> Vec<SignalInfo>;

    /// Reads the current value of the signal at `path`, or `None` if unknown.
    fn read(&self, path: &str) -> Option<u64>;

    /// Reads every signal listed by [`Probe::signals`] into `values`, in order.
    ///
    /// Unknown signals read as zero. Models with many signals should override this
    /// to avoid the per-path lookup.
    fn sample_into(&self, values: &mut Vec<u64>) {
        values.clear();
        values.extend(self.signals().iter().map(|s| self.read(&s.path).unwrap_or(0)));
    }
}
