//! Multi-domain clock sequencer.
//!
//! Every clock in the harness is derived from one tick counter by integer division:
//! a domain with divisor `d` toggles once every `d` ticks. Because all domains share
//! the counter, their phases are reproducible from the counter alone, which waveform
//! traces and snapshot replay both rely on.
//!
//! Domains start low with `previous == current`, so the first tick after a reset
//! never reports a spurious edge.

use crate::common::ConfigError;

/// Handle to a clock domain inside a [`ClockSequencer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockId(pub usize);

/// One clock signal derived from the shared counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDomain {
    name: String,
    divisor: u64,
    current: bool,
    previous: bool,
    toggles: u64,
}

impl ClockDomain {
    fn new(name: String, divisor: u64) -> Self {
        Self {
            name,
            divisor,
            current: false,
            previous: false,
            toggles: 0,
        }
    }

    /// Domain name as given in the configuration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of counter ticks per level change.
    pub fn divisor(&self) -> u64 {
        self.divisor
    }

    /// Current level.
    pub fn level(&self) -> bool {
        self.current
    }

    /// Level before the most recent tick.
    pub fn previous(&self) -> bool {
        self.previous
    }

    /// Number of level changes since reset.
    pub fn toggles(&self) -> u64 {
        self.toggles
    }

    /// Low-to-high transition on the most recent tick.
    #[inline]
    pub fn is_rising(&self) -> bool {
        self.current && !self.previous
    }

    /// High-to-low transition on the most recent tick.
    #[inline]
    pub fn is_falling(&self) -> bool {
        !self.current && self.previous
    }

    fn advance(&mut self, counter: u64) {
        self.previous = self.current;
        if counter % self.divisor == 0 {
            self.current = !self.current;
            self.toggles += 1;
        }
    }

    fn reset(&mut self) {
        self.current = false;
        self.previous = false;
        self.toggles = 0;
    }

    fn seek(&mut self, counter: u64) {
        self.toggles = counter / self.divisor;
        self.current = self.toggles % 2 == 1;
        self.previous = self.current;
    }
}

/// Derives phase-locked clock domains from a shared tick counter.
#[derive(Debug, Clone)]
pub struct ClockSequencer {
    counter: u64,
    domains: Vec<ClockDomain>,
}

impl ClockSequencer {
    /// Builds a sequencer from `(name, divisor)` pairs, in domain-id order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if there are no domains, a divisor is zero,
    /// or two domains share a name.
    pub fn new<I, S>(domains: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut built: Vec<ClockDomain> = Vec::new();
        for (name, divisor) in domains {
            let name = name.into();
            if divisor == 0 {
                return Err(ConfigError::Invalid(format!(
                    "clock '{name}' has a zero divisor"
                )));
            }
            if built.iter().any(|d| d.name == name) {
                return Err(ConfigError::Invalid(format!("duplicate clock '{name}'")));
            }
            built.push(ClockDomain::new(name, divisor));
        }
        if built.is_empty() {
            return Err(ConfigError::Invalid("at least one clock is required".into()));
        }
        Ok(Self {
            counter: 0,
            domains: built,
        })
    }

    /// Advances every domain by one counter unit.
    pub fn tick(&mut self) {
        self.counter += 1;
        let counter = self.counter;
        for domain in &mut self.domains {
            domain.advance(counter);
        }
    }

    /// Zeroes the counter and drives every domain low without an edge.
    pub fn reset(&mut self) {
        self.counter = 0;
        for domain in &mut self.domains {
            domain.reset();
        }
    }

    /// Recomputes every domain for an arbitrary counter value.
    ///
    /// Levels and toggle counts are exact; `previous` is set equal to `current`, so
    /// no edge is reported until the next tick.
    pub fn seek(&mut self, counter: u64) {
        self.counter = counter;
        for domain in &mut self.domains {
            domain.seek(counter);
        }
    }

    /// Ticks since the last reset.
    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Looks up a domain by name.
    pub fn id(&self, name: &str) -> Option<ClockId> {
        self.domains.iter().position(|d| d.name == name).map(ClockId)
    }

    /// All domains in id order.
    pub fn domains(&self) -> &[ClockDomain] {
        &self.domains
    }

    /// Returns the domain for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this sequencer.
    pub fn domain(&self, id: ClockId) -> &ClockDomain {
        &self.domains[id.0]
    }

    /// Current level of `id`.
    pub fn level(&self, id: ClockId) -> bool {
        self.domain(id).level()
    }

    /// Rising edge on the latest tick.
    pub fn is_rising(&self, id: ClockId) -> bool {
        self.domain(id).is_rising()
    }

    /// Falling edge on the latest tick.
    pub fn is_falling(&self, id: ClockId) -> bool {
        self.domain(id).is_falling()
    }

    /// Any edge on the latest tick.
    pub fn changed(&self, id: ClockId) -> bool {
        let d = self.domain(id);
        d.current != d.previous
    }
}
