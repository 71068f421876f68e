//! Waveform trace control.
//!
//! The controller owns the on/off state, hierarchy depth and output path of the VCD
//! dump. Signals are declared once from the core's [`Probe`] list; the depth only
//! filters which of them are sampled, so changing it never reopens the file.
//! Disabling the trace stops sampling but keeps the file open, and re-enabling
//! continues in the same file.

/// VCD writer.
pub mod vcd;

pub use vcd::VcdSink;

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::common::TraceError;
use crate::model::{Probe, SignalInfo};

/// Controls the waveform dump.
#[derive(Debug)]
pub struct TraceController {
    path: PathBuf,
    depth: usize,
    enabled: bool,
    declared: Vec<SignalInfo>,
    sink: Option<VcdSink>,
    last_timestamp: Option<u64>,
    skipping: bool,
    samples: u64,
}

impl TraceController {
    /// Creates a disabled controller.
    pub fn new(path: impl Into<PathBuf>, depth: usize) -> Self {
        Self {
            path: path.into(),
            depth,
            enabled: false,
            declared: Vec::new(),
            sink: None,
            last_timestamp: None,
            skipping: false,
            samples: 0,
        }
    }

    /// Sets the signals declared when a file is next opened.
    pub fn declare(&mut self, signals: Vec<SignalInfo>) {
        self.declared = signals;
    }

    /// Turns dumping on or off; enabling opens the file if none is open.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the file cannot be created; the trace stays
    /// disabled.
    pub fn set_enabled(&mut self, enabled: bool) -> Result<(), TraceError> {
        if enabled == self.enabled {
            return Ok(());
        }
        if enabled {
            self.open()?;
        }
        self.enabled = enabled;
        info!(enabled, path = %self.path.display(), "trace toggled");
        Ok(())
    }

    fn open(&mut self) -> Result<(), TraceError> {
        if self.sink.is_some() {
            return Ok(());
        }
        let sink = VcdSink::create(&self.path, &self.declared).map_err(|source| {
            warn!(path = %self.path.display(), "cannot open trace: {source}");
            TraceError::Io {
                path: self.path.clone(),
                source,
            }
        })?;
        info!(path = %self.path.display(), signals = sink.declared(), "trace file opened");
        self.sink = Some(sink);
        self.last_timestamp = None;
        self.skipping = false;
        Ok(())
    }

    /// Samples one step if enabled.
    ///
    /// Timestamps must increase strictly; a non-increasing `counter` is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if writing fails.
    pub fn dump(&mut self, counter: u64, probe: Option<&dyn Probe>) -> Result<(), TraceError> {
        if !self.enabled {
            return Ok(());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        if self.last_timestamp.is_some_and(|last| counter <= last) {
            if !self.skipping {
                warn!(counter, last = self.last_timestamp, "non-increasing trace timestamps skipped");
                self.skipping = true;
            }
            return Ok(());
        }
        sink.sample(counter, probe, self.depth)
            .map_err(|source| TraceError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.last_timestamp = Some(counter);
        self.skipping = false;
        self.samples += 1;
        Ok(())
    }

    /// Changes the hierarchy depth sampled from the next step on.
    pub fn set_depth(&mut self, depth: usize) {
        debug!(depth, "trace depth changed");
        self.depth = depth;
    }

    /// Closes any open file and switches to `path`, reopening only if enabled.
    ///
    /// A failed flush of the old file is logged; the switch happens regardless.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if reopening fails; the trace is then disabled.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> Result<(), TraceError> {
        if let Err(e) = self.close() {
            warn!("previous trace not flushed cleanly: {e}");
        }
        self.path = path.into();
        if self.enabled {
            if let Err(e) = self.open() {
                self.enabled = false;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Truncates and reopens the current file so timestamps can restart from zero.
    ///
    /// # Errors
    ///
    /// As [`TraceController::set_path`].
    pub fn rewind(&mut self) -> Result<(), TraceError> {
        let path = self.path.clone();
        self.set_path(path)
    }

    /// Flushes buffered output.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the flush fails.
    pub fn flush(&mut self) -> Result<(), TraceError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush().map_err(|source| TraceError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Flushes and closes the file; dumping stays enabled if it was.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the final flush fails.
    pub fn close(&mut self) -> Result<(), TraceError> {
        let flushed = self.flush();
        if self.sink.take().is_some() {
            info!(path = %self.path.display(), samples = self.samples, "trace file closed");
        }
        flushed
    }

    /// Whether steps are being sampled.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a file is open.
    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    /// Current hierarchy depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Steps sampled since creation.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

impl Drop for TraceController {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("trace close on drop failed: {e}");
        }
    }
}
