//! Simulation statistics collection and reporting.
//!
//! This module tracks run-level counters for the harness. It provides:
//! 1. **Throughput:** Steps, evaluations and host-clock edges, with derived rates.
//! 2. **Video:** Published frames and host frames presented.
//! 3. **Bus:** Bytes moved, transfers completed or aborted, wait edges and violations.
//! 4. **Persistence:** Snapshot and trace activity.

use std::fmt::Write as _;
use std::time::Instant;

use crate::bus::BusCounters;

/// Run statistics.
#[derive(Debug, Clone)]
pub struct SimStats {
    start_time: Instant,
    /// Simulation steps executed (counter increments).
    pub steps: u64,
    /// Calls to the core's `eval`.
    pub evaluations: u64,
    /// Host-clock rising edges seen.
    pub host_edges: u64,
    /// Steps executed with reset asserted.
    pub reset_steps: u64,

    /// Frames published by the compositor.
    pub frames_published: u64,
    /// Host frames driven through `host_frame`.
    pub host_frames: u64,
    /// Published frames handed to a renderer.
    pub frames_uploaded: u64,

    /// Bus totals, refreshed from the controller when read.
    pub bus: BusCounters,
    /// Bus protocol violations observed.
    pub protocol_violations: u64,

    /// Audio samples captured.
    pub audio_samples: u64,
    /// Snapshots written.
    pub snapshots_saved: u64,
    /// Snapshots restored.
    pub snapshots_restored: u64,
    /// Steps sampled into the waveform trace.
    pub trace_samples: u64,
}

impl Default for SimStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            steps: 0,
            evaluations: 0,
            host_edges: 0,
            reset_steps: 0,
            frames_published: 0,
            host_frames: 0,
            frames_uploaded: 0,
            bus: BusCounters::default(),
            protocol_violations: 0,
            audio_samples: 0,
            snapshots_saved: 0,
            snapshots_restored: 0,
            trace_samples: 0,
        }
    }
}

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"video"`, `"bus"`, `"persistence"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "video", "bus", "persistence"];

impl SimStats {
    /// Wall-clock seconds since the statistics were created.
    pub fn host_seconds(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Renders the requested sections; an empty slice renders all of them.
    pub fn render_sections(&self, sections: &[String]) -> String {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let seconds = self.host_seconds().max(f64::MIN_POSITIVE);
        let mut out = String::new();

        let _ = writeln!(out, "\n==========================================================");
        let _ = writeln!(out, "CO-SIMULATION STATISTICS");
        let _ = writeln!(out, "==========================================================");
        if want("summary") {
            let khz = (self.steps as f64 / seconds) / 1000.0;
            let _ = writeln!(out, "host_seconds             {seconds:.4} s");
            let _ = writeln!(out, "sim_steps                {}", self.steps);
            let _ = writeln!(out, "sim_evaluations          {}", self.evaluations);
            let _ = writeln!(out, "sim_host_edges           {}", self.host_edges);
            let _ = writeln!(out, "sim_reset_steps          {}", self.reset_steps);
            let _ = writeln!(out, "sim_freq                 {khz:.2} kHz");
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("video") {
            let _ = writeln!(out, "VIDEO");
            let _ = writeln!(out, "  frames.published       {}", self.frames_published);
            let _ = writeln!(out, "  frames.uploaded        {}", self.frames_uploaded);
            let _ = writeln!(out, "  host_frames            {}", self.host_frames);
            let _ = writeln!(out, "  audio.samples          {}", self.audio_samples);
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("bus") {
            let edges = self.host_edges.max(1);
            let _ = writeln!(out, "HOST BUS");
            let _ = writeln!(out, "  bytes.downloaded       {}", self.bus.bytes_downloaded);
            let _ = writeln!(out, "  bytes.uploaded         {}", self.bus.bytes_uploaded);
            let _ = writeln!(out, "  transfers.completed    {}", self.bus.transfers_completed);
            let _ = writeln!(out, "  transfers.aborted      {}", self.bus.transfers_aborted);
            let _ = writeln!(
                out,
                "  wait_edges             {} ({:.2}%)",
                self.bus.wait_edges,
                (self.bus.wait_edges as f64 / edges as f64) * 100.0
            );
            let _ = writeln!(out, "  violations             {}", self.protocol_violations);
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("persistence") {
            let _ = writeln!(out, "PERSISTENCE");
            let _ = writeln!(out, "  snapshots.saved        {}", self.snapshots_saved);
            let _ = writeln!(out, "  snapshots.restored     {}", self.snapshots_restored);
            let _ = writeln!(out, "  trace.samples          {}", self.trace_samples);
        }
        let _ = writeln!(out, "==========================================================");
        out
    }

    /// Prints only the requested statistics sections to stdout.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.render_sections(sections));
    }

    /// Prints all statistics sections to stdout.
    ///
    /// Equivalent to `print_sections(&[])`.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}
