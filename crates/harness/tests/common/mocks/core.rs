//! Recording core double.
//!
//! `ScriptedCore` answers the bus handshake from a scripted wait pattern, plays back
//! a fixed video stream, and logs what the harness drove so tests can check
//! ordering and bus traffic without a real hardware model.

use cosim_core::common::SnapshotError;
use cosim_core::model::{
    AudioSample, BusDrive, BusStatus, Probe, SignalInfo, SimCore, VideoSignals,
};

/// One harness interaction, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Clock { domain: usize, level: bool },
    Reset(bool),
    Inputs(u64),
    Drive(BusDrive),
    Eval,
}

/// A datum the core accepted on a bus edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub index: u8,
    pub address: u32,
    pub data: u16,
    pub download: bool,
}

#[derive(Debug, Clone)]
pub struct ScriptedCore {
    pub model_id: String,
    pub bus_clock: usize,
    pub pixel_clock: usize,
    pub record_events: bool,
    pub events: Vec<Event>,
    pub drives: Vec<BusDrive>,
    pub wait_pattern: Vec<bool>,
    pub stuck_wait: bool,
    pub ack_with_wait: bool,
    pub accepted: Vec<Accepted>,
    pub memory: Vec<u8>,
    pub video_stream: Vec<VideoSignals>,
    pub audio_sample: AudioSample,
    pub finish_after_evals: Option<u64>,
    pub evals: u64,
    pub reset: bool,
    pub reset_evals: u64,
    pub inputs: u64,
    pub finalize_calls: u32,
    clocks: Vec<bool>,
    last_bus: bool,
    last_pixel: bool,
    drive: BusDrive,
    status: BusStatus,
    wait_pos: usize,
    video_pos: usize,
    video: VideoSignals,
}

impl Default for ScriptedCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCore {
    pub fn new() -> Self {
        Self {
            model_id: "scripted".into(),
            bus_clock: 0,
            pixel_clock: 0,
            record_events: false,
            events: Vec::new(),
            drives: Vec::new(),
            wait_pattern: Vec::new(),
            stuck_wait: false,
            ack_with_wait: false,
            accepted: Vec::new(),
            memory: vec![0; 256],
            video_stream: Vec::new(),
            audio_sample: AudioSample::default(),
            finish_after_evals: None,
            evals: 0,
            reset: false,
            reset_evals: 0,
            inputs: 0,
            finalize_calls: 0,
            clocks: Vec::new(),
            last_bus: false,
            last_pixel: false,
            drive: BusDrive::IDLE,
            status: BusStatus::default(),
            wait_pos: 0,
            video_pos: 0,
            video: VideoSignals::default(),
        }
    }

    /// Logs every harness call into `events`.
    pub fn recording(mut self) -> Self {
        self.record_events = true;
        self
    }

    /// Wait levels used on successive enabled bus edges, repeated.
    pub fn with_wait_pattern(mut self, pattern: Vec<bool>) -> Self {
        self.wait_pattern = pattern;
        self
    }

    /// Memory read back by uploads.
    pub fn with_memory(mut self, memory: Vec<u8>) -> Self {
        self.memory = memory;
        self
    }

    /// Video samples played on successive pixel edges, repeated.
    pub fn with_video(mut self, stream: Vec<VideoSignals>) -> Self {
        self.video_stream = stream;
        self
    }

    /// Reports `finished` once `evals` evaluations have run.
    pub fn finishing_after(mut self, evals: u64) -> Self {
        self.finish_after_evals = Some(evals);
        self
    }

    /// Addresses of downloaded data, in acceptance order.
    pub fn download_addresses(&self) -> Vec<u32> {
        self.accepted
            .iter()
            .filter(|a| a.download)
            .map(|a| a.address)
            .collect()
    }

    /// Downloaded bytes (low byte of each datum), in acceptance order.
    pub fn downloaded_bytes(&self) -> Vec<u8> {
        self.accepted
            .iter()
            .filter(|a| a.download)
            .map(|a| a.data as u8)
            .collect()
    }

    fn level(&self, domain: usize) -> bool {
        self.clocks.get(domain).copied().unwrap_or(false)
    }

    fn bus_edge(&mut self) {
        let d = self.drive;
        if !d.is_enabled() {
            self.status = BusStatus::default();
            return;
        }
        let scripted = if self.wait_pattern.is_empty() {
            false
        } else {
            let w = self.wait_pattern[self.wait_pos % self.wait_pattern.len()];
            self.wait_pos += 1;
            w
        };
        let wait = self.stuck_wait || scripted;
        self.status.wait = wait;
        self.status.ack = !wait || self.ack_with_wait;
        if wait {
            return;
        }
        if d.upload {
            let a = d.address as usize;
            let lo = self.memory.get(a).copied().unwrap_or(0);
            let hi = self.memory.get(a + 1).copied().unwrap_or(0);
            self.status.data_in = u16::from_le_bytes([lo, hi]);
        }
        self.accepted.push(Accepted {
            index: d.index,
            address: d.address,
            data: d.data_out,
            download: d.download,
        });
    }

    fn pixel_edge(&mut self) {
        if self.video_stream.is_empty() {
            return;
        }
        self.video = self.video_stream[self.video_pos % self.video_stream.len()];
        self.video_pos += 1;
    }
}

impl SimCore for ScriptedCore {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn set_clock(&mut self, domain: usize, level: bool) {
        if self.clocks.len() <= domain {
            self.clocks.resize(domain + 1, false);
        }
        self.clocks[domain] = level;
        if self.record_events {
            self.events.push(Event::Clock { domain, level });
        }
    }

    fn set_reset(&mut self, asserted: bool) {
        self.reset = asserted;
        if self.record_events {
            self.events.push(Event::Reset(asserted));
        }
    }

    fn set_inputs(&mut self, mask: u64) {
        self.inputs = mask;
        if self.record_events {
            self.events.push(Event::Inputs(mask));
        }
    }

    fn drive_bus(&mut self, drive: &BusDrive) {
        self.drive = *drive;
        self.drives.push(*drive);
        if self.record_events {
            self.events.push(Event::Drive(*drive));
        }
    }

    fn bus_status(&self) -> BusStatus {
        self.status
    }

    fn eval(&mut self) {
        self.evals += 1;
        if self.reset {
            self.reset_evals += 1;
        }
        if self.record_events {
            self.events.push(Event::Eval);
        }
        let bus = self.level(self.bus_clock);
        if bus && !self.last_bus {
            self.bus_edge();
        }
        self.last_bus = bus;
        let pixel = self.level(self.pixel_clock);
        if pixel && !self.last_pixel {
            self.pixel_edge();
        }
        self.last_pixel = pixel;
    }

    fn video(&self) -> VideoSignals {
        self.video
    }

    fn audio(&self) -> AudioSample {
        self.audio_sample
    }

    fn finished(&self) -> bool {
        self.finish_after_evals.is_some_and(|n| self.evals >= n)
    }

    fn finalize(&mut self) {
        self.finalize_calls += 1;
    }

    fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.memory.len());
        out.extend_from_slice(&self.evals.to_le_bytes());
        out.extend_from_slice(&(self.video_pos as u64).to_le_bytes());
        out.extend_from_slice(&self.memory);
        out
    }

    fn restore_state(&mut self, blob: &[u8]) -> Result<(), SnapshotError> {
        if blob.len() != 16 + self.memory.len() {
            return Err(SnapshotError::Format(format!(
                "expected {} bytes of state, got {}",
                16 + self.memory.len(),
                blob.len()
            )));
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&blob[..8]);
        self.evals = u64::from_le_bytes(word);
        word.copy_from_slice(&blob[8..16]);
        self.video_pos = u64::from_le_bytes(word) as usize;
        self.memory.copy_from_slice(&blob[16..]);
        Ok(())
    }

    fn as_probe(&self) -> Option<&dyn Probe> {
        Some(self)
    }
}

impl Probe for ScriptedCore {
    fn signals(&self) -> Vec<SignalInfo> {
        vec![
            SignalInfo::new("evals", 64),
            SignalInfo::new("core.reset", 1),
            SignalInfo::new("core.bus.accepted", 32),
        ]
    }

    fn read(&self, path: &str) -> Option<u64> {
        match path {
            "evals" => Some(self.evals),
            "core.reset" => Some(u64::from(self.reset)),
            "core.bus.accepted" => Some(self.accepted.len() as u64),
            _ => None,
        }
    }
}
