//! Reference pattern core.
//!
//! `PatternCore` is a small synchronous model that exercises every harness
//! interface without an external hardware model:
//! 1. **Bus port:** A byte-addressed RAM at index 0 that accepts downloads and serves
//!    uploads, with optional wait-state injection.
//! 2. **Video:** A raster generator that scans the first `width * height` bytes of
//!    RAM as RGB332 pixels, with blanking and sync intervals.
//! 3. **Audio:** A square wave derived from the beam position.
//! 4. **State:** Full state serialised with `bincode`; internal counters exposed
//!    through [`Probe`].
//!
//! The core reacts to rising edges of its own clock inputs, exactly as synthesised
//! logic would: the harness only sets levels and calls [`SimCore::eval`].

use bincode::{Decode, Encode};
use tracing::{debug, warn};

use crate::common::SnapshotError;
use crate::model::{AudioSample, BusDrive, BusStatus, Probe, SignalInfo, SimCore, VideoSignals};

/// Horizontal blanking interval in pixel clocks.
const H_BLANK: u32 = 8;
/// Offset of horizontal sync into the blanking interval.
const H_SYNC_START: u32 = 2;
/// Horizontal sync width.
const H_SYNC_LEN: u32 = 4;
/// Vertical blanking interval in lines.
const V_BLANK: u32 = 4;
/// Offset of vertical sync into the blanking interval.
const V_SYNC_START: u32 = 1;
/// Vertical sync width.
const V_SYNC_LEN: u32 = 2;
/// Square-wave amplitude.
const AUDIO_LEVEL: i16 = 4096;

/// Geometry and wiring of a [`PatternCore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternConfig {
    /// Active pixels per line.
    pub width: u32,
    /// Active lines per frame.
    pub height: u32,
    /// RAM size in bytes.
    pub ram_size: usize,
    /// 16-bit data lines instead of 8-bit.
    pub word_bus: bool,
    /// Clock input that clocks the bus port.
    pub bus_clock: usize,
    /// Clock input that clocks the raster generator.
    pub pixel_clock: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            ram_size: 64 * 1024,
            word_bus: false,
            bus_clock: 0,
            pixel_clock: 0,
        }
    }
}

/// Misbehaviour injected into the bus port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusFaults {
    /// Wait edges inserted before each accepted datum.
    pub wait_states: u32,
    /// Hold wait forever once a transfer starts.
    pub stuck_wait: bool,
    /// Assert acknowledge together with wait.
    pub ack_during_wait: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
struct PixelOut {
    enable: bool,
    h_blank: bool,
    v_blank: bool,
    h_sync: bool,
    v_sync: bool,
    r: u8,
    g: u8,
    b: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
struct PatternState {
    ram: Vec<u8>,
    hcount: u32,
    vcount: u32,
    frame: u64,
    last_bus_clock: bool,
    last_pixel_clock: bool,
    waits_left: u32,
    writes: u64,
    last_address: u32,
    wait: bool,
    ack: bool,
    data_in: u16,
    video: PixelOut,
}

/// Synthetic core with a RAM-backed framebuffer and a bus port.
#[derive(Debug, Clone)]
pub struct PatternCore {
    config: PatternConfig,
    model_id: String,
    faults: BusFaults,
    finish_after: Option<u64>,
    clocks: Vec<bool>,
    reset: bool,
    inputs: u64,
    drive: BusDrive,
    finalized: bool,
    state: PatternState,
}

impl PatternCore {
    /// Creates a core with zeroed RAM.
    pub fn new(config: PatternConfig) -> Self {
        let ram_size = config.ram_size.max(1);
        Self {
            model_id: format!(
                "pattern/{}x{}/{}",
                config.width, config.height, ram_size
            ),
            config: PatternConfig { ram_size, ..config },
            faults: BusFaults::default(),
            finish_after: None,
            clocks: vec![false; config.bus_clock.max(config.pixel_clock) + 1],
            reset: false,
            inputs: 0,
            drive: BusDrive::IDLE,
            finalized: false,
            state: PatternState {
                ram: vec![0; ram_size],
                hcount: 0,
                vcount: 0,
                frame: 0,
                last_bus_clock: false,
                last_pixel_clock: false,
                waits_left: 0,
                writes: 0,
                last_address: 0,
                wait: false,
                ack: false,
                data_in: 0,
                video: PixelOut::default(),
            },
        }
    }

    /// Injects bus misbehaviour.
    pub fn set_faults(&mut self, faults: BusFaults) {
        self.faults = faults;
        self.state.waits_left = faults.wait_states;
    }

    /// Reports `finished` once `frames` frames have been scanned out.
    pub fn finish_after(&mut self, frames: u64) {
        self.finish_after = Some(frames);
    }

    /// Geometry and wiring.
    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// RAM contents.
    pub fn ram(&self) -> &[u8] {
        &self.state.ram
    }

    /// Frames scanned out so far.
    pub fn frame(&self) -> u64 {
        self.state.frame
    }

    /// Data accepted from the bus so far.
    pub fn writes(&self) -> u64 {
        self.state.writes
    }

    /// Whether `finalize` has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn clock_level(&self, input: usize) -> bool {
        self.clocks.get(input).copied().unwrap_or(false)
    }

    fn bus_edge(&mut self) {
        let d = self.drive;
        let s = &mut self.state;
        s.ack = false;
        if !d.is_enabled() {
            s.wait = false;
            s.waits_left = self.faults.wait_states;
            return;
        }
        if self.faults.stuck_wait || s.waits_left > 0 {
            s.waits_left = s.waits_left.saturating_sub(1);
            s.wait = true;
            s.ack = self.faults.ack_during_wait;
            return;
        }
        s.wait = false;
        s.waits_left = self.faults.wait_states;
        if d.index != 0 {
            // Other indices have no backing store; accept and discard.
            s.ack = true;
            return;
        }

        let len = s.ram.len();
        let lo = d.address as usize % len;
        let hi = (d.address as usize + 1) % len;
        if d.download && d.write {
            let [b0, b1] = d.data_out.to_le_bytes();
            s.ram[lo] = b0;
            if self.config.word_bus {
                s.ram[hi] = b1;
            }
            s.writes += 1;
        } else if d.upload {
            let b1 = if self.config.word_bus { s.ram[hi] } else { 0 };
            s.data_in = u16::from_le_bytes([s.ram[lo], b1]);
        }
        s.last_address = d.address;
        s.ack = true;
    }

    fn pixel_edge(&mut self) {
        let (w, h) = (self.config.width, self.config.height);
        let s = &mut self.state;
        if self.reset {
            s.hcount = 0;
            s.vcount = 0;
            s.video = PixelOut::default();
            return;
        }

        let active = s.hcount < w && s.vcount < h;
        let h_sync = (w + H_SYNC_START..w + H_SYNC_START + H_SYNC_LEN).contains(&s.hcount);
        let v_sync = (h + V_SYNC_START..h + V_SYNC_START + V_SYNC_LEN).contains(&s.vcount);
        let (r, g, b) = if active {
            let idx = (s.vcount as usize * w as usize + s.hcount as usize) % s.ram.len();
            let mut px = s.ram[idx];
            if self.inputs & 1 != 0 {
                px = !px;
            }
            rgb332(px)
        } else {
            (0, 0, 0)
        };
        s.video = PixelOut {
            enable: true,
            h_blank: s.hcount >= w,
            v_blank: s.vcount >= h,
            h_sync,
            v_sync,
            r,
            g,
            b,
        };

        s.hcount += 1;
        if s.hcount == w + H_BLANK {
            s.hcount = 0;
            s.vcount += 1;
            if s.vcount == h + V_BLANK {
                s.vcount = 0;
                s.frame += 1;
            }
        }
    }
}

fn rgb332(px: u8) -> (u8, u8, u8) {
    let r = (px >> 5) & 0x7;
    let g = (px >> 2) & 0x7;
    let b = px & 0x3;
    let scale = |c: u8| (u16::from(c) * 255 / 7) as u8;
    (scale(r), scale(g), b * 85)
}

impl SimCore for PatternCore {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn set_clock(&mut self, domain: usize, level: bool) {
        if let Some(c) = self.clocks.get_mut(domain) {
            *c = level;
        }
    }

    fn set_reset(&mut self, asserted: bool) {
        self.reset = asserted;
    }

    fn set_inputs(&mut self, mask: u64) {
        self.inputs = mask;
    }

    fn drive_bus(&mut self, drive: &BusDrive) {
        self.drive = *drive;
    }

    fn bus_status(&self) -> BusStatus {
        BusStatus {
            wait: self.state.wait,
            ack: self.state.ack,
            data_in: self.state.data_in,
        }
    }

    fn eval(&mut self) {
        let bus_clock = self.clock_level(self.config.bus_clock);
        if bus_clock && !self.state.last_bus_clock {
            self.bus_edge();
        }
        self.state.last_bus_clock = bus_clock;

        let pixel_clock = self.clock_level(self.config.pixel_clock);
        if pixel_clock && !self.state.last_pixel_clock {
            self.pixel_edge();
        }
        self.state.last_pixel_clock = pixel_clock;
    }

    fn video(&self) -> VideoSignals {
        let v = self.state.video;
        VideoSignals {
            pixel_enable: v.enable,
            h_blank: v.h_blank,
            v_blank: v.v_blank,
            h_sync: v.h_sync,
            v_sync: v.v_sync,
            r: v.r,
            g: v.g,
            b: v.b,
        }
    }

    fn audio(&self) -> AudioSample {
        let level = if (self.state.hcount / 8) % 2 == 0 {
            AUDIO_LEVEL
        } else {
            -AUDIO_LEVEL
        };
        AudioSample {
            left: level,
            right: -level,
        }
    }

    fn finished(&self) -> bool {
        self.finish_after.is_some_and(|n| self.state.frame >= n)
    }

    fn finalize(&mut self) {
        debug!(frames = self.state.frame, writes = self.state.writes, "pattern core finalized");
        self.finalized = true;
    }

    fn save_state(&self) -> Vec<u8> {
        bincode::encode_to_vec(&self.state, bincode::config::standard()).unwrap_or_else(|e| {
            warn!("pattern core state encode failed: {e}");
            Vec::new()
        })
    }

    fn restore_state(&mut self, blob: &[u8]) -> Result<(), SnapshotError> {
        let (state, used): (PatternState, usize) =
            bincode::decode_from_slice(blob, bincode::config::standard())
                .map_err(|e| SnapshotError::Format(format!("core state: {e}")))?;
        if used != blob.len() {
            return Err(SnapshotError::Format(format!(
                "core state has {} trailing bytes",
                blob.len() - used
            )));
        }
        if state.ram.len() != self.config.ram_size {
            return Err(SnapshotError::Format(format!(
                "core state has {} bytes of RAM, expected {}",
                state.ram.len(),
                self.config.ram_size
            )));
        }
        self.state = state;
        Ok(())
    }

    fn as_probe(&self) -> Option<&dyn Probe> {
        Some(self)
    }
}

impl Probe for PatternCore {
    fn signals(&self) -> Vec<SignalInfo> {
        vec![
            SignalInfo::new("reset", 1),
            SignalInfo::new("pattern.hcount", 16),
            SignalInfo::new("pattern.vcount", 16),
            SignalInfo::new("pattern.frame", 32),
            SignalInfo::new("pattern.inputs", 64),
            SignalInfo::new("pattern.bus.address", 32),
            SignalInfo::new("pattern.bus.wait", 1),
            SignalInfo::new("pattern.bus.ack", 1),
            SignalInfo::new("pattern.bus.writes", 32),
        ]
    }

    fn read(&self, path: &str) -> Option<u64> {
        let s = &self.state;
        let value = match path {
            "reset" => u64::from(self.reset),
            "pattern.hcount" => u64::from(s.hcount),
            "pattern.vcount" => u64::from(s.vcount),
            "pattern.frame" => s.frame,
            "pattern.inputs" => self.inputs,
            "pattern.bus.address" => u64::from(s.last_address),
            "pattern.bus.wait" => u64::from(s.wait),
            "pattern.bus.ack" => u64::from(s.ack),
            "pattern.bus.writes" => s.writes,
            _ => return None,
        };
        Some(value)
    }
}
