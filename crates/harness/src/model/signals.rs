//! Signal bundles exchanged between the harness and the simulated core.
//!
//! Each bundle groups the wires of one interface so that a core can be driven and
//! sampled with a single call per interface per evaluation:
//! 1. **Bus:** `BusDrive` (host to core) and `BusStatus` (core to host).
//! 2. **Video:** `VideoSignals`, colour channels plus sync/blank and pixel enable.
//! 3. **Audio:** `AudioSample`, one signed left/right pair.

use crate::common::constants::ALPHA_OPAQUE;

/// Lines driven by the host side of the bulk I/O bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusDrive {
    /// Download enable: a host-to-core transfer is in progress.
    pub download: bool,
    /// Upload enable: a core-to-host transfer is in progress.
    pub upload: bool,
    /// Destination device/region index inside the core.
    pub index: u8,
    /// Byte address of the current datum.
    pub address: u32,
    /// Data presented to the core (low byte only on an 8-bit bus).
    pub data_out: u16,
    /// Write strobe: `data_out` is valid on this edge.
    pub write: bool,
}

impl BusDrive {
    /// The idle bus: every enable and strobe deasserted.
    pub const IDLE: Self = Self {
        download: false,
        upload: false,
        index: 0,
        address: 0,
        data_out: 0,
        write: false,
    };

    /// Returns `true` if either transfer direction is enabled.
    pub fn is_enabled(&self) -> bool {
        self.download || self.upload
    }
}

/// Lines driven by the core side of the bulk I/O bus, sampled after evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStatus {
    /// Wait-state: the core is not ready to accept or produce the current datum.
    pub wait: bool,
    /// Acknowledge: the core latched the current datum.
    pub ack: bool,
    /// Data produced by the core during uploads.
    pub data_in: u16,
}

/// Video output of the core for one evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoSignals {
    /// Pixel clock enable; samples are only taken while it is high.
    pub pixel_enable: bool,
    /// Horizontal blanking.
    pub h_blank: bool,
    /// Vertical blanking.
    pub v_blank: bool,
    /// Horizontal sync pulse.
    pub h_sync: bool,
    /// Vertical sync pulse.
    pub v_sync: bool,
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl VideoSignals {
    /// Packs the colour channels as `0xAABBGGRR` with an opaque alpha.
    #[inline]
    pub fn packed_colour(&self) -> u32 {
        ALPHA_OPAQUE | (u32::from(self.b) << 16) | (u32::from(self.g) << 8) | u32::from(self.r)
    }
}

/// One stereo audio sample as produced by the core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioSample {
    /// Left channel, signed 16-bit.
    pub left: i16,
    /// Right channel, signed 16-bit.
    pub right: i16,
}
