//! Configuration system for the co-simulation harness.
//!
//! This module defines all configuration structures used to parameterize a run. It
//! provides:
//! 1. **Defaults:** Baseline clocking, video, bus and run-control constants.
//! 2. **Structures:** Sections for clocks, video, input, bus, run control, trace,
//!    snapshot and boot images.
//! 3. **Validation:** Cross-section checks (clock names resolve, ranges hold).
//!
//! Configuration is supplied as JSON (`HarnessConfig::from_json` / `from_file`), or
//! use `HarnessConfig::default()` for the built-in reference core.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::bus::BusWidth;
use crate::clock::ClockSequencer;
use crate::common::ConfigError;
use crate::common::constants::MAX_INPUTS;
use crate::video::Rotation;

/// Default configuration constants for the harness.
///
/// These values reproduce the two-domain 48/24 MHz bench the harness was first
/// built around.
mod defaults {
    /// Name of the fastest clock domain.
    pub const FAST_CLOCK: &str = "clk_48";

    /// Name of the half-rate clock domain.
    pub const HALF_CLOCK: &str = "clk_24";

    /// Counter units the core is held in reset after start-up.
    pub const RESET_CYCLES: u64 = 48;

    /// Active video width in pixels.
    pub const VIDEO_WIDTH: u32 = 128;

    /// Active video height in pixels.
    pub const VIDEO_HEIGHT: u32 = 128;

    /// Publications averaged by the FPS estimate.
    pub const FPS_WINDOW: usize = 32;

    /// Number of latched inputs.
    pub const INPUT_COUNT: usize = 12;

    /// Wait edges tolerated on one datum before the transfer is aborted (0 = no limit).
    pub const MAX_WAIT_EDGES: u64 = 0;

    /// Steps executed per host frame in running mode.
    pub const BATCH_SIZE: u64 = 150_000;

    /// Steps executed by one multi-step request.
    pub const MULTI_STEP_AMOUNT: u64 = 1024;

    /// Stereo samples kept by the audio tap.
    pub const AUDIO_CAPACITY: usize = 4096;

    /// Hierarchy depth sampled by the waveform tracer.
    pub const TRACE_DEPTH: usize = 99;

    /// Waveform output file.
    pub const TRACE_PATH: &str = "sim.vcd";

    /// Snapshot file used by save/restore shortcuts.
    pub const SNAPSHOT_PATH: &str = "sim.snap";
}

/// Root configuration structure containing all harness settings.
///
/// # Examples
///
/// ```
/// use cosim_core::config::HarnessConfig;
///
/// let config = HarnessConfig::default();
/// assert_eq!(config.host_clock, "clk_48");
/// assert_eq!(config.run.batch_size, 150_000);
/// ```
///
/// Deserializing from JSON; omitted sections keep their defaults:
///
/// ```
/// use cosim_core::config::HarnessConfig;
///
/// let json = r#"{
///     "clocks": [
///         { "name": "sys", "divisor": 1 },
///         { "name": "pix", "divisor": 4 }
///     ],
///     "host_clock": "sys",
///     "pixel_clock": "pix",
///     "video": { "width": 256, "height": 224, "rotation": 1 },
///     "boot": [ { "path": "boot.rom", "index": 0 } ]
/// }"#;
///
/// let config = HarnessConfig::from_json(json).unwrap();
/// assert_eq!(config.video.output_size(), (224, 256));
/// assert_eq!(config.boot[0].base_address, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Clock domains in the order their levels are driven into the core.
    #[serde(default = "HarnessConfig::default_clocks")]
    pub clocks: Vec<ClockConfig>,

    /// Domain whose rising edges clock the bus handshake.
    #[serde(default = "HarnessConfig::default_clock_name")]
    pub host_clock: String,

    /// Domain whose rising edges sample the pixel stream.
    #[serde(default = "HarnessConfig::default_clock_name")]
    pub pixel_clock: String,

    /// Domain whose rising edges sample audio; `null` disables the audio tap.
    #[serde(default = "HarnessConfig::default_audio_clock")]
    pub audio_clock: Option<String>,

    /// Counter units reset stays asserted after start-up or reset.
    #[serde(default = "HarnessConfig::default_reset_cycles")]
    pub reset_cycles: u64,

    /// Video compositor settings
    #[serde(default)]
    pub video: VideoConfig,

    /// Input latch settings
    #[serde(default)]
    pub input: InputConfig,

    /// Host bus settings
    #[serde(default)]
    pub bus: BusConfig,

    /// Run control settings
    #[serde(default)]
    pub run: RunConfig,

    /// Audio tap settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Waveform trace settings
    #[serde(default)]
    pub trace: TraceConfig,

    /// Snapshot settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Images queued on the bus at start-up, in order.
    #[serde(default)]
    pub boot: Vec<BootImage>,
}

impl HarnessConfig {
    fn default_clocks() -> Vec<ClockConfig> {
        vec![
            ClockConfig::new(defaults::FAST_CLOCK, 1),
            ClockConfig::new(defaults::HALF_CLOCK, 2),
        ]
    }

    fn default_clock_name() -> String {
        defaults::FAST_CLOCK.to_owned()
    }

    fn default_audio_clock() -> Option<String> {
        Some(defaults::FAST_CLOCK.to_owned())
    }

    fn default_reset_cycles() -> u64 {
        defaults::RESET_CYCLES
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and [`ConfigError::Invalid`]
    /// if validation fails.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`HarnessConfig::from_json`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Checks ranges and that every referenced clock exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clocks = self.clock_sequencer()?;
        let mut referenced = vec![("host_clock", self.host_clock.as_str())];
        referenced.push(("pixel_clock", self.pixel_clock.as_str()));
        if let Some(audio) = &self.audio_clock {
            referenced.push(("audio_clock", audio.as_str()));
        }
        for (field, name) in referenced {
            if clocks.id(name).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{field} refers to unknown clock '{name}'"
                )));
            }
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(ConfigError::Invalid("video dimensions must be non-zero".into()));
        }
        if self.input.count == 0 || self.input.count > MAX_INPUTS {
            return Err(ConfigError::Invalid(format!(
                "input.count must be between 1 and {MAX_INPUTS}"
            )));
        }
        if self.run.batch_size == 0 || self.run.multi_step_amount == 0 {
            return Err(ConfigError::Invalid(
                "run.batch_size and run.multi_step_amount must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Builds the clock sequencer described by `clocks`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty list, a zero divisor or a
    /// duplicate name.
    pub fn clock_sequencer(&self) -> Result<ClockSequencer, ConfigError> {
        ClockSequencer::new(self.clocks.iter().map(|c| (c.name.clone(), c.divisor)))
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            clocks: Self::default_clocks(),
            host_clock: Self::default_clock_name(),
            pixel_clock: Self::default_clock_name(),
            audio_clock: Self::default_audio_clock(),
            reset_cycles: Self::default_reset_cycles(),
            video: VideoConfig::default(),
            input: InputConfig::default(),
            bus: BusConfig::default(),
            run: RunConfig::default(),
            audio: AudioConfig::default(),
            trace: TraceConfig::default(),
            snapshot: SnapshotConfig::default(),
            boot: Vec::new(),
        }
    }
}

/// One clock domain.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClockConfig {
    /// Domain name, referenced by the `*_clock` fields.
    pub name: String,
    /// Counter units per level change.
    pub divisor: u64,
}

impl ClockConfig {
    /// Creates a clock entry.
    pub fn new(name: impl Into<String>, divisor: u64) -> Self {
        Self {
            name: name.into(),
            divisor,
        }
    }
}

/// Video compositor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoConfig {
    /// Active width in source pixels
    #[serde(default = "VideoConfig::default_width")]
    pub width: u32,

    /// Active height in source lines
    #[serde(default = "VideoConfig::default_height")]
    pub height: u32,

    /// Output rotation: -1, 0 or 1 quarter turns clockwise
    #[serde(default)]
    pub rotation: Rotation,

    /// Invert the output row order
    #[serde(default)]
    pub vflip: bool,

    /// Publications averaged by the FPS estimate
    #[serde(default = "VideoConfig::default_fps_window")]
    pub fps_window: usize,
}

impl VideoConfig {
    fn default_width() -> u32 {
        defaults::VIDEO_WIDTH
    }

    fn default_height() -> u32 {
        defaults::VIDEO_HEIGHT
    }

    fn default_fps_window() -> usize {
        defaults::FPS_WINDOW
    }

    /// Output dimensions after rotation.
    pub fn output_size(&self) -> (u32, u32) {
        self.rotation.output_size(self.width, self.height)
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
            rotation: Rotation::default(),
            vflip: false,
            fps_window: Self::default_fps_window(),
        }
    }
}

/// Input latch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    /// Number of latched inputs, 1..=64
    #[serde(default = "InputConfig::default_count")]
    pub count: usize,
}

impl InputConfig {
    fn default_count() -> usize {
        defaults::INPUT_COUNT
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            count: Self::default_count(),
        }
    }
}

/// Host bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Datum width: `"byte"` / `"8"` or `"word"` / `"16"`
    #[serde(default)]
    pub width: BusWidth,

    /// Consecutive wait edges tolerated per datum; 0 disables the limit
    #[serde(default = "BusConfig::default_max_wait_edges")]
    pub max_wait_edges: u64,
}

impl BusConfig {
    fn default_max_wait_edges() -> u64 {
        defaults::MAX_WAIT_EDGES
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            width: BusWidth::default(),
            max_wait_edges: Self::default_max_wait_edges(),
        }
    }
}

/// Run control configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Steps per host frame while running
    #[serde(default = "RunConfig::default_batch_size")]
    pub batch_size: u64,

    /// Steps per multi-step request
    #[serde(default = "RunConfig::default_multi_step_amount")]
    pub multi_step_amount: u64,

    /// Start in running mode instead of stopped
    #[serde(default)]
    pub autostart: bool,
}

impl RunConfig {
    fn default_batch_size() -> u64 {
        defaults::BATCH_SIZE
    }

    fn default_multi_step_amount() -> u64 {
        defaults::MULTI_STEP_AMOUNT
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: Self::default_batch_size(),
            multi_step_amount: Self::default_multi_step_amount(),
            autostart: false,
        }
    }
}

/// Audio tap configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AudioConfig {
    /// Stereo samples retained; 0 keeps none
    #[serde(default = "AudioConfig::default_capacity")]
    pub capacity: usize,
}

impl AudioConfig {
    fn default_capacity() -> usize {
        defaults::AUDIO_CAPACITY
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
        }
    }
}

/// Waveform trace configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraceConfig {
    /// Start with tracing enabled
    #[serde(default)]
    pub enabled: bool,

    /// Maximum hierarchy depth sampled
    #[serde(default = "TraceConfig::default_depth")]
    pub depth: usize,

    /// Output file
    #[serde(default = "TraceConfig::default_path")]
    pub path: PathBuf,
}

impl TraceConfig {
    fn default_depth() -> usize {
        defaults::TRACE_DEPTH
    }

    fn default_path() -> PathBuf {
        PathBuf::from(defaults::TRACE_PATH)
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            depth: Self::default_depth(),
            path: Self::default_path(),
        }
    }
}

/// Snapshot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotConfig {
    /// Default snapshot file
    #[serde(default = "SnapshotConfig::default_path")]
    pub path: PathBuf,
}

impl SnapshotConfig {
    fn default_path() -> PathBuf {
        PathBuf::from(defaults::SNAPSHOT_PATH)
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
        }
    }
}

/// An image downloaded over the bus at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootImage {
    /// File to download
    pub path: PathBuf,
    /// Destination index inside the core
    #[serde(default)]
    pub index: u8,
    /// Address of the first byte
    #[serde(default, alias = "base")]
    pub base_address: u32,
}
