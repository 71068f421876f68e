//! Headless co-simulation driver.
//!
//! This binary runs the built-in reference core under the harness. It performs:
//! 1. **Configuration:** Loads a JSON harness configuration or uses the defaults.
//! 2. **Loading:** Queues boot images from the configuration and the command line.
//! 3. **Running:** Executes a number of steps or host frames, with optional tracing.
//! 4. **Output:** Saves snapshots, dumps the last frame as PPM and prints statistics.

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cosim_core::config::BootImage;
use cosim_core::cores::{PatternConfig, PatternCore};
use cosim_core::input::InputSource;
use cosim_core::sim::RunMode;
use cosim_core::video::{Frame, FrameMeta, Renderer};
use cosim_core::{HarnessConfig, Simulator};

#[derive(Parser, Debug)]
#[command(
    name = "cosim",
    author,
    version,
    about = "Cycle-driven co-simulation harness",
    long_about = "Run the built-in pattern core under the co-simulation harness.\n\nExamples:\n  cosim run --frames 4 --dump-frame out.ppm\n  cosim run --config bench.json --boot image.bin:0:0x0 --steps 200000 --trace sim.vcd"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the reference core headlessly.
    Run(RunArgs),

    /// Parse and validate a configuration file.
    Check {
        /// Configuration file (JSON).
        config: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Harness configuration (JSON); defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extra boot image as `path[:index[:base]]`; may be repeated.
    #[arg(short, long, value_parser = parse_boot)]
    boot: Vec<BootImage>,

    /// Number of simulation steps to execute.
    #[arg(long, conflicts_with = "frames")]
    steps: Option<u64>,

    /// Number of video frames to produce.
    #[arg(long, default_value_t = 1)]
    frames: u64,

    /// Host frames to run before giving up on `--frames` (a core may never sync).
    #[arg(long, default_value_t = 10_000)]
    max_host_frames: u64,

    /// Input bitmask held for the whole run.
    #[arg(long, default_value_t = 0)]
    inputs: u64,

    /// Write a VCD trace to this file.
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Hierarchy depth for the VCD trace.
    #[arg(long)]
    trace_depth: Option<usize>,

    /// Restore a snapshot before running; without a path, the configured slot.
    #[arg(long, num_args = 0..=1, value_name = "PATH")]
    restore: Option<Option<PathBuf>>,

    /// Save a snapshot after running; without a path, the configured slot.
    #[arg(long, num_args = 0..=1, value_name = "PATH")]
    save: Option<Option<PathBuf>>,

    /// Write the last published frame as a PPM image.
    #[arg(long)]
    dump_frame: Option<PathBuf>,

    /// Print run statistics.
    #[arg(long)]
    stats: bool,
}

/// Holds one input mask for every host frame.
struct FixedInputs(u64);

impl InputSource for FixedInputs {
    fn is_active(&self, index: usize) -> bool {
        index < 64 && self.0 >> index & 1 == 1
    }
}

/// Keeps the most recent published frame.
#[derive(Default)]
struct FrameCapture {
    frame: Option<Frame>,
    meta: Option<FrameMeta>,
}

impl Renderer for FrameCapture {
    fn upload(&mut self, frame: &Frame, meta: FrameMeta) {
        self.frame = Some(frame.clone());
        self.meta = Some(meta);
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Check { config } => cmd_check(&config),
    };
    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}

/// Parses `path[:index[:base]]`; `base` accepts a `0x` prefix.
fn parse_boot(arg: &str) -> Result<BootImage, String> {
    let mut parts = arg.splitn(3, ':');
    let path = parts.next().filter(|p| !p.is_empty()).ok_or("missing path")?;
    let index = parts
        .next()
        .map(|s| s.parse::<u8>().map_err(|e| format!("bad index '{s}': {e}")))
        .transpose()?
        .unwrap_or(0);
    let base_address = parts
        .next()
        .map(|s| {
            let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                Some(hex) => u32::from_str_radix(hex, 16),
                None => s.parse(),
            };
            parsed.map_err(|e| format!("bad base address '{s}': {e}"))
        })
        .transpose()?
        .unwrap_or(0);
    Ok(BootImage {
        path: PathBuf::from(path),
        index,
        base_address,
    })
}

fn cmd_check(path: &std::path::Path) -> Result<(), Box<dyn Error>> {
    let config = HarnessConfig::from_file(path)?;
    let (width, height) = config.video.output_size();
    println!(
        "{}: ok ({} clocks, {width}x{height} output, {} boot images)",
        path.display(),
        config.clocks.len(),
        config.boot.len()
    );
    Ok(())
}

/// Runs host frames until `frames` more video frames are published, the core
/// finishes, or `max_host_frames` host frames have gone by. Returns the host
/// frames used.
fn run_frames(
    sim: &mut Simulator<PatternCore>,
    input: &dyn InputSource,
    capture: &mut FrameCapture,
    frames: u64,
    max_host_frames: u64,
) -> u64 {
    sim.set_run_mode(RunMode::Running);
    let target = sim.context().video.frame_count().saturating_add(frames);
    let mut host_frames = 0;
    while sim.context().video.frame_count() < target {
        if host_frames == max_host_frames {
            warn!(
                host_frames,
                frames = sim.context().video.frame_count(),
                "frame target not reached"
            );
            break;
        }
        host_frames += 1;
        if sim.host_frame(input, capture).finished {
            break;
        }
    }
    host_frames
}

/// Builds the simulator, runs it and writes the requested outputs.
fn cmd_run(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(path) = &args.trace {
        config.trace.enabled = true;
        config.trace.path.clone_from(path);
    }
    if let Some(depth) = args.trace_depth {
        config.trace.depth = depth;
    }

    let clocks = config.clock_sequencer()?;
    let index_of = |name: &str| clocks.id(name).map_or(0, |id| id.0);
    let core = PatternCore::new(PatternConfig {
        width: config.video.width,
        height: config.video.height,
        word_bus: config.bus.width.bytes() == 2,
        bus_clock: index_of(&config.host_clock),
        pixel_clock: index_of(&config.pixel_clock),
        ..PatternConfig::default()
    });

    let mut sim = Simulator::new(core, &config)?;
    let report = sim.queue_boot_images(&args.boot);
    for failed in &report.failed {
        warn!("{failed}");
    }
    if let Some(path) = &args.restore {
        let restored = match path {
            Some(path) => sim.restore_snapshot(path),
            None => sim.quick_restore(),
        };
        match restored {
            Ok(counter) => info!(counter, "resumed from snapshot"),
            Err(e) => warn!("continuing from the current state: {e}"),
        }
    }

    let input = FixedInputs(args.inputs);
    let mut capture = FrameCapture::default();
    if let Some(steps) = args.steps {
        sim.context_mut().input.read(&input);
        let _ = sim.step_n(steps);
    } else {
        let _ = run_frames(
            &mut sim,
            &input,
            &mut capture,
            args.frames,
            args.max_host_frames,
        );
    }

    if let Some(path) = &args.save {
        let saved = match path {
            Some(path) => sim.save_snapshot(path),
            None => sim.quick_save(),
        };
        if let Err(e) = saved {
            warn!("snapshot not saved: {e}");
        }
    }
    if let Some(path) = &args.dump_frame {
        let frame = capture.frame.as_ref().unwrap_or_else(|| sim.last_frame());
        match File::create(path).and_then(|f| frame.write_ppm(&mut BufWriter::new(f))) {
            Ok(()) => info!(path = %path.display(), "frame written"),
            Err(e) => warn!(path = %path.display(), "frame not written: {e}"),
        }
    }
    if let Some(meta) = capture.meta {
        info!(frames = meta.frame_count, fps = meta.fps, "video");
    }

    sim.finalize();
    if args.stats {
        sim.stats().print();
    }
    Ok(())
}
