// SPDX-License-Identifier: GPL-3.0-only

use clap::{Args, Parser, Subcommand};
use depth_roi::backends::{self, describe_options};
use depth_roi::config::Config;
use depth_roi::constants::APP_NAME;
use depth_roi::depth::Roi;
use depth_roi::session::{self, RunLimits};
use depth_roi::{HeadlessSurface, TerminalSurface};
use std::path::PathBuf;
use tracing::{debug, info, warn};

mod cli;

#[derive(Parser)]
#[command(name = "depth-roi")]
#[command(about = "Live depth camera viewer with region-of-interest object detection")]
#[command(version = env!("GIT_VERSION"))]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the viewer (default)
    Run(RunArgs),

    /// List V4L2 video nodes and whether they stream 16-bit depth
    List,

    /// Print every sensor option with its current value
    Options(SourceArgs),
}

/// Where frames come from
#[derive(Args, Debug, Clone, Default)]
struct SourceArgs {
    /// V4L2 device path (default: first node offering Z16 depth)
    #[arg(short, long, conflicts_with = "replay")]
    device: Option<String>,

    /// Replay recorded frames from a directory instead of a device
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Config file (default: ~/.config/depth-roi/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
struct RunArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Log candidates instead of drawing to the terminal
    #[arg(long)]
    headless: bool,

    /// Region of interest as x,y,width,height (skips interactive selection)
    #[arg(long)]
    roi: Option<Roi>,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Do not write the debug snapshot
    #[arg(long)]
    no_snapshot: bool,
}

impl SourceArgs {
    /// Load the config file and apply source overrides
    fn load_config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut config = Config::load(self.config.as_deref())?;
        if let Some(device) = &self.device {
            config.source.device = Some(device.clone());
            config.source.replay_dir = None;
        }
        if let Some(dir) = &self.replay {
            config.source.replay_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => run(args),
        Some(Commands::List) => {
            init_logging(false);
            cli::list_devices()
        }
        Some(Commands::Options(args)) => {
            init_logging(false);
            let config = args.load_config()?;
            let source = backends::open_source(&config.source)?;
            cli::print_options(source.as_ref());
            Ok(())
        }
        None => run(cli.run),
    }
}

/// Initialize logging
///
/// Set RUST_LOG to control the level (e.g. `RUST_LOG=depth_roi=debug`). The
/// terminal viewer owns the screen, so its log goes to a file in the cache
/// directory.
fn init_logging(to_file: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let log_file = to_file
        .then(|| dirs::cache_dir().map(|dir| dir.join(APP_NAME)))
        .flatten()
        .and_then(|dir| {
            std::fs::create_dir_all(&dir).ok()?;
            std::fs::File::create(dir.join(format!("{}.log", APP_NAME))).ok()
        });

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .init(),
        // No cache dir: drop log output rather than draw over the viewer
        None if to_file => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::sink)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_level(true)
            .init(),
    }
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(!args.headless);

    let mut config = args.source.load_config()?;
    if args.roi.is_some() {
        config.roi = args.roi;
    }
    if args.no_snapshot {
        config.snapshot.enabled = false;
    }
    config.validate()?;

    let mut source = backends::open_source(&config.source)?;
    info!(source = %source.descriptor(), "Depth source opened");

    for report in describe_options(source.as_ref()) {
        debug!(
            option = %report.option,
            supported = report.supported,
            value = ?report.value,
            "Sensor option"
        );
    }
    backends::configure_sensor(source.as_mut(), &config.source);

    let limits = RunLimits {
        max_frames: args.max_frames,
    };

    let summary = if args.headless {
        if config.roi.is_none() {
            warn!("No region given, headless run will not detect candidates");
        }
        let mut surface = HeadlessSurface::with_interrupt_handler()?;
        session::run(source.as_mut(), &mut surface, &config, limits)?
    } else {
        let mut surface = TerminalSurface::new()?;
        session::run(source.as_mut(), &mut surface, &config, limits)?
    };

    cli::print_summary(&summary);
    Ok(())
}
