use clap::Parser;
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Timeline prefetch simulator
///
/// Builds a timeline of stacked elements, renders it with a deliberately slow
/// simulated compositor and lets the prefetcher fill the frame cache ahead of
/// the playhead.
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Timeline length in frames
    #[arg(short = 'n', long = "frames", value_name = "N", default_value_t = 120)]
    pub frames: u32,

    /// Number of stacked elements
    #[arg(short = 'e', long = "elements", value_name = "N", default_value_t = 3)]
    pub elements: u32,

    /// Simulated render cost per frame (milliseconds)
    #[arg(short = 'r', long = "render-ms", value_name = "MS", default_value_t = 20)]
    pub render_ms: u64,

    /// Playback rate
    #[arg(long = "fps", value_name = "FPS", default_value_t = 24.0)]
    pub fps: f32,

    /// Frame cache capacity (entries), overrides the config file
    #[arg(long = "capacity", value_name = "N")]
    pub capacity: Option<usize>,

    /// Start playback after this many seconds of idle prefetching
    #[arg(short = 'p', long = "play", value_name = "SECONDS")]
    pub play: Option<f32>,

    /// Wrap playback around the timeline end this many times
    #[arg(long = "loop", value_name = "N", requires = "play")]
    pub loops: Option<u32>,

    /// Enable debug logging to file (default: framefetch.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
