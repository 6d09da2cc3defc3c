use clap::Parser;
use std::path::PathBuf;

// Build version with decoder info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Decoder: image 0.25 (exr, png, jpeg, tiff, tga, hdr)\n",
    "Target:  ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Windowed prefetch cache inspector for image sequences
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Image files, directories or glob patterns making up the sequence
    #[arg(value_name = "INPUTS", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Frame index to request (can be specified multiple times, default: 0)
    #[arg(short = 'f', long = "frame", value_name = "FRAME")]
    pub frames: Vec<usize>,

    /// Prefetch radius in frames (overrides config)
    #[arg(long = "prefetch", value_name = "N")]
    pub prefetch: Option<usize>,

    /// Safe radius in frames (overrides config, must not exceed prefetch)
    #[arg(long = "safe", value_name = "N")]
    pub safe: Option<usize>,

    /// Worker threads (overrides config, default: 75% of CPU cores)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Fraction of available memory the image store may use (0.0-1.0)
    #[arg(long = "mem", value_name = "FRACTION")]
    pub mem_fraction: Option<f64>,

    /// Load cache settings from this JSON file instead of the config directory
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Seconds to wait for each background load
    #[arg(long = "timeout", value_name = "SECS", default_value = "60")]
    pub timeout_secs: u64,

    /// Enable debug logging to file (default: seqcache.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
