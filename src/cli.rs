use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidi")]
#[command(author, version, about = "Video-on-demand media processing core")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the processor until interrupted
    Process,

    /// Segment a local MP4 into a directory of DASH segments
    Segment {
        /// Progressive MP4 to segment
        #[arg(required = true)]
        input: PathBuf,

        /// Output directory
        #[arg(required = true)]
        out_dir: PathBuf,

        /// Target segment duration in seconds (at least 1)
        #[arg(long, default_value = "3")]
        segment_duration: u64,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
