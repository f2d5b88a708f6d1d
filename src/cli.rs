use clap::{Parser, Subcommand};
use framedex_common::SeekPolicy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "framedex")]
#[command(author, version, about = "Frame-accurate random access over media streams")]
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
    /// Index a stream script and display what was learned
    Probe {
        /// JSON stream script
        #[arg(required = true)]
        script: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Decode one video frame
    ReadVideo {
        /// JSON stream script
        #[arg(required = true)]
        script: PathBuf,

        /// Frame number (0-origin, presentation order)
        #[arg(short, long)]
        frame: u32,

        /// Most tolerant seek policy (normal, unsafe, aggressive)
        #[arg(short, long)]
        policy: Option<SeekPolicy>,

        /// Write the converted frame to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a range of PCM samples
    ReadAudio {
        /// JSON stream script
        #[arg(required = true)]
        script: PathBuf,

        /// First sample (0-origin)
        #[arg(short, long)]
        start: u64,

        /// Number of samples
        #[arg(short = 'n', long)]
        count: u32,

        /// Write the PCM bytes to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
