use clap::{Parser, Subcommand};
use ezmp3_core::Backend;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ezmp3")]
#[command(author, version, about = "Download a video's audio track as MP3")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Video URL to process (shorthand for `extract <URL>`)
    #[arg(value_name = "URL")]
    pub url: Option<String>,

    /// Directory to save audio.mp3 into
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep the job directory (for debugging)
    #[arg(long)]
    pub keep_temp: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a single video's audio and convert it to MP3
    Extract {
        /// Video URL
        url: String,

        #[command(flatten)]
        options: ExtractOptions,
    },

    /// Convert a local audio file to MP3
    Convert {
        /// Input audio file
        input: PathBuf,

        /// Output file (defaults to the input with an .mp3 extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Backends to try, in order (container-demux, segment-transcode, external-encoder)
        #[arg(short, long, value_parser = parse_backend, value_delimiter = ',')]
        backend: Vec<Backend>,
    },

    /// Check external tools and backends
    Doctor,

    /// Show configuration
    Config,
}

#[derive(clap::Args, Clone)]
pub struct ExtractOptions {
    /// Directory to save audio.mp3 into
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep the job directory (for debugging)
    #[arg(long)]
    pub keep_temp: bool,
}

fn parse_backend(s: &str) -> Result<Backend, String> {
    Backend::from_str(s).ok_or_else(|| format!("unknown backend: {}", s))
}
