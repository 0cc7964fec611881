use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// List every entry in an image, optionally filtered by a substring.
    #[command(alias = "l")]
    List {
        /// The ISO image to read.
        #[arg(required = true)]
        image: PathBuf,

        /// Only show entries whose path contains this substring.
        pattern: Option<String>,
    },

    /// Print one entry's content to standard output.
    Cat {
        /// The ISO image to read.
        #[arg(required = true)]
        image: PathBuf,

        /// Entry path inside the image (e.g. etc/os-release).
        #[arg(required = true)]
        path: String,
    },

    /// Extract an image into a directory, with progress reporting.
    #[command(alias = "x")]
    Extract {
        /// The ISO image to extract.
        #[arg(required = true)]
        image: PathBuf,

        /// The directory to extract into (created if missing).
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Identify the Linux distribution an image carries.
    #[command(alias = "d")]
    Detect {
        /// The ISO image to inspect.
        #[arg(required = true)]
        image: PathBuf,
    },
}

/// Parse the process arguments.
pub fn run() -> Result<Commands, clap::Error> {
    Ok(Args::try_parse()?.command)
}
