//! Lapse CLI — Command-line interface for timelapse exposure ramping.
//!
//! Usage:
//!   lapse init <DIR>         Create a catalog from the images in DIR
//!   lapse info <DIR>         Show the frame table
//!   lapse reset <DIR>        Forget brightness and keyframes
//!   lapse initialize <DIR>   Sample brightness and detect keyframes
//!   lapse equalize <DIR>     Detect keyframes and ramp exposure
//!   lapse curves <DIR>       Print diagram curves as JSON

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lapse_ramp_engine::ViewCommand;

mod capture;
mod commands;
mod preview;

#[derive(Parser)]
#[command(
    name = "lapse",
    about = "Keyframe detection and exposure ramping for timelapse sequences",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a catalog from the images in a directory
    Init {
        /// Directory holding the frames
        path: PathBuf,

        /// Catalog name (defaults to the directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Overwrite an existing catalog
        #[arg(long)]
        force: bool,
    },

    /// Show the frame table of a catalog
    Info {
        /// Path to the catalog directory
        path: PathBuf,
    },

    /// Clear brightness and keyframe flags of the selection
    Reset {
        /// Path to the catalog directory
        path: PathBuf,
    },

    /// Sample brightness and flag keyframes
    Initialize(PassArgs),

    /// Flag keyframes and ramp exposure corrections between them
    Equalize(PassArgs),

    /// Print normalized diagram curves as JSON
    Curves {
        /// Path to the catalog directory
        path: PathBuf,
    },
}

#[derive(Args)]
struct PassArgs {
    /// Path to the catalog directory
    path: PathBuf,

    /// Preview width used for brightness sampling
    #[arg(long)]
    preview_width: Option<u32>,

    /// Preview height used for brightness sampling
    #[arg(long)]
    preview_height: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = lapse_common::AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    lapse_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Init { path, name, force } => commands::init::run(path, name, force),
        Commands::Info { path } => commands::info::run(path),
        Commands::Reset { path } => commands::pass::run(path, ViewCommand::Reset, config),
        Commands::Initialize(args) => {
            let config = with_preview_size(config, &args);
            commands::pass::run(args.path, ViewCommand::Initialize, config)
        }
        Commands::Equalize(args) => {
            let config = with_preview_size(config, &args);
            commands::pass::run(args.path, ViewCommand::Equalize, config)
        }
        Commands::Curves { path } => commands::curves::run(path),
    }
}

fn with_preview_size(mut config: lapse_common::AppConfig, args: &PassArgs) -> lapse_common::AppConfig {
    if let Some(width) = args.preview_width {
        config.sampler.preview_width = width;
    }
    if let Some(height) = args.preview_height {
        config.sampler.preview_height = height;
    }
    config
}
