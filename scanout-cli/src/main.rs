//! scanout CLI
//!
//! Dumps whatever the display hardware is scanning out, straight from the
//! kernel's KMS planes.
//!
//! # Usage
//!
//! ```bash
//! # Write every active plane to shot-<plane>.raw
//! scanout shot
//!
//! # Show planes and their framebuffers
//! scanout planes
//!
//! # Create a config file
//! scanout config init
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use scanout_core::ScanoutError;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// scanout - capture KMS scanout planes without a compositor
#[derive(Parser)]
#[command(name = "scanout")]
#[command(version)]
#[command(about = "Capture KMS scanout planes without a compositor", long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Read settings from this file instead of the default location
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    capture: commands::CaptureArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// List scanout planes and what they display
    #[command(alias = "ls")]
    Planes(commands::PlanesArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("scanout={}", level).parse()?)
                .add_directive(format!("scanout_core={}", level).parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Some(Commands::Planes(args)) => commands::planes(args, config_path),
        Some(Commands::Config(args)) => commands::config(args, config_path),
        None => commands::capture(cli.capture, config_path),
    };

    if let Err(e) = &result {
        if let Some(hint) = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<ScanoutError>())
            .and_then(ScanoutError::user_hint)
        {
            eprintln!("hint: {}", hint);
        }
    }

    result
}
