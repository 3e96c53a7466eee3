//! Config command - manage configuration files

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use scanout_core::config::{sample_config, CaptureConfig, ConfigFile};

/// Arguments for the config command
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the path to the config file
    Path,

    /// Show the current configuration
    Show,

    /// Generate a default config file
    Init {
        /// Force overwrite if file exists
        #[arg(short, long)]
        force: bool,
    },

    /// Print a sample configuration to stdout
    Sample,
}

/// Run config subcommand
pub fn config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(ConfigFile::default_path);

    match args.command {
        ConfigCommand::Path => {
            println!("{}", path.display());
            if path.exists() {
                println!("(file exists)");
            } else {
                println!("(file does not exist)");
            }
        }
        ConfigCommand::Show => show(&path)?,
        ConfigCommand::Init { force } => init(&path, force)?,
        ConfigCommand::Sample => {
            print!("{}", sample_config());
        }
    }

    Ok(())
}

fn show(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("No configuration file found at: {}", path.display());
        println!();
        println!("Using default settings. Create a config file with:");
        println!("  scanout config init");
        return Ok(());
    }

    let file = ConfigFile::load_from(path.to_path_buf())?;
    let config = CaptureConfig::from_file(&file).context("Configuration is invalid")?;

    println!("Configuration file: {}\n", path.display());
    match &config.device {
        Some(device) => println!("  Device:        {}", device.display()),
        None => println!(
            "  Device:        scan {}0..{}",
            config.node_prefix, config.scan_limit
        ),
    }
    println!("  Output dir:    {}", config.output_dir.display());
    println!("  Suffix:        {}", config.suffix);
    println!("  On FB error:   {}", config.framebuffer_policy);
    println!("  Subsampling:   {}", config.subsampling);
    println!("  Encoding:      {:?}", config.encoding);

    Ok(())
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!();
        println!("Use --force to overwrite, or edit the existing file.");
        return Ok(());
    }

    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
    }

    std::fs::write(path, sample_config()).context("Failed to write config file")?;

    println!("Created configuration file: {}", path.display());
    println!();
    println!("Edit this file to customize scanout settings.");
    Ok(())
}
