//! Planes command - show what each plane is scanning out

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use scanout_core::pipeline::CaptureSession;

use super::{apply_device_args, load_config};

/// Arguments for the planes command
#[derive(Args)]
pub struct PlanesArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Open this device node instead of scanning /dev/dri/card*
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Number of numbered device nodes to try
    #[arg(long)]
    pub scan_limit: Option<u32>,
}

/// List planes with their bindings and framebuffers
pub fn planes(args: PlanesArgs, config_path: Option<&Path>) -> Result<()> {
    let config = apply_device_args(load_config(config_path)?, args.device, args.scan_limit);

    let session = CaptureSession::open(&config).context("Failed to open display device")?;
    let planes = session.describe().context("Failed to list planes")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&planes)?);
        return Ok(());
    }

    println!(
        "{:<6} {:<8} {:<8} {:<8} {:<14} {:<12} {}",
        "Index", "Plane", "FB", "CRTC", "Format", "Size", "Slots"
    );
    println!("{}", "-".repeat(70));

    for info in &planes {
        let plane = &info.plane;
        let (format, size, slots) = match (&info.framebuffer, &info.error) {
            (Some(fb), _) => (
                fb.format_label(),
                format!("{}x{}", fb.width, fb.height),
                fb.populated_slots().count().to_string(),
            ),
            (None, Some(_)) => ("unreadable".to_string(), "-".to_string(), "-".to_string()),
            (None, None) => ("-".to_string(), "-".to_string(), "-".to_string()),
        };

        println!(
            "{:<6} {:<8} {:<8} {:<8} {:<14} {:<12} {}",
            plane.index, plane.id, plane.fb_id, plane.crtc_id, format, size, slots
        );
    }

    for (index, error) in planes
        .iter()
        .filter_map(|i| i.error.as_ref().map(|e| (i.plane.index, e)))
    {
        eprintln!("plane {}: {}", index, error);
    }

    let active = planes.iter().filter(|i| i.active).count();
    println!("\n{} plane(s), {} active", planes.len(), active);

    Ok(())
}
