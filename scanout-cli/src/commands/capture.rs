//! Capture command - dump every active plane to disk

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use scanout_core::config::{FramebufferPolicy, OutputEncoding, Subsampling};
use scanout_core::pipeline::{CaptureReport, CaptureSession, PlaneStatus};
use tracing::info;

use super::{apply_device_args, load_config};

/// Arguments for a capture run
#[derive(Args)]
pub struct CaptureArgs {
    /// Base name of the output files (<NAME>-<plane>.<suffix>)
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Open this device node instead of scanning /dev/dri/card*
    #[arg(short, long)]
    pub device: Option<PathBuf>,

    /// Number of numbered device nodes to try
    #[arg(long)]
    pub scan_limit: Option<u32>,

    /// Directory the plane files are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Suffix of raw plane files
    #[arg(long)]
    pub suffix: Option<String>,

    /// What to do when a plane's framebuffer cannot be read (skip, abort)
    #[arg(long, value_name = "POLICY")]
    pub on_framebuffer_error: Option<FramebufferPolicy>,

    /// How chroma sub-plane sizes are derived (halve, format)
    #[arg(long)]
    pub subsampling: Option<Subsampling>,

    /// Write RGB565/XRGB8888 planes as packed 24-bit RGB
    #[arg(long)]
    pub rgb: bool,
}

/// Capture every active plane
pub fn capture(args: CaptureArgs, config_path: Option<&Path>) -> Result<()> {
    let Some(name) = args.name else {
        bail!("Missing capture name (usage: scanout <NAME>)");
    };

    let mut config = apply_device_args(load_config(config_path)?, args.device, args.scan_limit);
    if let Some(dir) = args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(suffix) = args.suffix {
        config = config.with_suffix(suffix);
    }
    if let Some(policy) = args.on_framebuffer_error {
        config = config.with_framebuffer_policy(policy);
    }
    if let Some(subsampling) = args.subsampling {
        config = config.with_subsampling(subsampling);
    }
    if args.rgb {
        config = config.with_encoding(OutputEncoding::Rgb24);
    }

    let session = CaptureSession::open(&config).context("Failed to open display device")?;
    info!("Capabilities: {:?}", session.capabilities());

    let report = session
        .capture(&name, &config)
        .context("Capture aborted")?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &CaptureReport) {
    for plane in &report.planes {
        let status = plane.status();
        if status == PlaneStatus::Inactive {
            continue;
        }

        let format = plane
            .framebuffer
            .as_ref()
            .map(|fb| format!("{} {}x{}", fb.format_label(), fb.width, fb.height))
            .unwrap_or_else(|| "no framebuffer".to_string());
        let bytes: u64 = plane.artifacts.iter().map(|a| a.len).sum();

        match plane.artifacts.first() {
            Some(artifact) => println!(
                "plane {:<3} {:<22} {} ({} bytes, {} slot(s))",
                plane.plane.index,
                format,
                artifact.path.display(),
                bytes,
                plane.artifacts.len()
            ),
            None => println!("plane {:<3} {:<22} failed", plane.plane.index, format),
        }
    }

    for (plane, err) in report.diagnostics() {
        eprintln!("plane {}: {}", plane.index, err);
        if let Some(hint) = err.user_hint() {
            eprintln!("  hint: {}", hint);
        }
    }

    let files = report.files().len();
    if report.active_planes() == 0 {
        println!("No active planes.");
    } else if report.is_complete() {
        println!("Captured {} plane(s) into {} file(s).", report.active_planes(), files);
    } else {
        println!(
            "Captured {} file(s); {} diagnostic(s) reported.",
            files,
            report.diagnostics().count()
        );
    }
}
