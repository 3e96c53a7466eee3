//! CLI command implementations

mod capture;
mod config;
mod planes;

pub use capture::{capture, CaptureArgs};
pub use config::{config, ConfigArgs};
pub use planes::{planes, PlanesArgs};

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use scanout_core::config::{CaptureConfig, ConfigFile};

/// Load the config file
///
/// An explicit path must exist; the default location falls back to
/// defaults when no file is there.
fn load_config(path: Option<&Path>) -> Result<CaptureConfig> {
    let file = match path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            ConfigFile::load_from(path.to_path_buf())
                .with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => ConfigFile::load_or_default(),
    };
    Ok(CaptureConfig::from_file(&file)?)
}

/// Apply device selection flags shared by every command that opens a device
fn apply_device_args(
    mut config: CaptureConfig,
    device: Option<PathBuf>,
    scan_limit: Option<u32>,
) -> CaptureConfig {
    if let Some(device) = device {
        config = config.with_device(device);
    }
    if let Some(limit) = scan_limit {
        config = config.with_scan_limit(limit);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanout_core::config::FramebufferPolicy;

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[capture]\non_framebuffer_error = \"abort\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.framebuffer_policy, FramebufferPolicy::Abort);
    }

    #[test]
    fn test_device_flags_override() {
        let config = apply_device_args(CaptureConfig::default(), Some("/dev/dri/card3".into()), Some(2));
        assert_eq!(config.device.as_deref(), Some(Path::new("/dev/dri/card3")));
        assert_eq!(config.scan_limit, 2);
    }
}
