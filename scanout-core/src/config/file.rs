//! Configuration file loading
//!
//! Loads user configuration from `~/.config/scanout/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{Result, ScanoutError};
use crate::kms::{DEFAULT_NODE_PREFIX, DEFAULT_SCAN_LIMIT};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Device discovery settings
    #[serde(default)]
    pub device: DeviceSettings,

    /// Capture behaviour
    #[serde(default)]
    pub capture: CaptureSettings,

    /// Output settings
    #[serde(default)]
    pub output: OutputSettings,
}

/// Device discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Explicit device node (skips scanning)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Prefix of numbered device nodes
    #[serde(default = "default_node_prefix")]
    pub node_prefix: String,

    /// How many numbered nodes to try
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
}

/// Capture behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Framebuffer lookup failure policy (skip, abort)
    #[serde(default = "default_framebuffer_policy")]
    pub on_framebuffer_error: String,

    /// Chroma sub-plane sizing (halve, format)
    #[serde(default = "default_subsampling")]
    pub subsampling: String,
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory artifacts are written to
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// Suffix of raw artifacts
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Convert packed RGB planes to 24-bit RGB
    #[serde(default)]
    pub rgb24: bool,
}

// Default value functions
fn default_node_prefix() -> String {
    DEFAULT_NODE_PREFIX.to_string()
}

fn default_scan_limit() -> u32 {
    DEFAULT_SCAN_LIMIT
}

fn default_framebuffer_policy() -> String {
    "skip".to_string()
}

fn default_subsampling() -> String {
    "halve".to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_suffix() -> String {
    "raw".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            path: None,
            node_prefix: default_node_prefix(),
            scan_limit: default_scan_limit(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            on_framebuffer_error: default_framebuffer_policy(),
            subsampling: default_subsampling(),
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            suffix: default_suffix(),
            rgb24: false,
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("scanout").join("config.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("scanout")
                .join("config.toml")
        } else {
            PathBuf::from("/etc/scanout/config.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| ScanoutError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| ScanoutError::Config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ScanoutError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScanoutError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| ScanoutError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# scanout configuration

[device]
# Open this node instead of scanning (e.g. "/dev/dri/card1")
# path = "/dev/dri/card0"

# Numbered nodes scanned when no path is set
node_prefix = "/dev/dri/card"

# Give up after this many nodes
scan_limit = 16

[capture]
# When an active plane's framebuffer disappears mid-capture:
#   "skip"  - report it and keep capturing other planes (default)
#   "abort" - stop the run with an error
on_framebuffer_error = "skip"

# Size of chroma sub-planes:
#   "halve"  - half of pitch * height for every slot after the first
#   "format" - derive from the pixel format, halving unknown formats
subsampling = "halve"

[output]
# Directory artifacts are written to
directory = "."

# Suffix of raw artifacts
suffix = "raw"

# Write RGB565/XRGB8888 planes as packed 24-bit RGB (.rgb)
rgb24 = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.device.node_prefix, "/dev/dri/card");
        assert_eq!(config.device.scan_limit, 16);
        assert_eq!(config.capture.on_framebuffer_error, "skip");
        assert_eq!(config.output.suffix, "raw");
    }

    #[test]
    fn test_sample_config_parses() {
        let sample = sample_config();
        let config: ConfigFile = toml::from_str(&sample).unwrap();
        assert_eq!(config.device.scan_limit, 16);
        assert!(config.device.path.is_none());
        assert!(!config.output.rgb24);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: ConfigFile = toml::from_str("[capture]\nsubsampling = \"format\"\n").unwrap();
        assert_eq!(config.capture.subsampling, "format");
        assert_eq!(config.capture.on_framebuffer_error, "skip");
        assert_eq!(config.device.scan_limit, 16);
    }
}
