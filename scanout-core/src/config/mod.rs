//! Configuration types for scanout
//!
//! Provides the runtime capture configuration and the policies that
//! govern partial failures and sub-plane sizing.

mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, ScanoutError};
use crate::kms::{DEFAULT_NODE_PREFIX, DEFAULT_SCAN_LIMIT};

/// Default artifact suffix for raw dumps
pub const RAW_SUFFIX: &str = "raw";

/// Artifact suffix for 24-bit RGB output
pub const RGB_SUFFIX: &str = "rgb";

/// What to do when an active plane's framebuffer cannot be looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FramebufferPolicy {
    /// Stop the run with an error
    Abort,
    /// Report the plane and move on to the next one
    #[default]
    Skip,
}

impl std::fmt::Display for FramebufferPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

impl std::str::FromStr for FramebufferPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" | "fatal" => Ok(Self::Abort),
            "skip" | "continue" => Ok(Self::Skip),
            _ => Err(format!("Unknown framebuffer policy: {}", s)),
        }
    }
}

/// How chroma sub-plane sizes are derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Subsampling {
    /// Every slot after the first is half of `pitch * height`
    #[default]
    Halve,
    /// Row count from the pixel format, halving unknown formats
    Format,
}

impl std::fmt::Display for Subsampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Halve => write!(f, "halve"),
            Self::Format => write!(f, "format"),
        }
    }
}

impl std::str::FromStr for Subsampling {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "halve" | "half" => Ok(Self::Halve),
            "format" => Ok(Self::Format),
            _ => Err(format!("Unknown subsampling policy: {}", s)),
        }
    }
}

/// Byte encoding of written artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputEncoding {
    /// Mapped bytes, verbatim
    #[default]
    Raw,
    /// Tightly packed 24-bit RGB triples
    Rgb24,
}

impl OutputEncoding {
    /// File suffix for this encoding
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Raw => RAW_SUFFIX,
            Self::Rgb24 => RGB_SUFFIX,
        }
    }
}

/// Runtime configuration for one capture run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Explicit device node; skips the scan when set
    pub device: Option<PathBuf>,
    /// Prefix of numbered device nodes to scan
    pub node_prefix: String,
    /// Number of numbered nodes to try
    pub scan_limit: u32,
    /// Directory artifacts are written to
    pub output_dir: PathBuf,
    /// Suffix of raw artifacts
    pub suffix: String,
    /// Framebuffer lookup failure policy
    pub framebuffer_policy: FramebufferPolicy,
    /// Sub-plane sizing policy
    pub subsampling: Subsampling,
    /// Requested artifact encoding
    pub encoding: OutputEncoding,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            node_prefix: DEFAULT_NODE_PREFIX.to_string(),
            scan_limit: DEFAULT_SCAN_LIMIT,
            output_dir: PathBuf::from("."),
            suffix: RAW_SUFFIX.to_string(),
            framebuffer_policy: FramebufferPolicy::default(),
            subsampling: Subsampling::default(),
            encoding: OutputEncoding::default(),
        }
    }
}

impl CaptureConfig {
    /// Build a configuration from a loaded config file
    pub fn from_file(file: &ConfigFile) -> Result<Self> {
        let framebuffer_policy = file
            .capture
            .on_framebuffer_error
            .parse()
            .map_err(ScanoutError::config)?;
        let subsampling = file
            .capture
            .subsampling
            .parse()
            .map_err(ScanoutError::config)?;

        Ok(Self {
            device: file.device.path.clone(),
            node_prefix: file.device.node_prefix.clone(),
            scan_limit: file.device.scan_limit,
            output_dir: file.output.directory.clone(),
            suffix: file.output.suffix.clone(),
            framebuffer_policy,
            subsampling,
            encoding: if file.output.rgb24 {
                OutputEncoding::Rgb24
            } else {
                OutputEncoding::Raw
            },
        })
    }

    /// Use an explicit device node
    pub fn with_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.device = Some(path.into());
        self
    }

    /// Set the scan bound
    pub fn with_scan_limit(mut self, limit: u32) -> Self {
        self.scan_limit = limit;
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the raw artifact suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the framebuffer failure policy
    pub fn with_framebuffer_policy(mut self, policy: FramebufferPolicy) -> Self {
        self.framebuffer_policy = policy;
        self
    }

    /// Set the sub-plane sizing policy
    pub fn with_subsampling(mut self, subsampling: Subsampling) -> Self {
        self.subsampling = subsampling;
        self
    }

    /// Set the artifact encoding
    pub fn with_encoding(mut self, encoding: OutputEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Suffix for artifacts of the given encoding
    pub fn suffix_for(&self, encoding: OutputEncoding) -> &str {
        match encoding {
            OutputEncoding::Raw => &self.suffix,
            OutputEncoding::Rgb24 => RGB_SUFFIX,
        }
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.device.is_none() && self.scan_limit == 0 {
            return Err(ScanoutError::config(
                "scan_limit must be at least 1 when no device is given",
            ));
        }
        if self.device.is_none() && self.node_prefix.is_empty() {
            return Err(ScanoutError::config("node_prefix must not be empty"));
        }
        if self.suffix.is_empty() {
            return Err(ScanoutError::config("suffix must not be empty"));
        }
        Ok(())
    }

    /// Check a base name for artifact files
    pub fn validate_base(base: &str) -> Result<()> {
        if base.is_empty() {
            return Err(ScanoutError::config("base name must not be empty"));
        }
        if base.contains('/') {
            return Err(ScanoutError::config(
                "base name must not contain '/'; use --output-dir instead",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.node_prefix, "/dev/dri/card");
        assert_eq!(config.scan_limit, 16);
        assert_eq!(config.suffix, "raw");
        assert_eq!(config.framebuffer_policy, FramebufferPolicy::Skip);
        assert_eq!(config.subsampling, Subsampling::Halve);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("abort".parse::<FramebufferPolicy>(), Ok(FramebufferPolicy::Abort));
        assert_eq!("SKIP".parse::<FramebufferPolicy>(), Ok(FramebufferPolicy::Skip));
        assert!("maybe".parse::<FramebufferPolicy>().is_err());
        assert_eq!("format".parse::<Subsampling>(), Ok(Subsampling::Format));
    }

    #[test]
    fn test_zero_scan_limit_rejected() {
        let config = CaptureConfig::default().with_scan_limit(0);
        assert!(config.validate().is_err());
        assert!(config.with_device("/dev/dri/card1").validate().is_ok());
    }

    #[test]
    fn test_suffix_for_encoding() {
        let config = CaptureConfig::default().with_suffix("bin");
        assert_eq!(config.suffix_for(OutputEncoding::Raw), "bin");
        assert_eq!(config.suffix_for(OutputEncoding::Rgb24), "rgb");
    }
}
