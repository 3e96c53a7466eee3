//! Error types for scanout

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using ScanoutError
pub type Result<T> = std::result::Result<T, ScanoutError>;

/// Main error type for scanout operations
///
/// Each message already carries the underlying OS error text, so no
/// variant reports a separate `source()`.
#[derive(Debug, Error)]
pub enum ScanoutError {
    /// A device node could not be opened
    #[error("Device unavailable: {path}: {error}")]
    DeviceUnavailable {
        path: PathBuf,
        error: io::Error,
    },

    /// No node in the scanned range supports dumb buffers
    #[error(
        "No capable KMS device found after scanning {scanned} node(s){}",
        last_error_suffix(.last_error)
    )]
    NoCapableDeviceFound {
        scanned: u32,
        last_error: Option<io::Error>,
    },

    /// The kernel declined a client capability request
    #[error("Capability rejected: {capability}: {error}")]
    CapabilityRejected {
        capability: &'static str,
        error: io::Error,
    },

    /// The plane resource list could not be retrieved
    #[error("Unable to get plane resources: {0}")]
    ResourceQueryFailed(io::Error),

    /// The extended framebuffer descriptor could not be retrieved
    #[error("Failed to get framebuffer {fb_id}: {error}")]
    FramebufferLookupFailed {
        fb_id: u32,
        error: io::Error,
    },

    /// A kernel buffer handle could not be exported to a descriptor
    #[error("Failed to export buffer handle {handle} (slot {slot}): {error}")]
    BufferExportFailed {
        handle: u32,
        slot: usize,
        error: io::Error,
    },

    /// The framebuffer lookup succeeded but withheld every buffer handle
    ///
    /// The kernel does this for callers that are neither DRM master nor
    /// CAP_SYS_ADMIN.
    #[error("Framebuffer {fb_id} has no buffer handles")]
    NoBufferHandles { fb_id: u32 },

    /// An exported buffer could not be mapped
    #[error("Unable to map {len} bytes of slot {slot}: {error}")]
    MappingFailed {
        slot: usize,
        len: usize,
        error: io::Error,
    },

    /// The output artifact could not be opened or written
    #[error("Output unavailable: {path}: {error}")]
    OutputSinkUnavailable {
        path: PathBuf,
        error: io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// Generic error with context
    #[error("{context}: {inner}")]
    WithContext {
        context: String,
        inner: Box<ScanoutError>,
    },
}

impl ScanoutError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            inner: Box::new(self),
        }
    }

    /// Strip any context layers and return the underlying error
    pub fn root(&self) -> &ScanoutError {
        match self {
            Self::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Whether this error ends the whole run
    ///
    /// Framebuffer lookups are only fatal when the pipeline is configured
    /// to abort on them; that decision is made by the pipeline, so here
    /// they count as plane-local.
    pub fn is_run_fatal(&self) -> bool {
        match self.root() {
            Self::DeviceUnavailable { .. }
            | Self::NoCapableDeviceFound { .. }
            | Self::CapabilityRejected { .. }
            | Self::ResourceQueryFailed(_)
            | Self::Config(_) => true,
            Self::FramebufferLookupFailed { .. }
            | Self::NoBufferHandles { .. }
            | Self::BufferExportFailed { .. }
            | Self::MappingFailed { .. }
            | Self::OutputSinkUnavailable { .. }
            | Self::Io(_) => false,
            Self::WithContext { .. } => unreachable!("root() never returns a context layer"),
        }
    }

    /// The OS error behind this failure, if any
    pub fn os_error(&self) -> Option<&io::Error> {
        match self.root() {
            Self::DeviceUnavailable { error, .. }
            | Self::CapabilityRejected { error, .. }
            | Self::FramebufferLookupFailed { error, .. }
            | Self::BufferExportFailed { error, .. }
            | Self::MappingFailed { error, .. }
            | Self::OutputSinkUnavailable { error, .. } => Some(error),
            Self::ResourceQueryFailed(error) | Self::Io(error) => Some(error),
            Self::NoCapableDeviceFound { last_error, .. } => last_error.as_ref(),
            _ => None,
        }
    }

    /// A short hint telling the user what to try next
    pub fn user_hint(&self) -> Option<&'static str> {
        let permission_denied = self
            .os_error()
            .is_some_and(|e| e.kind() == io::ErrorKind::PermissionDenied);

        match self.root() {
            Self::DeviceUnavailable { .. } | Self::NoCapableDeviceFound { .. }
                if permission_denied =>
            {
                Some("Run as root or add your user to the 'video' group")
            }
            Self::NoCapableDeviceFound { .. } => {
                Some("Check that a KMS driver is loaded, or pass --device explicitly")
            }
            Self::CapabilityRejected { .. } => {
                Some("The kernel driver lacks atomic modesetting; a newer kernel may be required")
            }
            Self::FramebufferLookupFailed { .. } if permission_denied => {
                Some("Reading framebuffer handles requires CAP_SYS_ADMIN")
            }
            Self::NoBufferHandles { .. } => {
                Some("Reading framebuffer handles requires root or CAP_SYS_ADMIN")
            }
            Self::FramebufferLookupFailed { .. } => {
                Some("The display changed during capture; run 'scanout planes' and retry")
            }
            Self::BufferExportFailed { .. } => {
                Some("The driver may not support PRIME export for this buffer")
            }
            Self::MappingFailed { .. } => {
                Some("Tiled or protected buffers cannot always be mapped by the CPU")
            }
            Self::OutputSinkUnavailable { .. } => {
                Some("Check that the output directory exists and is writable")
            }
            Self::Config(_) => Some("Check ~/.config/scanout/config.toml for syntax errors"),
            _ => None,
        }
    }
}

fn last_error_suffix(last_error: &Option<io::Error>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last error: {e})"))
        .unwrap_or_default()
}

impl From<io::Error> for ScanoutError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}
