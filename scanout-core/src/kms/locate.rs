//! Display device discovery

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{DriverCapability, DrmDevice, KmsDevice};
use crate::error::{Result, ScanoutError};

/// Prefix of the numbered primary nodes
pub const DEFAULT_NODE_PREFIX: &str = "/dev/dri/card";

/// How many numbered nodes to try before giving up
pub const DEFAULT_SCAN_LIMIT: u32 = 16;

/// Path of the node with the given index
pub fn node_path(prefix: &str, index: u32) -> PathBuf {
    PathBuf::from(format!("{prefix}{index}"))
}

/// Find the first `<prefix><N>` node that supports dumb buffers
///
/// Nodes that fail to open or lack dumb buffer support are closed and
/// skipped. Only the returned device stays open.
pub fn locate(prefix: &str, limit: u32) -> Result<DrmDevice> {
    let device = locate_with(limit, |index| DrmDevice::open_node(&node_path(prefix, index)))?;
    info!("Using KMS device {}", device.path().display());
    Ok(device)
}

/// Open one explicit node, requiring dumb buffer support
pub fn open_capable(path: impl AsRef<Path>) -> Result<DrmDevice> {
    let device = DrmDevice::open(path)?;
    match has_dumb_buffers(&device) {
        Ok(true) => Ok(device),
        Ok(false) => Err(ScanoutError::NoCapableDeviceFound {
            scanned: 1,
            last_error: None,
        }),
        Err(e) => Err(ScanoutError::NoCapableDeviceFound {
            scanned: 1,
            last_error: Some(e),
        }),
    }
}

/// Scan indices `0..limit`, opening each with `open`
///
/// Returns the first device whose dumb buffer query reports support.
pub fn locate_with<D, F>(limit: u32, mut open: F) -> Result<D>
where
    D: KmsDevice,
    F: FnMut(u32) -> io::Result<D>,
{
    let mut last_error = None;

    for index in 0..limit {
        let device = match open(index) {
            Ok(device) => device,
            Err(e) => {
                debug!(index, "Skipping node: {}", e);
                last_error = Some(e);
                continue;
            }
        };

        match has_dumb_buffers(&device) {
            Ok(true) => {
                debug!(index, "Node supports dumb buffers");
                return Ok(device);
            }
            Ok(false) => debug!(index, "Node has no dumb buffer support"),
            Err(e) => {
                debug!(index, "Capability query failed: {}", e);
                last_error = Some(e);
            }
        }
    }

    Err(ScanoutError::NoCapableDeviceFound {
        scanned: limit,
        last_error,
    })
}

fn has_dumb_buffers<D: KmsDevice>(device: &D) -> io::Result<bool> {
    device
        .driver_capability(DriverCapability::DumbBuffer)
        .map(|value| value != 0)
}
