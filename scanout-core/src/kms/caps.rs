//! Client capability negotiation

use tracing::debug;

use super::{ClientCapability, KmsDevice};
use crate::error::{Result, ScanoutError};

/// Client capabilities enabled on a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilitySet {
    /// Atomic modesetting awareness
    pub atomic: bool,
    /// Universal plane listing
    pub universal_planes: bool,
}

impl CapabilitySet {
    /// Whether plane enumeration will see every plane
    pub fn supports_plane_listing(&self) -> bool {
        self.atomic && self.universal_planes
    }
}

/// Enable atomic awareness, then universal planes
///
/// Either rejection is fatal: without both, the plane list omits primary
/// and cursor planes.
pub fn negotiate<D: KmsDevice>(device: &D) -> Result<CapabilitySet> {
    let mut caps = CapabilitySet::default();

    for cap in [ClientCapability::Atomic, ClientCapability::UniversalPlanes] {
        device.set_client_capability(cap, true).map_err(|error| {
            debug!("Unable to set {} capability: {}", cap, error);
            ScanoutError::CapabilityRejected {
                capability: cap.name(),
                error,
            }
        })?;
        debug!("Enabled {} client capability", cap);

        match cap {
            ClientCapability::Atomic => caps.atomic = true,
            ClientCapability::UniversalPlanes => caps.universal_planes = true,
        }
    }

    Ok(caps)
}
