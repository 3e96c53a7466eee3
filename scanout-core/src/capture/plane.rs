//! Scanout plane enumeration

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::error::{Result, ScanoutError};
use crate::kms::KmsDevice;

/// A hardware scanout plane and what it is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Plane {
    /// Position in the kernel's plane list; used in artifact names
    pub index: usize,
    /// Kernel plane object id
    pub id: u32,
    /// Bound framebuffer (0 = none)
    pub fb_id: u32,
    /// Bound CRTC (0 = none)
    pub crtc_id: u32,
}

impl Plane {
    /// A plane is active when it scans out a framebuffer to a CRTC
    pub fn is_active(&self) -> bool {
        self.fb_id != 0 && self.crtc_id != 0
    }
}

/// List every plane with its current binding, in kernel order
///
/// Inactive planes are kept; callers filter with [`Plane::is_active`].
/// A plane that disappears between listing and lookup is reported as
/// unbound rather than failing the whole listing.
pub fn enumerate<D: KmsDevice>(device: &D) -> Result<Vec<Plane>> {
    let ids = device
        .plane_ids()
        .map_err(ScanoutError::ResourceQueryFailed)?;
    debug!("Found {} plane(s)", ids.len());

    let planes = ids
        .into_iter()
        .enumerate()
        .map(|(index, id)| {
            let binding = device.plane_binding(id).unwrap_or_else(|e| {
                warn!("Plane {} vanished before lookup: {}", id, e);
                Default::default()
            });
            trace!(index, id, fb = binding.fb_id, crtc = binding.crtc_id, "Plane binding");

            Plane {
                index,
                id,
                fb_id: binding.fb_id,
                crtc_id: binding.crtc_id,
            }
        })
        .collect();

    Ok(planes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_requires_both_ids() {
        let plane = |fb_id, crtc_id| Plane {
            index: 0,
            id: 31,
            fb_id,
            crtc_id,
        };
        assert!(plane(90, 41).is_active());
        assert!(!plane(0, 41).is_active());
        assert!(!plane(90, 0).is_active());
        assert!(!plane(0, 0).is_active());
    }
}
