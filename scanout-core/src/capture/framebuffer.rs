//! Framebuffer descriptor resolution

use std::ops::Deref;

use serde::Serialize;
use tracing::{debug, warn};

use super::Plane;
use crate::error::{Result, ScanoutError};
use crate::formats::{format_name, fourcc_string};
use crate::kms::KmsDevice;

/// Maximum sub-planes a framebuffer can carry
pub const MAX_SUBPLANES: usize = 4;

/// One sub-plane slot of a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SubPlane {
    /// Kernel buffer handle (0 = slot unused)
    pub handle: u32,
    /// Bytes per row
    pub pitch: u32,
    /// Byte offset of the sub-plane inside its buffer
    pub offset: u32,
    /// Layout modifier, when the framebuffer was created with one
    pub modifier: Option<u64>,
}

impl SubPlane {
    /// Whether this slot refers to a buffer
    pub fn is_populated(&self) -> bool {
        self.handle != 0
    }
}

/// Geometry, format and buffers of a framebuffer
///
/// Slot 0 holds the full-resolution plane; slots 1-3, when populated,
/// hold chroma planes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FramebufferDescriptor {
    /// Framebuffer object id
    pub fb_id: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// DRM fourcc pixel format
    pub fourcc: u32,
    /// Sub-plane slots
    pub slots: [SubPlane; MAX_SUBPLANES],
}

impl FramebufferDescriptor {
    /// Populated slots with their index
    pub fn populated_slots(&self) -> impl Iterator<Item = (usize, &SubPlane)> {
        self.slots.iter().enumerate().filter(|(_, s)| s.is_populated())
    }

    /// Human-readable pixel format
    pub fn format_label(&self) -> String {
        match format_name(self.fourcc) {
            "Unknown" => fourcc_string(self.fourcc),
            name => name.to_string(),
        }
    }
}

/// A descriptor whose buffer handles are released on drop
///
/// Several slots may share one handle; each distinct handle is closed once.
pub struct ResolvedFramebuffer<'d, D: KmsDevice> {
    device: &'d D,
    descriptor: FramebufferDescriptor,
}

impl<D: KmsDevice> ResolvedFramebuffer<'_, D> {
    /// The descriptor; clone it to keep it past the handle lifetime
    pub fn descriptor(&self) -> &FramebufferDescriptor {
        &self.descriptor
    }
}

impl<D: KmsDevice> Deref for ResolvedFramebuffer<'_, D> {
    type Target = FramebufferDescriptor;

    fn deref(&self) -> &Self::Target {
        &self.descriptor
    }
}

impl<D: KmsDevice> Drop for ResolvedFramebuffer<'_, D> {
    fn drop(&mut self) {
        let mut closed = [0u32; MAX_SUBPLANES];
        for (i, (_, slot)) in self.descriptor.populated_slots().enumerate() {
            if closed[..i].contains(&slot.handle) {
                continue;
            }
            closed[i] = slot.handle;
            if let Err(e) = self.device.close_buffer(slot.handle) {
                warn!("Failed to release buffer handle {}: {}", slot.handle, e);
            }
        }
    }
}

/// Look up the framebuffer currently bound to an active plane
///
/// The framebuffer can be torn down between enumeration and this call;
/// that surfaces as [`ScanoutError::FramebufferLookupFailed`].
pub fn resolve<'d, D: KmsDevice>(device: &'d D, plane: &Plane) -> Result<ResolvedFramebuffer<'d, D>> {
    let descriptor = device
        .framebuffer(plane.fb_id)
        .map_err(|error| ScanoutError::FramebufferLookupFailed {
            fb_id: plane.fb_id,
            error,
        })?;

    debug!(
        plane = plane.id,
        fb = descriptor.fb_id,
        "Framebuffer {}x{} {} with {} sub-plane(s)",
        descriptor.width,
        descriptor.height,
        descriptor.format_label(),
        descriptor.populated_slots().count()
    );

    Ok(ResolvedFramebuffer { device, descriptor })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::fourcc;

    fn nv12() -> FramebufferDescriptor {
        let mut slots = [SubPlane::default(); MAX_SUBPLANES];
        slots[0] = SubPlane {
            handle: 7,
            pitch: 1920,
            offset: 0,
            modifier: None,
        };
        slots[1] = SubPlane {
            handle: 7,
            pitch: 1920,
            offset: 1920 * 1080,
            modifier: None,
        };
        FramebufferDescriptor {
            fb_id: 90,
            width: 1920,
            height: 1080,
            fourcc: fourcc::NV12,
            slots,
        }
    }

    #[test]
    fn test_populated_slots() {
        let fb = nv12();
        let slots: Vec<_> = fb.populated_slots().map(|(i, _)| i).collect();
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    fn test_format_label_falls_back_to_fourcc() {
        let mut fb = nv12();
        assert_eq!(fb.format_label(), "NV12");
        fb.fourcc = fourcc::code(b'Q', b'Z', b'9', b'9');
        assert_eq!(fb.format_label(), "QZ99");
    }
}
