//! Mock infrastructure for testing
//!
//! Provides an in-memory KMS device whose exported buffers are temporary
//! files, plus helpers for building framebuffer descriptors.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::OwnedFd;

use scanout_core::capture::{FramebufferDescriptor, SubPlane, MAX_SUBPLANES};
use scanout_core::formats::fourcc;
use scanout_core::kms::{ClientCapability, DriverCapability, KmsDevice, PlaneBinding};

/// Calls the pipeline made against a [`MockDevice`]
#[derive(Debug, Default)]
pub struct CallLog {
    pub client_caps: Vec<ClientCapability>,
    pub framebuffer_lookups: Vec<u32>,
    pub exports: Vec<u32>,
    pub closed: Vec<u32>,
}

/// A scripted display device
#[derive(Debug, Default)]
pub struct MockDevice {
    pub dumb_buffer: bool,
    pub rejected_cap: Option<ClientCapability>,
    pub plane_list_error: bool,
    pub planes: Vec<(u32, PlaneBinding)>,
    pub vanished_planes: HashSet<u32>,
    pub framebuffers: HashMap<u32, FramebufferDescriptor>,
    pub buffers: HashMap<u32, Vec<u8>>,
    pub unexportable: HashSet<u32>,
    pub unmappable: HashSet<u32>,
    pub log: RefCell<CallLog>,
}

impl MockDevice {
    /// A device that supports dumb buffers and has no planes
    pub fn new() -> Self {
        Self {
            dumb_buffer: true,
            ..Default::default()
        }
    }

    /// Add a plane bound to `fb_id` on `crtc_id`
    pub fn with_plane(mut self, id: u32, fb_id: u32, crtc_id: u32) -> Self {
        self.planes.push((id, PlaneBinding { fb_id, crtc_id }));
        self
    }

    /// Register a framebuffer
    pub fn with_framebuffer(mut self, fb: FramebufferDescriptor) -> Self {
        self.framebuffers.insert(fb.fb_id, fb);
        self
    }

    /// Back a buffer handle with `bytes`
    pub fn with_buffer(mut self, handle: u32, bytes: Vec<u8>) -> Self {
        self.buffers.insert(handle, bytes);
        self
    }

    /// An active plane showing a single-plane XRGB8888 framebuffer
    ///
    /// The framebuffer and buffer handle both reuse `id`.
    pub fn with_xrgb_plane(self, id: u32, width: u32, height: u32) -> Self {
        let fb = xrgb_framebuffer(id, id, width, height);
        let bytes = pattern((width * 4 * height) as usize, id as u8);
        self.with_plane(id, id, 1).with_framebuffer(fb).with_buffer(id, bytes)
    }

    /// Calls made so far
    pub fn log(&self) -> std::cell::Ref<'_, CallLog> {
        self.log.borrow()
    }
}

impl KmsDevice for MockDevice {
    fn driver_capability(&self, cap: DriverCapability) -> io::Result<u64> {
        match cap {
            DriverCapability::DumbBuffer => Ok(self.dumb_buffer as u64),
        }
    }

    fn set_client_capability(&self, cap: ClientCapability, _enabled: bool) -> io::Result<()> {
        self.log.borrow_mut().client_caps.push(cap);
        if self.rejected_cap == Some(cap) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        Ok(())
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        if self.plane_list_error {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        Ok(self.planes.iter().map(|(id, _)| *id).collect())
    }

    fn plane_binding(&self, plane_id: u32) -> io::Result<PlaneBinding> {
        if self.vanished_planes.contains(&plane_id) {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        self.planes
            .iter()
            .find(|(id, _)| *id == plane_id)
            .map(|(_, binding)| *binding)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn framebuffer(&self, fb_id: u32) -> io::Result<FramebufferDescriptor> {
        self.log.borrow_mut().framebuffer_lookups.push(fb_id);
        self.framebuffers
            .get(&fb_id)
            .cloned()
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))
    }

    fn export_buffer(&self, handle: u32) -> io::Result<OwnedFd> {
        self.log.borrow_mut().exports.push(handle);
        if self.unexportable.contains(&handle) {
            return Err(io::Error::from_raw_os_error(libc::ENOSYS));
        }
        if self.unmappable.contains(&handle) {
            // Directories have no mmap implementation
            return Ok(File::open(std::env::temp_dir())?.into());
        }

        let bytes = self
            .buffers
            .get(&handle)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOENT))?;
        let mut file = tempfile::tempfile()?;
        file.write_all(bytes)?;
        Ok(file.into())
    }

    fn close_buffer(&self, handle: u32) -> io::Result<()> {
        self.log.borrow_mut().closed.push(handle);
        Ok(())
    }
}

/// Deterministic, non-repeating-per-row test bytes
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
        .collect()
}

fn slot(handle: u32, pitch: u32, offset: u32) -> SubPlane {
    SubPlane {
        handle,
        pitch,
        offset,
        modifier: None,
    }
}

/// Single-plane XRGB8888 framebuffer with a tight pitch
pub fn xrgb_framebuffer(fb_id: u32, handle: u32, width: u32, height: u32) -> FramebufferDescriptor {
    let mut slots = [SubPlane::default(); MAX_SUBPLANES];
    slots[0] = slot(handle, width * 4, 0);
    FramebufferDescriptor {
        fb_id,
        width,
        height,
        fourcc: fourcc::XRGB8888,
        slots,
    }
}

/// Single-plane RGB565 framebuffer with a tight pitch
pub fn rgb565_framebuffer(fb_id: u32, handle: u32, width: u32, height: u32) -> FramebufferDescriptor {
    let mut slots = [SubPlane::default(); MAX_SUBPLANES];
    slots[0] = slot(handle, width * 2, 0);
    FramebufferDescriptor {
        fb_id,
        width,
        height,
        fourcc: fourcc::RGB565,
        slots,
    }
}

/// Two-plane NV12 framebuffer with separate luma and chroma buffers
pub fn nv12_framebuffer(
    fb_id: u32,
    luma: u32,
    chroma: u32,
    width: u32,
    height: u32,
) -> FramebufferDescriptor {
    let mut slots = [SubPlane::default(); MAX_SUBPLANES];
    slots[0] = slot(luma, width, 0);
    slots[1] = slot(chroma, width, 0);
    FramebufferDescriptor {
        fb_id,
        width,
        height,
        fourcc: fourcc::NV12,
        slots,
    }
}

/// Three-plane YUV420 framebuffer sharing a single buffer
pub fn yuv420_shared_framebuffer(fb_id: u32, handle: u32, width: u32, height: u32) -> FramebufferDescriptor {
    let luma = width * height;
    let chroma = (width / 2) * (height / 2);
    let mut slots = [SubPlane::default(); MAX_SUBPLANES];
    slots[0] = slot(handle, width, 0);
    slots[1] = slot(handle, width / 2, luma);
    slots[2] = slot(handle, width / 2, luma + chroma);
    FramebufferDescriptor {
        fb_id,
        width,
        height,
        fourcc: fourcc::YUV420,
        slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_is_deterministic() {
        assert_eq!(pattern(64, 3), pattern(64, 3));
        assert_ne!(pattern(64, 3), pattern(64, 4));
    }

    #[test]
    fn test_xrgb_plane_registers_everything() {
        let device = MockDevice::new().with_xrgb_plane(5, 8, 2);
        assert_eq!(device.planes.len(), 1);
        assert!(device.framebuffers.contains_key(&5));
        assert_eq!(device.buffers[&5].len(), 8 * 4 * 2);
    }
}
