//! Kernel mode-setting device access
//!
//! [`KmsDevice`] is the boundary between the capture pipeline and the
//! kernel display subsystem. [`DrmDevice`] implements it on a real
//! `/dev/dri/card*` node; tests implement it over temporary files.

mod caps;
mod ioctl;
mod locate;

pub use caps::{negotiate, CapabilitySet};
pub use locate::{
    locate, locate_with, node_path, open_capable, DEFAULT_NODE_PREFIX, DEFAULT_SCAN_LIMIT,
};

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use bytemuck::Zeroable;
use tracing::trace;

use crate::capture::{FramebufferDescriptor, SubPlane};
use crate::error::{Result, ScanoutError};
use ioctl::*;

/// Attempts at reading the plane list before giving up on a moving target
const PLANE_LIST_ATTEMPTS: usize = 4;

/// Driver capabilities that can be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCapability {
    /// CPU-mappable "dumb" buffer allocation
    DumbBuffer,
}

impl DriverCapability {
    fn raw(self) -> u64 {
        match self {
            Self::DumbBuffer => DRM_CAP_DUMB_BUFFER,
        }
    }
}

/// Client capabilities a session can opt into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientCapability {
    /// Atomic modesetting awareness
    Atomic,
    /// List primary and cursor planes alongside overlays
    UniversalPlanes,
}

impl ClientCapability {
    fn raw(self) -> u64 {
        match self {
            Self::Atomic => DRM_CLIENT_CAP_ATOMIC,
            Self::UniversalPlanes => DRM_CLIENT_CAP_UNIVERSAL_PLANES,
        }
    }

    /// Name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            Self::Atomic => "atomic",
            Self::UniversalPlanes => "universal planes",
        }
    }
}

impl std::fmt::Display for ClientCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Current binding of a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaneBinding {
    /// Bound framebuffer (0 = none)
    pub fb_id: u32,
    /// Bound CRTC (0 = none)
    pub crtc_id: u32,
}

/// Operations the capture pipeline needs from a display device
pub trait KmsDevice {
    /// Query a driver capability value
    fn driver_capability(&self, cap: DriverCapability) -> io::Result<u64>;

    /// Enable or disable a client capability for this session
    fn set_client_capability(&self, cap: ClientCapability, enabled: bool) -> io::Result<()>;

    /// List every plane id, in kernel order
    fn plane_ids(&self) -> io::Result<Vec<u32>>;

    /// Look up what a plane is currently bound to
    fn plane_binding(&self, plane_id: u32) -> io::Result<PlaneBinding>;

    /// Look up the multi-planar descriptor of a framebuffer
    ///
    /// Non-zero buffer handles in the result belong to this session and
    /// must be released with [`KmsDevice::close_buffer`].
    fn framebuffer(&self, fb_id: u32) -> io::Result<FramebufferDescriptor>;

    /// Export a buffer handle to a read-only, close-on-exec descriptor
    fn export_buffer(&self, handle: u32) -> io::Result<OwnedFd>;

    /// Release a buffer handle obtained from [`KmsDevice::framebuffer`]
    fn close_buffer(&self, handle: u32) -> io::Result<()>;
}

/// An open DRM device node
#[derive(Debug)]
pub struct DrmDevice {
    file: File,
    path: PathBuf,
}

impl DrmDevice {
    /// Open a device node for read/write
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::open_node(path).map_err(|error| ScanoutError::DeviceUnavailable {
            path: path.to_path_buf(),
            error,
        })
    }

    pub(crate) fn open_node(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path this device was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl AsFd for DrmDevice {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl KmsDevice for DrmDevice {
    fn driver_capability(&self, cap: DriverCapability) -> io::Result<u64> {
        let mut req = drm_get_cap {
            capability: cap.raw(),
            value: 0,
        };
        // SAFETY: `req` is a valid drm_get_cap for the duration of the call.
        unsafe { drm_ioctl_get_cap(self.fd(), &mut req) }?;
        Ok(req.value)
    }

    fn set_client_capability(&self, cap: ClientCapability, enabled: bool) -> io::Result<()> {
        let req = drm_set_client_cap {
            capability: cap.raw(),
            value: enabled as u64,
        };
        // SAFETY: `req` is a valid drm_set_client_cap the kernel only reads.
        unsafe { drm_ioctl_set_client_cap(self.fd(), &req) }?;
        Ok(())
    }

    fn plane_ids(&self) -> io::Result<Vec<u32>> {
        // The plane count can change between the sizing call and the fill
        // call (hotplug), so retry until both agree.
        for _ in 0..PLANE_LIST_ATTEMPTS {
            let mut res = drm_mode_get_plane_res::zeroed();
            // SAFETY: a zero count with a null pointer only asks for the size.
            unsafe { drm_ioctl_mode_getplaneresources(self.fd(), &mut res) }?;

            let count = res.count_planes as usize;
            let mut ids = vec![0u32; count];
            if count == 0 {
                return Ok(ids);
            }

            res.plane_id_ptr = ids.as_mut_ptr() as u64;
            // SAFETY: `ids` has room for `count_planes` entries and outlives
            // the call; the kernel writes at most that many.
            unsafe { drm_ioctl_mode_getplaneresources(self.fd(), &mut res) }?;

            if res.count_planes as usize <= count {
                ids.truncate(res.count_planes as usize);
                trace!(count = ids.len(), "Listed planes");
                return Ok(ids);
            }
        }

        Err(io::Error::other("plane list kept changing while reading it"))
    }

    fn plane_binding(&self, plane_id: u32) -> io::Result<PlaneBinding> {
        let mut req = drm_mode_get_plane::zeroed();
        req.plane_id = plane_id;
        // SAFETY: count_format_types is zero so the kernel copies no formats.
        unsafe { drm_ioctl_mode_getplane(self.fd(), &mut req) }?;

        Ok(PlaneBinding {
            fb_id: req.fb_id,
            crtc_id: req.crtc_id,
        })
    }

    fn framebuffer(&self, fb_id: u32) -> io::Result<FramebufferDescriptor> {
        let mut req = drm_mode_fb_cmd2::zeroed();
        req.fb_id = fb_id;
        // SAFETY: `req` is a valid drm_mode_fb_cmd2 for the duration of the call.
        unsafe { drm_ioctl_mode_getfb2(self.fd(), &mut req) }?;

        let has_modifiers = req.flags & DRM_MODE_FB_MODIFIERS != 0;
        let slots = std::array::from_fn(|i| SubPlane {
            handle: req.handles[i],
            pitch: req.pitches[i],
            offset: req.offsets[i],
            modifier: (has_modifiers && req.handles[i] != 0).then_some(req.modifier[i]),
        });

        Ok(FramebufferDescriptor {
            fb_id,
            width: req.width,
            height: req.height,
            fourcc: req.pixel_format,
            slots,
        })
    }

    fn export_buffer(&self, handle: u32) -> io::Result<OwnedFd> {
        let mut req = drm_prime_handle {
            handle,
            flags: (libc::O_RDONLY | libc::O_CLOEXEC) as u32,
            fd: -1,
        };
        // SAFETY: `req` is a valid drm_prime_handle for the duration of the call.
        unsafe { drm_ioctl_prime_handle_to_fd(self.fd(), &mut req) }?;

        if req.fd < 0 {
            return Err(io::Error::other("kernel returned an invalid PRIME descriptor"));
        }
        // SAFETY: on success the kernel hands us a fresh descriptor we now own.
        Ok(unsafe { OwnedFd::from_raw_fd(req.fd) })
    }

    fn close_buffer(&self, handle: u32) -> io::Result<()> {
        let req = drm_gem_close { handle, pad: 0 };
        // SAFETY: `req` is a valid drm_gem_close the kernel only reads.
        unsafe { drm_ioctl_gem_close(self.fd(), &req) }?;
        Ok(())
    }
}
