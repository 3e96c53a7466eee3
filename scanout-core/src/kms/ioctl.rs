//! Raw DRM ioctl definitions
//!
//! Mirrors the structures in `include/uapi/drm/drm.h` and `drm_mode.h`.
//! Only the requests the capture path needs are declared here.

#![allow(non_camel_case_types)]

use bytemuck::Zeroable;

pub const DRM_IOCTL_BASE: u8 = b'd';

pub const DRM_CAP_DUMB_BUFFER: u64 = 0x1;

pub const DRM_CLIENT_CAP_UNIVERSAL_PLANES: u64 = 2;
pub const DRM_CLIENT_CAP_ATOMIC: u64 = 3;

/// `drm_mode_fb_cmd2.flags`: the modifier array is valid
pub const DRM_MODE_FB_MODIFIERS: u32 = 1 << 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct drm_get_cap {
    pub capability: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct drm_set_client_cap {
    pub capability: u64,
    pub value: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct drm_prime_handle {
    pub handle: u32,
    pub flags: u32,
    pub fd: i32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct drm_gem_close {
    pub handle: u32,
    pub pad: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct drm_mode_get_plane_res {
    pub plane_id_ptr: u64,
    pub count_planes: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct drm_mode_get_plane {
    pub plane_id: u32,
    pub crtc_id: u32,
    pub fb_id: u32,
    pub possible_crtcs: u32,
    pub gamma_size: u32,
    pub count_format_types: u32,
    pub format_type_ptr: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Zeroable)]
pub struct drm_mode_fb_cmd2 {
    pub fb_id: u32,
    pub width: u32,
    pub height: u32,
    pub pixel_format: u32,
    pub flags: u32,
    pub handles: [u32; 4],
    pub pitches: [u32; 4],
    pub offsets: [u32; 4],
    pub modifier: [u64; 4],
}

nix::ioctl_write_ptr!(drm_ioctl_gem_close, DRM_IOCTL_BASE, 0x09, drm_gem_close);
nix::ioctl_readwrite!(drm_ioctl_get_cap, DRM_IOCTL_BASE, 0x0c, drm_get_cap);
nix::ioctl_write_ptr!(
    drm_ioctl_set_client_cap,
    DRM_IOCTL_BASE,
    0x0d,
    drm_set_client_cap
);
nix::ioctl_readwrite!(
    drm_ioctl_prime_handle_to_fd,
    DRM_IOCTL_BASE,
    0x2d,
    drm_prime_handle
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getplaneresources,
    DRM_IOCTL_BASE,
    0xb5,
    drm_mode_get_plane_res
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getplane,
    DRM_IOCTL_BASE,
    0xb6,
    drm_mode_get_plane
);
nix::ioctl_readwrite!(
    drm_ioctl_mode_getfb2,
    DRM_IOCTL_BASE,
    0xce,
    drm_mode_fb_cmd2
);
