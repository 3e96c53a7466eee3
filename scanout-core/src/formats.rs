//! Pixel format constants and conversions
//!
//! Centralizes DRM fourcc handling: names for diagnostics, per-format
//! sub-plane geometry, and the packed RGB to 24-bit RGB conversion.

use std::io::{self, Write};

/// DRM format fourcc constants
///
/// See: <https://github.com/torvalds/linux/blob/master/include/uapi/drm/drm_fourcc.h>
pub mod fourcc {
    /// Build a fourcc code from its four characters
    pub const fn code(a: u8, b: u8, c: u8, d: u8) -> u32 {
        (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
    }

    /// RGB565 - 16-bit packed RGB
    pub const RGB565: u32 = code(b'R', b'G', b'1', b'6');
    /// XRGB8888 - 32-bit RGB with unused alpha
    pub const XRGB8888: u32 = code(b'X', b'R', b'2', b'4');
    /// ARGB8888 - 32-bit RGB with alpha
    pub const ARGB8888: u32 = code(b'A', b'R', b'2', b'4');
    /// XBGR8888 - 32-bit BGR with unused alpha
    pub const XBGR8888: u32 = code(b'X', b'B', b'2', b'4');
    /// ABGR8888 - 32-bit BGR with alpha
    pub const ABGR8888: u32 = code(b'A', b'B', b'2', b'4');
    /// XRGB2101010 - 30-bit RGB
    pub const XRGB2101010: u32 = code(b'X', b'R', b'3', b'0');
    /// RGB888 - 24-bit RGB
    pub const RGB888: u32 = code(b'R', b'G', b'2', b'4');
    /// NV12 - YUV 4:2:0, Y plane + interleaved CbCr
    pub const NV12: u32 = code(b'N', b'V', b'1', b'2');
    /// NV21 - YUV 4:2:0, Y plane + interleaved CrCb
    pub const NV21: u32 = code(b'N', b'V', b'2', b'1');
    /// NV16 - YUV 4:2:2, Y plane + interleaved CbCr
    pub const NV16: u32 = code(b'N', b'V', b'1', b'6');
    /// NV61 - YUV 4:2:2, Y plane + interleaved CrCb
    pub const NV61: u32 = code(b'N', b'V', b'6', b'1');
    /// NV24 - YUV 4:4:4, Y plane + interleaved CbCr
    pub const NV24: u32 = code(b'N', b'V', b'2', b'4');
    /// YUV420 - three-plane YUV 4:2:0
    pub const YUV420: u32 = code(b'Y', b'U', b'1', b'2');
    /// YVU420 - three-plane YVU 4:2:0
    pub const YVU420: u32 = code(b'Y', b'V', b'1', b'2');
    /// YUV422 - three-plane YUV 4:2:2
    pub const YUV422: u32 = code(b'Y', b'U', b'1', b'6');
    /// YUV444 - three-plane YUV 4:4:4
    pub const YUV444: u32 = code(b'Y', b'U', b'2', b'4');
    /// P010 - 10-bit YUV 4:2:0
    pub const P010: u32 = code(b'P', b'0', b'1', b'0');
    /// YUYV - packed YUV 4:2:2
    pub const YUYV: u32 = code(b'Y', b'U', b'Y', b'V');
}

/// Format name for diagnostics
pub fn format_name(fourcc: u32) -> &'static str {
    use fourcc::*;
    match fourcc {
        RGB565 => "RGB565",
        XRGB8888 => "XRGB8888",
        ARGB8888 => "ARGB8888",
        XBGR8888 => "XBGR8888",
        ABGR8888 => "ABGR8888",
        XRGB2101010 => "XRGB2101010",
        RGB888 => "RGB888",
        NV12 => "NV12",
        NV21 => "NV21",
        NV16 => "NV16",
        NV61 => "NV61",
        NV24 => "NV24",
        YUV420 => "YUV420",
        YVU420 => "YVU420",
        YUV422 => "YUV422",
        YUV444 => "YUV444",
        P010 => "P010",
        YUYV => "YUYV",
        _ => "Unknown",
    }
}

/// The four characters of a fourcc, with non-printable bytes replaced
pub fn fourcc_string(fourcc: u32) -> String {
    fourcc
        .to_le_bytes()
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect()
}

/// Vertical chroma subsampling factor of sub-plane `slot`
///
/// Returns `None` when the format is not in the table, leaving the caller
/// to pick a fallback.
pub fn vertical_subsampling(fourcc: u32, slot: usize) -> Option<u32> {
    use fourcc::*;
    if slot == 0 {
        return Some(1);
    }
    match fourcc {
        NV12 | NV21 | YUV420 | YVU420 | P010 => Some(2),
        NV16 | NV61 | YUV422 | NV24 | YUV444 => Some(1),
        _ => None,
    }
}

/// Packed RGB encodings that can be expanded to 24-bit RGB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedFormat {
    /// 16-bit, 5/6/5 bits of R/G/B
    Rgb565,
    /// 32-bit, 8 bits per channel, top byte ignored
    Xrgb8888,
}

impl PackedFormat {
    /// Map a fourcc onto a convertible encoding
    pub fn from_fourcc(fourcc: u32) -> Option<Self> {
        match fourcc {
            fourcc::RGB565 => Some(Self::Rgb565),
            fourcc::XRGB8888 | fourcc::ARGB8888 => Some(Self::Xrgb8888),
            _ => None,
        }
    }

    /// Bytes per source pixel
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb565 => 2,
            Self::Xrgb8888 => 4,
        }
    }

    fn decode(self, px: &[u8]) -> [u8; 3] {
        match self {
            Self::Rgb565 => rgb565_to_rgb888(u16::from_le_bytes([px[0], px[1]])),
            Self::Xrgb8888 => xrgb8888_to_rgb888(u32::from_le_bytes([px[0], px[1], px[2], px[3]])),
        }
    }
}

/// Expand one RGB565 pixel; low bits of each channel are left at zero
#[inline]
pub fn rgb565_to_rgb888(px: u16) -> [u8; 3] {
    [
        ((px & 0xf800) >> 8) as u8,
        ((px & 0x07e0) >> 3) as u8,
        ((px & 0x001f) << 3) as u8,
    ]
}

/// Extract the RGB bytes of one XRGB8888 pixel
#[inline]
pub fn xrgb8888_to_rgb888(px: u32) -> [u8; 3] {
    [(px >> 16) as u8, (px >> 8) as u8, px as u8]
}

/// Iterator yielding 24-bit RGB triples from a packed source buffer
///
/// Rows are `pitch` bytes apart; only the first `width` pixels of each row
/// are read. Iteration ends early if `src` is shorter than the geometry
/// claims.
#[derive(Debug, Clone)]
pub struct Rgb24Pixels<'a> {
    src: &'a [u8],
    format: PackedFormat,
    width: usize,
    height: usize,
    pitch: usize,
    x: usize,
    y: usize,
}

impl<'a> Rgb24Pixels<'a> {
    /// Walk `width` x `height` pixels of `src`
    pub fn new(src: &'a [u8], format: PackedFormat, width: u32, height: u32, pitch: u32) -> Self {
        Self {
            src,
            format,
            width: width as usize,
            height: height as usize,
            pitch: pitch as usize,
            x: 0,
            y: 0,
        }
    }
}

impl Iterator for Rgb24Pixels<'_> {
    type Item = [u8; 3];

    fn next(&mut self) -> Option<Self::Item> {
        if self.width == 0 || self.y >= self.height {
            return None;
        }

        let bpp = self.format.bytes_per_pixel();
        let start = self.y * self.pitch + self.x * bpp;
        let px = self.src.get(start..start + bpp)?;

        self.x += 1;
        if self.x == self.width {
            self.x = 0;
            self.y += 1;
        }

        Some(self.format.decode(px))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.height.saturating_sub(self.y) * self.width).saturating_sub(self.x);
        (0, Some(remaining))
    }
}

/// Stream the RGB24 expansion of `src` into `sink`
///
/// Returns the number of bytes written.
pub fn write_rgb24<W: Write>(
    sink: &mut W,
    src: &[u8],
    format: PackedFormat,
    width: u32,
    height: u32,
    pitch: u32,
) -> io::Result<u64> {
    let mut chunk = [0u8; 3 * 1024];
    let mut filled = 0;
    let mut written = 0u64;

    for rgb in Rgb24Pixels::new(src, format, width, height, pitch) {
        chunk[filled..filled + 3].copy_from_slice(&rgb);
        filled += 3;
        if filled == chunk.len() {
            sink.write_all(&chunk)?;
            written += filled as u64;
            filled = 0;
        }
    }

    sink.write_all(&chunk[..filled])?;
    written += filled as u64;
    Ok(written)
}
