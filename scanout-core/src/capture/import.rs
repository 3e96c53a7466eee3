//! Buffer export and read-only mapping

use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use super::FramebufferDescriptor;
use crate::config::Subsampling;
use crate::error::{Result, ScanoutError};
use crate::formats::vertical_subsampling;
use crate::kms::KmsDevice;

/// Number of `ImportedBuffer` mappings currently alive in this process
static LIVE_MAPPINGS: AtomicUsize = AtomicUsize::new(0);

/// A private, read-only mapping of one sub-plane
///
/// The mapping is released when the value is dropped. The mapped range
/// starts at the page containing the sub-plane offset; [`as_slice`]
/// exposes only the sub-plane bytes.
///
/// [`as_slice`]: ImportedBuffer::as_slice
#[derive(Debug)]
pub struct ImportedBuffer {
    base: NonNull<u8>,
    map_len: usize,
    start: usize,
    len: usize,
    slot: usize,
}

impl ImportedBuffer {
    /// Map `len` bytes at `offset` of `fd` read-only, copy-on-write
    pub fn map(fd: BorrowedFd<'_>, offset: u64, len: usize, slot: usize) -> Result<Self> {
        let failed = |error| ScanoutError::MappingFailed { slot, len, error };

        if len == 0 {
            return Err(failed(io::Error::new(
                io::ErrorKind::InvalidInput,
                "sub-plane has zero size",
            )));
        }

        let page = page_size();
        let aligned = offset - offset % page;
        let start = (offset - aligned) as usize;
        let map_len = start
            .checked_add(len)
            .ok_or_else(|| failed(io::Error::from(io::ErrorKind::InvalidInput)))?;
        let map_offset = libc::off_t::try_from(aligned)
            .map_err(|_| failed(io::Error::from(io::ErrorKind::InvalidInput)))?;

        // SAFETY: a fresh PROT_READ/MAP_PRIVATE mapping aliases nothing we
        // own; the kernel validates the descriptor and range.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                map_len,
                libc::PROT_READ,
                libc::MAP_PRIVATE,
                fd.as_raw_fd(),
                map_offset,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(failed(io::Error::last_os_error()));
        }
        let base = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| failed(io::Error::other("mmap returned null")))?;

        LIVE_MAPPINGS.fetch_add(1, Ordering::SeqCst);
        trace!(slot, len, "Mapped sub-plane");

        Ok(Self {
            base,
            map_len,
            start,
            len,
            slot,
        })
    }

    /// The sub-plane bytes
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `base..base + map_len` stays mapped until drop and
        // `start + len == map_len`.
        unsafe { std::slice::from_raw_parts(self.base.as_ptr().add(self.start), self.len) }
    }

    /// Mapped sub-plane size in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty (never true for a successful map)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sub-plane slot this buffer belongs to
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Mappings currently alive in this process
    pub fn live_mappings() -> usize {
        LIVE_MAPPINGS.load(Ordering::SeqCst)
    }
}

impl Drop for ImportedBuffer {
    fn drop(&mut self) {
        // SAFETY: `base`/`map_len` came from a successful mmap.
        unsafe {
            libc::munmap(self.base.as_ptr().cast(), self.map_len);
        }
        LIVE_MAPPINGS.fetch_sub(1, Ordering::SeqCst);
    }
}

fn page_size() -> u64 {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4096 }
}

/// Bytes to map for sub-plane `slot`
///
/// [`Subsampling::Halve`] sizes every non-zero slot at half of
/// `pitch * height`. [`Subsampling::Format`] derives the row count from
/// the pixel format and only halves formats it does not know.
pub fn mapping_len(fb: &FramebufferDescriptor, slot: usize, subsampling: Subsampling) -> usize {
    let Some(sub) = fb.slots.get(slot) else {
        return 0;
    };
    let full = sub.pitch as u64 * fb.height as u64;
    if slot == 0 {
        return full as usize;
    }

    let len = match subsampling {
        Subsampling::Halve => full / 2,
        Subsampling::Format => match vertical_subsampling(fb.fourcc, slot) {
            Some(factor) => sub.pitch as u64 * fb.height.div_ceil(factor) as u64,
            None => full / 2,
        },
    };
    len as usize
}

/// Export and map one sub-plane
///
/// Returns `Ok(None)` for an unused slot without touching the kernel. The
/// exported descriptor is closed before returning, whether or not the
/// mapping succeeded.
pub fn import<D: KmsDevice>(
    device: &D,
    fb: &FramebufferDescriptor,
    slot: usize,
    subsampling: Subsampling,
) -> Result<Option<ImportedBuffer>> {
    let Some(sub) = fb.slots.get(slot).filter(|s| s.is_populated()) else {
        return Ok(None);
    };

    let fd = device
        .export_buffer(sub.handle)
        .map_err(|error| ScanoutError::BufferExportFailed {
            handle: sub.handle,
            slot,
            error,
        })?;

    let len = mapping_len(fb, slot, subsampling);
    let mapped = ImportedBuffer::map(fd.as_fd(), sub.offset as u64, len, slot);
    drop(fd);

    mapped.map(Some)
}
