//! Resource accounting across a full capture
//!
//! Kept in its own test binary so no other test opens descriptors or
//! mappings concurrently.

mod mocks;

use mocks::{nv12_framebuffer, pattern, MockDevice};
use scanout_core::capture::ImportedBuffer;
use scanout_core::config::CaptureConfig;
use scanout_core::pipeline::CaptureSession;
use tempfile::TempDir;

fn open_fds() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

#[test]
fn test_no_descriptors_or_mappings_leak() {
    let dir = TempDir::new().unwrap();
    let mut device = MockDevice::new()
        .with_xrgb_plane(1, 32, 32)
        .with_plane(2, 60, 3)
        .with_framebuffer(nv12_framebuffer(60, 100, 101, 32, 32))
        .with_buffer(100, pattern(32 * 32, 1))
        .with_buffer(101, pattern(32 * 32, 2))
        .with_xrgb_plane(3, 16, 16)
        .with_xrgb_plane(4, 16, 16);
    device.unexportable.insert(3);
    device.unmappable.insert(4);

    let session = CaptureSession::with_device(device).unwrap();
    let config = CaptureConfig::default().with_output_dir(dir.path());

    let before = open_fds();
    let report = session.capture("leak", &config).unwrap();
    let after = open_fds();

    assert_eq!(report.artifacts().count(), 3);
    assert_eq!(report.diagnostics().count(), 2);
    assert_eq!(session.device().log().exports.len(), 5);
    assert_eq!(before, after);
    assert_eq!(ImportedBuffer::live_mappings(), 0);
}
