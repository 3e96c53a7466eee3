//! Device-to-disk capture pipeline
//!
//! Runs locate -> negotiate -> enumerate once, then for every active plane
//! resolve -> import -> extract, one sub-plane at a time. Only the setup
//! steps are fatal; per-plane and per-slot failures are collected in the
//! [`CaptureReport`] unless the framebuffer policy says otherwise. Collected
//! failures are only logged at debug level; reporting them is the
//! caller's job.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::capture::{
    self, artifact_path, extract, extract_rgb24, CaptureArtifact, FramebufferDescriptor, Plane,
    PlaneSink,
};
use crate::config::{CaptureConfig, FramebufferPolicy, OutputEncoding};
use crate::error::{Result, ScanoutError};
use crate::formats::PackedFormat;
use crate::kms::{self, CapabilitySet, DrmDevice, KmsDevice};

/// How a plane fared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneStatus {
    /// Not bound to a framebuffer and CRTC; skipped
    Inactive,
    /// Every populated slot was written
    Captured,
    /// Some slots were written, some failed
    Partial,
    /// Nothing was written
    Failed,
}

/// Outcome of one plane
#[derive(Debug)]
pub struct PlaneReport {
    /// The plane as enumerated
    pub plane: Plane,
    /// Its framebuffer, when the lookup succeeded
    pub framebuffer: Option<FramebufferDescriptor>,
    /// Segments written for this plane
    pub artifacts: Vec<CaptureArtifact>,
    /// Non-fatal failures met while processing it
    pub diagnostics: Vec<ScanoutError>,
}

impl PlaneReport {
    fn new(plane: Plane) -> Self {
        Self {
            plane,
            framebuffer: None,
            artifacts: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Summarize the outcome
    pub fn status(&self) -> PlaneStatus {
        match (
            self.plane.is_active(),
            self.artifacts.is_empty(),
            self.diagnostics.is_empty(),
        ) {
            (false, _, _) => PlaneStatus::Inactive,
            (true, false, true) => PlaneStatus::Captured,
            (true, false, false) => PlaneStatus::Partial,
            (true, true, _) => PlaneStatus::Failed,
        }
    }
}

/// Outcome of a capture run
#[derive(Debug, Default)]
pub struct CaptureReport {
    /// One entry per enumerated plane, in enumeration order
    pub planes: Vec<PlaneReport>,
}

impl CaptureReport {
    /// Every written segment
    pub fn artifacts(&self) -> impl Iterator<Item = &CaptureArtifact> {
        self.planes.iter().flat_map(|p| p.artifacts.iter())
    }

    /// Every non-fatal failure, with the plane it belongs to
    pub fn diagnostics(&self) -> impl Iterator<Item = (&Plane, &ScanoutError)> {
        self.planes
            .iter()
            .flat_map(|p| p.diagnostics.iter().map(move |d| (&p.plane, d)))
    }

    /// Distinct files written, in plane order
    pub fn files(&self) -> Vec<&std::path::Path> {
        let mut files: Vec<&std::path::Path> = Vec::new();
        for artifact in self.artifacts() {
            if files.last() != Some(&artifact.path.as_path()) {
                files.push(&artifact.path);
            }
        }
        files
    }

    /// Number of active planes
    pub fn active_planes(&self) -> usize {
        self.planes.iter().filter(|p| p.plane.is_active()).count()
    }

    /// Whether every active plane was captured without diagnostics
    pub fn is_complete(&self) -> bool {
        self.planes
            .iter()
            .all(|p| matches!(p.status(), PlaneStatus::Inactive | PlaneStatus::Captured))
    }
}

/// A plane and, when active, its framebuffer
#[derive(Debug, Clone, Serialize)]
pub struct PlaneInfo {
    /// The plane as enumerated
    #[serde(flatten)]
    pub plane: Plane,
    /// Whether the plane is active
    pub active: bool,
    /// Framebuffer of an active plane
    pub framebuffer: Option<FramebufferDescriptor>,
    /// Why the framebuffer could not be read
    pub error: Option<String>,
}

/// An open, negotiated device session
pub struct CaptureSession<D: KmsDevice> {
    device: D,
    caps: CapabilitySet,
}

impl CaptureSession<DrmDevice> {
    /// Find or open the configured device and negotiate capabilities
    pub fn open(config: &CaptureConfig) -> Result<Self> {
        config.validate()?;

        let device = match &config.device {
            Some(path) => kms::open_capable(path)?,
            None => kms::locate(&config.node_prefix, config.scan_limit)?,
        };

        Self::with_device(device)
    }
}

impl<D: KmsDevice> CaptureSession<D> {
    /// Negotiate capabilities on an already-located device
    pub fn with_device(device: D) -> Result<Self> {
        let caps = kms::negotiate(&device)?;
        Ok(Self { device, caps })
    }

    /// The underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Capabilities enabled on the session
    pub fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    /// Enumerate planes with their bindings
    pub fn planes(&self) -> Result<Vec<Plane>> {
        capture::enumerate(&self.device).inspect_err(|e| debug!("{}", e))
    }

    /// Enumerate planes and read each active plane's framebuffer
    pub fn describe(&self) -> Result<Vec<PlaneInfo>> {
        let planes = self.planes()?;

        Ok(planes
            .into_iter()
            .map(|plane| {
                let mut info = PlaneInfo {
                    plane,
                    active: plane.is_active(),
                    framebuffer: None,
                    error: None,
                };
                if info.active {
                    match capture::resolve(&self.device, &plane) {
                        Ok(fb) => {
                            if fb.populated_slots().next().is_none() {
                                let e = ScanoutError::NoBufferHandles { fb_id: fb.fb_id };
                                info.error = Some(e.to_string());
                            }
                            info.framebuffer = Some(fb.descriptor().clone());
                        }
                        Err(e) => info.error = Some(e.to_string()),
                    }
                }
                info
            })
            .collect())
    }

    /// Capture every active plane into files named after `base`
    pub fn capture(&self, base: &str, config: &CaptureConfig) -> Result<CaptureReport> {
        CaptureConfig::validate_base(base)?;
        config.validate()?;

        let planes = self.planes()?;
        let mut report = CaptureReport::default();

        for plane in planes {
            let mut plane_report = PlaneReport::new(plane);

            if !plane.is_active() {
                debug!(plane = plane.id, "Skipping inactive plane {}", plane.index);
                report.planes.push(plane_report);
                continue;
            }

            if let Err(e) = self.capture_plane(base, config, &mut plane_report) {
                match config.framebuffer_policy {
                    FramebufferPolicy::Abort => {
                        debug!("Plane {}: {}; aborting", plane.index, e);
                        return Err(e);
                    }
                    FramebufferPolicy::Skip => {
                        debug!("Plane {}: {}; skipping", plane.index, e);
                        plane_report.diagnostics.push(e);
                    }
                }
            }

            report.planes.push(plane_report);
        }

        info!(
            "Captured {} of {} active plane(s) into {} file(s)",
            report
                .planes
                .iter()
                .filter(|p| !p.artifacts.is_empty())
                .count(),
            report.active_planes(),
            report.files().len()
        );

        Ok(report)
    }

    /// Process one active plane
    ///
    /// Only a framebuffer lookup failure is returned; everything after it
    /// is recorded in `report.diagnostics`.
    fn capture_plane(
        &self,
        base: &str,
        config: &CaptureConfig,
        report: &mut PlaneReport,
    ) -> Result<()> {
        let plane = report.plane;
        let fb = capture::resolve(&self.device, &plane)?;
        report.framebuffer = Some(fb.descriptor().clone());

        if fb.populated_slots().next().is_none() {
            let e = ScanoutError::NoBufferHandles { fb_id: fb.fb_id };
            debug!("Plane {}: {}", plane.index, e);
            report.diagnostics.push(e);
            return Ok(());
        }

        let rgb = match config.encoding {
            OutputEncoding::Rgb24 => {
                let packed = PackedFormat::from_fourcc(fb.fourcc);
                if packed.is_none() {
                    warn!(
                        "Plane {}: {} cannot be converted to RGB24; writing raw bytes",
                        plane.index,
                        fb.format_label()
                    );
                }
                packed
            }
            OutputEncoding::Raw => None,
        };
        let encoding = if rgb.is_some() {
            OutputEncoding::Rgb24
        } else {
            OutputEncoding::Raw
        };

        let path = artifact_path(
            &config.output_dir,
            base,
            plane.index,
            config.suffix_for(encoding),
        );
        let mut sink = PlaneSink::new(path, plane.index);

        for (slot, sub) in fb.populated_slots() {
            let buffer = match capture::import(&self.device, &fb, slot, config.subsampling) {
                Ok(Some(buffer)) => buffer,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Plane {}: {}", plane.index, e);
                    report.diagnostics.push(e);
                    continue;
                }
            };

            let written = match rgb {
                Some(format) if slot == 0 => {
                    extract_rgb24(buffer, format, fb.width, fb.height, sub.pitch, &mut sink)
                }
                _ => extract(buffer, &mut sink),
            };

            match written {
                Ok(artifact) => report.artifacts.push(artifact),
                Err(e) => {
                    // The destination is unusable; later slots would fail the same way
                    debug!("Plane {}: {}", plane.index, e);
                    report.diagnostics.push(e);
                    return Ok(());
                }
            }
        }

        if let Err(e) = sink.finish() {
            debug!("Plane {}: {}", plane.index, e);
            report.diagnostics.push(e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_info_json_is_flat() {
        let info = PlaneInfo {
            plane: Plane {
                index: 2,
                id: 40,
                fb_id: 0,
                crtc_id: 0,
            },
            active: false,
            framebuffer: None,
            error: None,
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["index"], 2);
        assert_eq!(json["id"], 40);
        assert_eq!(json["active"], false);
        assert!(json["framebuffer"].is_null());
    }

    #[test]
    fn test_status_of_inactive_plane() {
        let report = PlaneReport::new(Plane {
            index: 0,
            id: 1,
            fb_id: 5,
            crtc_id: 0,
        });
        assert_eq!(report.status(), PlaneStatus::Inactive);

        let report = CaptureReport {
            planes: vec![report],
        };
        assert!(report.is_complete());
        assert_eq!(report.active_planes(), 0);
    }
}
