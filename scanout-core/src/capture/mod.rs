//! Screen capture from KMS scanout planes
//!
//! This module handles, in pipeline order:
//! - Plane enumeration and the active-plane filter
//! - Framebuffer descriptor lookup
//! - PRIME export and read-only mapping of each sub-plane
//! - Writing sub-plane bytes to per-plane output files

mod extract;
mod framebuffer;
mod import;
mod plane;

pub use extract::{artifact_path, extract, extract_rgb24, CaptureArtifact, PlaneSink};
pub use framebuffer::{
    resolve, FramebufferDescriptor, ResolvedFramebuffer, SubPlane, MAX_SUBPLANES,
};
pub use import::{import, mapping_len, ImportedBuffer};
pub use plane::{enumerate, Plane};
