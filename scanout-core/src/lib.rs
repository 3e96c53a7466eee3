//! scanout Core Library
//!
//! Captures what a machine is displaying by reading the kernel's scanout
//! planes directly, without a compositor or display server.
//!
//! This library provides:
//! - KMS device discovery and client capability negotiation
//! - Scanout plane enumeration and framebuffer lookup
//! - PRIME export and read-only mapping of plane buffers
//! - Raw and 24-bit RGB dumps of each plane
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌───────────────┐    ┌──────────────┐
//! │ Locate +     │───▶│ Enumerate    │───▶│ Resolve FB +  │───▶│ Extract to   │
//! │ Negotiate    │    │ planes       │    │ Import slots  │    │ plane files  │
//! └──────────────┘    └──────────────┘    └───────────────┘    └──────────────┘
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod formats;
pub mod kms;
pub mod pipeline;

pub use config::{CaptureConfig, FramebufferPolicy, OutputEncoding, Subsampling};
pub use error::{Result, ScanoutError};
pub use kms::{DrmDevice, KmsDevice};
pub use pipeline::{CaptureReport, CaptureSession, PlaneReport, PlaneStatus};
