//! Writing captured sub-planes to disk

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use super::ImportedBuffer;
use crate::config::OutputEncoding;
use crate::error::{Result, ScanoutError};
use crate::formats::{write_rgb24, PackedFormat};

/// One sub-plane's bytes inside a plane's output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureArtifact {
    /// File the bytes were written to
    pub path: PathBuf,
    /// Index of the originating plane
    pub plane_index: usize,
    /// Sub-plane slot
    pub slot: usize,
    /// Byte offset of this segment in the file
    pub offset: u64,
    /// Segment length in bytes
    pub len: u64,
    /// How the bytes are encoded
    pub encoding: OutputEncoding,
}

/// `<dir>/<base>-<plane_index>.<suffix>`
pub fn artifact_path(dir: &Path, base: &str, plane_index: usize, suffix: &str) -> PathBuf {
    dir.join(format!("{base}-{plane_index}.{suffix}"))
}

/// Output file for one plane
///
/// The file is created on the first write, so a plane that never yields
/// an imported slot leaves nothing behind.
#[derive(Debug)]
pub struct PlaneSink {
    path: PathBuf,
    plane_index: usize,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl PlaneSink {
    /// A sink that will write to `path`
    pub fn new(path: PathBuf, plane_index: usize) -> Self {
        Self {
            path,
            plane_index,
            writer: None,
            written: 0,
        }
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Whether the file has been created
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn sink_error(&self, error: io::Error) -> ScanoutError {
        ScanoutError::OutputSinkUnavailable {
            path: self.path.clone(),
            error,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => {
                let file = File::create(&self.path).map_err(|e| self.sink_error(e))?;
                debug!("Created {}", self.path.display());
                BufWriter::new(file)
            }
        };
        Ok(self.writer.insert(writer))
    }

    fn append<F>(&mut self, slot: usize, encoding: OutputEncoding, write: F) -> Result<CaptureArtifact>
    where
        F: FnOnce(&mut BufWriter<File>) -> io::Result<u64>,
    {
        let offset = self.written;
        let result = write(self.writer()?);
        let len = result.map_err(|e| self.sink_error(e))?;
        self.written += len;

        info!(
            "Wrote {} bytes of plane {} slot {} to {}",
            len,
            self.plane_index,
            slot,
            self.path.display()
        );

        Ok(CaptureArtifact {
            path: self.path.clone(),
            plane_index: self.plane_index,
            slot,
            offset,
            len,
            encoding,
        })
    }

    /// Flush buffered bytes to the file
    pub fn finish(mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| self.sink_error(e))?;
        }
        Ok(())
    }
}

/// Write a sub-plane verbatim, then release its mapping
pub fn extract(buffer: ImportedBuffer, sink: &mut PlaneSink) -> Result<CaptureArtifact> {
    let slot = buffer.slot();
    sink.append(slot, OutputEncoding::Raw, |w| {
        w.write_all(buffer.as_slice())?;
        Ok(buffer.len() as u64)
    })
}

/// Write a packed RGB sub-plane as 24-bit RGB, then release its mapping
pub fn extract_rgb24(
    buffer: ImportedBuffer,
    format: PackedFormat,
    width: u32,
    height: u32,
    pitch: u32,
    sink: &mut PlaneSink,
) -> Result<CaptureArtifact> {
    let slot = buffer.slot();
    sink.append(slot, OutputEncoding::Rgb24, |w| {
        write_rgb24(w, buffer.as_slice(), format, width, height, pitch)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path() {
        let path = artifact_path(Path::new("/tmp/shots"), "screen", 3, "raw");
        assert_eq!(path, PathBuf::from("/tmp/shots/screen-3.raw"));
    }

    #[test]
    fn test_sink_is_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let path = artifact_path(dir.path(), "lazy", 0, "raw");
        let sink = PlaneSink::new(path.clone(), 0);
        assert!(!sink.is_open());
        sink.finish().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_destination() {
        let path = PathBuf::from("/nonexistent/dir/out-0.raw");
        let mut sink = PlaneSink::new(path, 0);
        let err = sink.append(0, OutputEncoding::Raw, |_| Ok(0)).unwrap_err();
        match err {
            ScanoutError::OutputSinkUnavailable { error, .. } => {
                assert_eq!(error.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
