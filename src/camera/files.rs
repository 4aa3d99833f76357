use super::{Frame, FrameSource};
use crate::error::{EyeScanError, Result};
use std::path::PathBuf;

/// Frame source backed by still image files.
///
/// Stands in for a live camera when scans come from disk (CLI usage,
/// enrollment from photos). When the session wants more frames than there
/// are files, the list cycles, so a single photo can feed a full
/// multi-sample capture.
pub struct ImageFileSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageFileSource {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(EyeScanError::InvalidScan(
                "At least one frame image is required".into(),
            ));
        }
        Ok(Self { paths, next: 0 })
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> Result<Frame> {
        let path = &self.paths[self.next % self.paths.len()];
        self.next += 1;

        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();
        Ok(Frame::new(width, height, image.into_raw()))
    }
}
