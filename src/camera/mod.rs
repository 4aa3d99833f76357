mod files;
mod synthetic;

pub use files::ImageFileSource;
pub use synthetic::SyntheticSource;

use crate::error::Result;

/// One captured frame as a tightly packed RGBA8 buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Anything that can hand the capture session its next frame.
///
/// A source owns whatever device or file handle backs it; dropping the
/// source releases it. Sources are polled strictly sequentially, one
/// capture session at a time.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame>;
}
