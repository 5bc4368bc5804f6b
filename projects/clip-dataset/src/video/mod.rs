pub mod extractor;
pub mod opencv_reader;
pub mod resolver;
pub mod similarity;

use anyhow::Result;
use opencv::core::Mat;
use std::path::Path;

/// Random-access frame source for one open video.
pub trait VideoReader: Send {
    fn frame_count(&self) -> Result<usize>;
    fn seek_to_frame(&mut self, frame_num: usize) -> Result<()>;
    /// Decodes the frame at the current position and advances past it.
    fn read_frame(&mut self) -> Result<Mat>;
    /// Advances past the current frame without decoding it into a `Mat`.
    fn grab_frame(&mut self) -> Result<()>;
}

/// Opens readers for resolved video files. Shared by extraction workers.
pub trait VideoBackend: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>>;
}
