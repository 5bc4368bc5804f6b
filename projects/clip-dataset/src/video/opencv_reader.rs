use super::{VideoBackend, VideoReader};
use anyhow::{anyhow, Result};
use opencv::{
    core::{Mat, Vector},
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_HW_ACCELERATION,
        CAP_PROP_POS_FRAMES, VIDEO_ACCELERATION_ANY,
    },
};
use std::path::Path;

pub struct OpencvReader {
    capture: VideoCapture,
    total_frames: usize,
}

/// Open parameters requesting hardware decoding where the platform offers it.
/// OpenCV only honours acceleration when it is passed at open time.
fn open_params() -> Vector<i32> {
    Vector::from_slice(&[CAP_PROP_HW_ACCELERATION, VIDEO_ACCELERATION_ANY])
}

impl OpencvReader {
    pub fn new(path: &str) -> Result<Self> {
        let capture = match VideoCapture::from_file_with_params(path, CAP_ANY, &open_params()) {
            Ok(capture) if capture.is_opened()? => capture,
            _ => {
                tracing::debug!("OpencvReader: hardware decoding unavailable for {}", path);
                VideoCapture::from_file(path, CAP_ANY)?
            }
        };
        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open video file: {}", path));
        }

        let fps = capture.get(CAP_PROP_FPS)?;
        let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?;
        let total_frames = if raw_count > 0.0 { raw_count as usize } else { 0 };

        tracing::debug!(
            "OpencvReader: opened {}, fps={:.2}, stream_frames={}",
            path,
            fps,
            total_frames
        );

        Ok(Self {
            capture,
            total_frames,
        })
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> Result<usize> {
        Ok(self.total_frames)
    }

    fn seek_to_frame(&mut self, frame_num: usize) -> Result<()> {
        if !self.capture.set(CAP_PROP_POS_FRAMES, frame_num as f64)? {
            return Err(anyhow!("Failed to seek to frame {}", frame_num));
        }
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Mat> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Err(anyhow!("Failed to read frame"));
        }

        Ok(frame)
    }

    fn grab_frame(&mut self) -> Result<()> {
        if !self.capture.grab()? {
            return Err(anyhow!("Failed to grab frame"));
        }
        Ok(())
    }
}

impl Drop for OpencvReader {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            tracing::warn!("OpencvReader: failed to release capture: {}", e);
        }
    }
}

/// Decodes through OpenCV's `VideoCapture`.
pub struct OpencvBackend;

impl VideoBackend for OpencvBackend {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoReader>> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Video path is not valid UTF-8: {}", path.display()))?;
        Ok(Box::new(OpencvReader::new(path_str)?))
    }
}
