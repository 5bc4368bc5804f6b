use crate::config::{ExtractConfig, SeekMode};
use crate::dataset::types::ClipRecord;
use crate::error::PrepError;
use crate::video::resolver::{MatchTier, ResolvedVideo};
use crate::video::{VideoBackend, VideoReader};
use anyhow::{anyhow, Result};
use opencv::core::{Mat, Vector};
use opencv::imgcodecs;
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for decoded frames.
pub trait FrameSink: Send + Sync {
    fn write(&self, path: &Path, frame: &Mat) -> Result<()>;
}

/// Encodes frames with `imwrite`; the format follows the file extension.
pub struct ImageFileSink;

impl FrameSink for ImageFileSink {
    fn write(&self, path: &Path, frame: &Mat) -> Result<()> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Frame path is not valid UTF-8: {}", path.display()))?;
        if !imgcodecs::imwrite(path_str, frame, &Vector::<i32>::new())? {
            return Err(anyhow!("imwrite returned false"));
        }
        Ok(())
    }
}

/// Frame indices sampled from `[start, end]`, with `end` clamped to the last
/// frame of the video.
pub fn frame_targets(start: u64, end: u64, stride: usize, total_frames: u64) -> Vec<u64> {
    if total_frames == 0 || stride == 0 {
        return Vec::new();
    }
    let end = end.min(total_frames - 1);
    (start..=end).step_by(stride).collect()
}

/// `<output_root>/<domain>/<label>/<stem>_<frame:06>.jpg`
pub fn frame_path(output_root: &Path, clip: &ClipRecord, video_stem: &str, frame: u64) -> PathBuf {
    clip_dir(output_root, clip).join(format!("{}_{:06}.jpg", video_stem, frame))
}

fn clip_dir(output_root: &Path, clip: &ClipRecord) -> PathBuf {
    output_root
        .join(clip.domain.as_str())
        .join(clip.action_label.to_lowercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipStatus {
    Extracted(MatchTier),
    Unresolved,
    OpenFailed,
}

/// Result of extracting one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipOutcome {
    /// The manifest's video reference, kept for missing-video diagnostics
    pub hint: String,
    pub status: ClipStatus,
    pub targets: usize,
    pub frames_written: usize,
    pub write_failures: usize,
}

impl ClipOutcome {
    fn failed(clip: &ClipRecord, status: ClipStatus) -> Self {
        Self {
            hint: clip.video_path.clone(),
            status,
            targets: 0,
            frames_written: 0,
            write_failures: 0,
        }
    }
}

/// Samples clip frames at a fixed stride and persists them through a sink.
pub struct FrameExtractor<'a> {
    backend: &'a dyn VideoBackend,
    sink: &'a dyn FrameSink,
    stride: usize,
    seek_mode: SeekMode,
}

impl<'a> FrameExtractor<'a> {
    pub fn new(backend: &'a dyn VideoBackend, sink: &'a dyn FrameSink, config: &ExtractConfig) -> Self {
        Self {
            backend,
            sink,
            stride: config.stride,
            seek_mode: config.seek_mode,
        }
    }

    /// Extracts one clip. Never fails: problems are logged and reflected in
    /// the returned outcome.
    pub fn extract_clip(
        &self,
        clip: &ClipRecord,
        video: Option<&ResolvedVideo>,
        output_root: &Path,
    ) -> ClipOutcome {
        let Some(video) = video else {
            tracing::warn!("{}", PrepError::VideoUnresolved(clip.video_path.clone()));
            return ClipOutcome::failed(clip, ClipStatus::Unresolved);
        };

        let save_dir = clip_dir(output_root, clip);
        if let Err(e) = fs::create_dir_all(&save_dir) {
            // Writes below will fail and be counted per frame
            tracing::warn!("Failed to create {}: {}", save_dir.display(), e);
        }

        // The reader is owned by this call and released when it returns
        let mut reader = match self.backend.open(&video.path) {
            Ok(reader) => reader,
            Err(e) => {
                tracing::warn!(
                    "{}",
                    PrepError::VideoOpenFailed {
                        path: video.path.clone(),
                        reason: e.to_string(),
                    }
                );
                return ClipOutcome::failed(clip, ClipStatus::OpenFailed);
            }
        };

        let total_frames = match reader.frame_count() {
            Ok(count) => count as u64,
            Err(e) => {
                tracing::warn!("Failed to read frame count of {}: {}", video.path.display(), e);
                0
            }
        };
        let targets = frame_targets(clip.start_frame, clip.end_frame, self.stride, total_frames);
        let stem = video.stem();

        let mut outcome = ClipOutcome {
            hint: clip.video_path.clone(),
            status: ClipStatus::Extracted(video.tier),
            targets: targets.len(),
            frames_written: 0,
            write_failures: 0,
        };

        let mut position: Option<u64> = None;
        for &target in &targets {
            let frame = match self.decode_at(reader.as_mut(), target, &mut position) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!(
                        "Stopping {} at frame {}: {}",
                        video.path.display(),
                        target,
                        e
                    );
                    break;
                }
            };

            let path = frame_path(output_root, clip, &stem, target);
            match self.sink.write(&path, &frame) {
                Ok(()) => outcome.frames_written += 1,
                Err(e) => {
                    tracing::warn!(
                        "{}",
                        PrepError::FrameWriteFailed {
                            path,
                            reason: e.to_string(),
                        }
                    );
                    outcome.write_failures += 1;
                }
            }
        }

        outcome
    }

    /// Positions the reader on `target` and decodes it. `position` tracks the
    /// next frame the reader would return, when known.
    fn decode_at(
        &self,
        reader: &mut dyn VideoReader,
        target: u64,
        position: &mut Option<u64>,
    ) -> Result<Mat> {
        match (self.seek_mode, *position) {
            (SeekMode::Sequential, Some(current)) if current <= target => {
                for _ in current..target {
                    reader.grab_frame()?;
                }
            }
            _ => reader.seek_to_frame(target as usize)?,
        }

        let frame = reader.read_frame()?;
        *position = Some(target + 1);
        Ok(frame)
    }
}
