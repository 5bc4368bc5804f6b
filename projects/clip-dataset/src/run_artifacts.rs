// Run artifact written next to the extracted frames
//
// extraction_report.json records what an extraction run produced so later
// runs (or the detector's training scripts) can check coverage without
// parsing logs.

use crate::error::PrepResult;
use crate::pipeline::types::{ExtractionSummary, SplitTally};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "extraction_report.json";

#[derive(Serialize, Debug, Clone)]
pub struct ExtractionReport {
    pub created_at: DateTime<Utc>,
    pub video_root: PathBuf,
    pub frames_root: PathBuf,
    pub stride: usize,
    pub total_frames: usize,
    pub splits: Vec<SplitTally>,
    pub skipped_splits: Vec<String>,
    pub missing_videos: Vec<String>,
}

impl ExtractionReport {
    pub fn new(
        summary: &ExtractionSummary,
        video_root: &Path,
        frames_root: &Path,
        stride: usize,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            video_root: video_root.to_path_buf(),
            frames_root: frames_root.to_path_buf(),
            stride,
            total_frames: summary.total_frames(),
            splits: summary.splits.clone(),
            skipped_splits: summary.skipped_splits.clone(),
            missing_videos: summary.missing_videos.iter().cloned().collect(),
        }
    }

    /// Writes the report into `frames_root`, returning its path.
    pub fn write(&self) -> PrepResult<PathBuf> {
        fs::create_dir_all(&self.frames_root)?;
        let path = self.frames_root.join(REPORT_FILE_NAME);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(path)
    }
}
