use crate::error::{PrepError, PrepResult};
use crate::video::resolver::SIMILARITY_THRESHOLD;
use std::path::PathBuf;

/// Names of the three split files written next to the manifest.
pub const SPLIT_NAMES: [&str; 3] = ["train", "val", "test"];

/// Where each stage reads from and writes to.
#[derive(Clone, Debug)]
pub struct PathsConfig {
    pub annotations_dir: PathBuf,
    pub manifest_path: PathBuf,
    /// Directory holding train.csv, val.csv and test.csv
    pub splits_dir: PathBuf,
    pub video_root: PathBuf,
    /// Frames land in `<frames_root>/<split>/<domain>/<label>/`
    pub frames_root: PathBuf,
}

impl PathsConfig {
    pub fn split_csv(&self, split: &str) -> PathBuf {
        self.splits_dir.join(format!("{}.csv", split))
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            annotations_dir: PathBuf::from("./data/annotations_xml"),
            manifest_path: PathBuf::from("./data/manifests/violence_clips_manifest.csv"),
            splits_dir: PathBuf::from("./data/manifests"),
            video_root: PathBuf::from("./data/videos"),
            frames_root: PathBuf::from("./data/frames"),
        }
    }
}

/// Ratios and seed for the stratified splitter
#[derive(Clone, Debug)]
pub struct SplitConfig {
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub test_ratio: f64,
    pub seed: u64,
}

impl SplitConfig {
    /// Fraction of the input held out from train (val + test).
    pub fn holdout_fraction(&self) -> f64 {
        let total = self.train_ratio + self.val_ratio + self.test_ratio;
        (self.val_ratio + self.test_ratio) / total
    }

    /// Fraction of the holdout that goes to test.
    pub fn test_fraction_of_holdout(&self) -> f64 {
        self.test_ratio / (self.val_ratio + self.test_ratio)
    }

    pub fn validate(&self) -> PrepResult<()> {
        let ratios = [self.train_ratio, self.val_ratio, self.test_ratio];
        if ratios.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(PrepError::ConfigInvalid(format!(
                "split ratios must be positive, got {:?}",
                ratios
            )));
        }
        Ok(())
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.70,
            val_ratio: 0.15,
            test_ratio: 0.15,
            seed: 42,
        }
    }
}

/// How the extractor reaches each target frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SeekMode {
    /// Seek the decoder directly to every target index
    Seek,
    /// Seek once to the clip start, then grab and discard intermediate frames
    Sequential,
}

#[derive(Clone, Debug)]
pub struct ExtractConfig {
    /// Distance between sampled frames
    pub stride: usize,
    pub seek_mode: SeekMode,
    /// Number of extraction workers; 1 runs inline
    pub workers: usize,
    /// How many unresolved hints the summary lists
    pub max_reported_missing: usize,
    /// Minimum similarity ratio the fuzzy resolver tier must exceed
    pub similarity_threshold: f64,
}

impl ExtractConfig {
    pub fn validate(&self) -> PrepResult<()> {
        if self.stride == 0 {
            return Err(PrepError::ConfigInvalid("stride must be at least 1".into()));
        }
        if self.workers == 0 {
            return Err(PrepError::ConfigInvalid("workers must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(PrepError::ConfigInvalid(format!(
                "similarity threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            stride: 3,
            seek_mode: SeekMode::Seek,
            workers: 1,
            max_reported_missing: 10,
            similarity_threshold: SIMILARITY_THRESHOLD,
        }
    }
}

/// Full configuration handed to each stage.
#[derive(Clone, Debug, Default)]
pub struct PrepConfig {
    pub paths: PathsConfig,
    pub split: SplitConfig,
    pub extract: ExtractConfig,
}

impl PrepConfig {
    pub fn validate(&self) -> PrepResult<()> {
        self.split.validate()?;
        self.extract.validate()
    }
}
