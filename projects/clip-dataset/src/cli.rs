use crate::config::{ExtractConfig, PathsConfig, PrepConfig, SeekMode, SplitConfig};
use crate::video::resolver::SIMILARITY_THRESHOLD;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Directory of per-video XML annotations
    #[arg(
        long,
        global = true,
        env = "CLIP_DATASET_ANNOTATIONS_DIR",
        default_value = "./data/annotations_xml"
    )]
    pub annotations_dir: PathBuf,

    /// Manifest CSV written by `manifest` and read by `split`
    #[arg(
        long,
        global = true,
        env = "CLIP_DATASET_MANIFEST",
        default_value = "./data/manifests/violence_clips_manifest.csv"
    )]
    pub manifest: PathBuf,

    /// Directory for train.csv, val.csv and test.csv
    #[arg(
        long,
        global = true,
        env = "CLIP_DATASET_SPLITS_DIR",
        default_value = "./data/manifests"
    )]
    pub splits_dir: PathBuf,

    /// Root directory searched recursively for video files
    #[arg(
        long,
        global = true,
        env = "CLIP_DATASET_VIDEO_ROOT",
        default_value = "./data/videos"
    )]
    pub video_root: PathBuf,

    /// Root directory for extracted frames
    #[arg(
        long,
        global = true,
        env = "CLIP_DATASET_FRAMES_ROOT",
        default_value = "./data/frames"
    )]
    pub frames_root: PathBuf,

    #[arg(long, global = true, default_value_t = 0.70)]
    pub train_ratio: f64,

    #[arg(long, global = true, default_value_t = 0.15)]
    pub val_ratio: f64,

    #[arg(long, global = true, default_value_t = 0.15)]
    pub test_ratio: f64,

    /// Seed for the stratified shuffles
    #[arg(long, global = true, env = "CLIP_DATASET_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Sample every Nth frame of a clip
    #[arg(long, global = true, env = "CLIP_DATASET_STRIDE", default_value_t = 3)]
    pub stride: usize,

    #[arg(long, global = true, value_enum, default_value_t = SeekMode::Seek)]
    pub seek_mode: SeekMode,

    /// Parallel extraction workers
    #[arg(long, global = true, env = "CLIP_DATASET_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Unresolved videos listed in the extraction summary
    #[arg(long, global = true, default_value_t = 10)]
    pub max_reported_missing: usize,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Build the clip manifest from XML annotations
    Manifest,
    /// Split the manifest into stratified train/val/test CSVs
    Split,
    /// Extract sampled frames for every split
    Extract,
    /// Run manifest, split and extract in order
    RunAll,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn to_config(&self) -> PrepConfig {
        PrepConfig {
            paths: PathsConfig {
                annotations_dir: self.annotations_dir.clone(),
                manifest_path: self.manifest.clone(),
                splits_dir: self.splits_dir.clone(),
                video_root: self.video_root.clone(),
                frames_root: self.frames_root.clone(),
            },
            split: SplitConfig {
                train_ratio: self.train_ratio,
                val_ratio: self.val_ratio,
                test_ratio: self.test_ratio,
                seed: self.seed,
            },
            extract: ExtractConfig {
                stride: self.stride,
                seek_mode: self.seek_mode,
                workers: self.workers,
                max_reported_missing: self.max_reported_missing,
                similarity_threshold: SIMILARITY_THRESHOLD,
            },
        }
    }
}
