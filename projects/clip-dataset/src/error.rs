// Error taxonomy for the preparation stages

use std::path::PathBuf;
use thiserror::Error;

/// Result type for stage-level operations.
pub type PrepResult<T> = Result<T, PrepError>;

/// Errors raised while preparing the dataset.
///
/// Per-source, per-clip and per-frame variants are recoverable: they are
/// logged and counted in the stage summary, never returned from a stage.
/// `ManifestEmpty`, `InputMissing` and `ConfigInvalid` abort the stage.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error("annotation {path} is malformed: {reason}")]
    AnnotationMalformed { path: PathBuf, reason: String },

    #[error("annotation {0} has no <filename>")]
    MissingFilename(PathBuf),

    #[error("invalid clip range [{start}, {end}]")]
    ClipRangeInvalid { start: i64, end: i64 },

    #[error("manifest row {line} is malformed: {reason}")]
    ManifestRowMalformed { line: u64, reason: String },

    #[error("no video file matches hint {0}")]
    VideoUnresolved(String),

    #[error("failed to open video {path}: {reason}")]
    VideoOpenFailed { path: PathBuf, reason: String },

    #[error("failed to write frame {path}: {reason}")]
    FrameWriteFailed { path: PathBuf, reason: String },

    #[error("manifest has no clips with a valid domain")]
    ManifestEmpty,

    #[error("required input not found: {0}")]
    InputMissing(PathBuf),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline stage, used to pick the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Manifest,
    Split,
    Extract,
}

impl Stage {
    pub fn exit_code(self) -> i32 {
        match self {
            Stage::Manifest => 2,
            Stage::Split => 3,
            Stage::Extract => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Manifest => "manifest",
            Stage::Split => "split",
            Stage::Extract => "extract",
        }
    }
}

/// Exit code for configuration and usage errors.
pub const EXIT_CONFIG: i32 = 1;
