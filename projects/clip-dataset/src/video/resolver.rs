// Video resolver: maps a manifest's logical video reference to a file on disk
//
// Tiers are tried in order and the first hit wins:
//   1. exact path under the root
//   2. exact file stem
//   3. stem with season/time-of-day suffixes removed, as a substring
//   4. best similarity ratio, accepted only above the threshold

use crate::error::{PrepError, PrepResult};
use crate::video::similarity::similarity_ratio;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions indexed as videos (compared case-insensitively).
pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Removed from the hint stem, in this order, before substring matching.
pub const STRIPPED_SUFFIXES: [&str; 6] = ["_spring", "_summer", "_fall", "_winter", "_day", "_night"];

/// The fuzzy tier accepts a candidate only if its ratio is strictly above this.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// How a hint was matched, most confident first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExactPath,
    ExactStem,
    CleanedSubstring,
    FuzzySimilarity,
}

impl MatchTier {
    /// Resolution order.
    pub const ORDER: [MatchTier; 4] = [
        MatchTier::ExactPath,
        MatchTier::ExactStem,
        MatchTier::CleanedSubstring,
        MatchTier::FuzzySimilarity,
    ];

    fn find(self, hint: &VideoHint, index: &VideoIndex, threshold: f64) -> Option<PathBuf> {
        match self {
            MatchTier::ExactPath => match_exact_path(hint, index),
            MatchTier::ExactStem => match_exact_stem(hint, index),
            MatchTier::CleanedSubstring => match_cleaned_substring(hint, index),
            MatchTier::FuzzySimilarity => match_fuzzy(hint, index, threshold),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedVideo {
    pub path: PathBuf,
    pub tier: MatchTier,
}

impl ResolvedVideo {
    /// File stem of the resolved file, used to name extracted frames.
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }
}

/// A manifest video reference, slash-normalized.
#[derive(Debug, Clone)]
pub struct VideoHint {
    pub normalized: String,
    pub stem: String,
}

impl VideoHint {
    pub fn new(raw: &str) -> Self {
        let normalized = raw.trim().replace('\\', "/");
        let stem = file_stem(Path::new(&normalized));
        Self { normalized, stem }
    }

    /// Stem with every known season and time-of-day suffix removed.
    pub fn cleaned_stem(&self) -> String {
        let mut cleaned = self.stem.clone();
        for suffix in STRIPPED_SUFFIXES {
            cleaned = cleaned.replace(suffix, "");
        }
        cleaned.trim_matches('_').to_string()
    }
}

#[derive(Debug, Clone)]
struct IndexedVideo {
    path: PathBuf,
    stem: String,
}

/// Every video file under a root directory, at any depth, sorted by path.
#[derive(Debug, Clone)]
pub struct VideoIndex {
    root: PathBuf,
    videos: Vec<IndexedVideo>,
}

impl VideoIndex {
    pub fn build(root: &Path) -> PrepResult<Self> {
        if !root.is_dir() {
            return Err(PrepError::InputMissing(root.to_path_buf()));
        }
        let root = fs::canonicalize(root)?;

        let mut videos: Vec<IndexedVideo> = WalkDir::new(&root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| is_video_file(e.path()))
            .map(|e| IndexedVideo {
                stem: file_stem(e.path()),
                path: e.into_path(),
            })
            .collect();
        videos.sort_by(|a, b| a.path.cmp(&b.path));

        let index = Self { root, videos };
        tracing::info!("Indexed {} videos under {}", index.len(), index.root.display());
        Ok(index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

/// Resolves hints against a prebuilt index. Read-only once built, so it can be
/// shared between extraction workers.
#[derive(Debug, Clone)]
pub struct VideoResolver {
    index: VideoIndex,
    threshold: f64,
}

impl VideoResolver {
    pub fn new(index: VideoIndex, threshold: f64) -> Self {
        Self { index, threshold }
    }

    pub fn index(&self) -> &VideoIndex {
        &self.index
    }

    pub fn resolve(&self, hint: &str) -> Option<ResolvedVideo> {
        if self.index.is_empty() {
            return None;
        }

        let hint = VideoHint::new(hint);
        MatchTier::ORDER.into_iter().find_map(|tier| {
            tier.find(&hint, &self.index, self.threshold)
                .map(|path| ResolvedVideo { path, tier })
        })
    }
}

fn match_exact_path(hint: &VideoHint, index: &VideoIndex) -> Option<PathBuf> {
    if hint.normalized.is_empty() {
        return None;
    }
    let candidate = index.root.join(&hint.normalized);
    candidate.is_file().then_some(candidate)
}

fn match_exact_stem(hint: &VideoHint, index: &VideoIndex) -> Option<PathBuf> {
    index
        .videos
        .iter()
        .find(|v| v.stem == hint.stem)
        .map(|v| v.path.clone())
}

fn match_cleaned_substring(hint: &VideoHint, index: &VideoIndex) -> Option<PathBuf> {
    let cleaned = hint.cleaned_stem();
    // An empty needle would match every file
    if cleaned.is_empty() {
        return None;
    }
    index
        .videos
        .iter()
        .find(|v| v.stem.contains(&cleaned))
        .map(|v| v.path.clone())
}

fn match_fuzzy(hint: &VideoHint, index: &VideoIndex, threshold: f64) -> Option<PathBuf> {
    let mut best: Option<(&IndexedVideo, f64)> = None;
    for video in &index.videos {
        let ratio = similarity_ratio(&hint.stem, &video.stem);
        if best.map_or(ratio > 0.0, |(_, r)| ratio > r) {
            best = Some((video, ratio));
        }
    }

    match best {
        Some((video, ratio)) if ratio > threshold => {
            tracing::warn!(
                "Fuzzy match: {} -> {} (similarity {:.2})",
                hint.normalized,
                video.path.display(),
                ratio
            );
            Some(video.path.clone())
        }
        best => {
            tracing::info!(
                "No match for {} (best similarity {:.2})",
                hint.normalized,
                best.map(|(_, r)| r).unwrap_or(0.0)
            );
            None
        }
    }
}

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
