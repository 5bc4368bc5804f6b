use crate::dataset::types::DomainHistogram;
use crate::video::extractor::{ClipOutcome, ClipStatus};
use crate::video::resolver::MatchTier;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Remediation hints printed after the unresolved-video list.
const MISSING_VIDEO_HINTS: [&str; 3] = [
    "Check that each annotation's <filename> matches an actual file name",
    "Add the missing extension (e.g. .mp4) if the file has none",
    "Move or rename the video under the video root so its stem matches",
];

/// Extraction counters for one split.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitTally {
    pub name: String,
    pub clips: usize,
    /// Rows of the split CSV that could not be loaded
    pub malformed_rows: usize,
    pub histogram: DomainHistogram,
    pub frames_targeted: usize,
    pub frames_written: usize,
    pub write_failures: usize,
    pub unresolved_clips: usize,
    pub open_failed_clips: usize,
    /// Clips that resolved and opened but produced no frame
    pub empty_clips: usize,
    /// How resolved clips were matched, keyed by tier
    pub tiers: BTreeMap<MatchTier, usize>,
    #[serde(skip)]
    pub missing_videos: BTreeSet<String>,
}

impl SplitTally {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: ClipOutcome) {
        self.frames_targeted += outcome.targets;
        self.frames_written += outcome.frames_written;
        self.write_failures += outcome.write_failures;

        match outcome.status {
            ClipStatus::Extracted(tier) => {
                *self.tiers.entry(tier).or_insert(0) += 1;
                if outcome.frames_written == 0 {
                    self.empty_clips += 1;
                }
            }
            ClipStatus::Unresolved => {
                self.unresolved_clips += 1;
                self.missing_videos.insert(outcome.hint);
            }
            ClipStatus::OpenFailed => {
                self.open_failed_clips += 1;
                self.missing_videos.insert(outcome.hint);
            }
        }
    }
}

impl fmt::Display for SplitTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} clips, {} frames written",
            self.name, self.clips, self.frames_written
        )?;
        if self.write_failures > 0 {
            writeln!(f, "  frame write failures: {}", self.write_failures)?;
        }
        if self.unresolved_clips + self.open_failed_clips > 0 {
            writeln!(
                f,
                "  clips without video: {} unresolved, {} failed to open",
                self.unresolved_clips, self.open_failed_clips
            )?;
        }
        if self.empty_clips > 0 {
            writeln!(f, "  clips with no frames in range: {}", self.empty_clips)?;
        }
        if self.malformed_rows > 0 {
            writeln!(f, "  malformed rows skipped: {}", self.malformed_rows)?;
        }
        Ok(())
    }
}

/// End-of-run extraction result across all splits.
#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub splits: Vec<SplitTally>,
    /// Split CSVs that did not exist
    pub skipped_splits: Vec<String>,
    /// Distinct hints that never produced a decodable video, sorted
    pub missing_videos: BTreeSet<String>,
    pub max_reported_missing: usize,
}

impl ExtractionSummary {
    pub fn push(&mut self, tally: SplitTally) {
        self.missing_videos
            .extend(tally.missing_videos.iter().cloned());
        self.splits.push(tally);
    }

    pub fn total_frames(&self) -> usize {
        self.splits.iter().map(|s| s.frames_written).sum()
    }
}

impl fmt::Display for ExtractionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for split in &self.splits {
            write!(f, "{}", split)?;
        }
        for name in &self.skipped_splits {
            writeln!(f, "{}: skipped (CSV not found)", name)?;
        }
        writeln!(f, "Total frames written: {}", self.total_frames())?;

        if self.missing_videos.is_empty() {
            return writeln!(f, "All referenced videos were found");
        }

        writeln!(
            f,
            "Warning: {} videos could not be found or opened:",
            self.missing_videos.len()
        )?;
        for hint in self.missing_videos.iter().take(self.max_reported_missing) {
            writeln!(f, "  -> {}", hint)?;
        }
        if self.missing_videos.len() > self.max_reported_missing {
            writeln!(
                f,
                "  ... and {} more",
                self.missing_videos.len() - self.max_reported_missing
            )?;
        }
        writeln!(f, "How to fix:")?;
        for (i, hint) in MISSING_VIDEO_HINTS.iter().enumerate() {
            writeln!(f, "  {}. {}", i + 1, hint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(hint: &str, status: ClipStatus, written: usize) -> ClipOutcome {
        ClipOutcome {
            hint: hint.to_string(),
            status,
            targets: 4,
            frames_written: written,
            write_failures: 4 - written.min(4),
        }
    }

    #[test]
    fn test_tally_records_outcomes() {
        let mut tally = SplitTally::new("train");
        tally.record(outcome("a.mp4", ClipStatus::Extracted(MatchTier::ExactPath), 4));
        tally.record(outcome("b.mp4", ClipStatus::Extracted(MatchTier::FuzzySimilarity), 0));
        tally.record(outcome("c.mp4", ClipStatus::Unresolved, 0));
        tally.record(outcome("c.mp4", ClipStatus::Unresolved, 0));
        tally.record(outcome("d.mp4", ClipStatus::OpenFailed, 0));

        assert_eq!(tally.frames_written, 4);
        assert_eq!(tally.empty_clips, 1);
        assert_eq!(tally.unresolved_clips, 2);
        assert_eq!(tally.open_failed_clips, 1);
        assert_eq!(tally.tiers.get(&MatchTier::ExactPath), Some(&1));
        assert_eq!(tally.tiers.get(&MatchTier::FuzzySimilarity), Some(&1));
        // Deduplicated per hint
        assert_eq!(tally.missing_videos.len(), 2);
    }

    #[test]
    fn test_tiers_serialize_by_name() {
        let mut tally = SplitTally::new("train");
        tally.record(outcome("a.mp4", ClipStatus::Extracted(MatchTier::CleanedSubstring), 4));
        tally.record(outcome("b.mp4", ClipStatus::Extracted(MatchTier::ExactPath), 4));

        let json = serde_json::to_value(&tally).unwrap();
        assert_eq!(json["tiers"]["cleaned_substring"], 1);
        assert_eq!(json["tiers"]["exact_path"], 1);
        assert!(json.get("missing_videos").is_none());
    }

    #[test]
    fn test_summary_caps_missing_list() {
        let mut summary = ExtractionSummary {
            max_reported_missing: 2,
            ..Default::default()
        };
        let mut tally = SplitTally::new("val");
        for hint in ["z.mp4", "a.mp4", "m.mp4"] {
            tally.record(outcome(hint, ClipStatus::Unresolved, 0));
        }
        summary.push(tally);

        let text = summary.to_string();
        assert!(text.contains("3 videos could not be found"));
        assert!(text.contains("-> a.mp4"));
        assert!(text.contains("-> m.mp4"));
        assert!(!text.contains("-> z.mp4"));
        assert!(text.contains("... and 1 more"));
        assert!(text.contains("How to fix"));
    }

    #[test]
    fn test_summary_without_missing_videos() {
        let mut summary = ExtractionSummary::default();
        let mut tally = SplitTally::new("test");
        tally.record(outcome("a.mp4", ClipStatus::Extracted(MatchTier::ExactStem), 3));
        summary.push(tally);
        assert_eq!(summary.total_frames(), 3);
        assert!(summary.to_string().contains("All referenced videos were found"));
    }
}
