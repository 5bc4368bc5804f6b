// Manifest row and domain definitions shared by every stage

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Header written at the top of the manifest and every split CSV.
pub const MANIFEST_HEADER: [&str; 5] = [
    "video_path",
    "start_frame",
    "end_frame",
    "action_label",
    "domain",
];

/// Recording context of a video. Variants are ordered by name so histograms
/// print alphabetically.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Domain {
    Croki,
    Day,
    Night,
    Unknown,
}

impl Domain {
    /// Domains that may enter a training split.
    pub const VALID: [Domain; 3] = [Domain::Day, Domain::Night, Domain::Croki];

    /// Parses a valid domain tag. `unknown` and anything else return `None`.
    pub fn parse_valid(tag: &str) -> Option<Self> {
        match tag {
            "day" => Some(Domain::Day),
            "night" => Some(Domain::Night),
            "croki" => Some(Domain::Croki),
            _ => None,
        }
    }

    pub fn is_valid(self) -> bool {
        Domain::VALID.contains(&self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Croki => "croki",
            Domain::Day => "day",
            Domain::Night => "night",
            Domain::Unknown => "unknown",
        }
    }
}

impl From<String> for Domain {
    fn from(value: String) -> Self {
        Domain::parse_valid(value.trim().to_lowercase().as_str()).unwrap_or(Domain::Unknown)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labeled frame interval of one video.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ClipRecord {
    pub video_path: String,
    pub start_frame: u64,
    pub end_frame: u64,
    pub action_label: String,
    pub domain: Domain,
}

/// Clip counts per domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainHistogram(BTreeMap<Domain, usize>);

impl DomainHistogram {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ClipRecord>) -> Self {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.domain).or_insert(0) += 1;
        }
        Self(counts)
    }

    pub fn get(&self, domain: Domain) -> usize {
        self.0.get(&domain).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Domain, usize)> + '_ {
        self.0.iter().map(|(d, c)| (*d, *c))
    }
}

impl fmt::Display for DomainHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "  (no clips)");
        }
        for (domain, count) in self.iter() {
            writeln!(f, "  - {}: {}", domain, count)?;
        }
        Ok(())
    }
}
