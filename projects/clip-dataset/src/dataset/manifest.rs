// Manifest builder and CSV IO shared by the split and extract stages

use crate::dataset::annotation::parse_annotation_file;
use crate::dataset::types::{ClipRecord, DomainHistogram, MANIFEST_HEADER};
use crate::error::{PrepError, PrepResult};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of building a manifest from an annotation directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManifestSummary {
    pub sources: usize,
    pub missing_filename: usize,
    pub malformed: usize,
    pub dropped_intervals: usize,
    pub clips: usize,
    pub histogram: DomainHistogram,
}

impl fmt::Display for ManifestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Annotation sources: {}", self.sources)?;
        if self.missing_filename > 0 || self.malformed > 0 {
            writeln!(
                f,
                "Skipped sources: {} without <filename>, {} malformed",
                self.missing_filename, self.malformed
            )?;
        }
        if self.dropped_intervals > 0 {
            writeln!(f, "Dropped intervals: {}", self.dropped_intervals)?;
        }
        writeln!(f, "Total clips: {}", self.clips)?;
        if self.clips == 0 {
            return writeln!(f, "Warning: no clips were extracted");
        }
        writeln!(f, "Clips per domain:")?;
        write!(f, "{}", self.histogram)
    }
}

/// Lists every `.xml` file directly under `dir`, sorted by file name.
pub fn discover_annotations(dir: &Path) -> PrepResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PrepError::InputMissing(dir.to_path_buf()));
    }

    let mut sources = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_xml = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase().ends_with(".xml"))
            .unwrap_or(false);
        if is_xml && path.is_file() {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

/// Parses every source in order. Bad sources are logged and counted, never fatal.
pub fn collect_clips(sources: &[PathBuf]) -> (Vec<ClipRecord>, ManifestSummary) {
    let mut records = Vec::new();
    let mut summary = ManifestSummary {
        sources: sources.len(),
        ..Default::default()
    };

    for source in sources {
        match parse_annotation_file(source) {
            Ok(parsed) => {
                tracing::debug!(
                    "{}: {} clips for {} ({})",
                    source.display(),
                    parsed.clips.len(),
                    parsed.video_path,
                    parsed.domain
                );
                summary.dropped_intervals += parsed.dropped_intervals;
                records.extend(parsed.clips);
            }
            Err(e @ PrepError::MissingFilename(_)) => {
                tracing::warn!("{}, skipping", e);
                summary.missing_filename += 1;
            }
            Err(e) => {
                tracing::warn!("{}, skipping", e);
                summary.malformed += 1;
            }
        }
    }

    summary.clips = records.len();
    summary.histogram = DomainHistogram::from_records(&records);
    (records, summary)
}

/// Builds the manifest CSV at `output` from every annotation under `annotations_dir`.
pub fn build_manifest(annotations_dir: &Path, output: &Path) -> PrepResult<ManifestSummary> {
    let sources = discover_annotations(annotations_dir)?;
    tracing::info!(
        "Processing {} annotation files from {}",
        sources.len(),
        annotations_dir.display()
    );

    let (records, summary) = collect_clips(&sources);
    write_manifest(output, &records)?;
    tracing::info!("Wrote {} clips to {}", records.len(), output.display());

    Ok(summary)
}

/// Writes records with the fixed header; zero records produce a header-only file.
pub fn write_manifest(path: &Path, records: &[ClipRecord]) -> PrepResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(MANIFEST_HEADER)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Rows loaded from a manifest or split CSV.
#[derive(Debug, Clone, Default)]
pub struct LoadedManifest {
    pub records: Vec<ClipRecord>,
    /// Rows that failed to deserialize and were skipped
    pub malformed_rows: usize,
}

pub fn read_manifest(path: &Path) -> PrepResult<LoadedManifest> {
    if !path.is_file() {
        return Err(PrepError::InputMissing(path.to_path_buf()));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let mut loaded = LoadedManifest::default();

    for row in reader.deserialize::<ClipRecord>() {
        match row {
            Ok(record) if record.start_frame <= record.end_frame => loaded.records.push(record),
            Ok(record) => {
                tracing::warn!(
                    "{}: {}",
                    path.display(),
                    PrepError::ClipRangeInvalid {
                        start: record.start_frame as i64,
                        end: record.end_frame as i64,
                    }
                );
                loaded.malformed_rows += 1;
            }
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                tracing::warn!(
                    "{}: {}",
                    path.display(),
                    PrepError::ManifestRowMalformed {
                        line,
                        reason: e.to_string(),
                    }
                );
                loaded.malformed_rows += 1;
            }
        }
    }

    Ok(loaded)
}
