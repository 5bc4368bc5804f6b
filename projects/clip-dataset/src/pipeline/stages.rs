// Stage entry points: manifest -> split -> extract
//
// Each stage reads its inputs from the paths in `PrepConfig`, returns a
// summary on success and a `PrepError` when the stage as a whole cannot run.

use crate::config::{PrepConfig, SPLIT_NAMES};
use crate::dataset::manifest::{build_manifest, read_manifest, write_manifest, ManifestSummary};
use crate::dataset::split::{filter_valid_domains, split_manifest, DatasetSplit, SplitSummary};
use crate::dataset::types::DomainHistogram;
use crate::error::{PrepError, PrepResult};
use crate::pipeline::orchestrator::{extract_split, progress_bar, ExtractionContext};
use crate::pipeline::types::ExtractionSummary;
use crate::run_artifacts::ExtractionReport;
use crate::video::extractor::FrameSink;
use crate::video::resolver::{VideoIndex, VideoResolver};
use crate::video::VideoBackend;
use std::fs;
use std::path::PathBuf;

pub fn run_manifest(config: &PrepConfig) -> PrepResult<ManifestSummary> {
    build_manifest(&config.paths.annotations_dir, &config.paths.manifest_path)
}

pub fn run_split(config: &PrepConfig) -> PrepResult<SplitSummary> {
    let manifest = &config.paths.manifest_path;
    tracing::info!("Loading manifest {}", manifest.display());
    let loaded = read_manifest(manifest)?;
    if loaded.malformed_rows > 0 {
        tracing::warn!("Skipped {} malformed manifest rows", loaded.malformed_rows);
    }

    let (records, dropped_unknown) = filter_valid_domains(loaded.records);
    if dropped_unknown > 0 {
        tracing::warn!("Excluding {} clips with an unknown domain", dropped_unknown);
    }

    let split = split_manifest(records.clone(), &config.split)?;
    tracing::info!("Split {} clips into {:?}", split.len(), SPLIT_NAMES);

    write_split_files(config, &split)?;
    Ok(SplitSummary::new(&records, dropped_unknown, &split))
}

/// Writes all three split CSVs to staging files first and only replaces the
/// previous outputs once every write has succeeded.
fn write_split_files(config: &PrepConfig, split: &DatasetSplit) -> PrepResult<()> {
    fs::create_dir_all(&config.paths.splits_dir)?;

    let mut staged: Vec<(PathBuf, PathBuf, usize)> = Vec::new();
    for (name, part) in split.parts() {
        let path = config.paths.split_csv(name);
        let staging = path.with_extension("csv.tmp");
        if let Err(e) = write_manifest(&staging, part) {
            for (staging, _, _) in &staged {
                let _ = fs::remove_file(staging);
            }
            return Err(e);
        }
        staged.push((staging, path, part.len()));
    }

    for (staging, path, clips) in staged {
        fs::rename(&staging, &path)?;
        tracing::info!("Wrote {} clips to {}", clips, path.display());
    }
    Ok(())
}

pub fn run_extract(
    config: &PrepConfig,
    backend: &dyn VideoBackend,
    sink: &dyn FrameSink,
) -> PrepResult<ExtractionSummary> {
    let paths = &config.paths;
    let index = VideoIndex::build(&paths.video_root)?;
    let resolver = VideoResolver::new(index, config.extract.similarity_threshold);
    let ctx = ExtractionContext {
        resolver: &resolver,
        backend,
        sink,
        config: &config.extract,
    };

    let mut summary = ExtractionSummary {
        max_reported_missing: config.extract.max_reported_missing,
        ..Default::default()
    };

    for name in SPLIT_NAMES {
        let csv_path = paths.split_csv(name);
        let loaded = match read_manifest(&csv_path) {
            Ok(loaded) => loaded,
            Err(PrepError::InputMissing(path)) => {
                tracing::warn!("Split CSV not found, skipping: {}", path.display());
                summary.skipped_splits.push(name.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        let output_root = paths.frames_root.join(name);
        fs::create_dir_all(&output_root)?;

        let histogram = DomainHistogram::from_records(&loaded.records);
        println!("{}: {} clips", csv_path.display(), loaded.records.len());
        print!("{}", histogram);

        let pb = progress_bar(loaded.records.len(), name);
        let mut tally = extract_split(&ctx, name, &loaded.records, &output_root, &pb);
        pb.finish_with_message(format!("{} done", name));

        tally.malformed_rows = loaded.malformed_rows;
        tally.histogram = histogram;
        tracing::info!("{}: {} frames written", name, tally.frames_written);
        summary.push(tally);
    }

    if summary.splits.is_empty() {
        return Err(PrepError::InputMissing(paths.splits_dir.clone()));
    }

    let report = ExtractionReport::new(
        &summary,
        resolver.index().root(),
        &paths.frames_root,
        config.extract.stride,
    );
    let report_path = report.write()?;
    tracing::info!("Wrote extraction report to {}", report_path.display());

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::dataset::types::Domain;
    use crate::video::VideoReader;
    use anyhow::Result;
    use opencv::core::Mat;
    use std::path::Path;
    use std::sync::Mutex;

    struct StubReader {
        total: usize,
        pos: usize,
    }

    impl VideoReader for StubReader {
        fn frame_count(&self) -> Result<usize> {
            Ok(self.total)
        }

        fn seek_to_frame(&mut self, frame_num: usize) -> Result<()> {
            self.pos = frame_num;
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Mat> {
            self.pos += 1;
            Ok(Mat::default())
        }

        fn grab_frame(&mut self) -> Result<()> {
            self.pos += 1;
            Ok(())
        }
    }

    struct StubBackend;

    impl VideoBackend for StubBackend {
        fn open(&self, _path: &Path) -> Result<Box<dyn VideoReader>> {
            Ok(Box::new(StubReader { total: 100, pos: 0 }))
        }
    }

    /// Writes empty files so the output layout can be inspected on disk.
    struct TouchSink(Mutex<usize>);

    impl FrameSink for TouchSink {
        fn write(&self, path: &Path, _frame: &Mat) -> Result<()> {
            fs::write(path, b"")?;
            *self.0.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn config_in(root: &Path) -> PrepConfig {
        PrepConfig {
            paths: PathsConfig {
                annotations_dir: root.join("annotations_xml"),
                manifest_path: root.join("manifests/manifest.csv"),
                splits_dir: root.join("manifests"),
                video_root: root.join("videos"),
                frames_root: root.join("frames"),
            },
            ..PrepConfig::default()
        }
    }

    fn write_annotations(root: &Path) {
        let dir = root.join("annotations_xml");
        fs::create_dir_all(&dir).unwrap();
        for (i, domain) in ["day", "night", "croki"].iter().enumerate() {
            for n in 0..10 {
                // The last video of every domain has no file on disk
                let stem = if n == 9 {
                    format!("unlisted_{i}")
                } else {
                    format!("video_{i}_{n}")
                };
                let xml = format!(
                    "<annotation><filename>{domain}/{stem}.mp4</filename>\
                     <object><action><actionname>Assault</actionname>\
                     <frame><start>0</start><end>5</end></frame>\
                     </action></object></annotation>"
                );
                fs::write(dir.join(format!("{}_{}.xml", domain, n)), xml).unwrap();
            }
        }
        fs::write(
            dir.join("zz_unknown.xml"),
            "<annotation><filename>misc.mp4</filename><object><action>\
             <actionname>push</actionname><frame><start>0</start><end>2</end></frame>\
             </action></object></annotation>",
        )
        .unwrap();
    }

    fn write_videos(root: &Path) {
        for (i, domain) in ["day", "night", "croki"].iter().enumerate() {
            let dir = root.join("videos").join(domain);
            fs::create_dir_all(&dir).unwrap();
            for n in 0..9 {
                fs::write(dir.join(format!("video_{}_{}.mp4", i, n)), b"").unwrap();
            }
        }
    }

    #[test]
    fn test_full_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_annotations(root);
        write_videos(root);
        let config = config_in(root);

        let manifest = run_manifest(&config).unwrap();
        assert_eq!(manifest.sources, 31);
        assert_eq!(manifest.clips, 31);
        assert_eq!(manifest.histogram.get(Domain::Unknown), 1);

        let split = run_split(&config).unwrap();
        assert_eq!(split.dropped_unknown, 1);
        let sizes: Vec<usize> = split.partitions.iter().map(|p| p.clips).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 30);
        assert_eq!(sizes[0], 21);
        for name in SPLIT_NAMES {
            assert!(config.paths.split_csv(name).is_file());
        }

        let sink = TouchSink(Mutex::new(0));
        let summary = run_extract(&config, &StubBackend, &sink).unwrap();
        assert_eq!(summary.splits.len(), 3);
        assert_eq!(summary.missing_videos.len(), 3);
        // Two frames (0 and 3) per resolved clip
        assert_eq!(summary.total_frames(), 2 * 27);
        assert_eq!(*sink.0.lock().unwrap(), 54);
        assert!(root.join("frames/extraction_report.json").is_file());

        let train = &summary.splits[0];
        assert_eq!(train.name, "train");
        assert_eq!(train.clips, 21);
    }

    #[test]
    fn test_split_rerun_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_annotations(root);
        let config = config_in(root);
        run_manifest(&config).unwrap();

        run_split(&config).unwrap();
        let first: Vec<String> = SPLIT_NAMES
            .iter()
            .map(|n| fs::read_to_string(config.paths.split_csv(n)).unwrap())
            .collect();
        run_split(&config).unwrap();
        let second: Vec<String> = SPLIT_NAMES
            .iter()
            .map(|n| fs::read_to_string(config.paths.split_csv(n)).unwrap())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_failed_split_write_keeps_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_annotations(root);
        let config = config_in(root);
        run_manifest(&config).unwrap();

        fs::create_dir_all(&config.paths.splits_dir).unwrap();
        for name in SPLIT_NAMES {
            fs::write(config.paths.split_csv(name), "previous run").unwrap();
        }
        // A directory in the way makes the val write fail after train succeeded
        fs::create_dir_all(config.paths.splits_dir.join("val.csv.tmp")).unwrap();

        assert!(run_split(&config).is_err());
        for name in SPLIT_NAMES {
            let content = fs::read_to_string(config.paths.split_csv(name)).unwrap();
            assert_eq!(content, "previous run");
        }
        assert!(!config.paths.splits_dir.join("train.csv.tmp").exists());

        fs::remove_dir(config.paths.splits_dir.join("val.csv.tmp")).unwrap();
        run_split(&config).unwrap();
        for name in SPLIT_NAMES {
            let content = fs::read_to_string(config.paths.split_csv(name)).unwrap();
            assert!(content.starts_with("video_path,"));
            assert!(!config.paths.splits_dir.join(format!("{}.csv.tmp", name)).exists());
        }
    }

    #[test]
    fn test_split_fails_on_empty_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(&config.paths.annotations_dir).unwrap();
        run_manifest(&config).unwrap();

        assert!(matches!(run_split(&config), Err(PrepError::ManifestEmpty)));
        assert!(!config.paths.split_csv("train").exists());
    }

    #[test]
    fn test_stage_inputs_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        assert!(matches!(
            run_manifest(&config),
            Err(PrepError::InputMissing(_))
        ));
        assert!(matches!(run_split(&config), Err(PrepError::InputMissing(_))));

        let sink = TouchSink(Mutex::new(0));
        assert!(matches!(
            run_extract(&config, &StubBackend, &sink),
            Err(PrepError::InputMissing(_))
        ));

        // Video root present but no split CSVs
        fs::create_dir_all(&config.paths.video_root).unwrap();
        assert!(matches!(
            run_extract(&config, &StubBackend, &sink),
            Err(PrepError::InputMissing(_))
        ));
    }
}
