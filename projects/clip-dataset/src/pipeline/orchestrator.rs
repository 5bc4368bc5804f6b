// Extraction orchestrator: runs the frame extractor over one split
//
// Every distinct hint is resolved once up front, then clips are grouped by the
// file they resolved to so all frames of one video go to the same worker.
// Hints that resolve nowhere keep a job of their own. Workers share nothing
// mutable and each opens its own decoder per clip.

use crate::config::ExtractConfig;
use crate::dataset::types::ClipRecord;
use crate::pipeline::types::SplitTally;
use crate::video::extractor::{ClipOutcome, FrameExtractor, FrameSink};
use crate::video::resolver::{ResolvedVideo, VideoResolver};
use crate::video::VideoBackend;
use crossbeam::channel;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::thread;

/// What a job is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    Video(PathBuf),
    Unresolved(String),
}

/// All clips that read from one video file, or share one unresolved hint.
/// Each clip carries its own resolution since two hints may reach the same
/// file through different tiers.
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub key: JobKey,
    pub clips: Vec<(ClipRecord, Option<ResolvedVideo>)>,
}

/// Resolves each distinct hint once and groups clips by the resolved file,
/// keeping first-appearance order.
pub fn plan_jobs(records: &[ClipRecord], resolver: &VideoResolver) -> Vec<VideoJob> {
    let mut resolved: HashMap<&str, Option<ResolvedVideo>> = HashMap::new();
    let mut jobs: Vec<VideoJob> = Vec::new();
    let mut positions: HashMap<JobKey, usize> = HashMap::new();

    for record in records {
        let video = resolved
            .entry(record.video_path.as_str())
            .or_insert_with(|| resolver.resolve(&record.video_path))
            .clone();
        let key = match &video {
            Some(v) => JobKey::Video(v.path.clone()),
            None => JobKey::Unresolved(record.video_path.clone()),
        };

        let idx = *positions.entry(key.clone()).or_insert_with(|| {
            jobs.push(VideoJob {
                key,
                clips: Vec::new(),
            });
            jobs.len() - 1
        });
        jobs[idx].clips.push((record.clone(), video));
    }

    jobs
}

pub fn progress_bar(len: usize, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} clips, {eta})")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(label.to_string());
    pb
}

/// Shared, read-only collaborators of an extraction run.
pub struct ExtractionContext<'a> {
    pub resolver: &'a VideoResolver,
    pub backend: &'a dyn VideoBackend,
    pub sink: &'a dyn FrameSink,
    pub config: &'a ExtractConfig,
}

/// Extracts frames for every clip of one split into `output_root`.
pub fn extract_split(
    ctx: &ExtractionContext,
    name: &str,
    records: &[ClipRecord],
    output_root: &Path,
    pb: &ProgressBar,
) -> SplitTally {
    let ExtractionContext {
        resolver,
        backend,
        sink,
        config,
    } = *ctx;
    let extractor = FrameExtractor::new(backend, sink, config);
    let jobs = plan_jobs(records, resolver);
    let mut tally = SplitTally::new(name);
    tally.clips = records.len();

    let run_job = |job: &VideoJob, emit: &mut dyn FnMut(ClipOutcome)| {
        for (clip, video) in &job.clips {
            emit(extractor.extract_clip(clip, video.as_ref(), output_root));
            pb.inc(1);
        }
    };

    if config.workers <= 1 || jobs.len() <= 1 {
        for job in &jobs {
            run_job(job, &mut |outcome| tally.record(outcome));
        }
        return tally;
    }

    let (job_tx, job_rx) = channel::unbounded::<&VideoJob>();
    let (result_tx, result_rx) = channel::unbounded::<ClipOutcome>();
    for job in &jobs {
        // Receiver is alive until the scope below ends
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let worker_count = config.workers.min(jobs.len());
    tracing::info!("Spawning {} extraction workers for {}", worker_count, name);

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let run_job = &run_job;
            scope.spawn(move || {
                for job in job_rx {
                    run_job(job, &mut |outcome| {
                        let _ = result_tx.send(outcome);
                    });
                }
            });
        }
        drop(result_tx);

        for outcome in result_rx {
            tally.record(outcome);
        }
    });

    tally
}
