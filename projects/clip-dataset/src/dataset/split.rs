// Stratified train/val/test splitter
//
// Each stage shuffles every domain group with a freshly seeded RNG and moves a
// quota of it into the holdout side. Quotas follow the largest-remainder
// method, so a tiny domain may land entirely on one side but no row is ever
// lost or duplicated.

use crate::config::SplitConfig;
use crate::dataset::types::{ClipRecord, Domain, DomainHistogram};
use crate::error::{PrepError, PrepResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The three partitions produced from one manifest.
#[derive(Debug, Clone, Default)]
pub struct DatasetSplit {
    pub train: Vec<ClipRecord>,
    pub val: Vec<ClipRecord>,
    pub test: Vec<ClipRecord>,
}

impl DatasetSplit {
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// Partitions in file order: train, val, test.
    pub fn parts(&self) -> [(&'static str, &[ClipRecord]); 3] {
        [
            ("train", self.train.as_slice()),
            ("val", self.val.as_slice()),
            ("test", self.test.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PartitionStats {
    pub name: &'static str,
    pub clips: usize,
    pub histogram: DomainHistogram,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub input_clips: usize,
    /// Rows dropped because their domain is not day/night/croki
    pub dropped_unknown: usize,
    pub input_histogram: DomainHistogram,
    /// Rows across all three partitions
    pub split_clips: usize,
    pub partitions: Vec<PartitionStats>,
}

impl SplitSummary {
    pub fn new(input: &[ClipRecord], dropped_unknown: usize, split: &DatasetSplit) -> Self {
        Self {
            input_clips: input.len(),
            dropped_unknown,
            input_histogram: DomainHistogram::from_records(input),
            split_clips: split.len(),
            partitions: split
                .parts()
                .into_iter()
                .map(|(name, records)| PartitionStats {
                    name,
                    clips: records.len(),
                    histogram: DomainHistogram::from_records(records),
                })
                .collect(),
        }
    }
}

impl fmt::Display for SplitSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Input clips: {}", self.input_clips)?;
        write!(f, "{}", self.input_histogram)?;
        if self.dropped_unknown > 0 {
            writeln!(
                f,
                "Warning: {} clips with an unknown domain were excluded",
                self.dropped_unknown
            )?;
        }

        let kept = self.split_clips;
        writeln!(f, "{:<6} {:>8} {:>7}", "Split", "Clips", "Share")?;
        writeln!(f, "{}", "-".repeat(23))?;
        for part in &self.partitions {
            let share = if kept > 0 {
                part.clips as f64 / kept as f64 * 100.0
            } else {
                0.0
            };
            writeln!(f, "{:<6} {:>8} {:>6.1}%", part.name, part.clips, share)?;
        }
        for part in &self.partitions {
            writeln!(f, "Domains ({}):", part.name)?;
            write!(f, "{}", part.histogram)?;
        }
        Ok(())
    }
}

/// Drops records outside the valid domains. Returns the kept rows and the
/// number dropped.
pub fn filter_valid_domains(records: Vec<ClipRecord>) -> (Vec<ClipRecord>, usize) {
    let before = records.len();
    let kept: Vec<ClipRecord> = records.into_iter().filter(|r| r.domain.is_valid()).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Two-stage stratified split: train vs holdout, then holdout into val/test.
pub fn split_manifest(records: Vec<ClipRecord>, config: &SplitConfig) -> PrepResult<DatasetSplit> {
    config.validate()?;
    if records.is_empty() {
        return Err(PrepError::ManifestEmpty);
    }

    let (train, holdout) = stratified_partition(records, config.holdout_fraction(), config.seed);
    let (val, test) =
        stratified_partition(holdout, config.test_fraction_of_holdout(), config.seed);

    Ok(DatasetSplit { train, val, test })
}

/// Splits `records` into (kept, holdout) where the holdout holds
/// `ceil(fraction * n)` rows spread across domains in proportion to their size.
pub fn stratified_partition(
    records: Vec<ClipRecord>,
    fraction: f64,
    seed: u64,
) -> (Vec<ClipRecord>, Vec<ClipRecord>) {
    let total = records.len();
    if total == 0 {
        return (Vec::new(), Vec::new());
    }

    // Guard against 0.3 * 100 = 30.000000000000004 rounding up to 31
    let holdout_total = ((fraction * total as f64) - 1e-9).ceil().clamp(0.0, total as f64) as usize;

    let mut groups: BTreeMap<Domain, Vec<ClipRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.domain).or_default().push(record);
    }

    let sizes: Vec<usize> = groups.values().map(Vec::len).collect();
    let quotas = allocate_quotas(&sizes, holdout_total);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut kept = Vec::with_capacity(total - holdout_total);
    let mut holdout = Vec::with_capacity(holdout_total);

    for (mut group, quota) in groups.into_values().zip(quotas) {
        group.shuffle(&mut rng);
        let rest = group.split_off(quota);
        holdout.extend(group);
        kept.extend(rest);
    }

    // Interleave domains so neither side is sorted by domain
    kept.shuffle(&mut rng);
    holdout.shuffle(&mut rng);

    (kept, holdout)
}

/// Largest-remainder apportionment of `target` rows over groups of `sizes`.
/// Ties go to the larger group, then to the earlier one.
fn allocate_quotas(sizes: &[usize], target: usize) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    if total == 0 {
        return vec![0; sizes.len()];
    }

    let mut quotas: Vec<usize> = sizes.iter().map(|s| s * target / total).collect();
    let mut remaining = target - quotas.iter().sum::<usize>();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let rem_a = (sizes[a] * target) % total;
        let rem_b = (sizes[b] * target) % total;
        rem_b
            .cmp(&rem_a)
            .then(sizes[b].cmp(&sizes[a]))
            .then(a.cmp(&b))
    });

    for idx in order.into_iter().cycle() {
        if remaining == 0 {
            break;
        }
        if quotas[idx] < sizes[idx] {
            quotas[idx] += 1;
            remaining -= 1;
        }
    }

    quotas
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(counts: &[(Domain, usize)]) -> Vec<ClipRecord> {
        let mut out = Vec::new();
        for (domain, count) in counts {
            for i in 0..*count {
                out.push(ClipRecord {
                    video_path: format!("{}/video_{}.mp4", domain, i),
                    start_frame: i as u64,
                    end_frame: i as u64 + 10,
                    action_label: "assault".to_string(),
                    domain: *domain,
                });
            }
        }
        out
    }

    fn sorted(mut v: Vec<ClipRecord>) -> Vec<(String, u64)> {
        let mut keys: Vec<(String, u64)> = v
            .drain(..)
            .map(|r| (r.video_path, r.start_frame))
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_split_sizes_and_proportions() {
        let input = records(&[(Domain::Day, 100), (Domain::Night, 60), (Domain::Croki, 40)]);
        let split = split_manifest(input.clone(), &SplitConfig::default()).unwrap();

        assert_eq!(split.len(), 200);
        assert_eq!(split.train.len(), 140);
        assert_eq!(split.val.len() + split.test.len(), 60);
        assert_eq!(split.val.len(), 30);
        assert_eq!(split.test.len(), 30);

        for (name, part) in split.parts() {
            let hist = DomainHistogram::from_records(part);
            for domain in Domain::VALID {
                let expected = DomainHistogram::from_records(&input).get(domain) as f64 / 200.0;
                let actual = hist.get(domain) as f64 / part.len() as f64;
                assert!(
                    (expected - actual).abs() < 0.05,
                    "{} {}: expected {:.3}, got {:.3}",
                    name,
                    domain,
                    expected,
                    actual
                );
            }
        }
    }

    #[test]
    fn test_split_is_a_partition() {
        let input = records(&[(Domain::Day, 37), (Domain::Night, 11), (Domain::Croki, 5)]);
        let split = split_manifest(input.clone(), &SplitConfig::default()).unwrap();

        let mut all = split.train.clone();
        all.extend(split.val.clone());
        all.extend(split.test.clone());
        assert_eq!(sorted(all), sorted(input));
    }

    #[test]
    fn test_tiny_domains_are_not_lost() {
        // One croki clip cannot be spread over three splits
        let input = records(&[(Domain::Day, 4), (Domain::Croki, 1)]);
        let split = split_manifest(input.clone(), &SplitConfig::default()).unwrap();
        assert_eq!(split.len(), 5);

        let mut all = split.train.clone();
        all.extend(split.val.clone());
        all.extend(split.test.clone());
        assert_eq!(sorted(all), sorted(input));

        let single = records(&[(Domain::Night, 1)]);
        let split = split_manifest(single, &SplitConfig::default()).unwrap();
        assert_eq!(split.len(), 1);
    }

    #[test]
    fn test_split_is_reproducible() {
        let input = records(&[(Domain::Day, 50), (Domain::Night, 20), (Domain::Croki, 13)]);
        let a = split_manifest(input.clone(), &SplitConfig::default()).unwrap();
        let b = split_manifest(input.clone(), &SplitConfig::default()).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.val, b.val);
        assert_eq!(a.test, b.test);

        let other_seed = SplitConfig {
            seed: 7,
            ..SplitConfig::default()
        };
        let c = split_manifest(input, &other_seed).unwrap();
        assert_ne!(a.train, c.train);
    }

    #[test]
    fn test_empty_manifest_fails() {
        assert!(matches!(
            split_manifest(Vec::new(), &SplitConfig::default()),
            Err(PrepError::ManifestEmpty)
        ));
    }

    #[test]
    fn test_filter_valid_domains() {
        let input = records(&[(Domain::Day, 3), (Domain::Unknown, 2)]);
        let (kept, dropped) = filter_valid_domains(input);
        assert_eq!(kept.len(), 3);
        assert_eq!(dropped, 2);
        assert!(kept.iter().all(|r| r.domain == Domain::Day));
    }

    #[test]
    fn test_allocate_quotas() {
        assert_eq!(allocate_quotas(&[100, 60, 40], 60), vec![30, 18, 12]);
        // 7.5 / 7.5: tie broken towards the earlier group
        assert_eq!(allocate_quotas(&[15, 15], 15), vec![8, 7]);
        assert_eq!(allocate_quotas(&[4, 1], 2), vec![2, 0]);
        assert_eq!(allocate_quotas(&[1], 1), vec![1]);
        assert_eq!(allocate_quotas(&[3, 2], 0), vec![0, 0]);
        let quotas = allocate_quotas(&[5, 3, 1], 9);
        assert_eq!(quotas, vec![5, 3, 1]);
    }

    #[test]
    fn test_summary_table() {
        let input = records(&[(Domain::Day, 10)]);
        let split = split_manifest(input.clone(), &SplitConfig::default()).unwrap();
        let summary = SplitSummary::new(&input, 3, &split);
        let text = summary.to_string();
        assert!(text.contains("3 clips with an unknown domain"));
        assert!(text.contains("train"));
        assert_eq!(summary.partitions.len(), 3);
        assert_eq!(summary.split_clips, 10);
    }
}
