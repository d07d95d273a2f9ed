//! Class-balanced temporal sampling of raw batches.

use std::collections::BTreeMap;

use chrono::Datelike;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::Serialize;

use crate::record::{Label, RawRecord};

pub const DEFAULT_SAMPLE_TARGET: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthGroupSummary {
    pub key: MonthKey,
    pub available: usize,
    pub sampled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSample {
    pub records: Vec<RawRecord>,
    pub groups: Vec<MonthGroupSummary>,
    pub per_group_quota: usize,
    pub input_rows: usize,
    pub undated_rows: usize,
}

/// Result of sampling one batch.
///
/// `NoDatedRecords` means the batch had rows but none could be placed in a month. It is not
/// end-of-stream: the source may still have further batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleOutcome {
    Sampled(StratifiedSample),
    NoDatedRecords { input_rows: usize },
}

impl SampleOutcome {
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Sampled(sample) => sample.records,
            Self::NoDatedRecords { .. } => Vec::new(),
        }
    }

    pub fn sampled_rows(&self) -> usize {
        match self {
            Self::Sampled(sample) => sample.records.len(),
            Self::NoDatedRecords { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedSampler {
    target_size: usize,
    seed: u64,
}

impl StratifiedSampler {
    pub fn new(target_size: usize, seed: u64) -> Self {
        Self { target_size, seed }
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    /// Seed for one batch of one category. Stable across runs for the same base seed.
    pub fn batch_seed(&self, label: Label, batch_index: u64) -> u64 {
        let stream = u64::from(label.as_u8()).wrapping_add(1) << 48;
        mix64(self.seed ^ stream ^ batch_index.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    pub fn sample_batch(
        &self,
        records: Vec<RawRecord>,
        label: Label,
        batch_index: u64,
    ) -> SampleOutcome {
        self.sample_with_seed(records, self.batch_seed(label, batch_index))
    }

    /// Groups by calendar month, then draws `target / non_empty_groups` rows from each month
    /// without replacement, capped at the month's own size.
    pub fn sample_with_seed(&self, records: Vec<RawRecord>, seed: u64) -> SampleOutcome {
        let input_rows = records.len();
        let mut undated_rows = 0usize;
        let mut groups: BTreeMap<MonthKey, Vec<RawRecord>> = BTreeMap::new();

        for record in records {
            match record.observed_at {
                Some(ts) => groups
                    .entry(MonthKey {
                        year: ts.year(),
                        month: ts.month(),
                    })
                    .or_default()
                    .push(record),
                None => undated_rows += 1,
            }
        }

        // Only months that hold rows exist in the map, so the divisor never counts empty groups.
        if groups.is_empty() {
            return SampleOutcome::NoDatedRecords { input_rows };
        }

        let per_group_quota = self.target_size / groups.len();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut sampled = Vec::with_capacity(per_group_quota * groups.len());
        let mut summaries = Vec::with_capacity(groups.len());

        for (key, group) in groups {
            let available = group.len();
            let take = per_group_quota.min(available);
            let mut picked = index::sample(&mut rng, available, take).into_vec();
            picked.sort_unstable();

            let mut slots: Vec<Option<RawRecord>> = group.into_iter().map(Some).collect();
            sampled.extend(picked.into_iter().filter_map(|idx| slots[idx].take()));
            summaries.push(MonthGroupSummary {
                key,
                available,
                sampled: take,
            });
        }

        SampleOutcome::Sampled(StratifiedSample {
            records: sampled,
            groups: summaries,
            per_group_quota,
            input_rows,
            undated_rows,
        })
    }
}

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
