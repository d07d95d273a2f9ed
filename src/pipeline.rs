//! Per-category orchestration: source, sampler, transform, writer.
//!
//! Categories run one after another on the calling thread. Each batch is fully sampled,
//! transformed and written before the next one is fetched, so memory stays bounded by the
//! batch size. Failures inside a batch are logged with the batch index and skipped; only
//! startup failures (config, source connect, sink preparation) abort the run.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::checkpoint::{
    checkpoint_path, clear_checkpoint, load_checkpoint, save_checkpoint, CheckpointError,
    WindowCheckpoint,
};
use crate::config::{ChunkingKind, ConfigError, ExtractionConfig, OutputLayout};
use crate::features::{extract_batch, network_location};
use crate::record::{Label, LabeledBatch, RawRecord};
use crate::sampler::{SampleOutcome, StratifiedSampler};
use crate::source::{
    BatchFetchError, BatchPosition, ChunkedSource, QuerySpec, RecordProvider, SourceBatch,
    SourceError,
};
use crate::writer::{IncrementalWriter, SinkSpec, SinkSummary, WriterError};

pub const PROGRESS_EVERY_BATCHES: u64 = 100;

const COMBINED_SINK_ID: &str = "features";

/// One label class and the table it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub label: Label,
    pub table: String,
}

impl Category {
    pub fn new(label: Label, table: impl Into<String>) -> Self {
        Self {
            label,
            table: table.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.label.as_str()
    }
}

/// Everything collected while one category runs. Passed into the driver and handed back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryAccumulator {
    pub domains: BTreeSet<String>,
    pub extract_ms: Vec<f64>,
    pub write_ms: Vec<f64>,
    pub batches_seen: u64,
    pub batches_failed: u64,
    pub rows_fetched: u64,
    pub rows_dropped: u64,
    pub rows_sampled: u64,
    pub rows_written: u64,
    pub undated_batches: u64,
    pub clamped_rows: u64,
    pub row_count_mismatches: u64,
    pub resumed_from_window: Option<u64>,
}

/// A failure confined to one batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    Fetch(#[from] BatchFetchError),
    #[error("batch {batch_index}: write to sink {sink} failed: {source}")]
    Write {
        batch_index: u64,
        sink: String,
        creating_part: bool,
        #[source]
        source: WriterError,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{category}: source unavailable: {source}")]
    Source {
        category: &'static str,
        #[source]
        source: SourceError,
    },
    #[error("{category}: sink could not be prepared: {source}")]
    Sink {
        category: &'static str,
        #[source]
        source: WriterError,
    },
    #[error("{category}: {failures} consecutive failures creating a sink part, last: {last_error}")]
    SinkUnavailable {
        category: &'static str,
        failures: u32,
        last_error: WriterError,
    },
    #[error("{category}: checkpoint unreadable: {source}")]
    Checkpoint {
        category: &'static str,
        #[source]
        source: CheckpointError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: Label,
    pub table: String,
    pub sink: String,
    pub resumed_from_window: Option<u64>,
    pub batches_seen: u64,
    pub batches_failed: u64,
    pub rows_fetched: u64,
    pub rows_dropped: u64,
    pub rows_sampled: u64,
    pub rows_written: u64,
    pub undated_batches: u64,
    pub clamped_rows: u64,
    pub row_count_mismatches: u64,
    pub distinct_domains: usize,
    pub mean_extract_ms: Option<f64>,
    pub mean_write_ms: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub categories: Vec<CategorySummary>,
    pub sinks: Vec<SinkSummary>,
    pub domain_overlap: Vec<String>,
    pub mean_extract_ms: Option<f64>,
    pub mean_write_ms: Option<f64>,
}

pub struct PipelineDriver<C> {
    config: ExtractionConfig,
    connect: C,
}

impl<C, P> PipelineDriver<C>
where
    C: FnMut() -> Result<P, SourceError>,
    P: RecordProvider,
{
    /// `connect` is called (with the configured retry policy) once per category.
    pub fn new(config: ExtractionConfig, connect: C) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, connect })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Phishing first, then benign.
    pub fn categories(&self) -> [Category; 2] {
        [
            Category::new(Label::Phishing, self.config.phishing_table.clone()),
            Category::new(Label::Benign, self.config.benign_table.clone()),
        ]
    }

    pub fn sink_spec(&self, category: &Category) -> SinkSpec {
        let (id, file_name) = match self.config.layout {
            OutputLayout::PerCategory => (
                category.name().to_string(),
                format!("{}_features.csv", category.name()),
            ),
            OutputLayout::Combined => {
                (COMBINED_SINK_ID.to_string(), "features.csv".to_string())
            }
        };
        SinkSpec {
            id,
            path: self.config.output_dir.join(file_name),
            rows_per_file: self.config.rows_per_file,
        }
    }

    pub fn run(&mut self) -> Result<RunReport, PipelineError> {
        let started = Instant::now();
        let mut writer = IncrementalWriter::new();
        let mut summaries = Vec::new();
        let mut accumulators = Vec::new();
        let mut sinks = Vec::new();

        let categories = self.categories();
        for category in &categories {
            let spec = self.sink_spec(category);
            let acc = self.run_category(category, &mut writer, CategoryAccumulator::default())?;

            if self.config.layout == OutputLayout::PerCategory {
                sinks.push(finish_sink(&mut writer, category, &spec.id)?);
            }
            summaries.push(summarize(category, &spec.id, &acc));
            accumulators.push(acc);
        }

        if self.config.layout == OutputLayout::Combined {
            let last = &categories[categories.len() - 1];
            sinks.push(finish_sink(&mut writer, last, COMBINED_SINK_ID)?);
        }

        let domain_overlap = match accumulators.as_slice() {
            [phishing, benign] => domain_overlap(&phishing.domains, &benign.domains),
            _ => Vec::new(),
        };
        if !domain_overlap.is_empty() {
            warn!(
                component = "pipeline",
                event = "pipeline.domain_overlap",
                overlap_count = domain_overlap.len(),
                sample = ?domain_overlap.iter().take(10).collect::<Vec<_>>()
            );
        }

        let all_extract: Vec<f64> = accumulators
            .iter()
            .flat_map(|acc| acc.extract_ms.iter().copied())
            .collect();
        let all_write: Vec<f64> = accumulators
            .iter()
            .flat_map(|acc| acc.write_ms.iter().copied())
            .collect();
        let report = RunReport {
            categories: summaries,
            sinks,
            domain_overlap,
            mean_extract_ms: mean(&all_extract),
            mean_write_ms: mean(&all_write),
        };

        info!(
            component = "pipeline",
            event = "pipeline.run.complete",
            rows_written = report.categories.iter().map(|c| c.rows_written).sum::<u64>(),
            mean_extract_ms = ?report.mean_extract_ms,
            mean_write_ms = ?report.mean_write_ms,
            elapsed_ms = started.elapsed().as_millis() as u64
        );
        Ok(report)
    }

    /// Runs one category to completion, leaving its sink open in `writer`.
    pub fn run_category(
        &mut self,
        category: &Category,
        writer: &mut IncrementalWriter,
        mut acc: CategoryAccumulator,
    ) -> Result<CategoryAccumulator, PipelineError> {
        let name = category.name();
        let spec = self.sink_spec(category);
        let sink_id = spec.id.clone();
        let sink_path = spec.path.clone();
        writer.register(spec).map_err(|source| PipelineError::Sink {
            category: name,
            source,
        })?;

        let checkpoint_file = self.uses_checkpoints().then(|| checkpoint_path(&sink_path));
        let start_window = match (&checkpoint_file, self.config.resume) {
            (Some(path), true) => self.restore_from_checkpoint(category, writer, &sink_id, path)?,
            _ => None,
        };
        acc.resumed_from_window = start_window;
        if start_window.is_none() && !writer.header_written(&sink_id) {
            writer
                .discard_existing(&sink_id)
                .map_err(|source| PipelineError::Sink {
                    category: name,
                    source,
                })?;
        }

        let query = QuerySpec::new(category.table.clone(), self.config.row_limit).map_err(
            |source| PipelineError::Source {
                category: name,
                source,
            },
        )?;
        let options = self.config.source_options(start_window.unwrap_or(0));
        let mut source = ChunkedSource::open(&mut self.connect, query, options).map_err(
            |source| PipelineError::Source {
                category: name,
                source,
            },
        )?;

        info!(
            component = "pipeline",
            event = "pipeline.category.start",
            category = name,
            table = %category.table,
            sink = %sink_path.display(),
            stratify = self.config.stratify,
            resumed_from_window = ?start_window,
            window_count = source.plan().map(|plan| plan.window_count())
        );

        let sampler = StratifiedSampler::new(self.config.sample_target, self.config.seed);
        let mut create_failures = 0u32;

        while let Some(item) = source.next_batch() {
            acc.batches_seen += 1;
            let position = match &item {
                Ok(batch) => batch.position,
                Err(err) => err.position,
            };

            let outcome = match item {
                Ok(batch) => {
                    self.process_batch(category, &sampler, writer, &sink_id, batch, &mut acc)
                }
                Err(err) => Err(BatchError::from(err)),
            };

            match outcome {
                Ok(()) => create_failures = 0,
                Err(err) => {
                    acc.batches_failed += 1;
                    error!(
                        component = "pipeline",
                        event = "pipeline.batch.failed",
                        category = name,
                        batch_index = position.batch_index,
                        window_index = ?position.window_index,
                        offset = position.offset,
                        error = %err
                    );
                    if let BatchError::Write {
                        creating_part: true,
                        source,
                        ..
                    } = err
                    {
                        create_failures += 1;
                        if create_failures >= self.config.max_sink_failures {
                            return Err(PipelineError::SinkUnavailable {
                                category: name,
                                failures: create_failures,
                                last_error: source,
                            });
                        }
                    }
                }
            }

            if (position.batch_index + 1) % PROGRESS_EVERY_BATCHES == 0 {
                info!(
                    component = "pipeline",
                    event = "pipeline.progress",
                    category = name,
                    batches_done = position.batch_index + 1,
                    rows_written = acc.rows_written,
                    batches_failed = acc.batches_failed
                );
            }

            if position.closes_window {
                self.commit_window(
                    category,
                    writer,
                    &sink_id,
                    checkpoint_file.as_deref(),
                    &position,
                    &acc,
                );
            }
        }

        if let Some(path) = &checkpoint_file {
            if let Err(err) = clear_checkpoint(path) {
                warn!(
                    component = "pipeline",
                    event = "pipeline.checkpoint.clear_failed",
                    category = name,
                    path = %path.display(),
                    error = %err
                );
            }
        }

        info!(
            component = "pipeline",
            event = "pipeline.category.complete",
            category = name,
            batches_seen = acc.batches_seen,
            batches_failed = acc.batches_failed,
            rows_fetched = acc.rows_fetched,
            rows_written = acc.rows_written,
            distinct_domains = acc.domains.len(),
            mean_extract_ms = ?mean(&acc.extract_ms),
            mean_write_ms = ?mean(&acc.write_ms)
        );
        Ok(acc)
    }

    /// Checkpoints are written on every per-category windowed run so that a later run can
    /// resume; they are only read back when `resume` is set.
    fn uses_checkpoints(&self) -> bool {
        self.config.layout == OutputLayout::PerCategory
            && self.config.chunking == ChunkingKind::Windowed
    }

    fn restore_from_checkpoint(
        &self,
        category: &Category,
        writer: &mut IncrementalWriter,
        sink_id: &str,
        path: &Path,
    ) -> Result<Option<u64>, PipelineError> {
        let name = category.name();
        let Some(checkpoint) = load_checkpoint(path).map_err(|source| PipelineError::Checkpoint {
            category: name,
            source,
        })?
        else {
            return Ok(None);
        };

        if checkpoint.table != category.table || checkpoint.category != name {
            warn!(
                component = "pipeline",
                event = "pipeline.checkpoint.ignored",
                category = name,
                path = %path.display(),
                checkpoint_table = %checkpoint.table,
                table = %category.table
            );
            return Ok(None);
        }

        writer
            .restore(sink_id, checkpoint.part_index, checkpoint.rows_in_part)
            .map_err(|source| PipelineError::Sink {
                category: name,
                source,
            })?;
        info!(
            component = "pipeline",
            event = "pipeline.checkpoint.resumed",
            category = name,
            next_window = checkpoint.next_window,
            rows_total = checkpoint.rows_total
        );
        Ok(Some(checkpoint.next_window))
    }

    fn process_batch(
        &self,
        category: &Category,
        sampler: &StratifiedSampler,
        writer: &mut IncrementalWriter,
        sink_id: &str,
        batch: SourceBatch,
        acc: &mut CategoryAccumulator,
    ) -> Result<(), BatchError> {
        let SourceBatch { position, records } = batch;
        let fetched = records.len();
        let retained: Vec<RawRecord> = records
            .into_iter()
            .filter(RawRecord::has_content)
            .collect();
        let dropped = fetched - retained.len();
        acc.rows_fetched += fetched as u64;
        acc.rows_dropped += dropped as u64;

        let before_sampling = retained.len();
        let sampled = if self.config.stratify {
            match sampler.sample_batch(retained, category.label, position.batch_index) {
                SampleOutcome::Sampled(sample) => sample.records,
                SampleOutcome::NoDatedRecords { input_rows } => {
                    if input_rows > 0 {
                        acc.undated_batches += 1;
                        warn!(
                            component = "pipeline",
                            event = "pipeline.batch.undated",
                            category = category.name(),
                            batch_index = position.batch_index,
                            input_rows
                        );
                    }
                    Vec::new()
                }
            }
        } else {
            retained
        };
        acc.rows_sampled += sampled.len() as u64;

        info!(
            component = "pipeline",
            event = "pipeline.batch.sampled",
            category = category.name(),
            batch_index = position.batch_index,
            fetched_rows = fetched,
            dropped_rows = dropped,
            before_sampling,
            after_sampling = sampled.len()
        );

        let labeled = LabeledBatch::new(category.label, sampled);
        let extract_started = Instant::now();
        let features = extract_batch(&labeled);
        let extract_ms = elapsed_ms(extract_started);
        acc.clamped_rows += features.clamped_subdomains as u64;
        for record in &labeled.records {
            if let Ok(netloc) = network_location(record.url_or_empty()) {
                if !netloc.is_empty() {
                    acc.domains.insert(netloc);
                }
            }
        }
        acc.extract_ms.push(extract_ms);

        let write_started = Instant::now();
        let creating_part = !features.records.is_empty() && writer.next_write_creates(sink_id);
        let is_first_write = !writer.header_written(sink_id);
        let report = writer
            .append(sink_id, &features.records, is_first_write)
            .map_err(|source| BatchError::Write {
                batch_index: position.batch_index,
                sink: sink_id.to_string(),
                creating_part,
                source,
            })?;
        let write_ms = elapsed_ms(write_started);
        acc.write_ms.push(write_ms);
        acc.rows_written += report.rows_written;
        if report.mismatch.is_some() {
            acc.row_count_mismatches += 1;
        }

        info!(
            component = "pipeline",
            event = "pipeline.batch.written",
            category = category.name(),
            batch_index = position.batch_index,
            rows_written = report.rows_written,
            extract_ms,
            write_ms
        );
        Ok(())
    }

    fn commit_window(
        &self,
        category: &Category,
        writer: &IncrementalWriter,
        sink_id: &str,
        checkpoint_file: Option<&Path>,
        position: &BatchPosition,
        acc: &CategoryAccumulator,
    ) {
        let Some(window_index) = position.window_index else {
            return;
        };
        info!(
            component = "pipeline",
            event = "pipeline.window.complete",
            category = category.name(),
            window_index,
            rows_written = acc.rows_written
        );

        let (Some(path), Some(state)) = (checkpoint_file, writer.state(sink_id)) else {
            return;
        };
        let checkpoint = WindowCheckpoint {
            category: category.name().to_string(),
            table: category.table.clone(),
            next_window: window_index + 1,
            part_index: state.part_index(),
            rows_in_part: state.rows_in_part(),
            rows_total: state.rows_total,
        };
        if let Err(err) = save_checkpoint(path, &checkpoint) {
            warn!(
                component = "pipeline",
                event = "pipeline.checkpoint.save_failed",
                category = category.name(),
                path = %path.display(),
                error = %err
            );
        }
    }
}

/// Domains present in both sets, sorted.
pub fn domain_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> Vec<String> {
    a.intersection(b).cloned().collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}

fn finish_sink(
    writer: &mut IncrementalWriter,
    category: &Category,
    sink_id: &str,
) -> Result<SinkSummary, PipelineError> {
    writer.finish(sink_id).map_err(|source| PipelineError::Sink {
        category: category.name(),
        source,
    })
}

fn summarize(category: &Category, sink_id: &str, acc: &CategoryAccumulator) -> CategorySummary {
    CategorySummary {
        category: category.label,
        table: category.table.clone(),
        sink: sink_id.to_string(),
        resumed_from_window: acc.resumed_from_window,
        batches_seen: acc.batches_seen,
        batches_failed: acc.batches_failed,
        rows_fetched: acc.rows_fetched,
        rows_dropped: acc.rows_dropped,
        rows_sampled: acc.rows_sampled,
        rows_written: acc.rows_written,
        undated_batches: acc.undated_batches,
        clamped_rows: acc.clamped_rows,
        row_count_mismatches: acc.row_count_mismatches,
        distinct_domains: acc.domains.len(),
        mean_extract_ms: mean(&acc.extract_ms),
        mean_write_ms: mean(&acc.write_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::RetryPolicy;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    struct MemoryProvider {
        phishing: Vec<RawRecord>,
        benign: Vec<RawRecord>,
        fail_offsets: Vec<u64>,
    }

    impl MemoryProvider {
        fn rows(&self, table: &str) -> &[RawRecord] {
            if table == "phish" {
                &self.phishing
            } else {
                &self.benign
            }
        }
    }

    impl RecordProvider for MemoryProvider {
        fn count(&mut self, query: &QuerySpec) -> Result<u64, SourceError> {
            Ok(self.rows(&query.table).len() as u64)
        }

        fn fetch(
            &mut self,
            query: &QuerySpec,
            offset: u64,
            limit: u64,
        ) -> Result<Vec<RawRecord>, SourceError> {
            if self.fail_offsets.contains(&offset) {
                return Err(SourceError::Unavailable("injected".to_string()));
            }
            Ok(self
                .rows(&query.table)
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect())
        }
    }

    fn page(url: &str) -> RawRecord {
        let ts = Utc.with_ymd_and_hms(2022, 1, 15, 0, 0, 0).single().unwrap();
        RawRecord::new(url, "<html></html>", Some(ts))
    }

    fn config(dir: &std::path::Path) -> ExtractionConfig {
        let mut cfg = ExtractionConfig::new(dir.join("unused.sqlite"));
        cfg.batch_size = 2;
        cfg.window_rows = 4;
        cfg.output_dir = dir.to_path_buf();
        cfg.phishing_table = "phish".to_string();
        cfg.benign_table = "benign".to_string();
        cfg.retry = RetryPolicy {
            max_attempts: 1,
            delay_ms: 0,
        };
        cfg
    }

    #[test]
    fn overlap_is_sorted_intersection() {
        let a: BTreeSet<String> = ["x.com"].iter().map(|s| s.to_string()).collect();
        let b: BTreeSet<String> = ["y.com", "x.com"].iter().map(|s| s.to_string()).collect();
        assert_eq!(domain_overlap(&a, &b), vec!["x.com".to_string()]);
    }

    #[test]
    fn mean_of_nothing_is_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 3.0]), Some(2.0));
    }

    #[test]
    fn failing_batch_is_skipped_and_run_continues() {
        let dir = tempdir().unwrap();
        let mut driver = PipelineDriver::new(config(dir.path()), || {
            Ok(MemoryProvider {
                phishing: (0..6).map(|i| page(&format!("http://p{i}.com"))).collect(),
                benign: vec![page("http://b.com")],
                fail_offsets: vec![2],
            })
        })
        .unwrap();

        let report = driver.run().unwrap();
        let phishing = &report.categories[0];
        assert_eq!(phishing.batches_seen, 3);
        assert_eq!(phishing.batches_failed, 1);
        assert_eq!(phishing.rows_written, 4);
        assert_eq!(report.categories[1].rows_written, 1);
        assert_eq!(report.sinks.len(), 2);
    }

    /// Slips a foreign row into the sink before serving `offset`.
    struct TamperingProvider {
        inner: MemoryProvider,
        sink: std::path::PathBuf,
        offset: u64,
    }

    impl RecordProvider for TamperingProvider {
        fn count(&mut self, query: &QuerySpec) -> Result<u64, SourceError> {
            self.inner.count(query)
        }

        fn fetch(
            &mut self,
            query: &QuerySpec,
            offset: u64,
            limit: u64,
        ) -> Result<Vec<RawRecord>, SourceError> {
            if query.table == "phish" && offset == self.offset {
                use std::io::Write;
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&self.sink)
                    .map_err(|err| SourceError::Unavailable(err.to_string()))?;
                file.write_all(b"1,1,1,1,1,1,1,1,1\n")
                    .map_err(|err| SourceError::Unavailable(err.to_string()))?;
            }
            self.inner.fetch(query, offset, limit)
        }
    }

    #[test]
    fn row_count_mismatch_is_counted_and_the_batch_kept() {
        let dir = tempdir().unwrap();
        let sink = dir.path().join("phishing_features.csv");
        let mut driver = PipelineDriver::new(config(dir.path()), || {
            Ok(TamperingProvider {
                inner: MemoryProvider {
                    phishing: (0..4).map(|i| page(&format!("http://p{i}.com"))).collect(),
                    benign: vec![page("http://b.com")],
                    fail_offsets: Vec::new(),
                },
                sink: sink.clone(),
                offset: 2,
            })
        })
        .unwrap();

        let report = driver.run().unwrap();
        let phishing = &report.categories[0];
        assert_eq!(phishing.row_count_mismatches, 1);
        assert_eq!(phishing.batches_failed, 0);
        assert_eq!(phishing.rows_written, 4);
        assert_eq!(crate::writer::count_data_rows(&sink).unwrap(), 5);
    }

    #[test]
    fn combined_layout_writes_one_header() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.layout = OutputLayout::Combined;
        let mut driver = PipelineDriver::new(cfg, || {
            Ok(MemoryProvider {
                phishing: vec![page("http://p.com")],
                benign: vec![page("http://b.com")],
                fail_offsets: Vec::new(),
            })
        })
        .unwrap();

        let report = driver.run().unwrap();
        assert_eq!(report.sinks.len(), 1);
        assert_eq!(report.sinks[0].rows_total, 2);
        let contents = std::fs::read_to_string(dir.path().join("features.csv")).unwrap();
        assert_eq!(contents.matches("url_length").count(), 1);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.batch_size = 0;
        let result = PipelineDriver::new(cfg, || -> Result<MemoryProvider, SourceError> {
            Err(SourceError::Unavailable("never called".to_string()))
        });
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
