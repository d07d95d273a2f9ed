//! Phishing/benign page feature extraction.
//!
//! Implemented scope:
//! - bounded-memory batch reads from a SQLite page store, streaming or offset-windowed
//! - per-month stratified sampling with reproducible seeds
//! - URL and markup feature transform
//! - incremental CSV sinks with row-count verification, part rolling and digests
//! - window checkpoints for resumable runs

mod checkpoint;
mod config;
mod features;
mod observability;
mod pipeline;
mod record;
mod sampler;
mod source;
#[cfg(test)]
mod test_support;
mod writer;

pub use checkpoint::{
    checkpoint_path, clear_checkpoint, load_checkpoint, save_checkpoint, CheckpointError,
    WindowCheckpoint,
};
pub use config::{ChunkingKind, ConfigError, ExtractionConfig, OutputLayout, DB_STRING_VAR};
pub use features::{
    count_external_links, count_scripts, count_special_chars, extract_batch, has_https,
    has_suspicious_keyword, network_location, transform, BatchFeatures, NetlocError,
    SUSPICIOUS_KEYWORDS,
};
pub use observability::{
    init_logging, log_app_start, log_run_config, logging_config_from_env, LogFormat,
    LoggingConfig, LoggingInitError,
};
pub use pipeline::{
    domain_overlap, mean, BatchError, Category, CategoryAccumulator, CategorySummary,
    PipelineDriver, PipelineError, RunReport, PROGRESS_EVERY_BATCHES,
};
pub use record::{FeatureRecord, Label, LabeledBatch, RawRecord, FEATURE_COLUMNS};
pub use sampler::{
    MonthGroupSummary, MonthKey, SampleOutcome, StratifiedSample, StratifiedSampler,
    DEFAULT_SAMPLE_TARGET,
};
pub use source::{
    parse_timestamp_text, retry_fixed, BatchFetchError, BatchPosition, ChunkedSource,
    ChunkingMode, QuerySpec, RecordProvider, RetryPolicy, SourceBatch, SourceError,
    SourceOptions, SqliteRecordStore, WindowPlan, DEFAULT_BATCH_SIZE, DEFAULT_WINDOW_ROWS,
};
pub use writer::{
    count_data_rows, part_path, read_feature_file, IncrementalWriter, PartState,
    RowCountMismatch, SinkPartSummary, SinkSpec, SinkState, SinkSummary, WriteReport,
    WriterError,
};
