//! Run configuration resolved from `PHISHFEAT_*` environment variables.

use std::env;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::sampler::DEFAULT_SAMPLE_TARGET;
use crate::source::{
    ChunkingMode, RetryPolicy, SourceOptions, DEFAULT_BATCH_SIZE, DEFAULT_WINDOW_ROWS,
};

pub const DB_STRING_VAR: &str = "PHISHFEAT_DB_STRING";

const SQLITE_SCHEME: &str = "sqlite://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChunkingKind {
    Streaming,
    Windowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputLayout {
    /// `<category>_features.csv` per category.
    PerCategory,
    /// One `features.csv` shared by both categories.
    Combined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionConfig {
    pub db_path: PathBuf,
    pub batch_size: u64,
    pub chunking: ChunkingKind,
    pub window_rows: u64,
    pub total_rows: Option<u64>,
    pub row_limit: Option<u64>,
    pub sample_target: usize,
    pub seed: u64,
    pub stratify: bool,
    pub output_dir: PathBuf,
    pub layout: OutputLayout,
    pub rows_per_file: Option<u64>,
    pub phishing_table: String,
    pub benign_table: String,
    pub retry: RetryPolicy,
    pub resume: bool,
    pub max_sink_failures: u32,
}

impl ExtractionConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            chunking: ChunkingKind::Windowed,
            window_rows: DEFAULT_WINDOW_ROWS,
            total_rows: None,
            row_limit: None,
            sample_target: DEFAULT_SAMPLE_TARGET,
            seed: 42,
            stratify: true,
            output_dir: PathBuf::from("."),
            layout: OutputLayout::PerCategory,
            rows_per_file: None,
            phishing_table: "phishing_2022".to_string(),
            benign_table: "benign_2022".to_string(),
            retry: RetryPolicy::default(),
            resume: false,
            max_sink_failures: 3,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let raw_db = env::var(DB_STRING_VAR)
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .ok_or(ConfigError::MissingVar(DB_STRING_VAR))?;
        let db_path = raw_db
            .strip_prefix(SQLITE_SCHEME)
            .unwrap_or(&raw_db)
            .to_string();

        let mut cfg = Self::new(db_path);

        if let Some(v) = env_u64("PHISHFEAT_BATCH_SIZE")? {
            cfg.batch_size = v;
        }
        if let Some(v) = env_u64("PHISHFEAT_WINDOW_ROWS")? {
            cfg.window_rows = v;
        }
        if let Some(v) = env_u64("PHISHFEAT_SAMPLE_TARGET")? {
            cfg.sample_target = usize::try_from(v).map_err(|_| ConfigError::InvalidValue {
                var: "PHISHFEAT_SAMPLE_TARGET",
                value: v.to_string(),
                reason: "too large".to_string(),
            })?;
        }
        if let Some(v) = env_u64("PHISHFEAT_SEED")? {
            cfg.seed = v;
        }
        if let Some(v) = env_bool("PHISHFEAT_STRATIFY")? {
            cfg.stratify = v;
        }
        if let Some(raw) = env_string("PHISHFEAT_CHUNKING") {
            cfg.chunking = parse_chunking(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: "PHISHFEAT_CHUNKING",
                value: raw.clone(),
                reason: "expected windowed or streaming".to_string(),
            })?;
        }
        cfg.row_limit = env_u64("PHISHFEAT_ROW_LIMIT")?;
        cfg.total_rows = env_u64("PHISHFEAT_TOTAL_ROWS")?;
        if let Some(raw) = env_string("PHISHFEAT_OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_string("PHISHFEAT_OUTPUT_LAYOUT") {
            cfg.layout = parse_layout(&raw).ok_or_else(|| ConfigError::InvalidValue {
                var: "PHISHFEAT_OUTPUT_LAYOUT",
                value: raw.clone(),
                reason: "expected per-category or combined".to_string(),
            })?;
        }
        cfg.rows_per_file = env_u64("PHISHFEAT_ROWS_PER_FILE")?;
        if let Some(raw) = env_string("PHISHFEAT_PHISHING_TABLE") {
            cfg.phishing_table = raw;
        }
        if let Some(raw) = env_string("PHISHFEAT_BENIGN_TABLE") {
            cfg.benign_table = raw;
        }
        if let Some(v) = env_u64("PHISHFEAT_CONNECT_ATTEMPTS")? {
            cfg.retry.max_attempts = u32::try_from(v).unwrap_or(u32::MAX);
        }
        if let Some(v) = env_u64("PHISHFEAT_CONNECT_DELAY_MS")? {
            cfg.retry.delay_ms = v;
        }
        if let Some(v) = env_bool("PHISHFEAT_RESUME")? {
            cfg.resume = v;
        }
        if let Some(v) = env_u64("PHISHFEAT_MAX_SINK_FAILURES")? {
            cfg.max_sink_failures = u32::try_from(v).unwrap_or(u32::MAX);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be >= 1".to_string()));
        }
        if self.window_rows == 0 {
            return Err(ConfigError::Invalid("window_rows must be >= 1".to_string()));
        }
        if self.window_rows < self.batch_size {
            return Err(ConfigError::Invalid(
                "window_rows must be >= batch_size".to_string(),
            ));
        }
        if self.sample_target == 0 {
            return Err(ConfigError::Invalid("sample_target must be >= 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "connect attempts must be >= 1".to_string(),
            ));
        }
        if self.max_sink_failures == 0 {
            return Err(ConfigError::Invalid(
                "max_sink_failures must be >= 1".to_string(),
            ));
        }
        if self.rows_per_file == Some(0) {
            return Err(ConfigError::Invalid("rows_per_file must be >= 1".to_string()));
        }
        if self.resume && self.layout == OutputLayout::Combined {
            return Err(ConfigError::Invalid(
                "resume requires the per-category output layout".to_string(),
            ));
        }
        if self.resume && self.chunking == ChunkingKind::Streaming {
            return Err(ConfigError::Invalid(
                "resume requires windowed chunking".to_string(),
            ));
        }
        Ok(())
    }

    pub fn source_options(&self, start_window: u64) -> SourceOptions {
        let mode = match self.chunking {
            ChunkingKind::Streaming => ChunkingMode::Streaming,
            ChunkingKind::Windowed => ChunkingMode::Windowed {
                window_rows: self.window_rows,
                total_rows: self.total_rows,
            },
        };
        SourceOptions {
            batch_size: self.batch_size,
            mode,
            retry: self.retry,
            start_window,
        }
    }
}

fn env_string(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn env_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match env_string(var) {
        None => Ok(None),
        Some(raw) => raw
            .replace('_', "")
            .parse::<u64>()
            .map(Some)
            .map_err(|err| ConfigError::InvalidValue {
                var,
                value: raw,
                reason: err.to_string(),
            }),
    }
}

fn env_bool(var: &'static str) -> Result<Option<bool>, ConfigError> {
    match env_string(var) {
        None => Ok(None),
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                var,
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_chunking(raw: &str) -> Option<ChunkingKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "windowed" => Some(ChunkingKind::Windowed),
        "streaming" => Some(ChunkingKind::Streaming),
        _ => None,
    }
}

fn parse_layout(raw: &str) -> Option<OutputLayout> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "per-category" | "per_category" => Some(OutputLayout::PerCategory),
        "combined" => Some(OutputLayout::Combined),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_env_vars;

    const ALL_VARS: [&str; 19] = [
        DB_STRING_VAR,
        "PHISHFEAT_BATCH_SIZE",
        "PHISHFEAT_WINDOW_ROWS",
        "PHISHFEAT_SAMPLE_TARGET",
        "PHISHFEAT_SEED",
        "PHISHFEAT_STRATIFY",
        "PHISHFEAT_CHUNKING",
        "PHISHFEAT_ROW_LIMIT",
        "PHISHFEAT_TOTAL_ROWS",
        "PHISHFEAT_OUTPUT_DIR",
        "PHISHFEAT_OUTPUT_LAYOUT",
        "PHISHFEAT_ROWS_PER_FILE",
        "PHISHFEAT_PHISHING_TABLE",
        "PHISHFEAT_BENIGN_TABLE",
        "PHISHFEAT_CONNECT_ATTEMPTS",
        "PHISHFEAT_CONNECT_DELAY_MS",
        "PHISHFEAT_RESUME",
        "PHISHFEAT_MAX_SINK_FAILURES",
        "PHISHFEAT_LOG_LEVEL",
    ];

    fn cleared_with<'a>(set: &[(&'a str, &'a str)]) -> Vec<(&'a str, Option<&'a str>)> {
        let mut vars: Vec<(&str, Option<&str>)> = ALL_VARS.iter().map(|k| (*k, None)).collect();
        for (key, value) in set {
            vars.retain(|(k, _)| k != key);
            vars.push((*key, Some(*value)));
        }
        vars
    }

    #[test]
    fn missing_db_string_is_fatal() {
        let result = with_env_vars(&cleared_with(&[]), ExtractionConfig::from_env);
        assert_eq!(result, Err(ConfigError::MissingVar(DB_STRING_VAR)));
    }

    #[test]
    fn defaults_apply_when_only_db_string_is_set() {
        let cfg = with_env_vars(
            &cleared_with(&[(DB_STRING_VAR, "sqlite://data/pages.sqlite")]),
            ExtractionConfig::from_env,
        )
        .unwrap();

        assert_eq!(cfg.db_path, PathBuf::from("data/pages.sqlite"));
        assert_eq!(cfg.batch_size, 1_000);
        assert_eq!(cfg.window_rows, 100_000);
        assert_eq!(cfg.sample_target, 1_000);
        assert_eq!(cfg.chunking, ChunkingKind::Windowed);
        assert_eq!(cfg.layout, OutputLayout::PerCategory);
        assert!(cfg.stratify);
        assert_eq!(cfg.retry, RetryPolicy::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = with_env_vars(
            &cleared_with(&[
                (DB_STRING_VAR, "/tmp/pages.sqlite"),
                ("PHISHFEAT_BATCH_SIZE", "500"),
                ("PHISHFEAT_WINDOW_ROWS", "10_000"),
                ("PHISHFEAT_CHUNKING", "Streaming"),
                ("PHISHFEAT_OUTPUT_LAYOUT", "combined"),
                ("PHISHFEAT_STRATIFY", "off"),
                ("PHISHFEAT_ROW_LIMIT", "150000"),
            ]),
            ExtractionConfig::from_env,
        )
        .unwrap();

        assert_eq!(cfg.batch_size, 500);
        assert_eq!(cfg.window_rows, 10_000);
        assert_eq!(cfg.chunking, ChunkingKind::Streaming);
        assert_eq!(cfg.layout, OutputLayout::Combined);
        assert!(!cfg.stratify);
        assert_eq!(cfg.row_limit, Some(150_000));
        assert_eq!(cfg.source_options(0).mode, ChunkingMode::Streaming);
    }

    #[test]
    fn bad_numbers_and_conflicts_are_rejected() {
        let err = with_env_vars(
            &cleared_with(&[(DB_STRING_VAR, "x.sqlite"), ("PHISHFEAT_BATCH_SIZE", "lots")]),
            ExtractionConfig::from_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "PHISHFEAT_BATCH_SIZE", .. }));

        let err = with_env_vars(
            &cleared_with(&[
                (DB_STRING_VAR, "x.sqlite"),
                ("PHISHFEAT_RESUME", "true"),
                ("PHISHFEAT_OUTPUT_LAYOUT", "combined"),
            ]),
            ExtractionConfig::from_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let mut cfg = ExtractionConfig::new("x.sqlite");
        cfg.window_rows = 10;
        cfg.batch_size = 20;
        assert!(cfg.validate().is_err());
    }
}
