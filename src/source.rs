//! Bounded-size batch reads from the bulk page store.
//!
//! Two chunking modes are supported:
//! - streaming: consecutive batches of `batch_size` rows until the store runs dry
//! - windowed: the (pre-)counted total is split into fixed offset windows, each read in
//!   `batch_size` sub-batches, so an interrupted run only replays the current window

use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::record::RawRecord;

pub const DEFAULT_BATCH_SIZE: u64 = 1_000;
pub const DEFAULT_WINDOW_ROWS: u64 = 100_000;

const MILLIS_THRESHOLD: i64 = 100_000_000_000;
const MAX_CONSECUTIVE_STREAM_FAILURES: u32 = 3;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid source query: {0}")]
    InvalidQuery(String),
    #[error("invalid source options: {0}")]
    InvalidOptions(String),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("record source unavailable: {0}")]
    Unavailable(String),
    #[error("record source unreachable after {attempts} attempts: {last_error}")]
    ConnectExhausted { attempts: u32, last_error: String },
}

/// Fixed three-column selection over one table, with an optional overall row cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuerySpec {
    pub table: String,
    pub row_limit: Option<u64>,
}

impl QuerySpec {
    pub fn new(table: impl Into<String>, row_limit: Option<u64>) -> Result<Self, SourceError> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(SourceError::InvalidQuery(format!(
                "table name must be a plain identifier: {table:?}"
            )));
        }
        Ok(Self { table, row_limit })
    }

    fn cap(&self, rows: u64) -> u64 {
        match self.row_limit {
            Some(limit) => rows.min(limit),
            None => rows,
        }
    }
}

fn is_identifier(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Paginated access to raw page records.
pub trait RecordProvider {
    fn count(&mut self, query: &QuerySpec) -> Result<u64, SourceError>;

    fn fetch(
        &mut self,
        query: &QuerySpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RawRecord>, SourceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 2_000,
        }
    }
}

/// Runs `f` until it succeeds or `policy.max_attempts` is used up, sleeping a fixed delay
/// between attempts.
pub fn retry_fixed<T>(
    policy: &RetryPolicy,
    mut f: impl FnMut() -> Result<T, SourceError>,
) -> Result<T, SourceError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= max_attempts => {
                return Err(SourceError::ConnectExhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                })
            }
            Err(err) => {
                warn!(
                    component = "source",
                    event = "source.open.attempt_failed",
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay_ms,
                    error = %err
                );
                sleep(Duration::from_millis(policy.delay_ms));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChunkingMode {
    Streaming,
    Windowed {
        window_rows: u64,
        total_rows: Option<u64>,
    },
}

impl Default for ChunkingMode {
    fn default() -> Self {
        Self::Windowed {
            window_rows: DEFAULT_WINDOW_ROWS,
            total_rows: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceOptions {
    pub batch_size: u64,
    pub mode: ChunkingMode,
    pub retry: RetryPolicy,
    /// First window to read in windowed mode; earlier windows are skipped.
    pub start_window: u64,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            mode: ChunkingMode::default(),
            retry: RetryPolicy::default(),
            start_window: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowPlan {
    pub total_rows: u64,
    pub window_rows: u64,
}

impl WindowPlan {
    pub fn window_count(&self) -> u64 {
        self.total_rows.div_ceil(self.window_rows)
    }

    pub fn window_of(&self, offset: u64) -> u64 {
        offset / self.window_rows
    }

    pub fn window_end(&self, window_index: u64) -> u64 {
        window_index
            .saturating_add(1)
            .saturating_mul(self.window_rows)
            .min(self.total_rows)
    }
}

/// Where a batch sits in the source, whether or not its fetch succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchPosition {
    pub batch_index: u64,
    pub window_index: Option<u64>,
    pub offset: u64,
    pub limit: u64,
    /// True when this is the last batch of its window.
    pub closes_window: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBatch {
    pub position: BatchPosition,
    pub records: Vec<RawRecord>,
}

#[derive(Debug, Error)]
#[error(
    "batch {} at offset {} could not be fetched: {source}",
    .position.batch_index,
    .position.offset
)]
pub struct BatchFetchError {
    pub position: BatchPosition,
    #[source]
    pub source: SourceError,
}

pub struct ChunkedSource<P> {
    provider: P,
    query: QuerySpec,
    batch_size: u64,
    plan: Option<WindowPlan>,
    next_offset: u64,
    next_batch_index: u64,
    stream_failures: u32,
    exhausted: bool,
}

impl<P: RecordProvider> ChunkedSource<P> {
    /// Connects (with retry) and, in windowed mode, resolves the total row count.
    pub fn open(
        mut connect: impl FnMut() -> Result<P, SourceError>,
        query: QuerySpec,
        options: SourceOptions,
    ) -> Result<Self, SourceError> {
        if options.batch_size == 0 {
            return Err(SourceError::InvalidOptions(
                "batch_size must be >= 1".to_string(),
            ));
        }
        if matches!(options.mode, ChunkingMode::Windowed { window_rows: 0, .. }) {
            return Err(SourceError::InvalidOptions(
                "window_rows must be >= 1".to_string(),
            ));
        }

        let (provider, plan) = retry_fixed(&options.retry, || {
            let mut provider = connect()?;
            let plan = match options.mode {
                ChunkingMode::Streaming => None,
                ChunkingMode::Windowed {
                    window_rows,
                    total_rows: Some(total),
                } => Some(WindowPlan {
                    total_rows: query.cap(total),
                    window_rows,
                }),
                ChunkingMode::Windowed {
                    window_rows,
                    total_rows: None,
                } => Some(WindowPlan {
                    total_rows: provider.count(&query)?,
                    window_rows,
                }),
            };
            Ok((provider, plan))
        })?;

        // Batch indices stay absolute on resume so per-batch sampling seeds do not shift.
        let (next_offset, next_batch_index) = match plan {
            Some(plan) => (
                options.start_window.saturating_mul(plan.window_rows),
                options
                    .start_window
                    .saturating_mul(plan.window_rows.div_ceil(options.batch_size)),
            ),
            None => (0, 0),
        };

        info!(
            component = "source",
            event = "source.open.ready",
            table = %query.table,
            row_limit = ?query.row_limit,
            batch_size = options.batch_size,
            total_rows = plan.map(|p| p.total_rows),
            window_count = plan.map(|p| p.window_count()),
            start_window = options.start_window
        );

        Ok(Self {
            provider,
            query,
            batch_size: options.batch_size,
            plan,
            next_offset,
            next_batch_index,
            stream_failures: 0,
            exhausted: false,
        })
    }

    pub fn plan(&self) -> Option<WindowPlan> {
        self.plan
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    /// Fetches the next batch. `None` is end of data; an `Err` covers this batch only and the
    /// cursor has already moved past it.
    pub fn next_batch(&mut self) -> Option<Result<SourceBatch, BatchFetchError>> {
        if self.exhausted {
            return None;
        }
        let position = self.next_position()?;

        self.next_offset = position.offset + position.limit;
        self.next_batch_index += 1;

        if position.window_index.is_some() && position.offset % self.window_rows() == 0 {
            debug!(
                component = "source",
                event = "source.window.start",
                table = %self.query.table,
                window_index = position.window_index,
                offset = position.offset
            );
        }

        match self.provider.fetch(&self.query, position.offset, position.limit) {
            Ok(records) => {
                self.stream_failures = 0;
                if self.plan.is_none() && (records.len() as u64) < position.limit {
                    self.exhausted = true;
                    if records.is_empty() {
                        return None;
                    }
                }
                Some(Ok(SourceBatch { position, records }))
            }
            Err(source) => {
                if self.plan.is_none() {
                    self.stream_failures += 1;
                    if self.stream_failures >= MAX_CONSECUTIVE_STREAM_FAILURES {
                        error!(
                            component = "source",
                            event = "source.stream.abandoned",
                            table = %self.query.table,
                            consecutive_failures = self.stream_failures,
                            offset = position.offset
                        );
                        self.exhausted = true;
                    }
                }
                Some(Err(BatchFetchError { position, source }))
            }
        }
    }

    fn window_rows(&self) -> u64 {
        self.plan.map(|p| p.window_rows).unwrap_or(u64::MAX)
    }

    fn next_position(&mut self) -> Option<BatchPosition> {
        let offset = self.next_offset;
        match self.plan {
            Some(plan) => {
                if offset >= plan.total_rows {
                    self.exhausted = true;
                    return None;
                }
                let window_index = plan.window_of(offset);
                let window_end = plan.window_end(window_index);
                let limit = self.batch_size.min(window_end - offset);
                Some(BatchPosition {
                    batch_index: self.next_batch_index,
                    window_index: Some(window_index),
                    offset,
                    limit,
                    closes_window: offset + limit >= window_end,
                })
            }
            None => {
                let remaining = match self.query.row_limit {
                    Some(cap) if offset >= cap => {
                        self.exhausted = true;
                        return None;
                    }
                    Some(cap) => cap - offset,
                    None => u64::MAX,
                };
                Some(BatchPosition {
                    batch_index: self.next_batch_index,
                    window_index: None,
                    offset,
                    limit: self.batch_size.min(remaining),
                    closes_window: false,
                })
            }
        }
    }
}

impl<P: RecordProvider> Iterator for ChunkedSource<P> {
    type Item = Result<SourceBatch, BatchFetchError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}

/// Read-only SQLite page store with one table per category.
pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(Self { conn })
    }
}

impl RecordProvider for SqliteRecordStore {
    fn count(&mut self, query: &QuerySpec) -> Result<u64, SourceError> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", query.table);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(query.cap(count.max(0) as u64))
    }

    fn fetch(
        &mut self,
        query: &QuerySpec,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let sql = format!(
            "
            SELECT url, source_code, datetime
            FROM \"{}\"
            ORDER BY rowid ASC
            LIMIT ?1 OFFSET ?2
            ",
            query.table
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params![limit, offset])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(RawRecord {
                url: decode_text(row.get_ref(0)?),
                source_markup: decode_text(row.get_ref(1)?),
                observed_at: decode_observed_at(row.get_ref(2)?),
            });
        }
        Ok(out)
    }
}

fn decode_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(v) => Some(v.to_string()),
        ValueRef::Real(v) => Some(v.to_string()),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

fn decode_observed_at(value: ValueRef<'_>) -> Option<DateTime<Utc>> {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(v) => from_unix(v),
        ValueRef::Real(v) if v.is_finite() => from_unix(v.trunc() as i64),
        ValueRef::Real(_) => None,
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(parse_timestamp_text),
    }
}

fn from_unix(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (space or `T`) and bare dates as UTC.
pub fn parse_timestamp_text(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
