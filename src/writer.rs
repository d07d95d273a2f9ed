//! Incremental CSV sinks for feature rows.
//!
//! A sink is created (truncated, header written) on its first write and appended to
//! afterwards. After every write the part file is re-read and its data-row count compared
//! with what the writer believes it holds; a difference is reported, never raised.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::FeatureRecord;

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("unknown sink: {0}")]
    UnknownSink(String),
    #[error("invalid sink path {path}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("cannot resume {path}: checkpoint expects {expected} rows, file holds {actual}")]
    ResumeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkSpec {
    pub id: String,
    pub path: PathBuf,
    /// Roll to a new part file once the current one holds at least this many rows.
    pub rows_per_file: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartState {
    pub path: PathBuf,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkState {
    pub base_path: PathBuf,
    pub rows_per_file: Option<u64>,
    pub header_written: bool,
    pub rows_total: u64,
    pub parts: Vec<PartState>,
}

impl SinkState {
    fn new(spec: &SinkSpec) -> Self {
        Self {
            base_path: spec.path.clone(),
            rows_per_file: spec.rows_per_file,
            header_written: false,
            rows_total: 0,
            parts: Vec::new(),
        }
    }

    pub fn part_index(&self) -> usize {
        self.parts.len().saturating_sub(1)
    }

    pub fn rows_in_part(&self) -> u64 {
        self.parts.last().map(|part| part.rows).unwrap_or(0)
    }

    fn should_roll(&self) -> bool {
        match self.rows_per_file {
            Some(cap) => self.header_written && self.rows_in_part() >= cap,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowCountMismatch {
    pub path: PathBuf,
    pub expected: u64,
    pub actual: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub path: PathBuf,
    pub rows_written: u64,
    pub created: bool,
    pub mismatch: Option<RowCountMismatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkPartSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SinkSummary {
    pub id: String,
    pub rows_total: u64,
    pub parts: Vec<SinkPartSummary>,
}

#[derive(Debug, Default)]
pub struct IncrementalWriter {
    sinks: BTreeMap<String, SinkState>,
}

impl IncrementalWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the destination directory. Registering an id twice keeps the existing state.
    pub fn register(&mut self, spec: SinkSpec) -> Result<(), WriterError> {
        if self.sinks.contains_key(&spec.id) {
            return Ok(());
        }
        if spec.path.is_dir() {
            return Err(WriterError::InvalidPath {
                path: spec.path.clone(),
                reason: "path is a directory".to_string(),
            });
        }
        if let Some(parent) = spec.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.sinks.insert(spec.id.clone(), SinkState::new(&spec));
        Ok(())
    }

    pub fn state(&self, id: &str) -> Option<&SinkState> {
        self.sinks.get(id)
    }

    pub fn header_written(&self, id: &str) -> bool {
        self.sinks
            .get(id)
            .map(|state| state.header_written)
            .unwrap_or(false)
    }

    /// Whether the next non-empty append will create a part file (first write or roll).
    pub fn next_write_creates(&self, id: &str) -> bool {
        self.sinks
            .get(id)
            .map(|state| !state.header_written || state.should_roll())
            .unwrap_or(false)
    }

    /// Writes `records` to the sink. `is_first_write` truncates the sink and starts over with
    /// a header; an empty record slice leaves the sink untouched.
    pub fn append(
        &mut self,
        id: &str,
        records: &[FeatureRecord],
        is_first_write: bool,
    ) -> Result<WriteReport, WriterError> {
        let state = self
            .sinks
            .get_mut(id)
            .ok_or_else(|| WriterError::UnknownSink(id.to_string()))?;

        if records.is_empty() {
            return Ok(WriteReport {
                path: state
                    .parts
                    .last()
                    .map(|part| part.path.clone())
                    .unwrap_or_else(|| state.base_path.clone()),
                rows_written: 0,
                created: false,
                mismatch: None,
            });
        }

        if is_first_write {
            state.header_written = false;
            state.rows_total = 0;
            state.parts.clear();
        }

        let rolled = state.should_roll();
        let create = !state.header_written || rolled;
        let path = if create {
            part_path(&state.base_path, if rolled { state.parts.len() } else { 0 })
        } else {
            state
                .parts
                .last()
                .map(|part| part.path.clone())
                .unwrap_or_else(|| state.base_path.clone())
        };

        write_rows(&path, records, create)?;

        let written = records.len() as u64;
        if create {
            if !rolled {
                state.parts.clear();
            }
            state.parts.push(PartState {
                path: path.clone(),
                rows: 0,
            });
        }
        state.header_written = true;
        state.rows_total += written;
        let expected = match state.parts.last_mut() {
            Some(part) => {
                part.rows += written;
                part.rows
            }
            None => written,
        };

        if rolled {
            info!(
                component = "writer",
                event = "writer.part.rolled",
                sink = id,
                path = %path.display(),
                part_index = state.part_index()
            );
        }

        let mismatch = match count_data_rows(&path) {
            Ok(actual) => (actual != expected).then(|| RowCountMismatch {
                path: path.clone(),
                expected,
                actual,
            }),
            Err(err) => {
                warn!(
                    component = "writer",
                    event = "writer.verify_failed",
                    sink = id,
                    path = %path.display(),
                    error = %err
                );
                None
            }
        };
        if let Some(m) = &mismatch {
            warn!(
                component = "writer",
                event = "writer.row_count_mismatch",
                sink = id,
                path = %m.path.display(),
                expected_rows = m.expected,
                actual_rows = m.actual
            );
        }

        debug!(
            component = "writer",
            event = "writer.append",
            sink = id,
            path = %path.display(),
            rows_written = written,
            created = create,
            rows_total = state.rows_total
        );

        Ok(WriteReport {
            path,
            rows_written: written,
            created: create,
            mismatch,
        })
    }

    /// Puts a sink back to a previously committed position: the given part is truncated to
    /// header + `rows_in_part` rows and any later parts are deleted.
    pub fn restore(
        &mut self,
        id: &str,
        part_index: usize,
        rows_in_part: u64,
    ) -> Result<(), WriterError> {
        let state = self
            .sinks
            .get_mut(id)
            .ok_or_else(|| WriterError::UnknownSink(id.to_string()))?;

        let mut parts = Vec::with_capacity(part_index + 1);
        for idx in 0..part_index {
            let path = part_path(&state.base_path, idx);
            let rows = count_data_rows(&path)?;
            parts.push(PartState { path, rows });
        }

        let current = part_path(&state.base_path, part_index);
        let header_written = if current.exists() {
            let has_header = truncate_to_rows(&current, rows_in_part)?;
            if has_header {
                parts.push(PartState {
                    path: current.clone(),
                    rows: rows_in_part,
                });
            }
            has_header || !parts.is_empty()
        } else if rows_in_part == 0 {
            !parts.is_empty()
        } else {
            return Err(WriterError::ResumeMismatch {
                path: current,
                expected: rows_in_part,
                actual: 0,
            });
        };

        for (index, path) in existing_parts(&state.base_path)? {
            if index > part_index {
                fs::remove_file(&path)?;
            }
        }

        state.rows_total = parts.iter().map(|part| part.rows).sum();
        state.header_written = header_written;
        state.parts = parts;

        info!(
            component = "writer",
            event = "writer.restored",
            sink = id,
            part_index,
            rows_in_part,
            rows_total = state.rows_total
        );
        Ok(())
    }

    /// Deletes the base file and every rolled part an earlier run left behind, so a fresh run
    /// never leaves stale rows next to its own output.
    pub fn discard_existing(&mut self, id: &str) -> Result<usize, WriterError> {
        let state = self
            .sinks
            .get_mut(id)
            .ok_or_else(|| WriterError::UnknownSink(id.to_string()))?;

        let stale = existing_parts(&state.base_path)?;
        for (_, path) in &stale {
            fs::remove_file(path)?;
        }
        state.header_written = false;
        state.rows_total = 0;
        state.parts.clear();

        if !stale.is_empty() {
            info!(
                component = "writer",
                event = "writer.stale_parts_removed",
                sink = id,
                removed = stale.len()
            );
        }
        Ok(stale.len())
    }

    /// Closes the sink and returns every part with its row count and SHA-256 digest.
    pub fn finish(&mut self, id: &str) -> Result<SinkSummary, WriterError> {
        let state = self
            .sinks
            .remove(id)
            .ok_or_else(|| WriterError::UnknownSink(id.to_string()))?;

        let mut parts = Vec::with_capacity(state.parts.len());
        for part in &state.parts {
            parts.push(SinkPartSummary {
                path: part.path.clone(),
                rows: part.rows,
                sha256: file_sha256_hex(&part.path)?,
            });
        }

        info!(
            component = "writer",
            event = "writer.sink.closed",
            sink = id,
            rows_total = state.rows_total,
            part_count = parts.len()
        );

        Ok(SinkSummary {
            id: id.to_string(),
            rows_total: state.rows_total,
            parts,
        })
    }
}

/// `features.csv` for part 0, `features_1.csv`, `features_2.csv`, ... after that.
pub fn part_path(base: &Path, part_index: usize) -> PathBuf {
    if part_index == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{part_index}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{part_index}"),
    };
    base.with_file_name(name)
}

/// Part files of `base` currently on disk (regular files only), ordered by part index.
fn existing_parts(base: &Path) -> Result<Vec<(usize, PathBuf)>, WriterError> {
    let mut found = Vec::new();
    if base.is_file() {
        found.push((0, base.to_path_buf()));
    }

    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(found),
        Err(err) => return Err(err.into()),
    };
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(index) = rolled_part_index(base, &path) {
            found.push((index, path));
        }
    }

    found.sort();
    Ok(found)
}

/// `Some(n)` when `path` is exactly `part_path(base, n)` for some `n >= 1`.
fn rolled_part_index(base: &Path, path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let stem = base.file_stem()?.to_str()?;
    let rest = name.strip_prefix(stem)?.strip_prefix('_')?;
    let digits = match base.extension() {
        Some(ext) => rest.strip_suffix(ext.to_str()?)?.strip_suffix('.')?,
        None => rest,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: usize = digits.parse().ok()?;
    (index >= 1 && part_path(base, index).file_name() == path.file_name()).then_some(index)
}

fn write_rows(path: &Path, records: &[FeatureRecord], create: bool) -> Result<(), WriterError> {
    let file = if create {
        File::create(path)?
    } else {
        OpenOptions::new().append(true).open(path)?
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(create)
        .from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Number of data rows (excluding the header) currently in a sink file.
pub fn count_data_rows(path: &Path) -> Result<u64, WriterError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;
    let mut rows = 0u64;
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        rows += 1;
    }
    Ok(rows)
}

pub fn read_feature_file(path: &Path) -> Result<Vec<FeatureRecord>, WriterError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut out = Vec::new();
    for row in reader.deserialize() {
        out.push(row?);
    }
    Ok(out)
}

/// Cuts the file after its header and `rows` data lines. Returns false when the file has no
/// header line at all.
fn truncate_to_rows(path: &Path, rows: u64) -> Result<bool, WriterError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut keep_bytes = 0u64;
    let mut kept_rows = 0u64;
    let mut line = Vec::new();

    // Header line first, then `rows` data lines.
    let wanted_lines = rows + 1;
    let mut seen_lines = 0u64;
    while seen_lines < wanted_lines {
        line.clear();
        let read = reader.read_until(b'\n', &mut line)?;
        if read == 0 {
            break;
        }
        keep_bytes += read as u64;
        seen_lines += 1;
        if seen_lines > 1 {
            kept_rows += 1;
        }
    }

    if kept_rows < rows {
        return Err(WriterError::ResumeMismatch {
            path: path.to_path_buf(),
            expected: rows,
            actual: kept_rows,
        });
    }

    OpenOptions::new().write(true).open(path)?.set_len(keep_bytes)?;
    Ok(keep_bytes > 0)
}

fn file_sha256_hex(path: &Path) -> Result<String, WriterError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
