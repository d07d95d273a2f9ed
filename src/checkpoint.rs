//! Per-category window checkpoints for resumable runs.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("checkpoint JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid checkpoint path: {0}")]
    InvalidPath(PathBuf),
}

/// State committed after the last fully processed window of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowCheckpoint {
    pub category: String,
    pub table: String,
    pub next_window: u64,
    pub part_index: usize,
    pub rows_in_part: u64,
    pub rows_total: u64,
}

pub fn checkpoint_path(sink_path: &Path) -> PathBuf {
    let mut name = sink_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".checkpoint.json");
    sink_path.with_file_name(name)
}

pub fn load_checkpoint(path: &Path) -> Result<Option<WindowCheckpoint>, CheckpointError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

pub fn save_checkpoint(path: &Path, checkpoint: &WindowCheckpoint) -> Result<(), CheckpointError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| CheckpointError::InvalidPath(path.to_path_buf()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        serde_json::to_writer_pretty(&mut file, checkpoint)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

pub fn clear_checkpoint(path: &Path) -> Result<(), CheckpointError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
