//! Append-only transcript of chat events
//!
//! One file per server run. Each append opens the file in append mode, writes
//! one event and closes it again; appends are serialized by an in-process lock
//! so the file order is the order in which appends completed.

use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Transcript storage errors. These are fatal for the server.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to create history directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to append to history file {path}: {source}")]
    Append {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read history file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Per-run transcript file
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    /// Create `dir` if needed and start `history-<run_stamp>.txt` inside it
    pub fn create(dir: &Path, run_stamp: &str) -> Result<Self, HistoryError> {
        std::fs::create_dir_all(dir).map_err(|source| HistoryError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Self::open(dir.join(format!("history-{}.txt", run_stamp)))
    }

    /// Use `path` as the transcript file, creating it empty if it is missing
    pub fn open(path: PathBuf) -> Result<Self, HistoryError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| HistoryError::Append {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event exactly as given
    ///
    /// Blocking file I/O, called straight from connection tasks. Each call is
    /// one short open-write-close, and the lock keeps appends from
    /// interleaving across sessions.
    pub fn append(&self, line: &str) -> Result<(), HistoryError> {
        let _guard = self.write_lock.lock();
        let to_err = |source| HistoryError::Append {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(to_err)?;
        file.write_all(line.as_bytes()).map_err(to_err)?;
        Ok(())
    }

    /// All transcript lines, optionally without the most recent one
    pub fn read_lines(&self, exclude_last: bool) -> Result<Vec<String>, HistoryError> {
        let content =
            std::fs::read_to_string(&self.path).map_err(|source| HistoryError::Read {
                path: self.path.clone(),
                source,
            })?;

        let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
        if exclude_last {
            lines.pop();
        }
        Ok(lines)
    }

    /// Transcript text with lines joined by `\n` and no trailing terminator
    pub fn read_all(&self, exclude_last: bool) -> Result<String, HistoryError> {
        Ok(self.read_lines(exclude_last)?.join("\n"))
    }
}
