//! Write-Ahead Log (WAL) for session persistence.
//!
//! Finished routine sessions are appended to a JSONL (JSON Lines) file with
//! file locking so concurrent runs never interleave partial lines.

use crate::{Result, RoutineSession};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Destination for finished sessions
pub trait SessionSink {
    fn append(&mut self, session: &RoutineSession) -> Result<()>;
}

/// In-memory sink
impl SessionSink for Vec<RoutineSession> {
    fn append(&mut self, session: &RoutineSession) -> Result<()> {
        self.push(session.clone());
        Ok(())
    }
}

impl<S: SessionSink + ?Sized> SessionSink for &mut S {
    fn append(&mut self, session: &RoutineSession) -> Result<()> {
        (**self).append(session)
    }
}

/// JSONL-based session sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl SessionSink for JsonlSink {
    fn append(&mut self, session: &RoutineSession) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        // One line per session, written in a single buffered flush
        let mut line = serde_json::to_string(session)?;
        line.push('\n');
        let mut writer = std::io::BufWriter::new(&file);
        writer.write_all(line.as_bytes())?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;

        tracing::debug!("Appended session {} to WAL", session.id);
        Ok(())
    }
}

/// Read all sessions from a WAL file
///
/// Lines that fail to parse (partial writes, manual edits) are skipped with a
/// warning.
pub fn read_sessions(path: &Path) -> Result<Vec<RoutineSession>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut sessions = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to read WAL line {}: {}", line_num + 1, e);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<RoutineSession>(&line) {
            Ok(session) => sessions.push(session),
            Err(e) => {
                tracing::warn!("Failed to parse session at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} sessions from WAL", sessions.len());
    Ok(sessions)
}
