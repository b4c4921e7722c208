//! CSV rollup functionality for archiving WAL sessions.
//!
//! Sessions are flattened to one row each: identifiers, timestamps, counts,
//! phase durations and calories. Per-series detail stays in the WAL archive.

use crate::{Error, Result, RoutineSession, SessionTotals};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::path::Path;
use uuid::Uuid;

/// A row in the CSV output
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub(crate) struct CsvRow {
    pub id: String,
    pub routine_id: String,
    pub routine_title: String,
    pub started_at: Option<String>,
    pub performed_at: String,
    pub exercise_count: u32,
    pub series_count: u32,
    pub preparation_seconds: u64,
    pub rest_series_seconds: u64,
    pub rest_exercise_seconds: u64,
    pub work_seconds: u64,
    pub calories_kcal: u32,
    /// Semicolon separated
    pub muscles: String,
}

impl From<&RoutineSession> for CsvRow {
    fn from(session: &RoutineSession) -> Self {
        CsvRow {
            id: session.id.to_string(),
            routine_id: session.routine_id.clone(),
            routine_title: session.routine_title.clone(),
            started_at: session.started_at.map(|t| t.to_rfc3339()),
            performed_at: session.performed_at.to_rfc3339(),
            exercise_count: session.exercise_count,
            series_count: session.series_count,
            preparation_seconds: session.totals.preparation_seconds,
            rest_series_seconds: session.totals.rest_series_seconds,
            rest_exercise_seconds: session.totals.rest_between_exercises_seconds,
            work_seconds: session.totals.work_seconds,
            calories_kcal: session.calories_kcal,
            muscles: session.muscles.join(";"),
        }
    }
}

impl TryFrom<CsvRow> for RoutineSession {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Other(format!("Invalid UUID: {}", e)))?;

        let performed_at = DateTime::parse_from_rfc3339(&row.performed_at)
            .map_err(|e| Error::Other(format!("Invalid date: {}", e)))?
            .with_timezone(&Utc);

        let started_at = row
            .started_at
            .as_ref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let muscles = row
            .muscles
            .split(';')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .collect();

        Ok(RoutineSession {
            id,
            routine_id: row.routine_id,
            routine_title: row.routine_title,
            started_at,
            performed_at,
            workouts: vec![], // Not stored in CSV
            totals: SessionTotals {
                preparation_seconds: row.preparation_seconds,
                rest_series_seconds: row.rest_series_seconds,
                rest_between_exercises_seconds: row.rest_exercise_seconds,
                work_seconds: row.work_seconds,
            },
            muscles,
            exercise_count: row.exercise_count,
            series_count: row.series_count,
            notes: vec![],
            calories_kcal: row.calories_kcal,
        })
    }
}

/// Roll up WAL sessions into CSV and archive the WAL atomically
///
/// This function:
/// 1. Reads all sessions from the WAL
/// 2. Appends them to the CSV file (creates with headers if needed)
/// 3. Syncs the CSV to disk
/// 4. Renames the WAL to .processed
/// 5. Returns the number of sessions processed
///
/// The CSV is fsynced before the WAL is renamed, and the WAL is renamed
/// rather than deleted so it can be recovered by hand.
pub fn wal_to_csv_and_archive(wal_path: &Path, csv_path: &Path) -> Result<usize> {
    let sessions = crate::wal::read_sessions(wal_path)?;

    if sessions.is_empty() {
        tracing::info!("No sessions in WAL to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Headers only for a fresh file
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for session in &sessions {
        writer.serialize(CsvRow::from(session))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} sessions to CSV", sessions.len());

    let processed_path = wal_path.with_extension("wal.processed");
    std::fs::rename(wal_path, &processed_path)?;

    tracing::info!("Archived WAL to {:?}", processed_path);

    Ok(sessions.len())
}

/// Remove all `.wal.processed` files in `dir`
pub fn cleanup_processed_wals(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed WAL: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed WAL files", count);
    }

    Ok(count)
}
