//! Session history loading and summaries.
//!
//! Recent sessions are read from both the live WAL and the CSV archive,
//! deduplicated by id, and summarised for the `history` command.

use crate::csv_rollup::CsvRow;
use crate::{Result, RoutineSession};
use chrono::{Duration, Utc};
use csv::ReaderBuilder;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Load sessions from the last N days from both WAL and CSV
///
/// Returns sessions sorted by performed_at (newest first). Sessions present
/// in both sources are kept once, preferring the WAL copy which still carries
/// per-exercise detail.
pub fn load_recent_sessions(
    wal_path: &Path,
    csv_path: &Path,
    days: i64,
) -> Result<Vec<RoutineSession>> {
    let cutoff = Utc::now() - Duration::days(days);
    let mut sessions = Vec::new();
    let mut seen_ids = HashSet::new();

    if wal_path.exists() {
        for session in crate::wal::read_sessions(wal_path)? {
            if session.performed_at >= cutoff && seen_ids.insert(session.id) {
                sessions.push(session);
            }
        }
        tracing::debug!("Loaded {} sessions from WAL", sessions.len());
    }

    if csv_path.exists() {
        let mut csv_count = 0;
        for session in load_sessions_from_csv(csv_path)? {
            if session.performed_at >= cutoff && seen_ids.insert(session.id) {
                sessions.push(session);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} sessions from CSV", csv_count);
    }

    sessions.sort_by(|a, b| b.performed_at.cmp(&a.performed_at));

    tracing::info!(
        "Loaded {} total sessions from last {} days",
        sessions.len(),
        days
    );

    Ok(sessions)
}

/// Load all sessions from a CSV file, skipping bad rows
fn load_sessions_from_csv(path: &Path) -> Result<Vec<RoutineSession>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut sessions = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match RoutineSession::try_from(row) {
                Ok(session) => sessions.push(session),
                Err(e) => tracing::warn!("Failed to parse CSV row: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(sessions)
}

/// Totals over a set of sessions
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistorySummary {
    pub sessions: usize,
    pub total_kcal: u64,
    pub total_work_seconds: u64,
    pub total_rest_seconds: u64,
    pub average_kcal: f64,
    /// Most trained muscles with the number of sessions hitting them
    pub top_muscles: Vec<(String, usize)>,
}

/// Summarise sessions; `top_muscles` holds at most five entries
pub fn summarize(sessions: &[RoutineSession]) -> HistorySummary {
    let mut summary = HistorySummary {
        sessions: sessions.len(),
        ..Default::default()
    };
    let mut muscle_counts: HashMap<&str, usize> = HashMap::new();

    for session in sessions {
        summary.total_kcal += u64::from(session.calories_kcal);
        summary.total_work_seconds += session.totals.work_seconds;
        summary.total_rest_seconds += session.totals.rest_seconds();
        for muscle in &session.muscles {
            *muscle_counts.entry(muscle.as_str()).or_default() += 1;
        }
    }

    if !sessions.is_empty() {
        summary.average_kcal = summary.total_kcal as f64 / sessions.len() as f64;
    }

    let mut top: Vec<(String, usize)> = muscle_counts
        .into_iter()
        .map(|(m, n)| (m.to_string(), n))
        .collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(5);
    summary.top_muscles = top;

    summary
}
