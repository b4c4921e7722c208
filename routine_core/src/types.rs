//! Core domain types for the Routine system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Routines, exercises and their series
//! - Exercise metadata used by the calorie model
//! - Phases and positions inside a running routine
//! - Finished session records and body measurements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Series Types
// ============================================================================

/// Classification of a series
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    WarmUp,
    #[default]
    WorkingSet,
}

/// Which measurements of a series are meaningful
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeriesUnit {
    #[default]
    RepsAndWeight,
    Reps,
    Time,
    Distance,
}

/// One prescribed unit of work (a "set")
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Series {
    #[serde(default)]
    pub kind: SeriesKind,
    #[serde(default)]
    pub unit: SeriesUnit,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub distance_meters: Option<f64>,
    #[serde(default)]
    pub incline_percent: Option<f64>,
    #[serde(default)]
    pub power_watts: Option<f64>,
    /// Perceived exertion, 1-10. Only meaningful for working sets.
    #[serde(default)]
    pub rpe: Option<u8>,
    /// Rest after this series (`mm:ss`) when it is not the exercise's last
    #[serde(default)]
    pub rest: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Series {
    pub fn is_working_set(&self) -> bool {
        self.kind == SeriesKind::WorkingSet
    }

    /// Rest after this series in seconds (unparsable values count as zero)
    pub fn rest_seconds(&self) -> u64 {
        parse_clock(&self.rest).unwrap_or(0)
    }

    /// Average speed in metres per minute for time/distance series
    ///
    /// Returns None unless both distance and duration are recorded.
    pub fn speed_m_per_min(&self) -> Option<f64> {
        if !matches!(self.unit, SeriesUnit::Time | SeriesUnit::Distance) {
            return None;
        }
        let meters = self.distance_meters.filter(|d| *d > 0.0)?;
        let seconds = self.duration_seconds.filter(|d| *d > 0)?;
        Some(meters / (f64::from(seconds) / 60.0))
    }
}

// ============================================================================
// Routine Types
// ============================================================================

/// An exercise inside a routine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    /// Catalog key (e.g. "bench_press")
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub series: Vec<Series>,
    /// Fixed rest after the exercise's last series (`mm:ss`)
    #[serde(default)]
    pub rest_after: Option<String>,
}

impl Exercise {
    /// Rest after the exercise's last series
    ///
    /// Absent configuration falls back to `default_seconds`; a configured but
    /// unparsable value counts as zero.
    pub fn rest_after_seconds(&self, default_seconds: u64) -> u64 {
        match &self.rest_after {
            Some(rest) => parse_clock(rest).unwrap_or(0),
            None => default_seconds,
        }
    }
}

/// Routine-level preparation countdown before each series
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Preparation {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub duration: Option<String>,
}

impl Preparation {
    /// Effective preparation time; zero when disabled or unset
    pub fn seconds(&self) -> u64 {
        if !self.enabled {
            return 0;
        }
        self.duration
            .as_deref()
            .and_then(parse_clock)
            .unwrap_or(0)
    }
}

/// A user-built workout routine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Routine {
    pub id: String,
    pub title: String,
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub preparation: Preparation,
}

impl Routine {
    pub fn series_count(&self) -> usize {
        self.exercises.iter().map(|e| e.series.len()).sum()
    }
}

/// Parse a `mm:ss` (or bare seconds) duration
///
/// ```
/// use routine_core::parse_clock;
/// assert_eq!(parse_clock("0:30"), Some(30));
/// assert_eq!(parse_clock("02:05"), Some(125));
/// assert_eq!(parse_clock("90"), Some(90));
/// assert_eq!(parse_clock("1:75"), None);
/// ```
pub fn parse_clock(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    match s.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.trim().parse().ok()?;
            let seconds: u64 = seconds.trim().parse().ok()?;
            if seconds >= 60 {
                return None;
            }
            minutes.checked_mul(60)?.checked_add(seconds)
        }
        None => s.parse().ok(),
    }
}

// ============================================================================
// Exercise Metadata
// ============================================================================

/// Cardio classification used to pick an ACSM equation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CardioMode {
    Walk,
    Run,
    Bike,
    Row,
    Elliptical,
    Other,
}

/// Static metadata for an exercise key
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseMeta {
    pub key: String,
    pub name: String,
    pub muscles: Vec<String>,
    pub default_met: Option<f64>,
    pub cardio_mode: Option<CardioMode>,
}

impl ExerciseMeta {
    /// Metadata for a key the catalog does not know
    pub fn unknown(key: &str) -> Self {
        Self {
            key: key.to_string(),
            name: key.to_string(),
            muscles: Vec::new(),
            default_met: None,
            cardio_mode: None,
        }
    }

    pub fn is_cardio(&self) -> bool {
        self.cardio_mode.is_some()
    }
}

/// The catalog of known exercises
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub exercises: HashMap<String, ExerciseMeta>,
}

// ============================================================================
// Session Runtime Types
// ============================================================================

/// Position of a series inside a routine
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SeriesRef {
    pub exercise: usize,
    pub series: usize,
}

impl SeriesRef {
    pub fn new(exercise: usize, series: usize) -> Self {
        Self { exercise, series }
    }
}

/// Which kind of rest is running
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RestType {
    /// Between two series of the same exercise
    Series,
    /// After an exercise's last series
    Exercise,
}

/// Timed phase of a routine execution
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Preparation,
    Work,
    Rest(RestType),
}

/// When to ask the user for a perceived exertion rating
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RpeMode {
    #[default]
    Ask,
    Never,
}

// ============================================================================
// Session Records
// ============================================================================

/// Finalized record of one exercise inside a session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub exercise_key: String,
    pub name: String,
    pub muscles: Vec<String>,
    pub series: Vec<Series>,
    pub preparation_seconds: u64,
    pub rest_series_seconds: u64,
    pub rest_exercise_seconds: u64,
    pub work_seconds: u64,
    pub calories_kcal: f64,
}

/// Aggregate phase durations of a session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionTotals {
    pub preparation_seconds: u64,
    pub rest_series_seconds: u64,
    pub rest_between_exercises_seconds: u64,
    pub work_seconds: u64,
}

impl SessionTotals {
    pub fn rest_seconds(&self) -> u64 {
        self.rest_series_seconds + self.rest_between_exercises_seconds
    }

    pub fn total_seconds(&self) -> u64 {
        self.preparation_seconds + self.rest_seconds() + self.work_seconds
    }
}

/// A completed routine execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoutineSession {
    pub id: Uuid,
    pub routine_id: String,
    pub routine_title: String,
    pub started_at: Option<DateTime<Utc>>,
    pub performed_at: DateTime<Utc>,
    #[serde(default)]
    pub workouts: Vec<Workout>,
    #[serde(default)]
    pub totals: SessionTotals,
    #[serde(default)]
    pub muscles: Vec<String>,
    #[serde(default)]
    pub exercise_count: u32,
    #[serde(default)]
    pub series_count: u32,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub calories_kcal: u32,
}

/// A body measurement entry
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BodyMeasurement {
    pub measured_at: DateTime<Utc>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub body_fat_percent: Option<f64>,
}
