//! Default catalog of exercises and their metabolic metadata.
//!
//! MET values follow the Compendium of Physical Activities. Cardio entries
//! carry a `CardioMode` so the calorie model can use an ACSM equation when a
//! series records enough data.

use crate::types::*;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Cached default catalog - built once and reused across all operations
static DEFAULT_CATALOG: Lazy<Catalog> = Lazy::new(build_default_catalog_internal);

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static Catalog {
    &DEFAULT_CATALOG
}

/// Builds the default catalog
///
/// **Note**: For production use, prefer `get_default_catalog()` which returns a
/// cached reference. This function is retained for testing and custom catalogs.
pub fn build_default_catalog() -> Catalog {
    build_default_catalog_internal()
}

fn strength(key: &str, name: &str, muscles: &[&str], met: f64) -> ExerciseMeta {
    ExerciseMeta {
        key: key.into(),
        name: name.into(),
        muscles: muscles.iter().map(|m| m.to_string()).collect(),
        default_met: Some(met),
        cardio_mode: None,
    }
}

fn cardio(key: &str, name: &str, muscles: &[&str], met: f64, mode: CardioMode) -> ExerciseMeta {
    ExerciseMeta {
        cardio_mode: Some(mode),
        ..strength(key, name, muscles, met)
    }
}

fn build_default_catalog_internal() -> Catalog {
    let entries = vec![
        // ====================================================================
        // Strength
        // ====================================================================
        strength(
            "bench_press",
            "Bench Press",
            &["chest", "triceps", "front_delts"],
            5.0,
        ),
        strength(
            "back_squat",
            "Back Squat",
            &["quads", "glutes", "hamstrings", "lower_back"],
            6.0,
        ),
        strength(
            "deadlift",
            "Deadlift",
            &["hamstrings", "glutes", "lower_back", "traps"],
            6.0,
        ),
        strength(
            "overhead_press",
            "Overhead Press",
            &["front_delts", "side_delts", "triceps"],
            5.0,
        ),
        strength(
            "barbell_row",
            "Barbell Row",
            &["lats", "rhomboids", "biceps"],
            5.0,
        ),
        strength("pull_up", "Pull-up", &["lats", "biceps", "forearms"], 8.0),
        strength("push_up", "Push-up", &["chest", "triceps", "core"], 3.8),
        strength("lunge", "Walking Lunge", &["quads", "glutes"], 4.0),
        strength("plank", "Plank", &["core"], 3.8),
        strength(
            "kettlebell_swing",
            "Kettlebell Swing",
            &["glutes", "hamstrings", "core"],
            9.8,
        ),
        // ====================================================================
        // Cardio
        // ====================================================================
        cardio(
            "treadmill_walk",
            "Treadmill Walk",
            &["calves", "quads"],
            3.5,
            CardioMode::Walk,
        ),
        cardio(
            "outdoor_run",
            "Outdoor Run",
            &["calves", "quads", "hamstrings"],
            9.8,
            CardioMode::Run,
        ),
        cardio(
            "treadmill_run",
            "Treadmill Run",
            &["calves", "quads", "hamstrings"],
            9.0,
            CardioMode::Run,
        ),
        cardio(
            "stationary_bike",
            "Stationary Bike",
            &["quads", "glutes"],
            7.0,
            CardioMode::Bike,
        ),
        cardio(
            "rowing_machine",
            "Rowing Machine",
            &["lats", "quads", "core"],
            7.0,
            CardioMode::Row,
        ),
        cardio(
            "elliptical",
            "Elliptical Trainer",
            &["quads", "glutes"],
            5.0,
            CardioMode::Elliptical,
        ),
        cardio(
            "jump_rope",
            "Jump Rope",
            &["calves", "shoulders"],
            11.8,
            CardioMode::Other,
        ),
    ];

    let exercises: HashMap<String, ExerciseMeta> = entries
        .into_iter()
        .map(|meta| (meta.key.clone(), meta))
        .collect();

    Catalog { exercises }
}

impl Catalog {
    /// Metadata for `key`, falling back to an empty entry for unknown keys
    pub fn meta(&self, key: &str) -> ExerciseMeta {
        match self.exercises.get(key) {
            Some(meta) => meta.clone(),
            None => {
                tracing::debug!("Exercise '{}' not in catalog, using bare metadata", key);
                ExerciseMeta::unknown(key)
            }
        }
    }

    /// Validates catalog integrity
    ///
    /// Returns a list of validation errors, or empty vec if valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (key, meta) in &self.exercises {
            if key != &meta.key {
                errors.push(format!(
                    "Exercise '{}' key mismatch: meta.key = '{}'",
                    key, meta.key
                ));
            }

            if meta.name.trim().is_empty() {
                errors.push(format!("Exercise '{}' has an empty name", key));
            }

            if meta.muscles.is_empty() {
                errors.push(format!("Exercise '{}' lists no muscles", key));
            }

            match meta.default_met {
                Some(met) if met <= 0.0 => {
                    errors.push(format!(
                        "Exercise '{}': default MET {} must be positive",
                        key, met
                    ));
                }
                None if meta.is_cardio() => {
                    errors.push(format!(
                        "Cardio exercise '{}' needs a default MET",
                        key
                    ));
                }
                _ => {}
            }
        }

        errors
    }
}
