//! Routine library and body measurements, persisted with file locking.
//!
//! The library is a single JSON document holding the user's routines and
//! measurement log. It is read leniently (a missing or corrupted file yields
//! an empty library) and written atomically.

use crate::{BodyMeasurement, Error, Result, Routine};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// User-owned routines and measurements
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Library {
    #[serde(default)]
    pub routines: Vec<Routine>,

    #[serde(default)]
    pub measurements: Vec<BodyMeasurement>,
}

impl Library {
    /// Load the library from a file with shared locking
    ///
    /// Returns an empty library if the file doesn't exist.
    /// If the file is corrupted, logs a warning and returns an empty library.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No library file found, starting empty");
            return Ok(Self::default());
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open library {:?}: {}. Starting empty.", path, e);
                return Ok(Self::default());
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock library {:?}: {}. Starting empty.", path, e);
            return Ok(Self::default());
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read library {:?}: {}. Starting empty.", path, e);
            return Ok(Self::default());
        }

        file.unlock()?;

        match serde_json::from_str::<Library>(&contents) {
            Ok(library) => {
                tracing::debug!(
                    "Loaded {} routines and {} measurements from {:?}",
                    library.routines.len(),
                    library.measurements.len(),
                    path
                );
                Ok(library)
            }
            Err(e) => {
                tracing::warn!("Failed to parse library {:?}: {}. Starting empty.", path, e);
                Ok(Self::default())
            }
        }
    }

    /// Save with an exclusive lock, via temp file and rename
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Library(format!("Library path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved library to {:?}", path);
        Ok(())
    }

    /// Load, modify, and save back
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut Library) -> Result<()>,
    {
        let mut library = Self::load(path)?;
        f(&mut library)?;
        library.save(path)?;
        Ok(library)
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn routine(&self, id: &str) -> Option<&Routine> {
        self.routines.iter().find(|r| r.id == id)
    }

    /// Weight from the most recent measurement that has one
    pub fn latest_body_weight(&self) -> Option<f64> {
        self.measurements
            .iter()
            .filter(|m| m.weight_kg.is_some_and(|kg| kg > 0.0))
            .max_by_key(|m| m.measured_at)
            .and_then(|m| m.weight_kg)
    }

    pub fn record_weight(&mut self, weight_kg: f64, measured_at: DateTime<Utc>) -> Result<()> {
        if !weight_kg.is_finite() || weight_kg <= 0.0 {
            return Err(Error::Library(format!(
                "Body weight must be positive, got {}",
                weight_kg
            )));
        }
        self.measurements.push(BodyMeasurement {
            measured_at,
            weight_kg: Some(weight_kg),
            body_fat_percent: None,
        });
        Ok(())
    }

    /// Add or replace routines by id, returning how many were imported
    pub fn import_routines(&mut self, routines: Vec<Routine>) -> Result<usize> {
        let mut count = 0;
        for routine in routines {
            if routine.id.trim().is_empty() {
                return Err(Error::Library(format!(
                    "Routine '{}' has an empty id",
                    routine.title
                )));
            }

            match self.routines.iter_mut().find(|r| r.id == routine.id) {
                Some(existing) => {
                    tracing::info!("Replacing routine '{}'", routine.id);
                    *existing = routine;
                }
                None => self.routines.push(routine),
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Read routines from a JSON file holding either one routine or an array
pub fn load_routines_file(path: &Path) -> Result<Vec<Routine>> {
    let contents = std::fs::read_to_string(path)?;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<Routine>),
        One(Box<Routine>),
    }

    match serde_json::from_str::<OneOrMany>(&contents) {
        Ok(OneOrMany::Many(routines)) => Ok(routines),
        Ok(OneOrMany::One(routine)) => Ok(vec![*routine]),
        Err(e) => Err(Error::Library(format!(
            "Failed to parse routines from {:?}: {}",
            path, e
        ))),
    }
}
