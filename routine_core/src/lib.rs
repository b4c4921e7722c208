#![forbid(unsafe_code)]

//! Core domain model and workout session engine for Routine.
//!
//! This crate provides:
//! - Domain types (routines, exercises, series, session records)
//! - Exercise catalog with metabolic metadata
//! - Calorie model (MET / ACSM) and the phase accumulator
//! - Session state machine
//! - Persistence (WAL, CSV rollup, routine library)
//! - History loading and summaries

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod calories;
pub mod accumulator;
pub mod engine;
pub mod wal;
pub mod csv_rollup;
pub mod library;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::Config;
pub use accumulator::{PhaseAccumulator, PhaseTotals};
pub use engine::{RpeGate, SessionEngine, SessionEvent, SessionSettings, Stage};
pub use wal::{JsonlSink, SessionSink};
pub use library::Library;
pub use history::{load_recent_sessions, summarize, HistorySummary};
