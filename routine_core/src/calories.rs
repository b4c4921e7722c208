//! Energy expenditure model.
//!
//! Work phases are costed from the series' RPE and the exercise's MET, or from
//! an ACSM metabolic equation when a cardio series records enough data. Rest
//! and preparation use constant low METs. All results are kcal.
//!
//! References:
//! - Ainsworth et al., Compendium of Physical Activities (2011)
//! - ACSM's Guidelines for Exercise Testing and Prescription, metabolic equations

use crate::config::CaloriesConfig;
use crate::{CardioMode, ExerciseMeta, Phase, Series, SessionTotals, Workout};

/// MET constants
pub mod met {
    /// Resistance training, moderate effort (Compendium 02054)
    pub const DEFAULT: f64 = 5.0;

    /// Standing quietly between sets
    pub const REST: f64 = 1.3;

    /// Setting up equipment, light movement
    pub const PREPARATION: f64 = 2.0;
}

/// RPE stamped on a working set when none was given
pub const DEFAULT_RPE: u8 = 7;

/// Resting oxygen uptake per MET (ml/kg/min)
const OXYGEN_PER_MET: f64 = 3.5;

/// Energy yield of oxygen (kcal per litre)
const KCAL_PER_LITRE_O2: f64 = 5.0;

/// Above this speed (m/min) walking equations no longer hold
const RUNNING_SPEED_THRESHOLD: f64 = 134.0;

/// Watts to kg·m/min
const KGM_PER_WATT: f64 = 6.12;

/// Snapshot of the series a work phase was spent on
#[derive(Clone, Debug)]
pub struct WorkSnapshot {
    pub rpe: Option<u8>,
    pub meta: ExerciseMeta,
    pub series: Series,
}

/// Everything needed to cost the phase that is closing
#[derive(Clone, Debug)]
pub struct CalorieContext<'a> {
    pub body_weight_kg: Option<f64>,
    pub settings: &'a CaloriesConfig,
    pub work: Option<WorkSnapshot>,
}

/// Parse a typed RPE; anything outside 1-10 becomes the default
pub fn parse_rpe(text: &str) -> u8 {
    text.trim()
        .parse::<u8>()
        .ok()
        .filter(|rpe| (1..=10).contains(rpe))
        .unwrap_or(DEFAULT_RPE)
}

/// Map a perceived exertion rating onto a MET value
///
/// The exercise's default MET is taken as the value at RPE 5 and scaled
/// linearly by 8% per RPE point. Without an RPE the default MET is used as is.
pub fn rpe_to_met(rpe: Option<u8>, meta: &ExerciseMeta) -> f64 {
    let base = meta.default_met.unwrap_or(met::DEFAULT);
    match rpe {
        Some(rpe) if (1..=10).contains(&rpe) => base * (0.6 + 0.08 * f64::from(rpe)),
        _ => base,
    }
}

/// `kcal = MET × 3.5 × kg / 200 × minutes`
pub fn kcal_from_met(met: f64, body_weight_kg: f64, minutes: f64) -> f64 {
    met * OXYGEN_PER_MET * body_weight_kg / 200.0 * minutes
}

fn walking_vo2(speed: f64, grade: f64) -> f64 {
    3.5 + 0.1 * speed + 1.8 * speed * grade
}

fn running_vo2(speed: f64, grade: f64) -> f64 {
    3.5 + 0.2 * speed + 0.9 * speed * grade
}

fn cycling_vo2(watts: f64, body_weight_kg: f64) -> f64 {
    7.0 + 1.8 * (watts * KGM_PER_WATT) / body_weight_kg
}

/// ACSM kcal/min estimate for a cardio series
///
/// Returns None when the mode has no equation or the series lacks the data
/// (distance and duration for walking/running, power for cycling).
pub fn acsm_kcal_per_minute(mode: CardioMode, series: &Series, body_weight_kg: f64) -> Option<f64> {
    if body_weight_kg <= 0.0 {
        return None;
    }

    let vo2 = match mode {
        CardioMode::Walk | CardioMode::Run => {
            let speed = series.speed_m_per_min()?;
            let grade = series.incline_percent.unwrap_or(0.0).max(0.0) / 100.0;
            if mode == CardioMode::Run || speed > RUNNING_SPEED_THRESHOLD {
                running_vo2(speed, grade)
            } else {
                walking_vo2(speed, grade)
            }
        }
        CardioMode::Bike => {
            let watts = series.power_watts.filter(|w| *w > 0.0)?;
            cycling_vo2(watts, body_weight_kg)
        }
        CardioMode::Row | CardioMode::Elliptical | CardioMode::Other => return None,
    };

    Some(vo2 * body_weight_kg / 1000.0 * KCAL_PER_LITRE_O2)
}

/// kcal/min for active work on a series
pub fn work_kcal_per_minute(work: &WorkSnapshot, body_weight_kg: f64) -> f64 {
    if let Some(mode) = work.meta.cardio_mode {
        if let Some(kcal) = acsm_kcal_per_minute(mode, &work.series, body_weight_kg) {
            return kcal;
        }
    }
    kcal_from_met(rpe_to_met(work.rpe, &work.meta), body_weight_kg, 1.0)
}

/// Calories for `seconds` spent in `phase`
pub fn phase_calories(phase: Phase, seconds: u64, ctx: &CalorieContext<'_>) -> f64 {
    let Some(weight) = ctx.body_weight_kg.filter(|w| *w > 0.0) else {
        return 0.0;
    };
    if seconds == 0 {
        return 0.0;
    }
    let minutes = seconds as f64 / 60.0;

    match phase {
        Phase::Idle => 0.0,
        Phase::Preparation if ctx.settings.include_preparation => {
            kcal_from_met(met::PREPARATION, weight, minutes)
        }
        Phase::Rest(_) if ctx.settings.include_rest => kcal_from_met(met::REST, weight, minutes),
        Phase::Preparation | Phase::Rest(_) => 0.0,
        Phase::Work => match &ctx.work {
            Some(work) => work_kcal_per_minute(work, weight) * minutes,
            None => kcal_from_met(met::DEFAULT, weight, minutes),
        },
    }
}

/// Average RPE over the working sets that have one
pub fn average_working_rpe(workouts: &[Workout]) -> Option<f64> {
    let rpes: Vec<f64> = workouts
        .iter()
        .flat_map(|w| w.series.iter())
        .filter(|s| s.is_working_set())
        .filter_map(|s| s.rpe)
        .map(f64::from)
        .collect();

    if rpes.is_empty() {
        None
    } else {
        Some(rpes.iter().sum::<f64>() / rpes.len() as f64)
    }
}

/// Afterburn correction applied to the routine's total
///
/// Dense, hard sessions (high average RPE with short rests) get the
/// configured multiplier; everything else is returned unchanged.
pub fn apply_epoc(
    total_kcal: f64,
    workouts: &[Workout],
    totals: &SessionTotals,
    settings: &CaloriesConfig,
) -> f64 {
    if !settings.epoc_enabled || total_kcal <= 0.0 {
        return total_kcal;
    }

    let Some(avg_rpe) = average_working_rpe(workouts) else {
        return total_kcal;
    };

    let active = totals.work_seconds + totals.rest_seconds();
    if active == 0 {
        return total_kcal;
    }
    let density = totals.work_seconds as f64 / active as f64;

    if avg_rpe >= settings.epoc_min_avg_rpe && density >= settings.epoc_min_work_density {
        tracing::debug!(
            "Applying EPOC x{} (avg RPE {:.1}, work density {:.2})",
            settings.epoc_multiplier,
            avg_rpe,
            density
        );
        total_kcal * settings.epoc_multiplier
    } else {
        total_kcal
    }
}
