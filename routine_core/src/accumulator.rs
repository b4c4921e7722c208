//! Phase timing and calorie accumulation.
//!
//! The accumulator is a plain value: `advance` returns the updated
//! accumulator together with the kcal charged to the phase that closed.
//! Durations are bucketed per exercise; the calorie total spans the routine.

use crate::calories::{self, CalorieContext};
use crate::{Phase, RestType};
use chrono::{DateTime, Utc};

/// Seconds spent in each phase since the last flush
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PhaseTotals {
    pub preparation: u64,
    pub rest_series: u64,
    pub rest_exercise: u64,
    pub work: u64,
}

impl PhaseTotals {
    fn add(&mut self, phase: Phase, seconds: u64) {
        match phase {
            Phase::Idle => {}
            Phase::Preparation => self.preparation += seconds,
            Phase::Rest(RestType::Series) => self.rest_series += seconds,
            Phase::Rest(RestType::Exercise) => self.rest_exercise += seconds,
            Phase::Work => self.work += seconds,
        }
    }

    pub fn total(&self) -> u64 {
        self.preparation + self.rest_series + self.rest_exercise + self.work
    }
}

/// Running phase clock for one routine execution
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhaseAccumulator {
    totals: PhaseTotals,
    calories_kcal: f64,
    open: Phase,
    last_transition: DateTime<Utc>,
}

impl PhaseAccumulator {
    /// A fresh accumulator with the idle phase open at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            totals: PhaseTotals::default(),
            calories_kcal: 0.0,
            open: Phase::Idle,
            last_transition: now,
        }
    }

    pub fn open_phase(&self) -> Phase {
        self.open
    }

    pub fn totals(&self) -> PhaseTotals {
        self.totals
    }

    pub fn calories_kcal(&self) -> f64 {
        self.calories_kcal
    }

    pub fn last_transition(&self) -> DateTime<Utc> {
        self.last_transition
    }

    /// Close the open phase at `now` and open `next`
    ///
    /// `ctx` must describe the closing phase. A zero or negative interval adds
    /// neither time nor calories.
    pub fn advance(
        &self,
        next: Phase,
        now: DateTime<Utc>,
        ctx: &CalorieContext<'_>,
    ) -> (PhaseAccumulator, f64) {
        let mut updated = *self;
        let delta = (now - self.last_transition).num_seconds().max(0) as u64;

        let mut kcal = 0.0;
        if delta > 0 {
            kcal = calories::phase_calories(self.open, delta, ctx);
            updated.calories_kcal += kcal;
            updated.totals.add(self.open, delta);
        }

        updated.open = next;
        updated.last_transition = now;
        (updated, kcal)
    }

    /// Apply `advance` only when the phase actually changes
    pub fn switch_phase(&mut self, next: Phase, now: DateTime<Utc>, ctx: &CalorieContext<'_>) -> f64 {
        if next == self.open {
            return 0.0;
        }
        let closing = self.open;
        let (updated, kcal) = self.advance(next, now, ctx);
        tracing::debug!(
            "Phase {:?} -> {:?}: +{}s, +{:.2} kcal",
            closing,
            next,
            updated.totals.total() - self.totals.total(),
            kcal
        );
        *self = updated;
        kcal
    }

    /// Accrue the open phase up to `now` without changing it
    pub fn checkpoint(&mut self, now: DateTime<Utc>, ctx: &CalorieContext<'_>) -> f64 {
        let (updated, kcal) = self.advance(self.open, now, ctx);
        *self = updated;
        kcal
    }

    /// Hand out the per-phase durations and zero them
    pub fn take_totals(&mut self) -> PhaseTotals {
        std::mem::take(&mut self.totals)
    }

    /// Drop everything, including the calorie total
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calories::WorkSnapshot;
    use crate::config::CaloriesConfig;
    use crate::{ExerciseMeta, Series};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn ctx(settings: &CaloriesConfig, weight: Option<f64>) -> CalorieContext<'_> {
        CalorieContext {
            body_weight_kg: weight,
            settings,
            work: Some(WorkSnapshot {
                rpe: Some(8),
                meta: ExerciseMeta {
                    key: "bench_press".into(),
                    name: "Bench Press".into(),
                    muscles: vec!["chest".into()],
                    default_met: Some(5.0),
                    cardio_mode: None,
                },
                series: Series::default(),
            }),
        }
    }

    #[test]
    fn test_advance_charges_closing_phase() {
        let settings = CaloriesConfig::default();
        let ctx = ctx(&settings, Some(80.0));
        let acc = PhaseAccumulator::new(t0());
        let (acc, _) = acc.advance(Phase::Work, t0(), &ctx);

        let (acc, kcal) = acc.advance(Phase::Rest(RestType::Series), t0() + Duration::seconds(60), &ctx);
        assert_eq!(acc.totals().work, 60);
        assert_eq!(acc.open_phase(), Phase::Rest(RestType::Series));
        assert!(kcal > 0.0);
        assert_eq!(acc.calories_kcal(), kcal);

        let (acc, _) = acc.advance(Phase::Work, t0() + Duration::seconds(90), &ctx);
        assert_eq!(acc.totals().rest_series, 30);
        assert_eq!(acc.totals().work, 60);
    }

    #[test]
    fn test_advance_is_pure() {
        let settings = CaloriesConfig::default();
        let ctx = ctx(&settings, Some(80.0));
        let acc = PhaseAccumulator::new(t0());
        let (_updated, _) = acc.advance(Phase::Work, t0() + Duration::seconds(10), &ctx);
        assert_eq!(acc, PhaseAccumulator::new(t0()));
    }

    #[test]
    fn test_idle_time_is_not_counted() {
        let settings = CaloriesConfig::default();
        let ctx = ctx(&settings, Some(80.0));
        let mut acc = PhaseAccumulator::new(t0());
        let kcal = acc.switch_phase(Phase::Work, t0() + Duration::seconds(300), &ctx);
        assert_eq!(kcal, 0.0);
        assert_eq!(acc.totals().total(), 0);
    }

    #[test]
    fn test_negative_interval_adds_nothing() {
        let settings = CaloriesConfig::default();
        let ctx = ctx(&settings, Some(80.0));
        let mut acc = PhaseAccumulator::new(t0());
        acc.switch_phase(Phase::Work, t0(), &ctx);

        let kcal = acc.switch_phase(Phase::Preparation, t0() - Duration::seconds(30), &ctx);
        assert_eq!(kcal, 0.0);
        assert_eq!(acc.totals(), PhaseTotals::default());
        assert_eq!(acc.open_phase(), Phase::Preparation);
    }

    #[test]
    fn test_switch_to_same_phase_is_noop() {
        let settings = CaloriesConfig::default();
        let ctx = ctx(&settings, Some(80.0));
        let mut acc = PhaseAccumulator::new(t0());
        acc.switch_phase(Phase::Work, t0(), &ctx);

        acc.switch_phase(Phase::Work, t0() + Duration::seconds(45), &ctx);
        assert_eq!(acc.totals().work, 0);
        assert_eq!(acc.last_transition(), t0());

        acc.checkpoint(t0() + Duration::seconds(45), &ctx);
        assert_eq!(acc.totals().work, 45);
        assert_eq!(acc.open_phase(), Phase::Work);
    }

    #[test]
    fn test_no_body_weight_tracks_time_only() {
        let settings = CaloriesConfig::default();
        let ctx = ctx(&settings, None);
        let mut acc = PhaseAccumulator::new(t0());
        acc.switch_phase(Phase::Preparation, t0(), &ctx);
        acc.switch_phase(Phase::Work, t0() + Duration::seconds(10), &ctx);
        acc.switch_phase(Phase::Rest(RestType::Exercise), t0() + Duration::seconds(70), &ctx);
        acc.switch_phase(Phase::Idle, t0() + Duration::seconds(130), &ctx);

        let totals = acc.totals();
        assert_eq!(totals.preparation, 10);
        assert_eq!(totals.work, 60);
        assert_eq!(totals.rest_exercise, 60);
        assert_eq!(acc.calories_kcal(), 0.0);
    }

    #[test]
    fn test_take_totals_keeps_calories() {
        let settings = CaloriesConfig::default();
        let ctx = ctx(&settings, Some(70.0));
        let mut acc = PhaseAccumulator::new(t0());
        acc.switch_phase(Phase::Work, t0(), &ctx);
        acc.switch_phase(Phase::Rest(RestType::Series), t0() + Duration::seconds(120), &ctx);

        let kcal = acc.calories_kcal();
        let totals = acc.take_totals();
        assert_eq!(totals.work, 120);
        assert_eq!(acc.totals(), PhaseTotals::default());
        assert_eq!(acc.calories_kcal(), kcal);

        acc.reset(t0());
        assert_eq!(acc.calories_kcal(), 0.0);
        assert_eq!(acc.open_phase(), Phase::Idle);
    }
}
