//! Session engine driving a routine series by series.
//!
//! The engine is a synchronous state machine: every user action arrives with
//! the caller's `now`, and each handler returns the `SessionEvent`s it
//! produced (an empty list means the action was a no-op). Phase changes are
//! reported to the `PhaseAccumulator` with a snapshot of the series that was
//! active *before* the pointers move, so calories are always charged to the
//! phase that just ended.
//!
//! Lifecycle: idle → (preparation) → work → resting → ... → finished → idle.

use crate::accumulator::PhaseAccumulator;
use crate::calories::{self, CalorieContext, WorkSnapshot, DEFAULT_RPE};
use crate::config::{CaloriesConfig, Config};
use crate::wal::SessionSink;
use crate::{
    Catalog, Error, Phase, RestType, Result, Routine, RoutineSession, RpeMode, Series, SeriesRef,
    SessionTotals, Workout,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Behaviour switches for a routine execution
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub rpe_mode: RpeMode,
    pub default_exercise_rest_seconds: u64,
    pub calories: CaloriesConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rpe_mode: config.session.rpe_mode,
            default_exercise_rest_seconds: config.session.default_exercise_rest_seconds,
            calories: config.calories.clone(),
        }
    }
}

/// Whether the current series may be completed yet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RpeGate {
    Ready,
    /// Completion is deferred until the user rates the series
    AwaitingRpe(SeriesRef),
}

/// Where a running routine currently is
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Preparation { seconds: u64 },
    Work(RpeGate),
    Resting { kind: RestType, seconds: u64 },
    Finished,
}

impl Stage {
    pub fn phase(&self) -> Phase {
        match self {
            Stage::Preparation { .. } => Phase::Preparation,
            Stage::Work(_) => Phase::Work,
            Stage::Resting { kind, .. } => Phase::Rest(*kind),
            Stage::Finished => Phase::Idle,
        }
    }
}

/// What a handler did, in order
#[derive(Clone, Debug)]
pub enum SessionEvent {
    PreparationStarted { position: SeriesRef, seconds: u64 },
    WorkStarted(SeriesRef),
    RpeRequested(SeriesRef),
    RpeRecorded { position: SeriesRef, rpe: u8 },
    SeriesCompleted(SeriesRef),
    RestStarted { kind: RestType, seconds: u64 },
    RestCancelled(SeriesRef),
    ExerciseCompleted { index: usize },
    RoutineFinished(Box<RoutineSession>),
    FeedbackRequested,
    Cancelled,
}

/// Read-only inputs shared by every transition
struct Env<'a> {
    catalog: &'a Catalog,
    settings: &'a SessionSettings,
    body_weight_kg: Option<f64>,
}

/// State of one routine execution
#[derive(Clone, Debug)]
struct RoutineRun {
    routine: Routine,
    position: SeriesRef,
    stage: Stage,
    completed: Vec<Workout>,
    accumulator: PhaseAccumulator,
    exercise_kcal_start: f64,
    started_at: DateTime<Utc>,
}

impl RoutineRun {
    fn start(routine: Routine, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) -> Self {
        let mut run = Self {
            routine,
            position: SeriesRef::default(),
            stage: Stage::Work(RpeGate::Ready),
            completed: Vec::new(),
            accumulator: PhaseAccumulator::new(now),
            exercise_kcal_start: 0.0,
            started_at: now,
        };
        let stage = run.entry_stage();
        run.enter(stage, now, env, events);
        run
    }

    fn series(&self, position: SeriesRef) -> &Series {
        &self.routine.exercises[position.exercise].series[position.series]
    }

    fn is_last_series(&self, position: SeriesRef) -> bool {
        position.series + 1 >= self.routine.exercises[position.exercise].series.len()
    }

    /// Preparation when the routine has a non-zero countdown, work otherwise
    fn entry_stage(&self) -> Stage {
        match self.routine.preparation.seconds() {
            0 => Stage::Work(RpeGate::Ready),
            seconds => Stage::Preparation { seconds },
        }
    }

    fn calorie_context<'e>(&self, env: &'e Env<'_>) -> CalorieContext<'e> {
        let exercise = &self.routine.exercises[self.position.exercise];
        let series = self.series(self.position);
        CalorieContext {
            body_weight_kg: env.body_weight_kg,
            settings: &env.settings.calories,
            work: Some(WorkSnapshot {
                rpe: series.rpe,
                meta: env.catalog.meta(&exercise.key),
                series: series.clone(),
            }),
        }
    }

    /// Move the pointer and change stage, charging the closing phase to the
    /// series that was active before the move.
    fn move_to(
        &mut self,
        position: SeriesRef,
        stage: Stage,
        now: DateTime<Utc>,
        env: &Env<'_>,
        events: &mut Vec<SessionEvent>,
    ) {
        let ctx = self.calorie_context(env);
        if position != self.position {
            // Zero rest keeps the work phase open across series
            self.accumulator.checkpoint(now, &ctx);
        }
        self.position = position;
        self.stage = stage;
        self.accumulator.switch_phase(stage.phase(), now, &ctx);

        match stage {
            Stage::Preparation { seconds } => events.push(SessionEvent::PreparationStarted {
                position,
                seconds,
            }),
            Stage::Work(_) => events.push(SessionEvent::WorkStarted(position)),
            Stage::Resting { kind, seconds } => {
                events.push(SessionEvent::RestStarted { kind, seconds })
            }
            Stage::Finished => {}
        }
    }

    fn enter(&mut self, stage: Stage, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        self.move_to(self.position, stage, now, env, events);
    }

    fn next(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        match self.stage {
            Stage::Preparation { .. } => self.enter(Stage::Work(RpeGate::Ready), now, env, events),
            Stage::Resting { .. } => self.advance(now, env, events),
            Stage::Work(RpeGate::AwaitingRpe(pending)) => {
                tracing::debug!("Ignoring next: waiting for RPE on {:?}", pending);
            }
            Stage::Work(RpeGate::Ready) => self.finish_series(now, env, events),
            Stage::Finished => tracing::debug!("Ignoring next: routine already finished"),
        }
    }

    /// The user is done with the current series
    fn finish_series(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        let position = self.position;
        let series = &mut self.routine.exercises[position.exercise].series[position.series];

        if series.is_working_set() {
            match env.settings.rpe_mode {
                RpeMode::Ask => {
                    self.stage = Stage::Work(RpeGate::AwaitingRpe(position));
                    events.push(SessionEvent::RpeRequested(position));
                    return;
                }
                RpeMode::Never => {
                    if series.rpe.is_none() {
                        series.rpe = Some(DEFAULT_RPE);
                    }
                }
            }
        }

        self.begin_rest(now, env, events);
    }

    fn rpe_save(&mut self, text: &str, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        let Stage::Work(RpeGate::AwaitingRpe(pending)) = self.stage else {
            tracing::debug!("Ignoring RPE: nothing pending");
            return;
        };

        let rpe = calories::parse_rpe(text);
        self.routine.exercises[pending.exercise].series[pending.series].rpe = Some(rpe);
        self.stage = Stage::Work(RpeGate::Ready);
        events.push(SessionEvent::RpeRecorded {
            position: pending,
            rpe,
        });

        self.begin_rest(now, env, events);
    }

    /// Rest that follows the current series: its own rest, or the exercise's
    /// rest after the last series.
    fn resolve_rest(&self, env: &Env<'_>) -> (RestType, u64) {
        if self.is_last_series(self.position) {
            let exercise = &self.routine.exercises[self.position.exercise];
            (
                RestType::Exercise,
                exercise.rest_after_seconds(env.settings.default_exercise_rest_seconds),
            )
        } else {
            (RestType::Series, self.series(self.position).rest_seconds())
        }
    }

    fn begin_rest(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        events.push(SessionEvent::SeriesCompleted(self.position));

        match self.resolve_rest(env) {
            (_, 0) => self.advance(now, env, events),
            (kind, seconds) => self.enter(Stage::Resting { kind, seconds }, now, env, events),
        }
    }

    /// Move past the completed current series
    fn advance(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        let SeriesRef { exercise, series } = self.position;

        if !self.is_last_series(self.position) {
            let stage = self.entry_stage();
            self.move_to(SeriesRef::new(exercise, series + 1), stage, now, env, events);
            return;
        }

        // Close the exercise's last phase even if the next one is also work.
        let ctx = self.calorie_context(env);
        self.accumulator.checkpoint(now, &ctx);
        self.complete_exercise(exercise, env, events);

        if exercise + 1 < self.routine.exercises.len() {
            let stage = self.entry_stage();
            self.move_to(SeriesRef::new(exercise + 1, 0), stage, now, env, events);
        } else {
            self.finish_routine(now, env, events);
        }
    }

    fn complete_exercise(&mut self, index: usize, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        let totals = self.accumulator.take_totals();
        let kcal_total = self.accumulator.calories_kcal();
        let calories_kcal = kcal_total - self.exercise_kcal_start;
        self.exercise_kcal_start = kcal_total;

        let exercise = &self.routine.exercises[index];
        let meta = env.catalog.meta(&exercise.key);
        let name = if exercise.name.trim().is_empty() {
            meta.name
        } else {
            exercise.name.clone()
        };

        tracing::info!(
            "Exercise {} '{}' done: work {}s, rest {}s/{}s, prep {}s, {:.1} kcal",
            index,
            name,
            totals.work,
            totals.rest_series,
            totals.rest_exercise,
            totals.preparation,
            calories_kcal
        );

        self.completed.push(Workout {
            exercise_key: exercise.key.clone(),
            name,
            muscles: meta.muscles,
            series: exercise.series.clone(),
            preparation_seconds: totals.preparation,
            rest_series_seconds: totals.rest_series,
            rest_exercise_seconds: totals.rest_exercise,
            work_seconds: totals.work,
            calories_kcal,
        });
        events.push(SessionEvent::ExerciseCompleted { index });
    }

    fn finish_routine(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        let ctx = self.calorie_context(env);
        self.stage = Stage::Finished;
        self.accumulator.switch_phase(Phase::Idle, now, &ctx);

        let workouts = std::mem::take(&mut self.completed);
        let session = assemble_session(
            &self.routine,
            workouts,
            self.started_at,
            now,
            self.accumulator.calories_kcal(),
            &env.settings.calories,
        );

        self.accumulator.reset(now);
        self.exercise_kcal_start = 0.0;

        tracing::info!(
            "Routine '{}' finished: {} exercises, {} series, {} kcal",
            session.routine_title,
            session.exercise_count,
            session.series_count,
            session.calories_kcal
        );
        events.push(SessionEvent::RoutineFinished(Box::new(session)));
    }

    fn rest_complete(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        if matches!(self.stage, Stage::Resting { .. }) {
            self.advance(now, env, events);
        } else {
            tracing::debug!("Ignoring rest complete: not resting");
        }
    }

    fn preparation_complete(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        if matches!(self.stage, Stage::Preparation { .. }) {
            self.enter(Stage::Work(RpeGate::Ready), now, env, events);
        } else {
            tracing::debug!("Ignoring preparation complete: not preparing");
        }
    }

    /// Step back one series. Accrued time and calories are kept.
    fn previous(&mut self, now: DateTime<Utc>, env: &Env<'_>, events: &mut Vec<SessionEvent>) {
        let SeriesRef { exercise, series } = self.position;

        match self.stage {
            Stage::Resting { .. } => {
                self.enter(Stage::Work(RpeGate::Ready), now, env, events);
                events.push(SessionEvent::RestCancelled(self.position));
            }
            Stage::Finished => tracing::debug!("Ignoring previous: routine already finished"),
            Stage::Preparation { .. } | Stage::Work(_) => {
                let target = if series > 0 {
                    Some(SeriesRef::new(exercise, series - 1))
                } else if exercise > 0 {
                    let last = self.routine.exercises[exercise - 1].series.len() - 1;
                    Some(SeriesRef::new(exercise - 1, last))
                } else {
                    None
                };

                match target {
                    Some(position) => {
                        self.move_to(position, Stage::Work(RpeGate::Ready), now, env, events)
                    }
                    None => tracing::debug!("Ignoring previous: already at the first series"),
                }
            }
        }
    }
}

/// Build the immutable session record from the finished exercises
fn assemble_session(
    routine: &Routine,
    workouts: Vec<Workout>,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    raw_kcal: f64,
    settings: &CaloriesConfig,
) -> RoutineSession {
    let mut totals = SessionTotals::default();
    let mut muscles: Vec<String> = Vec::new();
    let mut notes = Vec::new();
    let mut series_count = 0;

    for workout in &workouts {
        totals.preparation_seconds += workout.preparation_seconds;
        totals.rest_series_seconds += workout.rest_series_seconds;
        totals.rest_between_exercises_seconds += workout.rest_exercise_seconds;
        totals.work_seconds += workout.work_seconds;
        series_count += workout.series.len() as u32;

        for muscle in &workout.muscles {
            if !muscles.contains(muscle) {
                muscles.push(muscle.clone());
            }
        }

        notes.extend(
            workout
                .series
                .iter()
                .filter_map(|s| s.notes.as_deref())
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from),
        );
    }

    let kcal = calories::apply_epoc(raw_kcal, &workouts, &totals, settings);

    RoutineSession {
        id: Uuid::new_v4(),
        routine_id: routine.id.clone(),
        routine_title: routine.title.clone(),
        started_at: Some(started_at),
        performed_at: now,
        exercise_count: workouts.len() as u32,
        series_count,
        workouts,
        totals,
        muscles,
        notes,
        calories_kcal: kcal.max(0.0).round() as u32,
    }
}

/// Drives one routine at a time and hands finished sessions to a sink
pub struct SessionEngine<'c, S: SessionSink> {
    catalog: &'c Catalog,
    sink: S,
    settings: SessionSettings,
    body_weight_kg: Option<f64>,
    run: Option<RoutineRun>,
}

macro_rules! drive {
    ($engine:ident, $method:ident $(, $arg:expr)*) => {{
        let env = Env {
            catalog: $engine.catalog,
            settings: &$engine.settings,
            body_weight_kg: $engine.body_weight_kg,
        };
        let mut events = Vec::new();
        if let Some(run) = $engine.run.as_mut() {
            run.$method($($arg,)* &env, &mut events);
        }
        $engine.persist_finished(&events);
        events
    }};
}

impl<'c, S: SessionSink> SessionEngine<'c, S> {
    pub fn new(catalog: &'c Catalog, sink: S, settings: SessionSettings) -> Self {
        Self {
            catalog,
            sink,
            settings,
            body_weight_kg: None,
            run: None,
        }
    }

    /// Latest known body weight; without it no calories are estimated
    pub fn with_body_weight(mut self, body_weight_kg: Option<f64>) -> Self {
        self.body_weight_kg = body_weight_kg.filter(|kg| *kg > 0.0);
        self
    }

    /// Load a routine and enter its first stage
    ///
    /// A finished routine that was never acknowledged with `finish` is
    /// replaced; an unfinished one is an error.
    pub fn start(&mut self, routine: Routine, now: DateTime<Utc>) -> Result<Vec<SessionEvent>> {
        if let Some(run) = &self.run {
            if run.stage != Stage::Finished {
                return Err(Error::Routine(format!(
                    "Routine '{}' is still in progress",
                    run.routine.id
                )));
            }
        }

        if routine.exercises.is_empty() {
            return Err(Error::Routine(format!(
                "Routine '{}' has no exercises",
                routine.id
            )));
        }
        if let Some(exercise) = routine.exercises.iter().find(|e| e.series.is_empty()) {
            return Err(Error::Routine(format!(
                "Exercise '{}' in routine '{}' has no series",
                exercise.key, routine.id
            )));
        }

        tracing::info!(
            "Starting routine '{}' ({} exercises, {} series)",
            routine.title,
            routine.exercises.len(),
            routine.series_count()
        );

        let env = Env {
            catalog: self.catalog,
            settings: &self.settings,
            body_weight_kg: self.body_weight_kg,
        };
        let mut events = Vec::new();
        self.run = Some(RoutineRun::start(routine, now, &env, &mut events));
        Ok(events)
    }

    /// Contextual "next": ends preparation, skips rest, or completes the series
    pub fn handle_next(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        drive!(self, next, now)
    }

    /// Store the rating for the pending series and continue as `handle_next`
    pub fn handle_rpe_save(&mut self, rpe: &str, now: DateTime<Utc>) -> Vec<SessionEvent> {
        drive!(self, rpe_save, rpe, now)
    }

    /// The rest countdown reached zero or was skipped
    pub fn handle_rest_complete(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        drive!(self, rest_complete, now)
    }

    pub fn handle_preparation_complete(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        drive!(self, preparation_complete, now)
    }

    /// Cancel a rest, or step back one series
    pub fn handle_previous(&mut self, now: DateTime<Utc>) -> Vec<SessionEvent> {
        drive!(self, previous, now)
    }

    /// Discard the running routine without saving anything
    pub fn cancel(&mut self) -> Vec<SessionEvent> {
        match self.run.take() {
            Some(run) => {
                tracing::info!("Routine '{}' cancelled", run.routine.id);
                vec![SessionEvent::Cancelled]
            }
            None => Vec::new(),
        }
    }

    /// Acknowledge a finished routine and return to idle
    pub fn finish(&mut self) -> Vec<SessionEvent> {
        if self.routine_finished() {
            self.run = None;
            vec![SessionEvent::FeedbackRequested]
        } else {
            Vec::new()
        }
    }

    /// Exactly one write per finished routine; failures are logged only.
    fn persist_finished(&mut self, events: &[SessionEvent]) {
        for event in events {
            if let SessionEvent::RoutineFinished(session) = event {
                match self.sink.append(session) {
                    Ok(()) => tracing::info!("Saved session {}", session.id),
                    Err(e) => tracing::error!("Failed to save session {}: {}", session.id, e),
                }
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.run.is_none()
    }

    pub fn routine_finished(&self) -> bool {
        matches!(&self.run, Some(run) if run.stage == Stage::Finished)
    }

    pub fn stage(&self) -> Option<Stage> {
        self.run.as_ref().map(|run| run.stage)
    }

    pub fn position(&self) -> Option<SeriesRef> {
        self.run.as_ref().map(|run| run.position)
    }

    pub fn routine(&self) -> Option<&Routine> {
        self.run.as_ref().map(|run| &run.routine)
    }

    pub fn pending_rpe(&self) -> Option<SeriesRef> {
        match self.stage()? {
            Stage::Work(RpeGate::AwaitingRpe(position)) => Some(position),
            _ => None,
        }
    }

    pub fn is_resting(&self) -> bool {
        matches!(self.stage(), Some(Stage::Resting { .. }))
    }

    /// Seconds of the running rest countdown
    pub fn rest_seconds(&self) -> Option<u64> {
        match self.stage()? {
            Stage::Resting { seconds, .. } => Some(seconds),
            _ => None,
        }
    }

    pub fn completed_exercises(&self) -> &[Workout] {
        self.run
            .as_ref()
            .map(|run| run.completed.as_slice())
            .unwrap_or_default()
    }

    pub fn accumulator(&self) -> Option<&PhaseAccumulator> {
        self.run.as_ref().map(|run| &run.accumulator)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
