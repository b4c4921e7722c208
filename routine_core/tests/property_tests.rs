//! Property-based tests for the session engine and calorie model.
//!
//! Routines and user action sequences are generated at random; the engine
//! must always account for every elapsed second and save exactly one session
//! per finished routine.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use routine_core::calories::{self, parse_rpe, CalorieContext};
use routine_core::config::CaloriesConfig;
use routine_core::{
    build_default_catalog, parse_clock, Exercise, Phase, PhaseAccumulator, Preparation, RestType,
    Routine, RoutineSession, RpeMode, Series, SeriesKind, SessionEngine, SessionEvent,
    SessionSettings,
};

const KEYS: &[&str] = &[
    "bench_press",
    "deadlift",
    "push_up",
    "treadmill_walk",
    "stationary_bike",
    "not_in_catalog",
];

#[derive(Clone, Debug)]
enum Action {
    Next,
    Previous,
    Rpe(String),
    RestComplete,
    PreparationComplete,
}

fn clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

prop_compose! {
    fn arbitrary_series()(
        warm_up in any::<bool>(),
        rest in prop_oneof![Just(0u64), 1u64..300],
        reps in 1u32..20,
    ) -> Series {
        Series {
            kind: if warm_up { SeriesKind::WarmUp } else { SeriesKind::WorkingSet },
            reps: Some(reps),
            rest: clock(rest),
            ..Default::default()
        }
    }
}

prop_compose! {
    fn arbitrary_exercise()(
        key in prop::sample::select(KEYS),
        series in prop::collection::vec(arbitrary_series(), 1..5),
        rest_after in prop::option::of(0u64..240),
    ) -> Exercise {
        Exercise {
            key: key.to_string(),
            name: String::new(),
            series,
            rest_after: rest_after.map(clock),
        }
    }
}

prop_compose! {
    fn arbitrary_routine()(
        exercises in prop::collection::vec(arbitrary_exercise(), 1..4),
        preparation in prop::option::of(0u64..20),
    ) -> Routine {
        Routine {
            id: "generated".into(),
            title: "Generated".into(),
            exercises,
            preparation: Preparation {
                enabled: preparation.is_some(),
                duration: preparation.map(clock),
            },
        }
    }
}

fn arbitrary_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        4 => Just(Action::Next),
        1 => Just(Action::Previous),
        2 => "[0-9]{0,2}".prop_map(Action::Rpe),
        2 => Just(Action::RestComplete),
        1 => Just(Action::PreparationComplete),
    ]
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 1, 6, 0, 0).unwrap()
}

fn finished(events: &[SessionEvent]) -> Option<RoutineSession> {
    events.iter().find_map(|e| match e {
        SessionEvent::RoutineFinished(s) => Some((**s).clone()),
        _ => None,
    })
}

proptest! {
    #[test]
    fn forward_run_accounts_for_everything(
        routine in arbitrary_routine(),
        ask in any::<bool>(),
        steps in prop::collection::vec(0i64..400, 64),
    ) {
        let catalog = build_default_catalog();
        let settings = SessionSettings {
            rpe_mode: if ask { RpeMode::Ask } else { RpeMode::Never },
            ..Default::default()
        };
        let mut engine = SessionEngine::new(&catalog, Vec::new(), settings);
        let expected_series = routine.series_count() as u32;
        let expected_exercises = routine.exercises.len() as u32;

        let mut now = t0();
        engine.start(routine, now).unwrap();

        let mut session = None;
        for step in steps.iter().cycle().take(200) {
            now += Duration::seconds(*step);
            let events = if engine.pending_rpe().is_some() {
                engine.handle_rpe_save("8", now)
            } else if engine.is_resting() {
                engine.handle_rest_complete(now)
            } else {
                engine.handle_next(now)
            };
            if let Some(s) = finished(&events) {
                session = Some(s);
                break;
            }
        }

        let session = session.expect("forward driving always finishes");
        prop_assert_eq!(session.exercise_count, expected_exercises);
        prop_assert_eq!(session.series_count, expected_series);
        prop_assert_eq!(session.totals.total_seconds() as i64, (now - t0()).num_seconds());
        prop_assert_eq!(session.calories_kcal, 0);
        prop_assert_eq!(engine.sink().len(), 1);

        // Every working set carries a rating, warm-ups never do
        for series in session.workouts.iter().flat_map(|w| w.series.iter()) {
            prop_assert_eq!(series.rpe.is_some(), series.is_working_set());
        }
    }

    #[test]
    fn random_actions_keep_time_consistent(
        routine in arbitrary_routine(),
        actions in prop::collection::vec((arbitrary_action(), 0i64..120), 1..80),
    ) {
        let catalog = build_default_catalog();
        let mut engine = SessionEngine::new(&catalog, Vec::new(), SessionSettings::default())
            .with_body_weight(Some(72.0));

        let mut now = t0();
        engine.start(routine, now).unwrap();
        let mut kcal_seen = 0.0;

        for (action, step) in actions {
            now += Duration::seconds(step);
            let events = match action {
                Action::Next => engine.handle_next(now),
                Action::Previous => engine.handle_previous(now),
                Action::Rpe(text) => engine.handle_rpe_save(&text, now),
                Action::RestComplete => engine.handle_rest_complete(now),
                Action::PreparationComplete => engine.handle_preparation_complete(now),
            };

            if let Some(session) = finished(&events) {
                prop_assert_eq!(session.totals.total_seconds() as i64, (now - t0()).num_seconds());
                prop_assert!(engine.routine_finished());
                break;
            }

            let acc = engine.accumulator().unwrap();
            let workouts = engine.completed_exercises();
            let flushed: u64 = workouts
                .iter()
                .map(|w| w.preparation_seconds + w.rest_series_seconds + w.rest_exercise_seconds + w.work_seconds)
                .sum();
            let open = (now - acc.last_transition()).num_seconds();
            prop_assert_eq!(
                flushed as i64 + acc.totals().total() as i64 + open,
                (now - t0()).num_seconds()
            );
            prop_assert!(acc.calories_kcal() >= kcal_seen);
            kcal_seen = acc.calories_kcal();
        }

        prop_assert!(engine.sink().len() <= 1);
    }

    #[test]
    fn calories_never_decrease_while_navigating(
        routine in arbitrary_routine(),
        weight in 40.0f64..150.0,
        actions in prop::collection::vec(
            (prop_oneof![Just(Action::Next), Just(Action::Previous), Just(Action::RestComplete)], 0i64..180),
            1..120,
        ),
    ) {
        let catalog = build_default_catalog();
        let mut engine = SessionEngine::new(&catalog, Vec::new(), SessionSettings::default())
            .with_body_weight(Some(weight));

        let mut now = t0();
        engine.start(routine, now).unwrap();
        let mut kcal_seen = 0.0;

        for (action, step) in actions {
            now += Duration::seconds(step);
            let events = match action {
                Action::Previous => engine.handle_previous(now),
                Action::RestComplete => engine.handle_rest_complete(now),
                _ if engine.pending_rpe().is_some() => engine.handle_rpe_save("8", now),
                _ => engine.handle_next(now),
            };
            if finished(&events).is_some() {
                break;
            }

            let kcal = engine.accumulator().unwrap().calories_kcal();
            prop_assert!(kcal >= kcal_seen, "calories went from {} to {}", kcal_seen, kcal);
            kcal_seen = kcal;
        }
    }

    #[test]
    fn accumulator_never_loses_time(
        phases in prop::collection::vec((0u8..4, 0i64..600), 1..40),
    ) {
        let settings = CaloriesConfig::default();
        let ctx = CalorieContext { body_weight_kg: Some(65.0), settings: &settings, work: None };
        let mut acc = PhaseAccumulator::new(t0());
        acc.switch_phase(Phase::Work, t0(), &ctx);

        let mut now = t0();
        let mut kcal = 0.0;
        for (phase, step) in phases {
            now += Duration::seconds(step);
            let next = match phase {
                0 => Phase::Work,
                1 => Phase::Preparation,
                2 => Phase::Rest(RestType::Series),
                _ => Phase::Rest(RestType::Exercise),
            };
            kcal += acc.switch_phase(next, now, &ctx);
        }
        acc.checkpoint(now, &ctx);

        prop_assert_eq!(acc.totals().total() as i64, (now - t0()).num_seconds());
        prop_assert!(acc.calories_kcal() >= kcal - 1e-9);
    }

    #[test]
    fn parse_rpe_always_in_range(text in ".{0,6}") {
        let rpe = parse_rpe(&text);
        prop_assert!((1..=10).contains(&rpe));
    }

    #[test]
    fn parse_clock_reads_formatted_durations(seconds in 0u64..10_000) {
        prop_assert_eq!(parse_clock(&clock(seconds)), Some(seconds));
        prop_assert_eq!(parse_clock(&seconds.to_string()), Some(seconds));
    }

    #[test]
    fn parse_clock_rejects_overflowing_minutes(minutes in (u64::MAX / 60 + 1)..u64::MAX) {
        prop_assert_eq!(parse_clock(&format!("{}:00", minutes)), None);
        prop_assert_eq!(parse_clock("307445734561825861:00"), None);
    }

    #[test]
    fn epoc_never_reduces_calories(
        total in 0.0f64..2000.0,
        work in 0u64..5000,
        rest in 0u64..5000,
        rpe in 1u8..=10,
    ) {
        let workouts = vec![routine_core::Workout {
            exercise_key: "bench_press".into(),
            name: "Bench Press".into(),
            muscles: vec![],
            series: vec![Series { rpe: Some(rpe), ..Default::default() }],
            preparation_seconds: 0,
            rest_series_seconds: rest,
            rest_exercise_seconds: 0,
            work_seconds: work,
            calories_kcal: total,
        }];
        let totals = routine_core::SessionTotals {
            work_seconds: work,
            rest_series_seconds: rest,
            ..Default::default()
        };
        let settings = CaloriesConfig::default();
        let adjusted = calories::apply_epoc(total, &workouts, &totals, &settings);
        prop_assert!(adjusted >= total);
        prop_assert!(adjusted <= total * settings.epoc_multiplier + 1e-9);
    }
}
