use chrono::Utc;
use clap::{Parser, Subcommand};
use routine_core::library::load_routines_file;
use routine_core::*;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Safety valve for `--auto-complete`; real routines need far fewer steps
const AUTO_STEP_LIMIT: usize = 10_000;

#[derive(Parser)]
#[command(name = "routine")]
#[command(about = "Workout routine runner with phase timing and calorie estimates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List routines in the library
    List,

    /// Import routines from a JSON file (one routine or an array)
    Import {
        file: PathBuf,
    },

    /// Record a body weight measurement in kg
    Weight {
        kg: f64,
    },

    /// Run a routine
    Run {
        routine_id: String,

        /// Drive the routine to completion without prompting (for testing)
        #[arg(long)]
        auto_complete: bool,

        /// RPE answered for every working set in auto-complete mode
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
        rpe: Option<u8>,
    },

    /// Summarise recent sessions
    History {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },

    /// Roll up WAL sessions to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

struct Paths {
    library: PathBuf,
    wal_dir: PathBuf,
    wal: PathBuf,
    csv: PathBuf,
}

impl Paths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            library: data_dir.join("library.json"),
            wal: wal_dir.join("routine_sessions.wal"),
            wal_dir,
            csv: data_dir.join("sessions.csv"),
        }
    }
}

fn main() -> Result<()> {
    routine_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let paths = Paths::new(&data_dir);

    match cli.command {
        Commands::List => cmd_list(&paths),
        Commands::Import { file } => cmd_import(&paths, &file),
        Commands::Weight { kg } => cmd_weight(&paths, kg),
        Commands::Run {
            routine_id,
            auto_complete,
            rpe,
        } => cmd_run(&paths, &config, &routine_id, auto_complete, rpe),
        Commands::History { days } => cmd_history(&paths, days),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
    }
}

fn cmd_list(paths: &Paths) -> Result<()> {
    let library = Library::load(&paths.library)?;

    if library.routines().is_empty() {
        println!("No routines in library. Add some with `routine import <FILE>`.");
        return Ok(());
    }

    for routine in library.routines() {
        println!(
            "{:<20} {}  ({} exercises, {} series)",
            routine.id,
            routine.title,
            routine.exercises.len(),
            routine.series_count()
        );
    }
    Ok(())
}

fn cmd_import(paths: &Paths, file: &Path) -> Result<()> {
    let routines = load_routines_file(file)?;
    let mut imported = 0;
    Library::update(&paths.library, |library| {
        imported = library.import_routines(routines)?;
        Ok(())
    })?;

    println!("✓ Imported {} routines", imported);
    Ok(())
}

fn cmd_weight(paths: &Paths, kg: f64) -> Result<()> {
    Library::update(&paths.library, |library| library.record_weight(kg, Utc::now()))?;
    println!("✓ Recorded body weight {:.1} kg", kg);
    Ok(())
}

fn cmd_run(
    paths: &Paths,
    config: &Config,
    routine_id: &str,
    auto_complete: bool,
    rpe: Option<u8>,
) -> Result<()> {
    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }

    let library = Library::load(&paths.library)?;
    let routine = library
        .routine(routine_id)
        .cloned()
        .ok_or_else(|| Error::Routine(format!("Unknown routine '{}'", routine_id)))?;

    let body_weight = library.latest_body_weight();
    if body_weight.is_none() {
        println!("No body weight recorded - calories will not be estimated.");
    }

    let sink = JsonlSink::new(&paths.wal);
    let mut engine = SessionEngine::new(catalog, sink, SessionSettings::from_config(config))
        .with_body_weight(body_weight);

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", routine.title.to_uppercase());
    println!("╰─────────────────────────────────────────╯");

    let events = engine.start(routine, Utc::now())?;
    let finished = if auto_complete {
        let answer = rpe.map(|r| r.to_string()).unwrap_or_default();
        auto_drive(&mut engine, events, &answer)?
    } else {
        interactive_drive(&mut engine, events)?
    };

    match finished {
        Some(session) => {
            display_summary(&session, body_weight.is_some());
            engine.finish();
        }
        None => {
            engine.cancel();
            println!("\nRoutine cancelled - nothing was saved.");
        }
    }
    Ok(())
}

fn take_finished(events: Vec<SessionEvent>) -> Option<RoutineSession> {
    events.into_iter().find_map(|e| match e {
        SessionEvent::RoutineFinished(session) => Some(*session),
        _ => None,
    })
}

fn auto_drive<S: SessionSink>(
    engine: &mut SessionEngine<'_, S>,
    mut events: Vec<SessionEvent>,
    rpe: &str,
) -> Result<Option<RoutineSession>> {
    for _ in 0..AUTO_STEP_LIMIT {
        display_events(engine, &events);
        if let Some(session) = take_finished(events) {
            return Ok(Some(session));
        }

        let now = Utc::now();
        events = if engine.pending_rpe().is_some() {
            engine.handle_rpe_save(rpe, now)
        } else if engine.is_resting() {
            engine.handle_rest_complete(now)
        } else {
            engine.handle_next(now)
        };
    }
    Err(Error::Other("Routine did not finish".into()))
}

fn interactive_drive<S: SessionSink>(
    engine: &mut SessionEngine<'_, S>,
    mut events: Vec<SessionEvent>,
) -> Result<Option<RoutineSession>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        display_events(engine, &events);
        if let Some(session) = take_finished(events) {
            return Ok(Some(session));
        }

        if engine.pending_rpe().is_some() {
            print!("RPE 1-10 (Enter = 7)  [b] back  [q] quit > ");
        } else if engine.is_resting() {
            print!("[Enter] skip rest  [b] back  [q] quit > ");
        } else {
            print!("[Enter] next  [b] back  [q] quit > ");
        }
        io::stdout().flush()?;

        let input = match lines.next() {
            Some(line) => line?,
            None => return Ok(None),
        };
        let input = input.trim().to_lowercase();
        let now = Utc::now();

        events = match input.as_str() {
            "q" => return Ok(None),
            "b" => engine.handle_previous(now),
            _ if engine.pending_rpe().is_some() => engine.handle_rpe_save(&input, now),
            _ => engine.handle_next(now),
        };
    }
}

fn display_events<S: SessionSink>(engine: &SessionEngine<'_, S>, events: &[SessionEvent]) {
    let Some(routine) = engine.routine() else {
        return;
    };

    for event in events {
        match event {
            SessionEvent::PreparationStarted { position, seconds } => {
                let exercise = &routine.exercises[position.exercise];
                println!("\n  Get ready: {} ({}s)", display_name(exercise), seconds);
            }
            SessionEvent::WorkStarted(position) => {
                let exercise = &routine.exercises[position.exercise];
                let series = &exercise.series[position.series];
                println!(
                    "\n  {}  [{}/{}]  {}",
                    display_name(exercise),
                    position.series + 1,
                    exercise.series.len(),
                    describe_series(series)
                );
            }
            SessionEvent::RestStarted { kind, seconds } => {
                let label = match kind {
                    RestType::Series => "Rest",
                    RestType::Exercise => "Rest before next exercise",
                };
                println!("  {}: {}", label, format_clock(*seconds));
            }
            SessionEvent::RpeRecorded { rpe, .. } => println!("  → RPE {}", rpe),
            SessionEvent::ExerciseCompleted { index } => {
                println!("  ✓ {} done", display_name(&routine.exercises[*index]));
            }
            _ => {}
        }
    }
}

fn display_name(exercise: &Exercise) -> String {
    if !exercise.name.trim().is_empty() {
        return exercise.name.clone();
    }
    match get_default_catalog().exercises.get(&exercise.key) {
        Some(meta) => meta.name.clone(),
        None => exercise.key.clone(),
    }
}

fn describe_series(series: &Series) -> String {
    let mut parts = Vec::new();
    if series.kind == SeriesKind::WarmUp {
        parts.push("warm-up".to_string());
    }
    match series.unit {
        SeriesUnit::RepsAndWeight | SeriesUnit::Reps => {
            if let Some(reps) = series.reps {
                parts.push(format!("{} reps", reps));
            }
            if let Some(kg) = series.weight_kg.filter(|_| series.unit == SeriesUnit::RepsAndWeight) {
                parts.push(format!("@ {} kg", kg));
            }
        }
        SeriesUnit::Time | SeriesUnit::Distance => {
            if let Some(seconds) = series.duration_seconds {
                parts.push(format_clock(u64::from(seconds)));
            }
            if let Some(meters) = series.distance_meters {
                parts.push(format!("{} m", meters));
            }
        }
    }
    parts.join(" ")
}

fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn display_summary(session: &RoutineSession, has_weight: bool) {
    println!("\n✓ Routine complete!");
    println!(
        "  Exercises: {}  Series: {}",
        session.exercise_count, session.series_count
    );
    println!(
        "  Work: {}  Rest: {}  Preparation: {}",
        format_clock(session.totals.work_seconds),
        format_clock(session.totals.rest_seconds()),
        format_clock(session.totals.preparation_seconds)
    );
    if has_weight {
        println!("  Calories: {} kcal", session.calories_kcal);
    } else {
        println!("  Calories: n/a");
    }
    if !session.muscles.is_empty() {
        println!("  Muscles: {}", session.muscles.join(", "));
    }
}

fn cmd_history(paths: &Paths, days: i64) -> Result<()> {
    let sessions = load_recent_sessions(&paths.wal, &paths.csv, days)?;

    if sessions.is_empty() {
        println!("No sessions in the last {} days.", days);
        return Ok(());
    }

    for session in &sessions {
        println!(
            "{}  {:<24} {:>2} exercises {:>3} series {:>5} kcal",
            session.performed_at.format("%Y-%m-%d %H:%M"),
            session.routine_title,
            session.exercise_count,
            session.series_count,
            session.calories_kcal
        );
    }

    let summary = summarize(&sessions);
    println!("\nLast {} days: {} sessions", days, summary.sessions);
    println!(
        "  Calories: {} kcal total, {:.0} per session",
        summary.total_kcal, summary.average_kcal
    );
    println!(
        "  Work: {}  Rest: {}",
        format_clock(summary.total_work_seconds),
        format_clock(summary.total_rest_seconds)
    );
    if !summary.top_muscles.is_empty() {
        let muscles: Vec<String> = summary
            .top_muscles
            .iter()
            .map(|(m, n)| format!("{} ({})", m, n))
            .collect();
        println!("  Top muscles: {}", muscles.join(", "));
    }
    Ok(())
}

fn cmd_rollup(paths: &Paths, cleanup: bool) -> Result<()> {
    if !paths.wal.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = routine_core::csv_rollup::wal_to_csv_and_archive(&paths.wal, &paths.csv)?;

    println!("✓ Rolled up {} sessions to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = routine_core::csv_rollup::cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}
