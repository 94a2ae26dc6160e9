use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;
use vitals_core::catalog::{BLOOD_PRESSURE_DOMAIN, SLEEP_DOMAIN};
use vitals_core::score::{score_history, scored_history};
use vitals_core::trends::{metric_trends, session_indicators, MetricTrend};
use vitals_core::*;

#[derive(Parser)]
#[command(name = "vitals")]
#[command(about = "Blood pressure, sleep and lab tracking with health scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Blood-pressure sessions
    Bp {
        #[command(subcommand)]
        command: BpCommand,
    },

    /// Sleep entries
    Sleep {
        #[command(subcommand)]
        command: SleepCommand,
    },

    /// Blood-test results
    Lab {
        #[command(subcommand)]
        command: LabCommand,
    },

    /// Show change indicators for blood pressure and lab metrics
    Trends {
        /// Show unchanged values as ±0 instead of a dash
        #[arg(long)]
        neutral_icon: bool,
    },

    /// Show subscores, the overall health score and insights
    Score {
        /// Score as of this date (YYYY-MM-DD); defaults to today
        #[arg(long, value_parser = parse_date)]
        today: Option<NaiveDate>,
    },

    /// Exclude a metric or domain from scoring and trends
    Ignore { key: String },

    /// Include a previously ignored metric again
    Unignore { key: String },

    /// List ignored metrics
    Ignored,

    /// Write sessions and sleep entries to CSV files
    Export {
        /// Output directory
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum BpCommand {
    /// Record a session of one or more readings
    Add {
        /// Reading as SYS/DIA or SYS/DIA/PULSE; repeat for several readings
        #[arg(long = "reading", required = true, value_parser = parse_reading)]
        readings: Vec<RawReading>,

        /// When the session was taken ("YYYY-MM-DD HH:MM"); defaults to now
        #[arg(long, value_parser = parse_datetime)]
        at: Option<NaiveDateTime>,

        #[arg(long, value_enum)]
        arm: Option<ArmArg>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Replace every reading of a session
    Replace {
        session_id: Uuid,

        #[arg(long = "reading", required = true, value_parser = parse_reading)]
        readings: Vec<RawReading>,
    },

    /// Delete a session
    Remove { session_id: Uuid },

    /// List sessions, oldest first
    List,
}

#[derive(Subcommand)]
enum SleepCommand {
    /// Record one night of sleep
    Add {
        /// Night the sleep started (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,

        /// Total sleep in hours
        #[arg(long)]
        hours: f64,

        #[arg(long)]
        deep_minutes: Option<u32>,

        #[arg(long)]
        rem_minutes: Option<u32>,

        /// Bedtime (HH:MM)
        #[arg(long, value_parser = parse_time)]
        bedtime: Option<NaiveTime>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// List sleep entries, oldest first
    List,
}

#[derive(Subcommand)]
enum LabCommand {
    /// Record a blood-test result
    Add {
        metric: String,
        value: f64,

        /// Date of the test (YYYY-MM-DD); defaults to today
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },

    /// List the metrics lab results can be recorded for
    Metrics,
}

#[derive(Clone, Copy, ValueEnum)]
enum ArmArg {
    Left,
    Right,
}

impl From<ArmArg> for Arm {
    fn from(arm: ArmArg) -> Self {
        match arm {
            ArmArg::Left => Arm::Left,
            ArmArg::Right => Arm::Right,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    vitals_core::logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let mut store = JsonFileStore::new(data_dir);

    match cli.command {
        Commands::Bp { command } => cmd_bp(&mut store, command),
        Commands::Sleep { command } => cmd_sleep(&mut store, command),
        Commands::Lab { command } => cmd_lab(&mut store, command),
        Commands::Trends { neutral_icon } => cmd_trends(&store, &config, neutral_icon),
        Commands::Score { today } => {
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            cmd_score(&store, &config, today)
        }
        Commands::Ignore { key } => cmd_ignore(store, &config, key),
        Commands::Unignore { key } => cmd_unignore(store, &config, &key),
        Commands::Ignored => cmd_ignored(store, &config),
        Commands::Export { out } => cmd_export(&store, out),
    }
}

fn cmd_bp(store: &mut JsonFileStore, command: BpCommand) -> Result<()> {
    match command {
        BpCommand::Add {
            mut readings,
            at,
            arm,
            notes,
        } => {
            let at = at.unwrap_or_else(|| Local::now().naive_local());
            if let Some(arm) = arm {
                for reading in &mut readings {
                    reading.arm = Some(arm.into());
                }
            }

            let mut recorded = None;
            Journal::update(store, |journal| {
                recorded = Some(journal.add_session(at, &readings, notes)?.clone());
                Ok(())
            })?;

            if let Some(session) = recorded {
                println!("✓ Session recorded: {}", session.session_id);
                print_session(&session);
            }
        }

        BpCommand::Replace {
            session_id,
            readings,
        } => {
            let mut replaced = None;
            Journal::update(store, |journal| {
                replaced = Some(journal.replace_session(session_id, &readings)?.clone());
                Ok(())
            })?;

            if let Some(session) = replaced {
                println!("✓ Session updated: {}", session.session_id);
                print_session(&session);
            }
        }

        BpCommand::Remove { session_id } => {
            Journal::update(store, |journal| {
                journal.remove_session(session_id)?;
                Ok(())
            })?;
            println!("✓ Session removed: {}", session_id);
        }

        BpCommand::List => {
            let journal = Journal::load(&*store);
            let sessions = journal.sessions_sorted();
            if sessions.is_empty() {
                println!("No sessions recorded.");
            }
            for session in sessions {
                println!("{}", session.session_id);
                print_session(session);
            }
        }
    }
    Ok(())
}

fn cmd_sleep(store: &mut JsonFileStore, command: SleepCommand) -> Result<()> {
    match command {
        SleepCommand::Add {
            date,
            hours,
            deep_minutes,
            rem_minutes,
            bedtime,
            notes,
        } => {
            let entry = SleepEntry {
                id: Uuid::new_v4(),
                date,
                duration_minutes: hours_to_minutes(hours)?,
                deep_minutes,
                rem_minutes,
                bedtime,
                notes,
            };

            Journal::update(store, |journal| {
                journal.add_sleep(entry)?;
                Ok(())
            })?;
            println!("✓ Sleep recorded for the night of {}", date);
        }

        SleepCommand::List => {
            let journal = Journal::load(&*store);
            let entries = journal.sleep_sorted();
            if entries.is_empty() {
                println!("No sleep recorded.");
            }
            for entry in entries {
                let restorative = entry
                    .restorative_percent()
                    .map(|p| format!(", {:.0}% deep + REM", p))
                    .unwrap_or_default();
                println!(
                    "  {}  {:.1} h{}",
                    entry.date,
                    f64::from(entry.duration_minutes) / 60.0,
                    restorative
                );
            }
        }
    }
    Ok(())
}

fn cmd_lab(store: &mut JsonFileStore, command: LabCommand) -> Result<()> {
    match command {
        LabCommand::Add {
            metric,
            value,
            date,
        } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            Journal::update(store, |journal| {
                journal.add_lab(&metric, date, value)?;
                Ok(())
            })?;
            println!("✓ Recorded {} = {} on {}", metric, value, date);
        }

        LabCommand::Metrics => {
            for metric in default_catalog().lab_metrics() {
                println!("  {:<20} {} ({})", metric.key, metric.name, metric.unit);
            }
        }
    }
    Ok(())
}

fn cmd_trends(store: &JsonFileStore, config: &Config, neutral_icon: bool) -> Result<()> {
    let journal = Journal::load(&*store);
    let ignored = IgnoredMetrics::open(store.clone(), config.registry.debounce_window())?;
    let catalog = default_catalog();

    let mut indicators = session_indicators(&journal.sessions, catalog, neutral_icon);
    if ignored.is_ignored(BLOOD_PRESSURE_DOMAIN) {
        indicators.clear();
    }
    indicators.retain(|t| !ignored.is_ignored(&t.key));
    let style = DeltaStyle {
        integer: false,
        neutral_icon,
    };
    let labs = metric_trends(&journal.labs, catalog, &ignored, style);

    if indicators.is_empty() && labs.is_empty() {
        println!("Nothing to compare yet.");
        return Ok(());
    }

    if !indicators.is_empty() {
        println!("Blood pressure (latest session)");
        for trend in &indicators {
            print_trend(trend);
        }
    }

    if !labs.is_empty() {
        println!("Lab results");
        for trend in &labs {
            print_trend(trend);
        }
    }
    Ok(())
}

fn cmd_score(store: &JsonFileStore, config: &Config, today: NaiveDate) -> Result<()> {
    let journal = Journal::load(&*store);
    let ignored = IgnoredMetrics::open(store.clone(), config.registry.debounce_window())?;

    let history = scored_history(
        &journal.sessions,
        &journal.sleep,
        today,
        &config.scoring,
        &ignored,
    );
    let score = score_history(&history, &config.scoring, &ignored);

    println!("Health score as of {}", today);
    match score.overall() {
        Some(overall) => println!("  Overall: {}", overall),
        None => println!("  Overall: not enough data"),
    }

    match &score.bp_score {
        Some(bp) => {
            println!(
                "  Blood pressure: {} ({}, avg {}/{})",
                bp.value, bp.category, bp.avg_systolic, bp.avg_diastolic
            );
            for (name, value) in bp.components() {
                println!("    {:<20} {:+}", name, value);
            }
        }
        None if ignored.is_ignored(BLOOD_PRESSURE_DOMAIN) => println!("  Blood pressure: ignored"),
        None => println!("  Blood pressure: not enough data"),
    }

    match &score.sleep_score {
        Some(sleep) => {
            println!("  Sleep: {}", sleep.value);
            for (name, value) in sleep.components() {
                println!("    {:<20} {:+}", name, value);
            }
        }
        None if ignored.is_ignored(SLEEP_DOMAIN) => println!("  Sleep: ignored"),
        None => println!("  Sleep: not enough data"),
    }

    println!();
    println!("Insights");
    for insight in compose_insights(&score, &history.sessions, &history.sleep) {
        println!("  • {}", insight);
    }
    Ok(())
}

fn cmd_ignore(store: JsonFileStore, config: &Config, key: String) -> Result<()> {
    check_ignorable(&key)?;
    let mut ignored = IgnoredMetrics::open(store, config.registry.debounce_window())?;
    if ignored.ignore(key.clone()) {
        println!("✓ Ignoring {}", key);
    } else {
        println!("{} is already ignored", key);
    }
    Ok(())
}

fn cmd_unignore(store: JsonFileStore, config: &Config, key: &str) -> Result<()> {
    let mut ignored = IgnoredMetrics::open(store, config.registry.debounce_window())?;
    if ignored.unignore(key) {
        println!("✓ No longer ignoring {}", key);
    } else {
        println!("{} was not ignored", key);
    }
    Ok(())
}

fn cmd_ignored(store: JsonFileStore, config: &Config) -> Result<()> {
    let ignored = IgnoredMetrics::open(store, config.registry.debounce_window())?;
    if ignored.is_empty() {
        println!("No ignored metrics.");
    }
    for key in ignored.keys() {
        println!("  {}", key);
    }
    Ok(())
}

fn cmd_export(store: &JsonFileStore, out: PathBuf) -> Result<()> {
    let journal = Journal::load(&*store);
    let sessions = export::write_sessions_csv(&journal.sessions, &out.join("sessions.csv"))?;
    let sleep = export::write_sleep_csv(&journal.sleep, &out.join("sleep.csv"))?;

    println!("✓ Exported {} sessions and {} sleep entries", sessions, sleep);
    println!("  Directory: {}", out.display());
    Ok(())
}

fn check_ignorable(key: &str) -> Result<()> {
    if key == BLOOD_PRESSURE_DOMAIN || key == SLEEP_DOMAIN || default_catalog().contains(key) {
        Ok(())
    } else {
        Err(Error::validation("key", key, "not a known metric or domain"))
    }
}

fn print_session(session: &Session) {
    let pulse = session
        .pulse
        .map(|p| format!(", pulse {}", p))
        .unwrap_or_default();
    println!(
        "  {}  {}/{}{}  {} ({} reading{})",
        session.datetime.format("%Y-%m-%d %H:%M"),
        session.systolic,
        session.diastolic,
        pulse,
        session.category(),
        session.reading_count,
        if session.reading_count == 1 { "" } else { "s" }
    );
}

fn print_trend(trend: &MetricTrend) {
    match (&trend.delta, &trend.pct) {
        (Some(delta), Some(pct)) => println!(
            "  {:<20} {} {} ({}, {}) {}",
            trend.name, trend.current, trend.unit, delta, pct, trend.kind
        ),
        _ => println!(
            "  {:<20} {} {} (no earlier value)",
            trend.name, trend.current, trend.unit
        ),
    }
}

fn hours_to_minutes(hours: f64) -> Result<u32> {
    if !hours.is_finite() || hours <= 0.0 || hours > 24.0 {
        return Err(Error::validation("hours", hours, "must be between 0 and 24"));
    }
    Ok((hours * 60.0).round() as u32)
}

fn parse_reading(s: &str) -> std::result::Result<RawReading, String> {
    let parts: Vec<&str> = s.split('/').map(str::trim).collect();
    let number = |p: &str| {
        p.parse::<u16>()
            .map_err(|_| format!("invalid number {:?} in reading {:?}", p, s))
    };

    match parts.as_slice() {
        [sys, dia] => Ok(RawReading::new(number(sys)?, number(dia)?, None)),
        [sys, dia, pulse] => Ok(RawReading::new(
            number(sys)?,
            number(dia)?,
            Some(number(pulse)?),
        )),
        _ => Err(format!("expected SYS/DIA or SYS/DIA/PULSE, got {:?}", s)),
    }
}

fn parse_datetime(s: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .map_err(|e| format!("expected \"YYYY-MM-DD HH:MM\": {}", e))
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| format!("expected HH:MM: {}", e))
}
