use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use quark_engine::config::EngineConfig;
use quark_engine::rules::{dispatch, DomainEvent};
use quark_engine::storage::Storage;
use quark_engine::term::Term;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "quark-engine",
    about = "Achievement ledger maintenance — full-history recompute and inspection",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the SQLite database file
    #[arg(long, env = "QUARK_DB", global = true)]
    db: Option<std::path::PathBuf>,

    /// Path to a config.toml (optional)
    #[arg(long, env = "QUARK_CONFIG", global = true)]
    config: Option<std::path::PathBuf>,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, env = "QUARK_LOG", global = true)]
    log: Option<String>,

    /// Log output format: "pretty" | "json"
    #[arg(long, env = "QUARK_LOG_FORMAT", global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Replay the full domain history through every rule.
    ///
    /// Every evaluator recomputes from persisted history and never
    /// downgrades an acquired row, so recompute is safe to run at any
    /// time. Run it after bulk imports or catalog edits.
    ///
    /// Examples:
    ///   quark-engine recompute
    ///   quark-engine recompute --term fa2013
    Recompute {
        /// Term that non-historical achievements (icon credits) land in.
        /// Format: season code + year, e.g. "fa2013". Defaults to the
        /// latest term present in the database.
        #[arg(long)]
        term: Option<String>,
    },
    /// Print a user's achievement ledger.
    Show {
        /// User id to inspect
        #[arg(long)]
        user: i64,
        /// Emit JSON instead of the human-readable table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = EngineConfig::new(
        args.config.as_deref(),
        args.db,
        args.log,
        args.log_format,
    );

    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(config.log.as_str()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(config.log.as_str()).compact().init();
    }

    let store = Storage::open_with_slow_query(&config.database, config.slow_query_threshold_ms)
        .await
        .with_context(|| format!("Opening database at {}", config.database.display()))?;

    match args.command {
        Command::Recompute { term } => recompute(&store, term.as_deref()).await,
        Command::Show { user, json } => show(&store, user, json).await,
    }
}

/// Replay every saved record through the rules, oldest term first within
/// each family. Evaluators read the full persisted history on each event,
/// so family-by-family order converges to the same ledger as the original
/// interleaving.
async fn recompute(store: &Storage, term: Option<&str>) -> Result<()> {
    let officers = store.all_officers().await?;
    let attendance = store.all_attendance().await?;
    let exams = store.all_exams().await?;
    let reports = store.all_project_reports().await?;

    let current_term = match term {
        Some(raw) => raw.parse::<Term>()?,
        None => match store.latest_term_id().await? {
            Some(id) => Term::from_id(id).context("Database holds an invalid term key")?,
            None => bail!("empty database and no --term given"),
        },
    };
    info!(term = %current_term, "recomputing achievement ledger from full history");

    let mut replayed = 0usize;
    for officer in &officers {
        dispatch(store, current_term, &DomainEvent::OfficerSaved(officer)).await?;
        replayed += 1;
    }
    for record in &attendance {
        dispatch(store, current_term, &DomainEvent::AttendanceSaved(record)).await?;
        replayed += 1;
    }
    for exam in &exams {
        dispatch(store, current_term, &DomainEvent::ExamSaved(exam)).await?;
        replayed += 1;
    }
    for report in &reports {
        dispatch(store, current_term, &DomainEvent::ProjectReportSaved(report)).await?;
        replayed += 1;
    }
    // Catalog rows carry icon credits; ledger rows written outside the
    // engine (manual awards) feed the meta rules.
    for achievement in &store.all_achievements().await? {
        dispatch(store, current_term, &DomainEvent::AchievementSaved(achievement)).await?;
        replayed += 1;
    }
    for record in &store.all_progress().await? {
        dispatch(store, current_term, &DomainEvent::ProgressSaved(record)).await?;
        replayed += 1;
    }

    info!(replayed, "recompute complete");
    Ok(())
}

async fn show(store: &Storage, user: i64, json: bool) -> Result<()> {
    let ledger = store.user_ledger(user).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ledger)?);
        return Ok(());
    }
    if ledger.is_empty() {
        println!("no achievement rows for user {user}");
        return Ok(());
    }
    for row in &ledger {
        let mark = if row.acquired { "x" } else { " " };
        let term = row
            .term()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "[{mark}] {:<32} {:>4}/{:<4} {}",
            row.achievement, row.progress, row.goal, term
        );
    }
    Ok(())
}
