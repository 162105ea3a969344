use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use doulos_checkin::config::{Config, DEFAULT_CONFIG_FILE};
use doulos_checkin::guard::{self, normalize_registration_number, CheckInOutcome, GuardDecision};
use doulos_checkin::models::CheckInAttempt;
use doulos_checkin::registry::parse_timestamp;
use doulos_checkin::window::{self, TimeWindow};
use doulos_checkin::{db, report};

#[derive(Parser)]
#[command(name = "doulos-checkin")]
#[command(about = "Attendance check-in for Doulos fellowship meetings", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Log debug output
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample members and a meeting
    Seed,
    /// Import members from a CSV file
    ImportMembers {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show whether attendance is open right now
    Window {
        /// Evaluate at this local time instead of now (YYYY-MM-DDTHH:MM)
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Check a member in to a meeting
    CheckIn {
        #[arg(long)]
        meeting: Uuid,
        #[arg(long)]
        reg_no: String,
        /// Name for a member not yet in the registry
        #[arg(long)]
        name: Option<String>,
        /// Accept a second check-in in the same week
        #[arg(long)]
        confirm: bool,
        #[arg(long)]
        at: Option<String>,
        /// Admin override: ignore the attendance window
        #[arg(long)]
        skip_window: bool,
        /// Gate on the meeting's own schedule instead of the weekly window
        #[arg(long, conflicts_with = "skip_window")]
        meeting_schedule: bool,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown attendance report
    Report {
        #[arg(long)]
        campus: Option<String>,
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let config = Config::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration ({})", cli.config.display()))?;
    let weekly_window = config.time_window()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let meeting_id = db::seed(&pool).await?;
            println!("Seed data inserted (meeting {meeting_id}).");
        }
        Commands::ImportMembers { csv } => {
            let pool = connect(&config).await?;
            let upserted = db::import_members_csv(&pool, &csv).await?;
            println!("Upserted {upserted} members from {}.", csv.display());
        }
        Commands::Window { at, json } => {
            let now = resolve_now(at.as_deref())?;
            let eligibility = window::evaluate(&now, &weekly_window);
            if json {
                println!("{}", serde_json::to_string_pretty(&eligibility)?);
            } else {
                println!("{}", eligibility.reason);
            }
        }
        Commands::CheckIn {
            meeting,
            reg_no,
            name,
            confirm,
            at,
            skip_window,
            meeting_schedule,
            json,
        } => {
            let now = resolve_now(at.as_deref())?;
            let pool = connect(&config).await?;
            let meeting = db::find_meeting(&pool, meeting)
                .await?
                .with_context(|| format!("meeting {meeting} not found"))?;

            if skip_window {
                tracing::info!(meeting_id = %meeting.id, "attendance window skipped by operator");
            } else {
                let gate = if meeting_schedule {
                    TimeWindow::for_meeting(&meeting)
                        .with_context(|| format!("meeting {} has an invalid schedule", meeting.id))?
                } else {
                    weekly_window
                };
                let eligibility = window::evaluate(&now, &gate);
                if !eligibility.is_open {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&eligibility)?);
                    } else {
                        println!("{}", eligibility.reason);
                    }
                    return Ok(());
                }
            }

            let attempt = CheckInAttempt {
                meeting_id: meeting.id,
                registration_number: reg_no,
                name_override: name,
                confirmed_duplicate: confirm,
            };
            let decision = classify(&pool, &config, &attempt, &meeting).await?;

            let mut outcome = CheckInOutcome::new(decision);
            if let GuardDecision::Admit { resolved_name } = &outcome.decision {
                let number = normalize_registration_number(&attempt.registration_number);
                let inserted =
                    db::record_attendance(&pool, &meeting, &number, resolved_name, now).await?;
                outcome = outcome.recorded(inserted);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.message());
            }
        }
        Commands::Report {
            campus,
            since_days,
            out,
        } => {
            let pool = connect(&config).await?;
            let since = report::cutoff_date(Local::now().date_naive(), since_days);
            let records = db::fetch_attendance(&pool, since, campus.as_deref()).await?;
            let markdown = report::build_report(campus.as_deref(), since, &records);
            std::fs::write(&out, markdown)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn classify(
    pool: &PgPool,
    config: &Config,
    attempt: &CheckInAttempt,
    meeting: &doulos_checkin::Meeting,
) -> anyhow::Result<GuardDecision> {
    let meeting_date = meeting.date;
    let policy = config.duplicate_policy;

    guard::classify_async(attempt, meeting, |number| async move {
        db::find_member_for_guard(pool, &number, meeting_date, policy).await
    })
    .await
}

fn resolve_now(at: Option<&str>) -> anyhow::Result<NaiveDateTime> {
    match at {
        Some(value) => parse_timestamp(value),
        None => Ok(Local::now().naive_local()),
    }
}

async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(config.database_url()?)
        .await
        .context("failed to connect to Postgres")
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("DOULOS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
