//! `cadence` command line front end.
//!
//! # Responsibility
//! - Map flags and `CADENCE_*` environment variables onto core calls.
//! - Print results as pretty JSON on stdout and failures as one
//!   `error kind=... field=... message=...` line on stderr.

use anyhow::{Context, Result};
use cadence_core::{
    core_version, default_log_level, init_logging, open_db, Clock, EntityId, Family, FixedClock,
    LifecycleError, LifecycleService, NewEntity, SqliteEntityRepository, SystemClock,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::info;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Date-driven lifecycle for data batches and governance terms")]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "CADENCE_DB", default_value = "cadence.sqlite3")]
    db: PathBuf,
    /// trace|debug|info|warn|error. Defaults to the build-mode level when
    /// logging to files and to `warn` on stderr.
    #[arg(long, global = true, env = "CADENCE_LOG_LEVEL")]
    log_level: Option<String>,
    /// Absolute directory for rotating log files; logs go to stderr otherwise.
    #[arg(long, global = true, env = "CADENCE_LOG_DIR")]
    log_dir: Option<String>,
    /// Evaluate as if today were this date (YYYY-MM-DD).
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a draft batch or upcoming term.
    Create {
        #[arg(long, value_parser = parse_family)]
        family: Family,
        #[arg(long)]
        name: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// List entities ordered by start date.
    List {
        #[arg(long, value_parser = parse_family)]
        family: Option<Family>,
    },
    /// Apply today's automatic transitions, then list.
    Load {
        #[arg(long, value_parser = parse_family)]
        family: Option<Family>,
    },
    /// Apply (or with --dry-run only show) today's automatic transitions.
    Sweep {
        #[arg(long, value_parser = parse_family)]
        family: Option<Family>,
        #[arg(long)]
        dry_run: bool,
    },
    Get {
        id: EntityId,
    },
    Activate {
        id: EntityId,
    },
    /// Activate before the start date, moving the start date to today.
    ForceActivate {
        id: EntityId,
        #[arg(long)]
        reason: String,
    },
    /// Close an active entity, ending it today if its window is still open.
    Close {
        id: EntityId,
    },
    /// Close, including a never-activated entity whose window has passed.
    ForceClose {
        id: EntityId,
        #[arg(long)]
        reason: String,
    },
    /// Return a finished entity to active after an extension.
    Reopen {
        id: EntityId,
    },
    /// Move the end date forward.
    Extend {
        id: EntityId,
        #[arg(long)]
        end: NaiveDate,
    },
    Pause {
        id: EntityId,
        #[arg(long)]
        reason: String,
    },
    Resume {
        id: EntityId,
    },
    /// Show the transition audit trail.
    History {
        id: EntityId,
    },
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let level = cli.log_level.clone().unwrap_or_else(|| {
        if cli.log_dir.is_some() {
            default_log_level().to_string()
        } else {
            "warn".to_string()
        }
    });
    init_logging(&level, cli.log_dir.as_deref()).map_err(anyhow::Error::msg)?;

    if let Command::Version = cli.command {
        return print_version();
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    let repo = SqliteEntityRepository::try_new(&conn)?;
    let clock: Box<dyn Clock> = match cli.today {
        Some(today) => Box::new(FixedClock::new(today, SystemClock.now_ms())),
        None => Box::new(SystemClock),
    };
    info!(
        "event=cli_command module=cli status=start today={}",
        clock.today()
    );
    let service = LifecycleService::new(repo, clock);

    match cli.command {
        Command::Create {
            family,
            name,
            start,
            end,
        } => print_json(&service.create(&NewEntity::new(family, name, start, end))?),
        Command::List { family } => print_json(&service.list(family)?),
        Command::Load { family } => print_json(&service.load(family)?),
        Command::Sweep { family, dry_run } => {
            let proposals = service.preview_sweep(family)?;
            if dry_run {
                print_json(&proposals)
            } else {
                print_json(&service.apply_proposals(&proposals))
            }
        }
        Command::Get { id } => print_json(&service.get(id)?),
        Command::Activate { id } => print_json(&service.activate(id)?),
        Command::ForceActivate { id, reason } => print_json(&service.force_activate(id, &reason)?),
        Command::Close { id } => print_json(&service.close(id)?),
        Command::ForceClose { id, reason } => print_json(&service.force_close(id, &reason)?),
        Command::Reopen { id } => print_json(&service.reopen(id)?),
        Command::Extend { id, end } => print_json(&service.extend(id, end)?),
        Command::Pause { id, reason } => print_json(&service.pause(id, &reason)?),
        Command::Resume { id } => print_json(&service.resume(id)?),
        Command::History { id } => print_json(&service.history(id)?),
        Command::Version => print_version(),
    }
}

fn parse_family(value: &str) -> Result<Family, String> {
    Family::parse(value).ok_or_else(|| {
        format!("unknown family `{value}`; expected data_batch|governance_term")
    })
}

fn print_version() -> Result<()> {
    print_json(&json!({ "cadence_core": core_version() }))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(err: &anyhow::Error) {
    match err.downcast_ref::<LifecycleError>() {
        Some(lifecycle) => eprintln!(
            "error kind={} field={} message={}",
            lifecycle.kind(),
            lifecycle.field().unwrap_or("-"),
            lifecycle
        ),
        None => eprintln!("error kind=internal field=- message={err:#}"),
    }
}
