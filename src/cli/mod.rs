pub mod daemon_path;
pub mod history;
pub mod output;
pub mod process;
pub mod settings_command;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use history::HistoryCommand;
use output::{
    export::{export, ExportFormat},
    report::{render_day, render_history, render_hourly, render_summary},
};
use process::{daemon_executable, is_daemon_running, kill_daemons, restart_daemon};
use settings_command::{
    edit_settings, process_apps_command, set_idle_threshold, set_limit_hours, AppsCommand,
};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        limits::evaluate_limit,
        settings::SettingsStorage,
        start_daemon,
        storage::{
            aggregate_storage::{AggregateStore, FileAggregateStore},
            entities::DailyAggregate,
        },
        tracking::scheduler::SchedulerConfig,
    },
    fs::operations::replace_file_atomically,
    utils::{
        dir::{create_application_default_path, ensure_dir, records_dir, settings_path, LOGS_DIR},
        logging::{enable_logging, CLI_PREFIX},
        time::format_seconds,
    },
};

#[derive(Parser, Debug)]
#[command(name = "vibewatch", version, long_about = None)]
#[command(about = "Keeps time spent in your tools under a daily limit", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application, replacing a running one")]
    Init {},
    #[command(about = "Run a daemon directly in current console. Used for debugging")]
    Serve {},
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Show time spent today per app")]
    Today {},
    #[command(about = "Show whether the daemon runs and how much of today's limit is left")]
    Status {},
    #[command(about = "Show totals of previous days")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
    #[command(about = "Export every recorded day")]
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(long, short, help = "File to write into. Prints to stdout by default")]
        output: Option<PathBuf>,
    },
    #[command(about = "Delete all recorded data")]
    Clear {
        #[arg(long, help = "Confirm deleting everything")]
        yes: bool,
    },
    #[command(about = "Set the daily limit of a weekday")]
    Limit {
        #[arg(long, help = "Weekday from 1 (Sunday) to 7 (Saturday)")]
        weekday: u32,
        #[arg(long)]
        hours: f64,
    },
    #[command(about = "Manage tracked apps")]
    Apps {
        #[command(subcommand)]
        command: AppsCommand,
    },
    #[command(about = "Set how long without input counts as being away")]
    Idle {
        #[arg(long)]
        seconds: u64,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = match &args.dir {
        Some(dir) => ensure_dir(dir.clone())?,
        None => create_application_default_path()?,
    };
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir.join(LOGS_DIR), logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => {
            restart_daemon(args.dir.as_deref())?;
            println!("Daemon started");
            Ok(())
        }
        Commands::Stop {} => {
            let stopped = kill_daemons(&daemon_executable()?)?;
            println!("Stopped {stopped} daemons");
            Ok(())
        }
        Commands::Serve {} => start_daemon(app_dir, SchedulerConfig::default()).await,
        Commands::Today {} => print_today(&app_dir).await,
        Commands::Status {} => print_status(&app_dir).await,
        Commands::History { command } => {
            let range = command.range(Local::now())?;
            let store = FileAggregateStore::new(records_dir(&app_dir))?;
            let aggregates = store.fetch_range(range.from, range.to).await?;
            if aggregates.is_empty() {
                println!("Nothing was tracked between {} and {}", range.from, range.to);
                return Ok(());
            }
            let settings = SettingsStorage::new(settings_path(&app_dir)).load().await;
            print!("{}", render_history(&aggregates, &settings));
            Ok(())
        }
        Commands::Export { format, output } => {
            let store = FileAggregateStore::new(records_dir(&app_dir))?;
            let aggregates = store
                .fetch_range(NaiveDate::MIN, Local::now().date_naive())
                .await?;
            let content = export(&aggregates, format)?;
            match output {
                Some(path) => {
                    replace_file_atomically(&path, content.as_bytes()).await?;
                    println!("Exported {} days into {path:?}", aggregates.len());
                }
                None => print!("{content}"),
            }
            Ok(())
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("This deletes all tracked time, pass --yes to confirm");
            }
            clear_all(&app_dir, args.dir.as_deref()).await
        }
        Commands::Limit { weekday, hours } => {
            edit_settings(&app_dir, |settings| set_limit_hours(settings, weekday, hours)).await?;
            println!("Limit for weekday {weekday} is now {hours}h");
            Ok(())
        }
        Commands::Apps { command } => process_apps_command(&app_dir, command).await,
        Commands::Idle { seconds } => {
            edit_settings(&app_dir, |settings| set_idle_threshold(settings, seconds)).await?;
            println!("Idle threshold is now {seconds}s");
            Ok(())
        }
    }
}

/// Today as stored. The daemon saves every few minutes, so the last minutes may be missing.
async fn load_today(app_dir: &Path) -> Result<DailyAggregate> {
    let store = FileAggregateStore::new(records_dir(app_dir))?;
    let today = Local::now().date_naive();
    Ok(store
        .fetch_by_day(today)
        .await?
        .unwrap_or_else(|| DailyAggregate::new(today)))
}

async fn print_today(app_dir: &Path) -> Result<()> {
    let aggregate = load_today(app_dir).await?;
    let settings = SettingsStorage::new(settings_path(app_dir)).load().await;
    let status = evaluate_limit(aggregate.total_seconds, settings.limit_for(aggregate.day));
    print!("{}", render_day(&aggregate, &status));
    print!("{}", render_hourly(&aggregate));
    Ok(())
}

async fn print_status(app_dir: &Path) -> Result<()> {
    let running = is_daemon_running(&daemon_executable()?)?;
    println!(
        "Daemon is {}",
        if running { "running" } else { "not running" }
    );

    let aggregate = load_today(app_dir).await?;
    let settings = SettingsStorage::new(settings_path(app_dir)).load().await;
    let status = evaluate_limit(aggregate.total_seconds, settings.limit_for(aggregate.day));
    println!("{}", render_summary(&aggregate, &status));
    println!("Tracked apps: {}", settings.tracked_apps.join(", "));
    println!(
        "Idle after: {}",
        format_seconds(settings.idle_threshold_seconds)
    );
    Ok(())
}

/// The daemon keeps today in memory, so it is stopped first and started again after the files
/// are gone.
async fn clear_all(app_dir: &Path, dir_arg: Option<&Path>) -> Result<()> {
    let executable = daemon_executable()?;
    let was_running = kill_daemons(&executable)? > 0;

    FileAggregateStore::new(records_dir(app_dir))?
        .delete_all()
        .await?;
    println!("Deleted all tracked data");

    if was_running {
        restart_daemon(dir_arg)?;
        println!("Daemon restarted");
    }
    Ok(())
}
