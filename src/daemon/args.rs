use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Background process that counts time spent in tracked apps")]
pub struct DaemonArgs {
    /// Run in the foreground instead of detaching.
    #[arg(long)]
    pub force: bool,
    /// Application directory holding records, settings and logs.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    /// Seconds between ticks. Every active tick counts this many seconds.
    #[arg(long = "tick-seconds", default_value_t = 15, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_seconds: u64,
    /// Unsaved seconds after which the current day is written out.
    #[arg(long = "flush-threshold", default_value_t = 300)]
    pub flush_threshold: u64,
}
