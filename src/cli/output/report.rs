use std::fmt::Write;

use ansi_term::{Colour, Style};

use crate::{
    daemon::{
        limits::{evaluate_limit, LimitState, LimitStatus},
        settings::Settings,
        storage::entities::DailyAggregate,
    },
    utils::time::format_seconds,
};

const BAR_WIDTH: u64 = 30;

fn state_style(state: LimitState) -> Style {
    match state {
        LimitState::Alert => Colour::Green.normal(),
        LimitState::Concerned => Colour::Yellow.bold(),
        LimitState::Exhausted => Colour::Red.bold(),
    }
}

/// `1h 20m left` or `15m over`.
fn describe_remaining(status: &LimitStatus) -> String {
    if status.over_limit_seconds > 0 {
        format!("{} over", format_seconds(status.over_limit_seconds))
    } else {
        format!("{} left", format_seconds(status.remaining_seconds))
    }
}

/// Header line of a day: total against the limit and the state.
pub fn render_summary(aggregate: &DailyAggregate, status: &LimitStatus) -> String {
    format!(
        "{}\t{} / {}\t{}\t{}",
        aggregate.day,
        aggregate.formatted_total(),
        format_seconds(status.limit_seconds),
        state_style(status.state).paint(status.state.to_string()),
        describe_remaining(status)
    )
}

/// Summary followed by time per app, largest first.
pub fn render_day(aggregate: &DailyAggregate, status: &LimitStatus) -> String {
    let mut output = render_summary(aggregate, status);
    output.push('\n');
    for (app, seconds) in aggregate.apps_by_time() {
        let _ = writeln!(output, "  {app:<20}{}", format_seconds(seconds));
    }
    output
}

/// Bars for every hour with activity. Values are minutes.
pub fn render_hourly(aggregate: &DailyAggregate) -> String {
    let busiest = aggregate.hourly_activity.iter().copied().max().unwrap_or(0);
    let mut output = String::new();
    if busiest == 0 {
        return output;
    }
    for (hour, minutes) in aggregate.hourly_activity.iter().enumerate() {
        if *minutes == 0 {
            continue;
        }
        let width = (minutes * BAR_WIDTH).div_ceil(busiest) as usize;
        let _ = writeln!(output, "{hour:02}:00 {:<30} {minutes}m", "#".repeat(width));
    }
    output
}

/// One line per day, in the given order.
pub fn render_history(aggregates: &[DailyAggregate], settings: &Settings) -> String {
    let mut output = String::new();
    for aggregate in aggregates {
        let status = evaluate_limit(aggregate.total_seconds, settings.limit_for(aggregate.day));
        output.push_str(&render_summary(aggregate, &status));
        output.push('\n');
    }
    output
}
