use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use super::Args;
use crate::utils::time::range_start;

const DEFAULT_HISTORY_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct HistoryCommand {
    #[arg(
        long,
        conflicts_with_all = ["from", "to"],
        help = "Number of days to show, including today. Defaults to a week"
    )]
    days: Option<u32>,
    #[arg(
        long,
        help = "First day of the range. Examples are \"yesterday\", \"last monday\", \"15/03/2025\""
    )]
    from: Option<String>,
    #[arg(long, requires = "from", help = "Last day of the range. Defaults to today")]
    to: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Inclusive range of days to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl HistoryCommand {
    pub fn range(&self, now: DateTime<Local>) -> Result<DayRange> {
        let today = now.date_naive();
        let Some(from) = &self.from else {
            let days = self.days.unwrap_or(DEFAULT_HISTORY_DAYS);
            return Ok(DayRange {
                from: range_start(today, days),
                to: today,
            });
        };

        let from = parse_day(from, now, self.date_style, "start")?;
        let to = match &self.to {
            Some(to) => parse_day(to, now, self.date_style, "end")?,
            None => today,
        };
        if from > to {
            return Err(validation_error(format!(
                "Start of the range {from} is after its end {to}"
            )));
        }
        Ok(DayRange { from, to })
    }
}

fn parse_day(
    value: &str,
    now: DateTime<Local>,
    style: DateStyle,
    name: &str,
) -> Result<NaiveDate> {
    parse_date_string(value, now, style.into())
        .map(|v| v.date_naive())
        .map_err(|e| validation_error(format!("Failed to validate {name} date {e}")))
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Local, NaiveDate, TimeZone};
    use clap::Parser;

    use super::{DayRange, HistoryCommand};

    fn parse(args: &[&str]) -> HistoryCommand {
        HistoryCommand::parse_from(std::iter::once("history").chain(args.iter().copied()))
    }

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    #[test]
    fn defaults_to_a_week() -> Result<()> {
        let now = Local.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(
            parse(&[]).range(now)?,
            DayRange {
                from: date(1, 4),
                to: date(1, 10)
            }
        );
        Ok(())
    }

    #[test]
    fn single_day() -> Result<()> {
        let now = Local.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let range = parse(&["--days", "1"]).range(now)?;
        assert_eq!(range.from, range.to);
        Ok(())
    }

    #[test]
    fn huge_day_count_reaches_earliest_date() -> Result<()> {
        let now = Local.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        assert_eq!(
            parse(&["--days", "4000000000"]).range(now)?,
            DayRange {
                from: NaiveDate::MIN,
                to: date(1, 10)
            }
        );
        Ok(())
    }

    #[test]
    fn explicit_dates() -> Result<()> {
        let now = Local.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap();
        assert_eq!(
            parse(&["--from", "15/03/2026", "--to", "17/03/2026"]).range(now)?,
            DayRange {
                from: date(3, 15),
                to: date(3, 17)
            }
        );
        assert_eq!(
            parse(&["--from", "03/15/2026", "--date-style", "us"]).range(now)?,
            DayRange {
                from: date(3, 15),
                to: date(3, 20)
            }
        );
        Ok(())
    }

    #[test]
    fn reversed_range_is_rejected() {
        let now = Local.with_ymd_and_hms(2026, 3, 20, 12, 0, 0).unwrap();
        assert!(parse(&["--from", "17/03/2026", "--to", "15/03/2026"])
            .range(now)
            .is_err());
    }
}
