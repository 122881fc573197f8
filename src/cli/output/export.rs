use std::{collections::BTreeSet, fmt::Write};

use anyhow::Result;
use clap::ValueEnum;

use crate::{daemon::storage::entities::DailyAggregate, utils::time::date_to_record_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Renders `aggregates` in the requested format, rows keep the given order.
pub fn export(aggregates: &[DailyAggregate], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(aggregates)?),
        ExportFormat::Csv => Ok(to_csv(aggregates)),
    }
}

/// One row per day. Every app seen on any day gets a column, sorted by name, holding whole
/// minutes. Hours and minutes of the total are split, so `5400` seconds is `1,30`.
pub fn to_csv(aggregates: &[DailyAggregate]) -> String {
    let apps = aggregates
        .iter()
        .flat_map(|v| v.app_breakdown.keys())
        .map(String::as_str)
        .collect::<BTreeSet<_>>();

    let mut csv = String::from("Date,Total Hours,Total Minutes");
    for app in &apps {
        csv.push(',');
        csv.push_str(&escape(&format!("{app} (minutes)")));
    }
    csv.push('\n');

    for aggregate in aggregates {
        let hours = aggregate.total_seconds / 3600;
        let minutes = (aggregate.total_seconds % 3600) / 60;
        // Writing into a String can't fail.
        let _ = write!(
            csv,
            "{},{hours},{minutes}",
            date_to_record_name(aggregate.day)
        );
        for app in &apps {
            let _ = write!(csv, ",{}", aggregate.app_seconds(app) / 60);
        }
        csv.push('\n');
    }
    csv
}

fn escape(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;

    use crate::daemon::storage::entities::DailyAggregate;

    use super::{export, to_csv, ExportFormat};

    fn aggregate(day: u32, apps: &[(&str, u64)]) -> DailyAggregate {
        let mut aggregate = DailyAggregate::new(NaiveDate::from_ymd_opt(2026, 1, day).unwrap());
        for (app, seconds) in apps {
            aggregate.add_total_time(*seconds, 10);
            aggregate.add_app_time(app, *seconds);
        }
        aggregate
    }

    #[test]
    fn csv_layout() {
        let aggregates = vec![
            aggregate(4, &[("Terminal", 5400)]),
            aggregate(3, &[("Cursor", 600), ("Terminal", 90)]),
        ];

        let csv = to_csv(&aggregates);

        assert_eq!(
            csv,
            "Date,Total Hours,Total Minutes,Cursor (minutes),Terminal (minutes)\n\
             2026-01-04,1,30,0,90\n\
             2026-01-03,0,11,10,1\n"
        );
    }

    #[test]
    fn empty_csv_has_header_only() {
        assert_eq!(to_csv(&[]), "Date,Total Hours,Total Minutes\n");
    }

    #[test]
    fn csv_escapes_app_names() {
        let csv = to_csv(&[aggregate(3, &[("Foo, Inc", 60)])]);
        assert!(csv.starts_with("Date,Total Hours,Total Minutes,\"Foo, Inc (minutes)\"\n"));
    }

    #[test]
    fn json_is_a_list_of_aggregates() -> Result<()> {
        let aggregates = vec![aggregate(3, &[("Cursor", 600)])];

        let json = export(&aggregates, ExportFormat::Json)?;

        let parsed: Vec<DailyAggregate> = serde_json::from_str(&json)?;
        assert_eq!(parsed, aggregates);
        Ok(())
    }
}
