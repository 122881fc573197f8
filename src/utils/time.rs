use chrono::{Days, NaiveDate};

const RECORD_DATE_FORMAT: &str = "%Y-%m-%d";

/// This is the standard way of converting a date to a string in vibewatch.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format(RECORD_DATE_FORMAT).to_string()
}

/// Reverse of [date_to_record_name]. Accepts a bare file stem.
pub fn record_name_to_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, RECORD_DATE_FORMAT).ok()
}

/// First day of the `days` long range that ends with `last`, `last` included. Ranges reaching
/// past the earliest representable date start there.
pub fn range_start(last: NaiveDate, days: u32) -> NaiveDate {
    last.checked_sub_days(Days::new(u64::from(days.max(1)) - 1))
        .unwrap_or(NaiveDate::MIN)
}

/// Formats seconds as `3h 42m`, or `42m` under an hour.
pub fn format_seconds(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{date_to_record_name, format_seconds, range_start, record_name_to_date};

    #[test]
    fn record_names_are_reversible() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();
        assert_eq!(date_to_record_name(date), "2026-01-03");
        assert_eq!(record_name_to_date("2026-01-03"), Some(date));
        assert_eq!(record_name_to_date("settings"), None);
    }

    #[test]
    fn range_counts_last_day() {
        let last = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        assert_eq!(range_start(last, 1), last);
        assert_eq!(range_start(last, 0), last);
        assert_eq!(
            range_start(last, 7),
            NaiveDate::from_ymd_opt(2026, 1, 4).unwrap()
        );
    }

    #[test]
    fn huge_range_starts_at_earliest_date() {
        let last = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        assert_eq!(range_start(last, u32::MAX), NaiveDate::MIN);
        assert_eq!(range_start(last, 4_000_000_000), NaiveDate::MIN);
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_seconds(0), "0m");
        assert_eq!(format_seconds(59), "0m");
        assert_eq!(format_seconds(42 * 60), "42m");
        assert_eq!(format_seconds(3 * 3600 + 42 * 60 + 5), "3h 42m");
    }
}
