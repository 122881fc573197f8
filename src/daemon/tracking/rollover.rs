use chrono::{DateTime, Local, NaiveDate};

/// Whether a new local calendar day started since `previous`. The first observation never counts
/// as a new day. Gaps spanning several midnights are still a single change of day.
pub fn day_changed(previous: Option<DateTime<Local>>, now: DateTime<Local>) -> bool {
    previous.is_some_and(|previous| previous.date_naive() != now.date_naive())
}

/// Whether an aggregate collected for `day` no longer belongs to `now`.
pub fn is_stale(day: NaiveDate, now: DateTime<Local>) -> bool {
    day != now.date_naive()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Local, TimeZone};

    use super::{day_changed, is_stale};

    #[test]
    fn first_tick_never_rolls_over() {
        let now = Local.with_ymd_and_hms(2026, 1, 3, 0, 0, 5).unwrap();
        assert!(!day_changed(None, now));
    }

    #[test]
    fn same_day_does_not_roll_over() {
        let previous = Local.with_ymd_and_hms(2026, 1, 3, 0, 0, 1).unwrap();
        let now = Local.with_ymd_and_hms(2026, 1, 3, 23, 59, 59).unwrap();
        assert!(!day_changed(Some(previous), now));
    }

    #[test]
    fn midnight_rolls_over() {
        let previous = Local.with_ymd_and_hms(2026, 1, 3, 23, 59, 50).unwrap();
        let now = previous + Duration::seconds(15);
        assert!(day_changed(Some(previous), now));
    }

    #[test]
    fn long_sleep_rolls_over() {
        let previous = Local.with_ymd_and_hms(2026, 1, 3, 22, 0, 0).unwrap();
        let now = previous + Duration::hours(50);
        assert!(day_changed(Some(previous), now));
    }

    #[test]
    fn stale_day() {
        let now = Local.with_ymd_and_hms(2026, 1, 4, 8, 0, 0).unwrap();
        assert!(is_stale(now.date_naive() - Duration::days(1), now));
        assert!(!is_stale(now.date_naive(), now));
    }
}
