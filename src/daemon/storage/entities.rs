use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::time::format_seconds;

pub const HOURS_IN_DAY: usize = 24;

/// One day worth of tracked time. This is both the in-memory accumulator of the scheduler and the
/// record persisted for that day.
///
/// `app_breakdown` isn't a partition of `total_seconds`: when several tracked apps run during the
/// same tick every one of them receives the tick, while the total receives it once.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct DailyAggregate {
    pub id: Uuid,
    /// Calendar day in the local timezone.
    pub day: NaiveDate,
    pub total_seconds: u64,
    pub app_breakdown: HashMap<String, u64>,
    /// Minutes of activity per hour of the day.
    #[serde(deserialize_with = "hourly_ser::deserialize")]
    pub hourly_activity: [u64; HOURS_IN_DAY],
}

impl DailyAggregate {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            day,
            total_seconds: 0,
            app_breakdown: HashMap::new(),
            hourly_activity: [0; HOURS_IN_DAY],
        }
    }

    /// Counts one tick towards the day. Hourly buckets only receive whole minutes.
    pub fn add_total_time(&mut self, seconds: u64, hour: u32) {
        self.total_seconds += seconds;
        if let Some(bucket) = self.hourly_activity.get_mut(hour as usize) {
            *bucket += seconds / 60;
        }
    }

    pub fn add_app_time(&mut self, app_name: &str, seconds: u64) {
        *self.app_breakdown.entry(app_name.to_string()).or_default() += seconds;
    }

    pub fn app_seconds(&self, app_name: &str) -> u64 {
        self.app_breakdown.get(app_name).copied().unwrap_or(0)
    }

    pub fn formatted_total(&self) -> String {
        format_seconds(self.total_seconds)
    }

    /// Apps ordered by attributed time, longest first.
    pub fn apps_by_time(&self) -> Vec<(&str, u64)> {
        let mut apps = self
            .app_breakdown
            .iter()
            .map(|(name, seconds)| (name.as_str(), *seconds))
            .collect::<Vec<_>>();
        apps.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        apps
    }
}

mod hourly_ser {
    use serde::{Deserialize, Deserializer};

    use super::HOURS_IN_DAY;

    /// Records written by older or foreign tools may carry a different amount of buckets. They
    /// are cut or padded so that there are always exactly 24.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u64; HOURS_IN_DAY], D::Error>
    where
        D: Deserializer<'de>,
    {
        let values = Vec::<u64>::deserialize(deserializer)?;
        let mut hours = [0; HOURS_IN_DAY];
        for (bucket, value) in hours.iter_mut().zip(values) {
            *bucket = value;
        }
        Ok(hours)
    }
}
