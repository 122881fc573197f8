//! User configuration. The daemon reads it from `settings.json` in the application directory and
//! the cli edits the same file.

use std::{
    collections::{BTreeMap, HashSet},
    io::ErrorKind,
    path::PathBuf,
    time::Duration,
};

use anyhow::{bail, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fs::operations::replace_file_atomically;

const HOUR: u64 = 3600;

/// Limit used for days without a configured one.
pub const DEFAULT_DAILY_LIMIT: u64 = 4 * HOUR;
pub const DEFAULT_IDLE_THRESHOLD_SECONDS: u64 = 180;
pub const DEFAULT_TRACKED_APPS: [&str; 3] = ["Cursor", "Antigravity", "Terminal"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds allowed per weekday. Weekdays are numbered from 1 (Sunday) to 7 (Saturday).
    pub daily_limits: BTreeMap<u32, u64>,
    pub idle_threshold_seconds: u64,
    pub tracked_apps: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let daily_limits = (1..=7)
            .map(|weekday| {
                let weekend = weekday == 1 || weekday == 7;
                (weekday, if weekend { 2 * HOUR } else { 4 * HOUR })
            })
            .collect();
        Self {
            daily_limits,
            idle_threshold_seconds: DEFAULT_IDLE_THRESHOLD_SECONDS,
            tracked_apps: DEFAULT_TRACKED_APPS.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// The part of [Settings] the accounting engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSettings {
    pub idle_threshold: Duration,
    pub tracked_apps: HashSet<String>,
}

impl Settings {
    pub fn limit_for_weekday(&self, weekday: Weekday) -> u64 {
        self.daily_limits
            .get(&weekday.number_from_sunday())
            .copied()
            .unwrap_or(DEFAULT_DAILY_LIMIT)
    }

    pub fn limit_for(&self, day: NaiveDate) -> u64 {
        self.limit_for_weekday(day.weekday())
    }

    pub fn set_limit(&mut self, weekday: u32, seconds: u64) -> Result<()> {
        if !(1..=7).contains(&weekday) {
            bail!("Weekday should be between 1 (Sunday) and 7 (Saturday), got {weekday}");
        }
        self.daily_limits.insert(weekday, seconds);
        Ok(())
    }

    /// Adds an app, ignoring case duplicates. Returns whether anything changed.
    pub fn add_tracked_app(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty()
            || self
                .tracked_apps
                .iter()
                .any(|v| v.eq_ignore_ascii_case(name))
        {
            return false;
        }
        self.tracked_apps.push(name.to_string());
        true
    }

    /// Removes an app regardless of case. Returns whether anything changed.
    pub fn remove_tracked_app(&mut self, name: &str) -> bool {
        let before = self.tracked_apps.len();
        self.tracked_apps
            .retain(|v| !v.eq_ignore_ascii_case(name.trim()));
        before != self.tracked_apps.len()
    }

    pub fn tracking(&self) -> TrackingSettings {
        TrackingSettings {
            idle_threshold: Duration::from_secs(self.idle_threshold_seconds),
            tracked_apps: self.tracked_apps.iter().cloned().collect(),
        }
    }

    /// Replaces values that can't be used with defaults.
    fn normalized(mut self) -> Self {
        if self.idle_threshold_seconds == 0 {
            self.idle_threshold_seconds = DEFAULT_IDLE_THRESHOLD_SECONDS;
        }
        self.daily_limits.retain(|weekday, _| (1..=7).contains(weekday));
        self
    }
}

/// Reads and writes [Settings] as json.
#[derive(Debug, Clone)]
pub struct SettingsStorage {
    path: PathBuf,
}

impl SettingsStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Missing or unreadable settings fall back to defaults, tracking should never stop because of
    /// a bad configuration file.
    pub async fn load(&self) -> Settings {
        let content = match tokio::fs::read(&self.path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No settings at {:?}, using defaults", self.path);
                return Settings::default();
            }
            Err(e) => {
                warn!("Failed to read settings {:?}, using defaults {e}", self.path);
                return Settings::default();
            }
        };
        match serde_json::from_slice::<Settings>(&content) {
            Ok(v) => v.normalized(),
            Err(e) => {
                warn!("Settings {:?} are corrupted, using defaults {e}", self.path);
                Settings::default()
            }
        }
    }

    pub async fn save(&self, settings: &Settings) -> Result<()> {
        let content = serde_json::to_vec_pretty(settings)?;
        replace_file_atomically(&self.path, &content).await?;
        Ok(())
    }
}
