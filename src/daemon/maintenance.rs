use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use tokio::{
    sync::watch,
    time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::{
    settings::{Settings, SettingsStorage},
    tracking::handle::TrackerHandle,
};

pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

/// Wall time running ahead of monotonic time by more than this means the machine was suspended.
const WAKE_TOLERANCE: chrono::Duration = chrono::Duration::seconds(60);

/// Periodic chores of the daemon that don't belong in the tick: noticing a new day while nothing
/// ticks, noticing the machine came back from a suspend, and picking up settings edited by the
/// cli.
pub struct MaintenanceModule {
    tracker: TrackerHandle,
    settings_storage: SettingsStorage,
    settings: watch::Sender<Settings>,
    clock: Box<dyn Clock>,
    period: Duration,
    shutdown: CancellationToken,
    last_pass: (DateTime<Local>, Instant),
}

impl MaintenanceModule {
    pub fn new(
        tracker: TrackerHandle,
        settings_storage: SettingsStorage,
        settings: watch::Sender<Settings>,
        clock: Box<dyn Clock>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let last_pass = (clock.time(), clock.instant());
        Self {
            tracker,
            settings_storage,
            settings,
            clock,
            period,
            shutdown,
            last_pass,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut interval = interval_at(self.clock.instant() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!("Maintenance pass failed {e:?}");
                    }
                }
            }
        }
    }

    async fn run_once(&mut self) -> Result<()> {
        let now = (self.clock.time(), self.clock.instant());
        let (previous_time, previous_instant) = std::mem::replace(&mut self.last_pass, now);

        if woke_up(previous_time, previous_instant, now.0, now.1) {
            info!("Detected a suspend since {previous_time}");
            self.tracker.notify_wake().await?;
        } else {
            self.tracker.check_rollover().await?;
        }

        self.reload_settings().await
    }

    async fn reload_settings(&mut self) -> Result<()> {
        let settings = self.settings_storage.load().await;
        if *self.settings.borrow() == settings {
            return Ok(());
        }
        debug!("Settings changed {settings:?}");
        self.tracker.update_settings(settings.tracking()).await?;
        self.settings.send_replace(settings);
        Ok(())
    }
}

/// Monotonic time stops while the machine sleeps, wall time doesn't.
fn woke_up(
    previous_time: DateTime<Local>,
    previous_instant: Instant,
    now_time: DateTime<Local>,
    now_instant: Instant,
) -> bool {
    let Ok(monotonic) = chrono::Duration::from_std(now_instant - previous_instant) else {
        return false;
    };
    (now_time - previous_time) - monotonic > WAKE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use chrono::{Local, TimeZone};
    use tempfile::tempdir;
    use tokio::{
        sync::{mpsc, watch},
        time::Instant,
    };
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            settings::{Settings, SettingsStorage},
            storage::{
                aggregate_storage::testing::MemoryAggregateStore, entities::DailyAggregate,
            },
            tracking::handle::{TrackerCommand, TrackerHandle},
        },
        utils::clock::test_clocks::ManualClock,
    };

    use super::{woke_up, MaintenanceModule};

    /// Answers tracker commands and remembers what was asked.
    fn recording_tracker() -> (TrackerHandle, Arc<Mutex<Vec<&'static str>>>) {
        let (sender, mut receiver) = mpsc::channel(4);
        let (_, snapshot) = watch::channel(DailyAggregate::new(Local::now().date_naive()));
        let handle = TrackerHandle::new(sender, snapshot, Arc::new(MemoryAggregateStore::default()));
        let log = Arc::new(Mutex::new(vec![]));
        let shared = log.clone();
        tokio::spawn(async move {
            while let Some(command) = receiver.recv().await {
                let mut log = shared.lock().unwrap();
                match command {
                    TrackerCommand::Wake(reply) => {
                        log.push("wake");
                        let _ = reply.send(());
                    }
                    TrackerCommand::CheckRollover(reply) => {
                        log.push("rollover");
                        let _ = reply.send(());
                    }
                    TrackerCommand::UpdateSettings(_, reply) => {
                        log.push("settings");
                        let _ = reply.send(());
                    }
                    _ => log.push("other"),
                }
            }
        });
        (handle, log)
    }

    #[test]
    fn wall_jump_is_a_wake() {
        let time = Local.with_ymd_and_hms(2026, 1, 3, 23, 0, 0).unwrap();
        let instant = Instant::now();
        let later = instant + Duration::from_secs(30);

        assert!(!woke_up(time, instant, time + chrono::Duration::seconds(30), later));
        assert!(woke_up(time, instant, time + chrono::Duration::hours(8), later));
    }

    #[tokio::test]
    async fn pass_checks_rollover_and_picks_up_settings() -> Result<()> {
        let dir = tempdir()?;
        let storage = SettingsStorage::new(dir.path().join("settings.json"));
        let (tracker, log) = recording_tracker();
        let (settings, mut settings_updates) = watch::channel(Settings::default());
        let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap());
        let mut module = MaintenanceModule::new(
            tracker,
            storage.clone(),
            settings,
            Box::new(clock.clone()),
            Duration::from_secs(30),
            CancellationToken::new(),
        );

        module.run_once().await?;
        assert_eq!(*log.lock().unwrap(), vec!["rollover"]);
        assert!(!settings_updates.has_changed()?);

        let mut edited = Settings::default();
        edited.idle_threshold_seconds = 600;
        storage.save(&edited).await?;
        module.run_once().await?;

        assert_eq!(*log.lock().unwrap(), vec!["rollover", "rollover", "settings"]);
        assert_eq!(*settings_updates.borrow_and_update(), edited);
        Ok(())
    }

    #[tokio::test]
    async fn suspend_is_reported_as_wake() -> Result<()> {
        let dir = tempdir()?;
        let (tracker, log) = recording_tracker();
        let (settings, _) = watch::channel(Settings::default());
        let clock = ManualClock::new(Local.with_ymd_and_hms(2026, 1, 3, 23, 0, 0).unwrap());
        let mut module = MaintenanceModule::new(
            tracker,
            SettingsStorage::new(dir.path().join("settings.json")),
            settings,
            Box::new(clock.clone()),
            Duration::from_secs(30),
            CancellationToken::new(),
        );

        clock.advance(chrono::Duration::hours(9));
        module.run_once().await?;

        assert_eq!(*log.lock().unwrap(), vec!["wake"]);
        Ok(())
    }
}
