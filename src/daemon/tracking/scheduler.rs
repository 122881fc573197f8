use std::{mem, sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, Timelike};
use tokio::{
    sync::{mpsc, watch},
    time::{interval_at, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::{
    daemon::{
        settings::TrackingSettings,
        storage::{aggregate_storage::AggregateStore, entities::DailyAggregate, error::StoreResult},
    },
    utils::clock::Clock,
};

use super::{
    handle::{TrackerCommand, TrackerHandle, TrackerStatus},
    idle::IdleGate,
    persistence::{PersistenceGate, DEFAULT_FLUSH_THRESHOLD},
    rollover,
    running::RunningSetProbe,
};

pub const DEFAULT_TICK: Duration = Duration::from_secs(15);
const FIRST_TICK_DELAY: Duration = Duration::from_secs(1);
const COMMAND_BUFFER: usize = 16;
const MIN_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cadence of ticks, every active tick counts this many seconds. Cut to whole seconds and
    /// raised to at least one second when the scheduler is created.
    pub tick: Duration,
    pub first_tick_delay: Duration,
    pub flush_threshold: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            first_tick_delay: FIRST_TICK_DELAY,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
        }
    }
}

impl SchedulerConfig {
    fn tick_seconds(&self) -> u64 {
        self.tick.as_secs()
    }

    fn normalized(mut self) -> Self {
        let tick = Duration::from_secs(self.tick.as_secs()).max(MIN_TICK);
        if tick != self.tick {
            warn!("Tick of {:?} doesn't count whole seconds, using {tick:?}", self.tick);
            self.tick = tick;
        }
        self
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    is_tracking: bool,
    last_tick: Option<DateTime<Local>>,
    /// Tracking was running when the system went to sleep.
    resume_on_wake: bool,
}

/// Owns today's aggregate and every piece of mutable tracking state. Runs as a single task, so
/// ticks and commands never interleave and the aggregate needs no locking. The outside world
/// talks to it through [TrackerHandle] and reads published snapshots of the aggregate.
pub struct AccountingScheduler {
    commands: mpsc::Receiver<TrackerCommand>,
    snapshot: watch::Sender<DailyAggregate>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
    config: SchedulerConfig,
    store: Arc<dyn AggregateStore>,
    idle_gate: IdleGate,
    running_probe: RunningSetProbe,
    persistence: PersistenceGate,
    aggregate: DailyAggregate,
    state: TrackerState,
    ticker: Option<Interval>,
}

impl AccountingScheduler {
    pub fn new(
        store: Arc<dyn AggregateStore>,
        idle_gate: IdleGate,
        running_probe: RunningSetProbe,
        clock: Box<dyn Clock>,
        config: SchedulerConfig,
        shutdown: CancellationToken,
    ) -> (Self, TrackerHandle) {
        let config = config.normalized();
        let aggregate = DailyAggregate::new(clock.time().date_naive());
        let (command_sender, commands) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot, snapshot_receiver) = watch::channel(aggregate.clone());
        let handle = TrackerHandle::new(command_sender, snapshot_receiver, store.clone());
        let persistence = PersistenceGate::new(store.clone(), config.flush_threshold);

        let scheduler = Self {
            commands,
            snapshot,
            shutdown,
            clock,
            config,
            store,
            idle_gate,
            running_probe,
            persistence,
            aggregate,
            state: TrackerState::default(),
            ticker: None,
        };
        (scheduler, handle)
    }

    /// Executes the scheduler event loop until shutdown or until every handle is gone. Pending
    /// time is flushed on the way out.
    pub async fn run(mut self) -> Result<()> {
        let today = self.aggregate.day;
        self.load_day(today).await;
        self.publish();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    break
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!("Every tracker handle is gone");
                        break
                    }
                },
                _ = next_tick(&mut self.ticker) => self.tick().await,
            }
        }

        self.stop().await;
        info!("Scheduler finished");
        Ok(())
    }

    async fn handle_command(&mut self, command: TrackerCommand) {
        // Replies are ignored, the requester may have stopped waiting.
        match command {
            TrackerCommand::Start(reply) => {
                self.start().await;
                let _ = reply.send(());
            }
            TrackerCommand::Stop(reply) => {
                self.stop().await;
                let _ = reply.send(());
            }
            TrackerCommand::Sleep(reply) => {
                self.sleep().await;
                let _ = reply.send(());
            }
            TrackerCommand::Wake(reply) => {
                self.wake().await;
                let _ = reply.send(());
            }
            TrackerCommand::CheckRollover(reply) => {
                self.check_rollover().await;
                let _ = reply.send(());
            }
            TrackerCommand::UpdateSettings(settings, reply) => {
                self.update_settings(settings);
                let _ = reply.send(());
            }
            TrackerCommand::ClearAll(reply) => {
                let _ = reply.send(self.clear_all().await);
            }
            TrackerCommand::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    async fn start(&mut self) {
        if self.state.is_tracking {
            return;
        }
        self.check_rollover().await;

        self.state.is_tracking = true;
        self.state.last_tick = Some(self.clock.time());
        let mut ticker = interval_at(
            self.clock.instant() + self.config.first_tick_delay,
            self.config.tick,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);
        info!("Tracking started with {:?} ticks", self.config.tick);
    }

    /// Stopping flushes whatever is pending regardless of the threshold.
    async fn stop(&mut self) {
        self.ticker = None;
        if mem::take(&mut self.state.is_tracking) {
            info!("Tracking stopped");
        }
        self.persistence.flush(&self.aggregate).await;
    }

    async fn sleep(&mut self) {
        self.state.resume_on_wake = self.state.is_tracking;
        info!("System is going to sleep");
        self.stop().await;
    }

    async fn wake(&mut self) {
        info!("System woke up");
        self.check_rollover().await;
        if mem::take(&mut self.state.resume_on_wake) && !self.state.is_tracking {
            self.start().await;
        }
    }

    /// Starts a new day when the current aggregate belongs to a past one.
    async fn check_rollover(&mut self) {
        let now = self.clock.time();
        if rollover::is_stale(self.aggregate.day, now) {
            self.roll_over(now.date_naive()).await;
        }
    }

    fn update_settings(&mut self, settings: TrackingSettings) {
        info!(
            "Tracking {:?} with idle threshold {:?}",
            settings.tracked_apps, settings.idle_threshold
        );
        self.idle_gate.set_threshold(settings.idle_threshold);
        self.running_probe.set_tracked_apps(settings.tracked_apps);
    }

    async fn clear_all(&mut self) -> StoreResult<()> {
        self.store.delete_all().await?;
        self.persistence.discard();
        self.aggregate = DailyAggregate::new(self.clock.time().date_naive());
        self.publish();
        info!("Cleared all tracked data");
        Ok(())
    }

    fn status(&self) -> TrackerStatus {
        TrackerStatus {
            is_tracking: self.state.is_tracking,
            last_tick: self.state.last_tick,
            pending_seconds: self.persistence.pending_seconds(),
        }
    }

    /// Accounts one cadence period. Time counts only when at least one tracked app runs and the
    /// user isn't idle, and then it counts once towards the total and once towards every running
    /// app.
    #[instrument(level = "trace", skip(self))]
    async fn tick(&mut self) {
        let now = self.clock.time();
        if rollover::day_changed(self.state.last_tick, now)
            && rollover::is_stale(self.aggregate.day, now)
        {
            self.roll_over(now.date_naive()).await;
        }
        self.state.last_tick = Some(now);

        let running = self.running_probe.running_tracked_apps().await;
        if running.is_empty() {
            trace!("No tracked apps are running");
            return;
        }
        if !self.idle_gate.is_user_active() {
            debug!("User is idle, skipping tick");
            return;
        }

        let seconds = self.config.tick_seconds();
        self.aggregate.add_total_time(seconds, now.hour());
        for app in &running {
            self.aggregate.add_app_time(app, seconds);
            self.persistence.record(app, seconds);
        }
        trace!("Counted {seconds}s for {running:?}");

        self.persistence.flush_if_needed(&self.aggregate).await;
        self.publish();
    }

    /// Settles the current day and continues with `day`.
    async fn roll_over(&mut self, day: NaiveDate) {
        info!("Day changed from {} to {day}", self.aggregate.day);
        let previous = mem::replace(&mut self.aggregate, DailyAggregate::new(day));
        self.persistence.retire(previous).await;
        self.load_day(day).await;
        self.publish();
    }

    /// Continues from the stored record of `day` if there is one.
    async fn load_day(&mut self, day: NaiveDate) {
        match self.store.fetch_by_day(day).await {
            Ok(Some(stored)) => {
                debug!("Continuing {day} from {}s", stored.total_seconds);
                self.aggregate = stored;
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to load {day}, starting it empty {e}"),
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.aggregate.clone());
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
