use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    daemon::{
        limits::{evaluate_limit, LimitStatus},
        settings::{Settings, TrackingSettings},
        storage::{aggregate_storage::AggregateStore, entities::DailyAggregate, error::StoreResult},
    },
    utils::time::range_start,
};

/// Messages understood by [super::scheduler::AccountingScheduler]. Every command carries a reply
/// channel that is answered once the command is fully applied.
pub(crate) enum TrackerCommand {
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Sleep(oneshot::Sender<()>),
    Wake(oneshot::Sender<()>),
    CheckRollover(oneshot::Sender<()>),
    UpdateSettings(TrackingSettings, oneshot::Sender<()>),
    ClearAll(oneshot::Sender<StoreResult<()>>),
    Status(oneshot::Sender<TrackerStatus>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerStatus {
    pub is_tracking: bool,
    pub last_tick: Option<DateTime<Local>>,
    pub pending_seconds: u64,
}

/// Front door of a running scheduler. Commands are executed by the scheduler in between ticks,
/// reads of today's aggregate come from the last published snapshot and never wait for it.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<TrackerCommand>,
    snapshot: watch::Receiver<DailyAggregate>,
    store: Arc<dyn AggregateStore>,
}

impl TrackerHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<TrackerCommand>,
        snapshot: watch::Receiver<DailyAggregate>,
        store: Arc<dyn AggregateStore>,
    ) -> Self {
        Self {
            commands,
            snapshot,
            store,
        }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> TrackerCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| anyhow!("Tracker is not running"))?;
        response
            .await
            .map_err(|_| anyhow!("Tracker dropped the request"))
    }

    pub async fn start(&self) -> Result<()> {
        self.request(TrackerCommand::Start).await
    }

    /// Returns after the final flush. No tick happens after this returns.
    pub async fn stop(&self) -> Result<()> {
        self.request(TrackerCommand::Stop).await
    }

    /// The system is about to suspend. Tracking stops and resumes on [Self::notify_wake].
    pub async fn notify_sleep(&self) -> Result<()> {
        self.request(TrackerCommand::Sleep).await
    }

    /// The system came back. Starts a new day if midnight passed meanwhile.
    pub async fn notify_wake(&self) -> Result<()> {
        self.request(TrackerCommand::Wake).await
    }

    pub async fn check_rollover(&self) -> Result<()> {
        self.request(TrackerCommand::CheckRollover).await
    }

    pub async fn update_settings(&self, settings: TrackingSettings) -> Result<()> {
        self.request(|reply| TrackerCommand::UpdateSettings(settings, reply))
            .await
    }

    /// Deletes every stored day and resets today to nothing.
    pub async fn clear_all(&self) -> Result<()> {
        self.request(TrackerCommand::ClearAll).await??;
        Ok(())
    }

    pub async fn status(&self) -> Result<TrackerStatus> {
        self.request(TrackerCommand::Status).await
    }

    /// Copy of the aggregate as of the last published change.
    pub fn today(&self) -> DailyAggregate {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DailyAggregate> {
        self.snapshot.clone()
    }

    pub fn limit_status(&self, settings: &Settings) -> LimitStatus {
        let today = self.today();
        evaluate_limit(today.total_seconds, settings.limit_for(today.day))
    }

    /// Aggregates of the last `days` days including today, newest first. Today comes from memory,
    /// so it includes time that isn't saved yet.
    pub async fn recent(&self, days: u32) -> Result<Vec<DailyAggregate>> {
        if days == 0 {
            return Ok(vec![]);
        }
        let today = self.today();
        let stored = self
            .store
            .fetch_range(range_start(today.day, days), today.day)
            .await?;
        Ok(with_live_day(stored, today))
    }

    /// Every known aggregate, newest first.
    pub async fn export_all(&self) -> Result<Vec<DailyAggregate>> {
        let today = self.today();
        let stored = self.store.fetch_range(NaiveDate::MIN, today.day).await?;
        Ok(with_live_day(stored, today))
    }
}

/// Replaces the stored version of the live day with the live one.
fn with_live_day(stored: Vec<DailyAggregate>, live: DailyAggregate) -> Vec<DailyAggregate> {
    let mut aggregates = stored
        .into_iter()
        .filter(|v| v.day != live.day)
        .collect::<Vec<_>>();
    aggregates.push(live);
    aggregates.sort_by(|a, b| b.day.cmp(&a.day));
    aggregates
}
