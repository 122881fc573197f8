use tokio::sync::watch;
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{
    limits::{evaluate_limit, LimitState, LimitStatus},
    settings::Settings,
    storage::entities::DailyAggregate,
};

/// Watches published aggregates and reports whenever today's limit state changes.
pub struct LimitObserver {
    snapshots: watch::Receiver<DailyAggregate>,
    settings: watch::Receiver<Settings>,
    shutdown: CancellationToken,
    last_state: Option<LimitState>,
}

impl LimitObserver {
    pub fn new(
        snapshots: watch::Receiver<DailyAggregate>,
        settings: watch::Receiver<Settings>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            snapshots,
            settings,
            shutdown,
            last_state: None,
        }
    }

    pub async fn run(mut self) {
        let mut snapshots = WatchStream::new(self.snapshots.clone());
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                snapshot = snapshots.next() => match snapshot {
                    Some(snapshot) => {
                        let limit = self.settings.borrow().limit_for(snapshot.day);
                        self.observe(&snapshot, limit);
                    }
                    None => return,
                },
            }
        }
    }

    /// Returns the new status when the state differs from the last observed one.
    fn observe(&mut self, snapshot: &DailyAggregate, limit: u64) -> Option<LimitStatus> {
        let status = evaluate_limit(snapshot.total_seconds, limit);
        if self.last_state.replace(status.state) == Some(status.state) {
            return None;
        }
        match status.state {
            LimitState::Alert => info!(
                "{} used on {}, {}s left",
                snapshot.formatted_total(),
                snapshot.day,
                status.remaining_seconds
            ),
            LimitState::Concerned => warn!(
                "Less than an hour left on {}, {}s remaining",
                snapshot.day, status.remaining_seconds
            ),
            LimitState::Exhausted => warn!(
                "Daily limit reached on {}, {}s over",
                snapshot.day, status.over_limit_seconds
            ),
        }
        Some(status)
    }
}
