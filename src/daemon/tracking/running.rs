use std::collections::HashSet;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::system_api::RunningApps;

struct SnapshotRequest {
    tracked: HashSet<String>,
    reply: oneshot::Sender<HashSet<String>>,
}

/// The only place where the running apps collaborator lives. Anything that wants a snapshot of the
/// running apps sends a request and waits for the answer, so the collaborator is never touched
/// from two places at once.
pub struct ForegroundContext {
    receiver: mpsc::Receiver<SnapshotRequest>,
    apps: Box<dyn RunningApps>,
}

/// Cheap to clone sender side of [ForegroundContext].
#[derive(Clone)]
pub struct ForegroundHandle {
    sender: mpsc::Sender<SnapshotRequest>,
}

impl ForegroundContext {
    pub fn new(apps: Box<dyn RunningApps>) -> (Self, ForegroundHandle) {
        let (sender, receiver) = mpsc::channel(1);
        (Self { receiver, apps }, ForegroundHandle { sender })
    }

    /// Answers requests until every [ForegroundHandle] is dropped.
    pub async fn run(mut self) {
        while let Some(request) = self.receiver.recv().await {
            let running = self.apps.running_tracked_apps(&request.tracked);
            // The requester may have given up, nothing to do then.
            let _ = request.reply.send(running);
        }
        debug!("Foreground context finished");
    }
}

impl ForegroundHandle {
    pub async fn snapshot(&self, tracked: HashSet<String>) -> Result<HashSet<String>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SnapshotRequest { tracked, reply })
            .await
            .map_err(|_| anyhow!("Foreground context is gone"))?;
        response
            .await
            .map_err(|_| anyhow!("Foreground context dropped the request"))
    }
}

/// Answers which of the tracked apps are running right now.
pub struct RunningSetProbe {
    foreground: ForegroundHandle,
    tracked: HashSet<String>,
}

impl RunningSetProbe {
    pub fn new(foreground: ForegroundHandle, tracked: HashSet<String>) -> Self {
        Self {
            foreground,
            tracked,
        }
    }

    pub fn set_tracked_apps(&mut self, tracked: HashSet<String>) {
        self.tracked = tracked;
    }

    /// Hops into the foreground context for a snapshot. Never fails, an unreachable context
    /// means nothing is counted.
    pub async fn running_tracked_apps(&self) -> HashSet<String> {
        if self.tracked.is_empty() {
            return HashSet::new();
        }
        match self.foreground.snapshot(self.tracked.clone()).await {
            Ok(running) => running
                .into_iter()
                .filter(|app| self.tracked.contains(app))
                .collect(),
            Err(e) => {
                warn!("Running apps are unavailable {e:?}");
                HashSet::new()
            }
        }
    }
}
