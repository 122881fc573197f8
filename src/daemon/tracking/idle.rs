use std::time::Duration;

use tracing::debug;

use crate::system_api::IdleProbe;

/// Decides whether the user is at the computer.
pub struct IdleGate {
    probe: Box<dyn IdleProbe>,
    threshold: Duration,
}

impl IdleGate {
    pub fn new(probe: Box<dyn IdleProbe>, threshold: Duration) -> Self {
        Self { probe, threshold }
    }

    pub fn set_threshold(&mut self, threshold: Duration) {
        self.threshold = threshold;
    }

    /// Returns false only when the probe reports an idle time at or above the threshold. When idle
    /// time can't be measured the user counts as active, losing tracked time is worse than
    /// counting a few idle minutes.
    pub fn is_user_active(&mut self) -> bool {
        match self.probe.idle_time() {
            Ok(idle) => idle < self.threshold,
            Err(e) => {
                debug!("Idle time is unavailable, assuming user is active {e:?}");
                true
            }
        }
    }
}
