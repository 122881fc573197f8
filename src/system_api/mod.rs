//! Contains the collaborators that talk to the operating system.
//! [GenericIdleProbe] picks the idle time source for the current build, [processes::SystemRunningApps]
//! inspects the process list.

pub mod processes;
#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use std::{collections::HashSet, time::Duration};

use anyhow::{anyhow, Result};
#[cfg(test)]
use mockall::automock;

/// Measures how long the user hasn't touched any input device.
#[cfg_attr(test, automock)]
pub trait IdleProbe: Send {
    fn idle_time(&mut self) -> Result<Duration>;
}

/// Answers which of the tracked applications are currently running. Implementations are only ever
/// called from the foreground context that owns them.
#[cfg_attr(test, automock)]
pub trait RunningApps: Send {
    fn running_tracked_apps(&mut self, tracked: &HashSet<String>) -> HashSet<String>;
}

/// Serves as a cross-compatible [IdleProbe] implementation. When no platform probe is compiled in,
/// or it can't be reached, every query fails and callers treat the user as active.
pub struct GenericIdleProbe {
    inner: Option<Box<dyn IdleProbe>>,
}

impl GenericIdleProbe {
    pub fn new() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Self {
                    inner: Some(Box::new(win::WindowsIdleProbe::new())),
                }
            }
            else if #[cfg(feature = "x11")] {
                match x11::X11IdleProbe::new() {
                    Ok(v) => Self { inner: Some(Box::new(v)) },
                    Err(e) => {
                        tracing::warn!("X11 idle probe is unavailable {e:?}");
                        Self { inner: None }
                    }
                }
            }
            else {
                tracing::warn!("No idle probe was compiled in, user is always considered active");
                Self { inner: None }
            }
        }
    }
}

impl Default for GenericIdleProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleProbe for GenericIdleProbe {
    fn idle_time(&mut self) -> Result<Duration> {
        match self.inner.as_mut() {
            Some(inner) => inner.idle_time(),
            None => Err(anyhow!("Idle time is not available on this system")),
        }
    }
}
