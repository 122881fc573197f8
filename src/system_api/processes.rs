use std::{collections::HashSet, path::Path};

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::{instrument, trace};

use super::RunningApps;

/// Alternative process names for tracked apps whose executable isn't named like the app.
const PROCESS_ALIASES: &[(&str, &[&str])] = &[
    (
        "terminal",
        &[
            "gnome-terminal-server",
            "konsole",
            "xfce4-terminal",
            "alacritty",
            "kitty",
            "wezterm-gui",
            "windowsterminal",
        ],
    ),
    ("code", &["code-oss", "codium"]),
];

/// [RunningApps] backed by the process list of the machine.
pub struct SystemRunningApps {
    system: System,
}

impl SystemRunningApps {
    pub fn new() -> Self {
        Self {
            system: System::new_with_specifics(
                RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing().with_exe(
                    sysinfo::UpdateKind::OnlyIfNotSet,
                )),
            ),
        }
    }
}

impl Default for SystemRunningApps {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningApps for SystemRunningApps {
    #[instrument(skip(self))]
    fn running_tracked_apps(&mut self, tracked: &HashSet<String>) -> HashSet<String> {
        if tracked.is_empty() {
            return HashSet::new();
        }
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_exe(sysinfo::UpdateKind::OnlyIfNotSet),
        );
        let names = self.system.processes().values().flat_map(|process| {
            let name = process.name().to_string_lossy().to_string();
            let stem = process.exe().and_then(executable_stem);
            std::iter::once(name).chain(stem)
        });
        let running = match_tracked_apps(tracked, names);
        trace!("Running tracked apps {running:?}");
        running
    }
}

fn executable_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|v| v.to_string_lossy().to_string())
}

/// Normalizes a process name for comparison: lower case, without a windows `.exe` suffix.
fn normalize_process_name(name: &str) -> String {
    let name = name.trim().to_lowercase();
    match name.strip_suffix(".exe") {
        Some(v) => v.to_string(),
        None => name,
    }
}

/// Returns the tracked names (as configured) that match at least one of the process names.
/// Matching is case-insensitive and exact, helper processes are never considered a running app.
pub fn match_tracked_apps(
    tracked: &HashSet<String>,
    process_names: impl IntoIterator<Item = String>,
) -> HashSet<String> {
    let running = process_names
        .into_iter()
        .map(|v| normalize_process_name(&v))
        .filter(|v| !v.is_empty() && !v.contains("helper"))
        .collect::<HashSet<_>>();

    tracked
        .iter()
        .filter(|app| {
            let target = app.trim().to_lowercase();
            if running.contains(&target) {
                return true;
            }
            PROCESS_ALIASES
                .iter()
                .filter(|(name, _)| *name == target)
                .flat_map(|(_, aliases)| aliases.iter())
                .any(|alias| running.contains(*alias))
        })
        .cloned()
        .collect()
}
