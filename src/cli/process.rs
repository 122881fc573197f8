use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Pid, Process, Signal, System};
use tracing::{debug, info};

use super::daemon_path::to_daemon_path;

pub fn daemon_executable() -> Result<PathBuf> {
    Ok(to_daemon_path(env::current_exe()?))
}

/// Processes started from `executable`, except this one and its children.
fn find_daemons<'a>(
    system: &'a System,
    executable: &Path,
) -> Result<Vec<(&'a Pid, &'a Process)>> {
    let current_id = get_current_pid().map_err(|e| anyhow!("Failed to get current pid {e}"))?;
    Ok(system
        .processes()
        .iter()
        .filter(|(pid, _)| **pid != current_id)
        .filter(|(_, process)| !matches!(process.parent(), Some(p) if p == current_id))
        .filter(|(_, process)| {
            process
                .exe()
                .filter(|v| v.exists())
                .is_some_and(|v| v == executable)
        })
        .collect())
}

pub fn is_daemon_running(executable: &Path) -> Result<bool> {
    let system = System::new_all();
    Ok(!find_daemons(&system, executable)?.is_empty())
}

/// Terminates every daemon and waits for them to exit. Returns how many were running.
pub fn kill_daemons(executable: &Path) -> Result<usize> {
    let system = System::new_all();
    let daemons = find_daemons(&system, executable)?;
    for (pid, process) in &daemons {
        debug!("Stopping daemon {pid}");
        // SIGTERM lets the daemon save what it has. On Windows this forcefully terminates the
        // process.
        if process.kill_with(Signal::Term).is_none() {
            process.kill();
        }
        process.wait();
    }
    Ok(daemons.len())
}

/// Shuts down the running daemon, if any, and starts a new detached one.
pub fn restart_daemon(dir: Option<&Path>) -> Result<()> {
    let executable = daemon_executable()?;
    let stopped = kill_daemons(&executable)?;
    if stopped > 0 {
        info!("Stopped {stopped} running daemons");
    }

    let mut command = std::process::Command::new(&executable);
    command.arg("--force");
    if let Some(dir) = dir {
        command.arg("--dir").arg(dir);
    }

    #[cfg(feature = "win")]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::DETACHED_PROCESS;
        command.creation_flags(DETACHED_PROCESS.0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    info!("Spawning {executable:?}");
    #[allow(clippy::zombie_processes)]
    let _ = command.spawn()?;
    Ok(())
}
