use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use maintenance::{MaintenanceModule, DEFAULT_MAINTENANCE_INTERVAL};
use observer::LimitObserver;
use settings::SettingsStorage;
use storage::aggregate_storage::{AggregateStore, FileAggregateStore};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracking::{
    handle::TrackerHandle,
    idle::IdleGate,
    running::{ForegroundContext, RunningSetProbe},
    scheduler::{AccountingScheduler, SchedulerConfig},
};

use crate::{
    system_api::{processes::SystemRunningApps, GenericIdleProbe, IdleProbe, RunningApps},
    utils::{
        clock::{Clock, DefaultClock},
        dir::{records_dir, settings_path},
    },
};

pub mod args;
pub mod limits;
pub mod maintenance;
pub mod observer;
pub mod settings;
pub mod shutdown;
pub mod storage;
pub mod tracking;

/// Everything the daemon runs, wired together but not started yet.
struct DaemonModules {
    scheduler: AccountingScheduler,
    foreground: ForegroundContext,
    maintenance: MaintenanceModule,
    observer: LimitObserver,
    tracker: TrackerHandle,
    shutdown: CancellationToken,
}

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config: SchedulerConfig) -> Result<()> {
    std::env::set_current_dir("/")?;

    let store = Arc::new(FileAggregateStore::new(records_dir(&dir))?);
    let modules = create_modules(
        store,
        SettingsStorage::new(settings_path(&dir)),
        GenericIdleProbe::new(),
        SystemRunningApps::new(),
        DefaultClock,
        config,
        DEFAULT_MAINTENANCE_INTERVAL,
    )
    .await;

    let token = modules.shutdown.clone();
    run_modules(modules, shutdown::detect_shutdown(token)).await
}

async fn create_modules(
    store: Arc<dyn AggregateStore>,
    settings_storage: SettingsStorage,
    idle_probe: impl IdleProbe + 'static,
    running_apps: impl RunningApps + 'static,
    clock: impl Clock + Clone,
    config: SchedulerConfig,
    maintenance_interval: Duration,
) -> DaemonModules {
    let settings = settings_storage.load().await;
    let tracking = settings.tracking();
    let shutdown = CancellationToken::new();

    let (foreground, foreground_handle) = ForegroundContext::new(Box::new(running_apps));
    let (scheduler, tracker) = AccountingScheduler::new(
        store,
        IdleGate::new(Box::new(idle_probe), tracking.idle_threshold),
        RunningSetProbe::new(foreground_handle, tracking.tracked_apps),
        Box::new(clock.clone()),
        config,
        shutdown.clone(),
    );

    let (settings_sender, settings_receiver) = watch::channel(settings);
    let maintenance = MaintenanceModule::new(
        tracker.clone(),
        settings_storage,
        settings_sender,
        Box::new(clock),
        maintenance_interval,
        shutdown.clone(),
    );
    let observer = LimitObserver::new(tracker.subscribe(), settings_receiver, shutdown.clone());

    DaemonModules {
        scheduler,
        foreground,
        maintenance,
        observer,
        tracker,
        shutdown,
    }
}

/// Runs every module until `shutdown_signal` cancels them. The scheduler flushes before returning.
async fn run_modules(
    modules: DaemonModules,
    shutdown_signal: impl Future<Output = ()>,
) -> Result<()> {
    let DaemonModules {
        scheduler,
        foreground,
        maintenance,
        observer,
        tracker,
        shutdown: _,
    } = modules;

    let start_tracking = async {
        match tracker.start().await {
            Ok(()) => info!("Daemon is tracking"),
            Err(e) => error!("Failed to start tracking {e:?}"),
        }
    };

    let (_, _, scheduler_result, _, maintenance_result, _) = tokio::join!(
        shutdown_signal,
        start_tracking,
        scheduler.run(),
        foreground.run(),
        maintenance.run(),
        observer.run(),
    );

    if let Err(scheduler_result) = scheduler_result {
        error!("Scheduler got an error {:?}", scheduler_result);
    }

    if let Err(maintenance_result) = maintenance_result {
        error!("Maintenance module got an error {:?}", maintenance_result);
    }

    Ok(())
}
