use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Detects signals sent to the process and cancels `cancelation` on the first one.
///
/// On Windows detached processes can't detect signals sent to them, so the cli terminates the
/// process there and the last few minutes may be lost.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = interrupt() => {
            info!("Received ctrl-c");
        },
        _ = terminate() => {
            info!("Received termination signal");
        },
        // Someone else decided to shut down.
        _ = cancelation.cancelled() => return,
    };
    cancelation.cancel();
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c {e:?}");
        std::future::pending::<()>().await
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!("Failed to listen for SIGTERM {e:?}");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await
}
