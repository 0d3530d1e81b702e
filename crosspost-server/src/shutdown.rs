//! Graceful shutdown on SIGINT / SIGTERM
//!
//! In-flight requests are allowed to finish; a request interrupted between
//! stages would otherwise leave a post stored but not published.

use tracing::{info, warn};

/// Resolves when the process is asked to stop
#[cfg(unix)]
pub async fn signal() {
    use futures::stream::StreamExt;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook_tokio::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            warn!("Signal setup failed: {}, falling back to Ctrl-C only", e);
            ctrl_c().await;
            return;
        }
    };
    let handle = signals.handle();

    if let Some(sig) = signals.next().await {
        let name = match sig {
            SIGTERM => "SIGTERM",
            SIGINT => "SIGINT",
            _ => "signal",
        };
        info!("Received {}, stopping gracefully...", name);
    }

    handle.close();
}

#[cfg(not(unix))]
pub async fn signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl-C, stopping gracefully...");
}
