//! Orderly-shutdown signal listener for the coordinator process.
//!
//! Grounded on the teacher's `bin/ebeans/main.rs`: a task that awaits
//! `tokio::signal` and cancels a shared `CancellationToken`, which the
//! rest of the process selects on at every blocking point. Extended
//! here to also listen for `SIGTERM`, since this daemon (unlike the
//! teacher's TCP server) is expected to run under an init system that
//! sends `SIGTERM` for graceful stop rather than only `ctrl_c`.

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Spawns a task that cancels `cancel` on the first `SIGINT` or
/// `SIGTERM`, mirroring the teacher's ctrl-c task but folding in
/// `SIGTERM` for init-system shutdown.
pub fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                return;
            }
        };

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "something strange with ctrl-c handling!");
                }
            }
            _ = sigterm.recv() => {}
        }

        cancel.cancel();
    });
}
