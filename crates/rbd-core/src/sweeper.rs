use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to a background task that runs a housekeeping pass on a fixed
/// interval.
///
/// The task stops when [`Sweeper::shutdown`] is called or when the handle is
/// dropped.
pub struct Sweeper {
    name: &'static str,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the task on the current tokio runtime. The first pass runs one
    /// full `period` after spawning.
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut pass: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // interval fires immediately on the first tick
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => pass().await,
                }
            }

            debug!("{} sweeper stopped", name);
        });

        info!("{} sweeper started (every {:?})", name, period);
        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    /// Signals the task and waits for it to finish its current pass.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.handle.await {
            tracing::warn!("{} sweeper join error: {}", self.name, e);
        }
    }
}
