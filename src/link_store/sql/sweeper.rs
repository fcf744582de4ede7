use std::time::Duration;

use sqlx::AnyPool;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};

use super::{delete_links_before, retention_cutoff, Dialect};

/// Background task that deletes links older than the retention window.
///
/// The task owns one end of two one-shot channels: it listens for the stop
/// signal and reports on `done` once it has exited its loop. A sweep that is
/// already running finishes before the stop signal is observed, so after
/// [`Sweeper::stop`] returns nothing touches the pool any more.
pub(crate) struct Sweeper {
    stop: oneshot::Sender<()>,
    done: oneshot::Receiver<()>,
}

impl Sweeper {
    pub(crate) fn spawn(
        pool: AnyPool,
        dialect: Dialect,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    // A dropped sender also ends the loop.
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        tracing::info!(?retention, "Cleaning up old shared links");
                        let result = match retention_cutoff(retention) {
                            Some(cutoff) => delete_links_before(&pool, dialect, cutoff).await,
                            None => Ok(0),
                        };
                        match result {
                            Ok(count) => tracing::info!(count, "Deleted old shared links"),
                            Err(e) => {
                                tracing::error!(error = %e, "Error cleaning up old shared links")
                            }
                        }
                    }
                }
            }

            tracing::debug!("Retention sweeper stopped");
            let _ = done_tx.send(());
        });

        Self {
            stop: stop_tx,
            done: done_rx,
        }
    }

    /// Signal the task to stop and wait until it has.
    pub(crate) async fn stop(self) {
        let _ = self.stop.send(());
        // Err means the task is gone already (it panicked or the runtime is shutting down).
        let _ = self.done.await;
    }
}
