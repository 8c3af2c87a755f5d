//! Periodic expiry of unconfirmed payment holds.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::metrics::Metrics;
use crate::store::bookings;

/// Handle to the running sweep task.
pub struct SweeperHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the loop after the current tick and waits for the task to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            error!("expiry sweep task ended abnormally: {}", e);
        }
    }
}

/// Runs one sweep at `now` and records it in `metrics`.
pub async fn run_sweep_once(db: &SqlitePool, metrics: &Metrics, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    match bookings::expire_stale_holds(db, now).await {
        Ok(expired) => {
            metrics.record_sweep(expired);
            if expired > 0 {
                info!(expired_count = expired, "expired stale payment holds");
            } else {
                debug!("expiry sweep found no stale holds");
            }
            Ok(expired)
        }
        Err(e) => {
            metrics.inc_sweep_errors();
            Err(e)
        }
    }
}

/// Spawns the sweep loop. The first sweep runs immediately.
///
/// A failing tick is logged and the loop waits for the next one.
pub fn spawn_sweeper(db: SqlitePool, metrics: Metrics, interval: Duration) -> SweeperHandle {
    let cancel = CancellationToken::new();
    let cancel_child = cancel.clone();

    let join = tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = interval.as_secs(), "expiry sweep started");
        loop {
            tokio::select! {
                _ = cancel_child.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = run_sweep_once(&db, &metrics, Utc::now()).await {
                        error!("expiry sweep failed: {}", e);
                    }
                }
            }
        }
        info!("expiry sweep stopped");
    });

    SweeperHandle { cancel, join }
}
