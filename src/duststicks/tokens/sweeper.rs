//! Background purge of expired tokens.
//!
//! The sweeper runs one pass at startup, then one per `interval`. A pass that
//! fails or exceeds `sweep_timeout` is logged and retried on the next tick; the
//! loop only ends when its `CancellationToken` is cancelled.
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::TokenStore;
use crate::duststicks::db::{with_timeout, StoreResult};

#[derive(Clone, Copy, Debug)]
pub struct SweeperConfig {
    interval: Duration,
    sweep_timeout: Duration,
}

impl SweeperConfig {
    /// Default sweeper config: one pass per hour, each bounded by 10s.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            sweep_timeout: Duration::from_secs(10),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_interval_seconds(self, seconds: u64) -> Self {
        self.with_interval(Duration::from_secs(seconds))
    }

    #[must_use]
    pub fn with_sweep_timeout(mut self, timeout: Duration) -> Self {
        self.sweep_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sweep_timeout_seconds(self, seconds: u64) -> Self {
        self.with_sweep_timeout(Duration::from_secs(seconds))
    }

    /// Replace zero durations, which `tokio::time::interval` rejects, with 1s.
    #[must_use]
    pub fn normalize(self) -> Self {
        let one_second = Duration::from_secs(1);
        Self {
            interval: if self.interval.is_zero() {
                one_second
            } else {
                self.interval
            },
            sweep_timeout: if self.sweep_timeout.is_zero() {
                one_second
            } else {
                self.sweep_timeout
            },
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn sweep_timeout(&self) -> Duration {
        self.sweep_timeout
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Delete every token that expired before now, bounded by `timeout`.
///
/// # Errors
/// Returns the store error, or `Timeout` if the delete did not finish in time.
pub async fn sweep_once(store: &dyn TokenStore, timeout: Duration) -> StoreResult<u64> {
    with_timeout(timeout, store.delete_expired(Utc::now())).await
}

/// Spawn the sweeper loop. Cancel `shutdown` and await the handle to stop it.
pub fn spawn_sweeper(
    store: Arc<dyn TokenStore>,
    config: SweeperConfig,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let mut ticker = tokio::time::interval(config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = config.interval().as_secs(),
            "token sweeper started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let sweep = sweep_once(store.as_ref(), config.sweep_timeout());
            let result = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                result = sweep => result,
            };

            match result {
                Ok(deleted) => debug!(deleted, "expired tokens swept"),
                Err(err) => error!("token sweep failed: {err}"),
            }
        }

        info!("token sweeper stopped");
    })
}
