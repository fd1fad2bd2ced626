//! Runtime settings read from the `config` table.
//!
//! A background poller copies `config.mailing_active` (row `id = 1`) into an
//! [`AppSettings`] shared with the mailer, so operators can switch outbound mail
//! on and off without a restart.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Instrument};

use super::db::{with_timeout, StoreResult, QUERY_TIMEOUT};

#[derive(Debug, Default)]
pub struct AppSettings {
    mailing_active: AtomicBool,
}

impl AppSettings {
    #[must_use]
    pub fn new(mailing_active: bool) -> Self {
        Self {
            mailing_active: AtomicBool::new(mailing_active),
        }
    }

    #[must_use]
    pub fn mailing_active(&self) -> bool {
        self.mailing_active.load(Ordering::Relaxed)
    }

    pub fn set_mailing_active(&self, active: bool) {
        self.mailing_active.store(active, Ordering::Relaxed);
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current `mailing_active`, creating the default row when it is missing.
    async fn mailing_active(&self) -> StoreResult<bool>;
}

#[derive(Clone, Debug)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn mailing_active(&self) -> StoreResult<bool> {
        let select = "SELECT mailing_active FROM config WHERE id = 1";
        let insert = r"
            INSERT INTO config (id, mailing_active)
            VALUES (1, true)
            ON CONFLICT (id) DO NOTHING
        ";

        with_timeout(QUERY_TIMEOUT, async {
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = select
            );
            let row = sqlx::query(select)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await?;

            if let Some(row) = row {
                return Ok(row.try_get("mailing_active")?);
            }

            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = insert
            );
            sqlx::query(insert)
                .execute(&self.pool)
                .instrument(span)
                .await?;

            Ok(true)
        })
        .await
    }
}

/// Spawn the settings poller. Cancel `shutdown` and await the handle to stop it.
pub fn spawn_config_poller(
    store: Arc<dyn ConfigStore>,
    settings: Arc<AppSettings>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = if interval.is_zero() {
            Duration::from_secs(1)
        } else {
            interval
        };
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "config poller started");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match store.mailing_active().await {
                Ok(active) => {
                    if active != settings.mailing_active() {
                        info!(mailing_active = active, "app config changed");
                    }
                    settings.set_mailing_active(active);
                    debug!(mailing_active = active, "app config refreshed");
                }
                Err(err) => error!("failed to read app config: {err}"),
            }
        }

        info!("config poller stopped");
    })
}
