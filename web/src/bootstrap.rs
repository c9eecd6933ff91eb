//! Wiring of the service from configuration.

use crate::config::{Config, StoreBackend};
use anyhow::Context;
use conference_core::environment::{Notification, SystemClock};
use conference_core::store::EntityStore;
use conference_postgres::PostgresEntityStore;
use conference_runtime::{ChannelNotificationQueue, ConferenceService, InMemoryAnnouncementCache};
use conference_testing::InMemoryEntityStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Open the configured entity store, applying migrations when asked to.
///
/// # Errors
///
/// Fails when `PostgreSQL` is unreachable or a migration fails.
pub async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn EntityStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Ok(Arc::new(InMemoryEntityStore::new()))
        }
        StoreBackend::Postgres => {
            tracing::info!(
                max_connections = config.postgres.max_connections,
                "Connecting to PostgreSQL"
            );
            let pool = PgPoolOptions::new()
                .max_connections(config.postgres.max_connections)
                .min_connections(config.postgres.min_connections)
                .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
                .connect(&config.postgres.url)
                .await
                .context("Failed to connect to PostgreSQL")?;
            let store = PostgresEntityStore::from_pool(pool);

            if config.postgres.run_migrations {
                store
                    .migrate()
                    .await
                    .context("Failed to run database migrations")?;
                tracing::info!("Database migrations applied");
            }
            Ok(Arc::new(store))
        }
    }
}

/// Build the service over `store` and return the receiving end of its
/// notification queue, to be handed to a
/// [`NotificationWorker`](conference_runtime::NotificationWorker).
#[must_use]
pub fn build_service(
    store: Arc<dyn EntityStore>,
    config: &Config,
) -> (ConferenceService, mpsc::Receiver<Notification>) {
    let (queue, receiver) = ChannelNotificationQueue::new(config.background.notification_queue_capacity);
    let service = ConferenceService::new(
        store,
        Arc::new(SystemClock),
        Arc::new(queue),
        Arc::new(InMemoryAnnouncementCache::new()),
    )
    .with_retry_policy(config.retry_policy());
    (service, receiver)
}
