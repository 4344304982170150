use std::sync::Arc;

use axum::Router;
use leadflow_core::config::{AppConfig, ConfigError};
use leadflow_core::events::TracingEventPublisher;
use leadflow_db::{connect_with_settings, migrations, DbPool};
use leadflow_engine::RoutingEngine;
use thiserror::Error;
use tracing::info;

use crate::{api, health};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<RoutingEngine>,
}

impl Application {
    /// Routing API plus `/health`.
    pub fn router(&self) -> Router {
        api::router(self.engine.clone()).merge(health::router(self.db_pool.clone()))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let engine =
        RoutingEngine::from_pool(db_pool.clone(), &config, Arc::new(TracingEventPublisher));

    Ok(Application { config, db_pool, engine: Arc::new(engine) })
}
