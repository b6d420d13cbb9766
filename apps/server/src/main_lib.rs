use std::sync::Arc;

use crate::config::Config;
use scholaris_core::health::{HealthConfig, HealthService, HealthServiceTrait};
use scholaris_storage_sqlite::{
    db::{self, write_actor},
    HealthRunRepository, SqliteDataStore,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub health_service: Arc<dyn HealthServiceTrait + Send + Sync>,
}

/// Installs the global subscriber; `log` records from the library crates are
/// forwarded into it.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = write_actor::spawn_writer((*pool).clone());

    let mut health_config = HealthConfig::default();
    if let Some(timeout_ms) = config.probe_timeout_ms {
        health_config.probe_timeout_ms = timeout_ms;
    }
    health_config.validate()?;

    let store = Arc::new(SqliteDataStore::new(pool.clone()));
    let run_store = Arc::new(HealthRunRepository::new(pool.clone(), writer));
    let health_service: Arc<dyn HealthServiceTrait + Send + Sync> =
        Arc::new(HealthService::new(store, run_store).with_config(health_config));

    Ok(Arc::new(AppState { health_service }))
}
