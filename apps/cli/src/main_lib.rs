use std::sync::Arc;

use eqindex_core::cache::{IndexCacheTrait, MemoryCache, NoopCache};
use eqindex_core::{EngineConfig, IndexService, IndexServiceTrait};
use eqindex_storage_sqlite::{db, IndexRepository, ObservationRepository};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, LogFormat};

pub struct AppState {
    pub index_service: Arc<dyn IndexServiceTrait>,
    pub observation_repository: Arc<ObservationRepository>,
    pub config: Config,
}

/// Installs the global subscriber. Library crates log through `log`, which
/// the default `tracing-log` bridge forwards here.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = db::spawn_writer((*pool).clone());

    let observation_repository = Arc::new(ObservationRepository::new(pool.clone(), writer.clone()));
    let index_repository = Arc::new(IndexRepository::new(pool.clone(), writer.clone()));

    let cache: Arc<dyn IndexCacheTrait> = if config.cache_enabled {
        tracing::debug!("Read cache enabled, ttl {:?}", config.cache_ttl);
        Arc::new(MemoryCache::new(config.cache_ttl))
    } else {
        Arc::new(NoopCache)
    };

    let index_service = Arc::new(IndexService::new(
        observation_repository.clone(),
        index_repository,
        cache,
        EngineConfig {
            init_lookback_days: config.init_lookback_days,
        },
    ));

    Ok(AppState {
        index_service,
        observation_repository,
        config: config.clone(),
    })
}
