use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{
    CancellationFlag, CompositionChanges, CompositionView, ConstructionRequest,
    ConstructionSummary, EngineConfig, IndexConstructionEngine, IndexError, IndexRepositoryTrait,
    IndexServiceTrait, PerformanceSeries, PerformanceSummary,
};
use crate::cache::{CacheKey, IndexCacheTrait};
use crate::errors::Result;
use crate::market_data::ObservationRepositoryTrait;
use crate::utils::time_utils::today;

/// Service entry point: runs constructions and serves cached reads.
pub struct IndexService {
    observations: Arc<dyn ObservationRepositoryTrait>,
    repository: Arc<dyn IndexRepositoryTrait>,
    cache: Arc<dyn IndexCacheTrait>,
    config: EngineConfig,
    active_runs: DashMap<u32, CancellationFlag>,
}

impl IndexService {
    pub fn new(
        observations: Arc<dyn ObservationRepositoryTrait>,
        repository: Arc<dyn IndexRepositoryTrait>,
        cache: Arc<dyn IndexCacheTrait>,
        config: EngineConfig,
    ) -> Self {
        Self {
            observations,
            repository,
            cache,
            config,
            active_runs: DashMap::new(),
        }
    }

    fn engine(&self, cancellation: CancellationFlag) -> IndexConstructionEngine {
        IndexConstructionEngine::new(
            self.observations.clone(),
            self.repository.clone(),
            self.config,
        )
        .with_cancellation(cancellation)
    }

    /// Claims `top_n` for a new run. One run per index size at a time.
    fn register_run(&self, top_n: u32) -> Result<CancellationFlag> {
        match self.active_runs.entry(top_n) {
            Entry::Occupied(_) => Err(IndexError::AlreadyRunning(top_n).into()),
            Entry::Vacant(slot) => {
                let flag = CancellationFlag::new();
                slot.insert(flag.clone());
                Ok(flag)
            }
        }
    }

    fn finish_run(&self, top_n: u32) {
        self.active_runs.remove(&top_n);
        // Days persisted before a halt or cancel are visible too.
        self.cache.clear();
    }

    fn cached<T, F>(&self, key: CacheKey, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let key = key.to_string();
        if let Some(value) = self.cache.get(&key) {
            match serde_json::from_value(value) {
                Ok(hit) => {
                    debug!("Cache hit for {}", key);
                    return Ok(hit);
                }
                Err(e) => warn!("Discarding unreadable cache entry {}: {}", key, e),
            }
        }

        let loaded = load()?;
        self.cache.set(&key, serde_json::to_value(&loaded)?);
        Ok(loaded)
    }
}

#[async_trait]
impl IndexServiceTrait for IndexService {
    async fn run_construction(&self, request: ConstructionRequest) -> Result<ConstructionSummary> {
        request.validate()?;
        let top_n = request.top_n;
        let cancellation = self.register_run(top_n)?;
        let mut engine = self.engine(cancellation);
        let result = engine.run(&request).await;
        self.finish_run(top_n);
        result
    }

    async fn resume_construction(
        &self,
        top_n: u32,
        end_date: NaiveDate,
    ) -> Result<ConstructionSummary> {
        let cancellation = self.register_run(top_n)?;
        let mut engine = self.engine(cancellation);
        let result = engine.resume(top_n, end_date).await;
        self.finish_run(top_n);
        result
    }

    fn cancel_construction(&self, top_n: u32) -> bool {
        match self.active_runs.get(&top_n) {
            Some(flag) => {
                info!("Cancellation requested for top {}", top_n);
                flag.cancel();
                true
            }
            None => false,
        }
    }

    fn get_performance(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
        top_n: u32,
    ) -> Result<PerformanceSeries> {
        let end = end.unwrap_or_else(today);
        self.cached(CacheKey::Performance { start, end, top_n }, || {
            let performance = self.repository.get_performance(start, end, top_n)?;
            Ok(PerformanceSeries {
                top_n,
                start_date: start,
                end_date: end,
                summary: PerformanceSummary::from_records(&performance),
                performance,
            })
        })
    }

    fn get_composition(&self, date: NaiveDate, top_n: u32) -> Result<CompositionView> {
        self.cached(CacheKey::Composition { date, top_n }, || {
            let portfolio = self
                .repository
                .get_portfolio(date, top_n)?
                .ok_or_else(|| {
                    IndexError::NotFound(format!(
                        "no composition for top {} on {}",
                        top_n, date
                    ))
                })?;
            Ok(CompositionView::from(&portfolio))
        })
    }

    fn get_composition_changes(
        &self,
        start: NaiveDate,
        end: Option<NaiveDate>,
        top_n: u32,
    ) -> Result<CompositionChanges> {
        let end = end.unwrap_or_else(today);
        self.cached(CacheKey::CompositionChanges { start, end, top_n }, || {
            let rows = self.repository.get_composition_changes(start, end, top_n)?;
            Ok(CompositionChanges::group(top_n, start, end, &rows))
        })
    }

    async fn reset_index(&self) -> Result<()> {
        if !self.active_runs.is_empty() {
            return Err(IndexError::InvalidRequest(
                "cannot reset while a construction is running".to_string(),
            )
            .into());
        }
        self.repository.delete_all().await?;
        self.cache.clear();
        info!("Index data reset");
        Ok(())
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}
