//! # Lotto Service
//!
//! The façade UI surfaces talk to.
//!
//! ## Overview
//!
//! - **Offline-first reads**: [`LottoService::get_results`] answers from the
//!   cache and refreshes in the background
//! - **Pages and search**: served straight from the remote source, falling
//!   back to local data when it is unreachable
//! - **Diagnostics**: cache info, current sync status, connection test
//! - **Subscriptions**: sync-status and data-change callbacks plus an async
//!   event stream
//!
//! Fallback answers are marked with their [`ResultSource`]. Cache-served
//! pages report totals bounded by what is cached, and a search answered from
//! the last loaded page only covers that page.

use bridge_traits::{
    analytics::{ActionType, AnalyticsSink, LotteryAction},
    network::ConnectivityProbe,
    remote::{LottoResult, RemoteResultSource, ResultQuery, MAX_REMOTE_PAGE_SIZE},
    time::Clock,
};
use core_runtime::{
    config::LottoConfig,
    events::{EventStream, StatusBus, SubscriptionId},
};
use core_sync::{with_deadline, CacheInfo, LottoData, SyncEngine, SyncStatus};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::{
    models::{PaginatedResults, ResultSource, SearchResults},
    search::SearchQuery,
    Result, ServiceError,
};

struct ServiceInner {
    engine: SyncEngine,
    remote: Arc<dyn RemoteResultSource>,
    probe: Arc<dyn ConnectivityProbe>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    search_limit: usize,
    /// Last page handed out by `get_results_paginated`
    loaded_page: Mutex<Vec<LottoResult>>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct LottoService {
    inner: Arc<ServiceInner>,
}

impl LottoService {
    /// Create a service from a validated configuration.
    pub fn new(config: LottoConfig) -> Result<Self> {
        config.validate()?;

        let bus = Arc::new(StatusBus::new(config.event_buffer_size));
        let engine = SyncEngine::from_config(&config, bus);

        info!(
            max_sync_attempts = config.max_sync_attempts,
            page_size = config.remote_page_size,
            fetch_timeout_ms = config.fetch_timeout.as_millis() as u64,
            analytics = config.analytics_sink.is_some(),
            "Lotto service ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                engine,
                remote: config.remote_source,
                probe: config.connectivity_probe,
                analytics: config.analytics_sink,
                clock: config.clock,
                fetch_timeout: config.fetch_timeout,
                search_limit: config.search_limit,
                loaded_page: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.inner.engine
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn on_sync_status_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.inner.engine.bus().subscribe_status(callback)
    }

    pub fn off_sync_status_change(&self, id: SubscriptionId) -> bool {
        self.inner.engine.bus().unsubscribe_status(id)
    }

    pub fn on_data_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&LottoData) + Send + Sync + 'static,
    {
        self.inner.engine.bus().subscribe_data(callback)
    }

    pub fn off_data_change(&self, id: SubscriptionId) -> bool {
        self.inner.engine.bus().unsubscribe_data(id)
    }

    /// Async stream of both channels.
    pub fn events(&self) -> EventStream {
        self.inner.engine.bus().stream()
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Return cached data immediately and refresh it in the background.
    ///
    /// The background outcome is only visible through the event channels.
    /// With nothing cached, waits for a sync instead. Must be called from
    /// within a Tokio runtime.
    #[instrument(skip(self))]
    pub async fn get_results(&self) -> Result<LottoData> {
        if let Some(cached) = self.inner.engine.cache().load().await {
            let engine = self.inner.engine.clone();
            tokio::spawn(async move {
                if let Err(e) = engine.sync_results().await {
                    debug!(error = %e, "Background sync finished without fresh data");
                }
            });
            return Ok(cached);
        }

        info!("No cached results, syncing before answering");
        Ok(self.inner.engine.sync_results().await?)
    }

    /// Sync with the remote source; joins a sync already in flight.
    #[instrument(skip(self))]
    pub async fn sync_results(&self) -> Result<LottoData> {
        let outcome = self.inner.engine.sync_results().await;

        let data = match &outcome {
            Ok(data) => json!({ "success": true, "records": data.results.len() }),
            Err(e) => json!({ "success": false, "error": e.to_string() }),
        };
        self.track(ActionType::SyncData, data);

        Ok(outcome?)
    }

    // ------------------------------------------------------------------
    // Pages and search
    // ------------------------------------------------------------------

    /// One page of results, newest first. `page` is 1-based.
    ///
    /// Falls back to slicing the cache when the remote is unreachable; the
    /// totals are then bounded by the cache, and are zero with nothing cached.
    #[instrument(skip(self))]
    pub async fn get_results_paginated(&self, page: usize, page_size: usize) -> Result<PaginatedResults> {
        if page == 0 {
            return Err(ServiceError::InvalidArgument("page is 1-based".to_string()));
        }
        if page_size == 0 || page_size > MAX_REMOTE_PAGE_SIZE {
            return Err(ServiceError::InvalidArgument(format!(
                "page size must be between 1 and {}",
                MAX_REMOTE_PAGE_SIZE
            )));
        }
        let offset = (page - 1).saturating_mul(page_size);

        let paginated = match self.remote_page(offset, page, page_size).await {
            Ok(paginated) => paginated,
            Err(e) => {
                warn!(error = %e, "Remote page unavailable, using cache");
                let cached = self
                    .inner
                    .engine
                    .cache()
                    .load()
                    .await
                    .map(|data| data.results)
                    .unwrap_or_default();
                Self::cache_page(&cached, offset, page, page_size)
            }
        };

        self.set_loaded_page(paginated.results.clone());
        self.track(
            ActionType::ViewHistory,
            json!({
                "page": page,
                "page_size": page_size,
                "source": paginated.source,
            }),
        );

        Ok(paginated)
    }

    async fn remote_page(&self, offset: usize, page: usize, page_size: usize) -> core_sync::Result<PaginatedResults> {
        let deadline = self.inner.fetch_timeout;
        let total = with_deadline(deadline, self.inner.remote.count(&[])).await?;
        let results = with_deadline(
            deadline,
            self.inner.remote.fetch(&ResultQuery::page(offset, page_size)),
        )
        .await?;

        debug!(total, received = results.len(), "Served page from remote");
        Ok(PaginatedResults {
            results,
            total,
            has_more: (offset.saturating_add(page_size) as u64) < total,
            current_page: page,
            source: ResultSource::Remote,
        })
    }

    fn cache_page(cached: &[LottoResult], offset: usize, page: usize, page_size: usize) -> PaginatedResults {
        let start = offset.min(cached.len());
        let end = offset.saturating_add(page_size).min(cached.len());

        PaginatedResults {
            results: cached[start..end].to_vec(),
            total: cached.len() as u64,
            has_more: end < cached.len(),
            current_page: page,
            source: ResultSource::Cache,
        }
    }

    /// Search the remote source. See [`SearchQuery`] for how input is read.
    pub async fn search(&self, query: &str) -> Result<LottoData> {
        Ok(self.search_detailed(query).await?.data)
    }

    /// Like [`search`](Self::search), also reporting where the answer came
    /// from.
    ///
    /// When the remote is unreachable, only the last page returned by
    /// [`get_results_paginated`](Self::get_results_paginated) is searched.
    #[instrument(skip(self))]
    pub async fn search_detailed(&self, query: &str) -> Result<SearchResults> {
        let parsed = SearchQuery::parse(query);
        let mut request = ResultQuery::page(0, self.inner.search_limit);
        request.conditions = parsed.conditions();
        debug!(query = ?parsed, "Searching");

        let outcome = with_deadline(self.inner.fetch_timeout, self.inner.remote.fetch(&request)).await;
        let (results, source) = match outcome {
            Ok(results) => (results, ResultSource::Remote),
            Err(e) => {
                let loaded = self.loaded_page();
                if loaded.is_empty() {
                    warn!(error = %e, "Search failed and no page is loaded");
                    return Err(e.into());
                }
                warn!(error = %e, loaded = loaded.len(), "Search falling back to the loaded page");
                let matching: Vec<LottoResult> = loaded.into_iter().filter(|r| request.matches(r)).collect();
                (matching, ResultSource::LoadedPage)
            }
        };

        info!(found = results.len(), source = ?source, "Search finished");
        self.track(
            ActionType::Search,
            json!({ "query": query, "results": results.len() }),
        );

        Ok(SearchResults {
            data: LottoData::new(self.inner.clock.now(), results),
            source,
        })
    }

    fn loaded_page(&self) -> Vec<LottoResult> {
        self.inner
            .loaded_page
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_loaded_page(&self, results: Vec<LottoResult>) {
        *self
            .inner
            .loaded_page
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = results;
    }

    // ------------------------------------------------------------------
    // Cache and diagnostics
    // ------------------------------------------------------------------

    /// Drop the cache, the last-sync time and the failure counter once any
    /// in-flight sync has finished.
    pub async fn clear_cache(&self) -> Result<()> {
        Ok(self.inner.engine.clear_cache().await?)
    }

    /// Exact remote record count, or the cached count when unreachable.
    pub async fn total_results_count(&self) -> u64 {
        match with_deadline(self.inner.fetch_timeout, self.inner.remote.count(&[])).await {
            Ok(total) => total,
            Err(e) => {
                debug!(error = %e, "Remote count unavailable, counting cache");
                self.inner
                    .engine
                    .cache()
                    .load()
                    .await
                    .map(|data| data.results.len() as u64)
                    .unwrap_or(0)
            }
        }
    }

    pub async fn get_cache_info(&self) -> CacheInfo {
        let cache = self.inner.engine.cache();
        let cached = cache.load().await;

        CacheInfo {
            has_cache: cached.is_some(),
            last_sync: cache.last_sync().await,
            sync_attempts: cache.sync_attempts().await,
            cache_size: cache.cache_size_bytes().await,
            total_records: self.total_results_count().await,
            cache_version: cached.and_then(|data| data.cache_version),
        }
    }

    /// Status snapshot built from persisted state and a fresh probe.
    pub async fn get_current_sync_status(&self) -> SyncStatus {
        let cache = self.inner.engine.cache();
        let cached = cache.load().await;
        let last_sync_time = match cache.last_sync().await {
            Some(at) => Some(at),
            None => cached.as_ref().map(|data| data.last_updated),
        };

        SyncStatus {
            is_syncing: self.inner.engine.is_syncing(),
            last_sync_time,
            error: None,
            has_cache: cached.is_some(),
            is_online: self.inner.probe.is_online().await,
            sync_attempts: cache.sync_attempts().await,
            progress: None,
        }
    }

    /// Whether the remote source answers a count query.
    #[instrument(skip(self))]
    pub async fn test_connection(&self) -> bool {
        match with_deadline(self.inner.fetch_timeout, self.inner.remote.count(&[])).await {
            Ok(total) => {
                info!(total, "Remote connection OK");
                true
            }
            Err(e) => {
                warn!(error = %e, "Remote connection test failed");
                false
            }
        }
    }

    /// Hand the action to the sink on a separate task; the caller never waits
    /// on it.
    fn track(&self, action_type: ActionType, data: serde_json::Value) {
        let Some(sink) = self.inner.analytics.clone() else {
            return;
        };

        let action = LotteryAction::new(action_type, self.inner.clock.now()).with_data(data);
        tokio::spawn(async move {
            if let Err(e) = sink.track(action).await {
                warn!(action = action_type.as_str(), error = %e, "Failed to track action");
            }
        });
    }
}

impl std::fmt::Debug for LottoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LottoService")
            .field("engine", &self.inner.engine)
            .field("search_limit", &self.inner.search_limit)
            .finish_non_exhaustive()
    }
}
