//! # Sync Engine
//!
//! Reconciles the local cache with the remote result source.
//!
//! ## Overview
//!
//! A sync run:
//! 1. Loads the cache and probes connectivity, then publishes an
//!    `is_syncing` status
//! 2. Offline: publishes a failure status and falls back to the cache
//! 3. Refuses to contact the remote once the consecutive-failure counter has
//!    reached `max_sync_attempts`
//! 4. Fetches, page by page:
//!    - **Bootstrap** when the cache is absent or empty: every record, with
//!      progress reported against the remote count
//!    - **Incremental** otherwise: records dated after the cache watermark
//! 5. Zero new records: publishes a completed status and returns the cache
//!    untouched
//! 6. Otherwise merges, persists atomically, publishes the new data and a
//!    completed status
//!
//! A failed fetch bumps the failure counter, publishes a failure status and
//! still returns the cache when there is one. The error only reaches the
//! caller when there is nothing cached.
//!
//! Incremental fetches assume new draws are always dated after every cached
//! draw. A correction published for an older date is not picked up until the
//! cache is cleared.
//!
//! ## Concurrency
//!
//! Runs are single-flight: a caller arriving while a run is in progress joins
//! it and receives the same outcome. A run is a spawned task, so it finishes
//! even when every caller stops waiting for it. Every remote call is bounded
//! by `fetch_timeout`.
//!
//! Runs and [`SyncEngine::clear_cache`] are serialized; a clear waits for the
//! in-flight run and a run started meanwhile waits for the clear.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{CacheStore, SyncConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(cache, remote, probe, bus, clock, SyncConfig::default());
//! let data = engine.sync_results().await?;
//! println!("{} draws cached", data.results.len());
//! ```

use bridge_traits::{
    error::Result as BridgeResult,
    network::ConnectivityProbe,
    remote::{Condition, LottoResult, RemoteResultSource, ResultQuery, MAX_REMOTE_PAGE_SIZE},
    time::Clock,
};
use core_runtime::{config::LottoConfig, events::StatusBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::{
    cache::CacheStore,
    merge::{merge_results, watermark},
    models::{LottoData, SyncStatus},
    Result, SyncError,
};

/// Sync engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Consecutive failed fetches after which the remote is no longer contacted
    pub max_sync_attempts: u32,

    /// Records requested per remote page (at most the remote cap)
    pub page_size: usize,

    /// Deadline for each individual remote call
    pub fetch_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_sync_attempts: 3,
            page_size: MAX_REMOTE_PAGE_SIZE,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&LottoConfig> for SyncConfig {
    fn from(config: &LottoConfig) -> Self {
        Self {
            max_sync_attempts: config.max_sync_attempts,
            page_size: config.remote_page_size,
            fetch_timeout: config.fetch_timeout,
        }
    }
}

/// Await a remote call under a deadline, mapping both failure kinds into
/// [`SyncError`].
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> Result<T>
where
    F: Future<Output = BridgeResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(SyncError::RemoteFetchFailed(e.to_string())),
        Err(_) => Err(SyncError::Timeout(deadline.as_millis() as u64)),
    }
}

type SharedSync = Shared<BoxFuture<'static, Result<LottoData>>>;

struct EngineInner {
    cache: CacheStore,
    remote: Arc<dyn RemoteResultSource>,
    probe: Arc<dyn ConnectivityProbe>,
    bus: Arc<StatusBus>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    in_flight: Mutex<Option<SharedSync>>,
    /// Held for a whole run and for a clear
    cache_lock: tokio::sync::Mutex<()>,
}

/// Empties the in-flight slot when the run task ends, however it ends.
struct FlightGuard(SyncEngine);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.flight_slot().take();
    }
}

/// Offline-first sync engine. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(
        cache: CacheStore,
        remote: Arc<dyn RemoteResultSource>,
        probe: Arc<dyn ConnectivityProbe>,
        bus: Arc<StatusBus>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                cache,
                remote,
                probe,
                bus,
                clock,
                config,
                in_flight: Mutex::new(None),
                cache_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Build an engine from a validated runtime configuration.
    pub fn from_config(config: &LottoConfig, bus: Arc<StatusBus>) -> Self {
        Self::new(
            CacheStore::new(config.settings_store.clone(), config.clock.clone()),
            config.remote_source.clone(),
            config.connectivity_probe.clone(),
            bus,
            config.clock.clone(),
            SyncConfig::from(config),
        )
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    pub fn bus(&self) -> &Arc<StatusBus> {
        &self.inner.bus
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Whether a sync run is currently in flight.
    pub fn is_syncing(&self) -> bool {
        self.flight_slot().is_some()
    }

    /// Sync with the remote source and return the best data available.
    ///
    /// Joins the in-flight run if there is one. Must be called from within a
    /// Tokio runtime.
    pub async fn sync_results(&self) -> Result<LottoData> {
        let flight = {
            let mut slot = self.flight_slot();
            match slot.as_ref() {
                Some(running) => {
                    debug!("Joining in-flight sync");
                    running.clone()
                }
                None => {
                    // The slot stays locked until the run is registered, so
                    // the task's guard cannot empty it first.
                    let engine = self.clone();
                    let task = tokio::spawn(
                        async move {
                            let _guard = FlightGuard(engine.clone());
                            engine.run_sync().await
                        }
                        .in_current_span(),
                    );
                    let run = task
                        .map(|joined| {
                            joined.unwrap_or_else(|e| Err(SyncError::Interrupted(e.to_string())))
                        })
                        .boxed()
                        .shared();
                    *slot = Some(run.clone());
                    run
                }
            }
        };

        flight.await
    }

    /// Clear the cache, the last-sync time and the failure counter.
    ///
    /// Waits for an in-flight run first; that run would otherwise write the
    /// cleared history back.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<()> {
        let _exclusive = self.inner.cache_lock.lock().await;
        self.inner.cache.clear().await?;
        info!("Cache cleared");
        Ok(())
    }

    fn flight_slot(&self) -> MutexGuard<'_, Option<SharedSync>> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    async fn run_sync(&self) -> Result<LottoData> {
        let inner = &self.inner;
        let _exclusive = inner.cache_lock.lock().await;
        let cached = inner.cache.load().await;
        let is_online = inner.probe.is_online().await;
        let attempts = inner.cache.sync_attempts().await;

        let started = SyncStatus {
            is_syncing: true,
            last_sync_time: inner.cache.last_sync().await,
            error: None,
            has_cache: cached.is_some(),
            is_online,
            sync_attempts: attempts,
            progress: None,
        };
        info!(has_cache = started.has_cache, is_online, attempts, "Starting sync");
        inner.bus.publish_status(started.clone());

        if !is_online {
            warn!("Offline, falling back to cache");
            return self.fail(&started, SyncError::Offline, attempts, cached);
        }

        let max = inner.config.max_sync_attempts;
        if attempts >= max {
            warn!(attempts, max, "Too many failed syncs, not contacting remote");
            return self.fail(
                &started,
                SyncError::MaxRetriesExceeded { attempts, max },
                attempts,
                cached,
            );
        }

        let since = cached.as_ref().and_then(|data| watermark(&data.results));
        let fetched = match since {
            Some(since) => self.fetch_incremental(since).await,
            None => self.fetch_bootstrap(&started).await,
        };

        let fresh = match fetched {
            Ok(fresh) => fresh,
            Err(e) => {
                let attempts = inner.cache.increment_sync_attempts().await;
                error!(error = %e, attempts, "Remote fetch failed");
                return self.fail(&started, e, attempts, cached);
            }
        };

        if fresh.is_empty() {
            if attempts > 0 {
                inner.cache.reset_sync_attempts().await;
            }
            let Some(existing) = cached else {
                warn!("Remote returned no records and nothing is cached");
                return self.fail(&started, SyncError::NoDataAvailable, 0, None);
            };

            info!(records = existing.results.len(), "No new draws, cache unchanged");
            inner.bus.publish_status(SyncStatus {
                is_syncing: false,
                has_cache: true,
                sync_attempts: 0,
                progress: None,
                ..started
            });
            return Ok(existing);
        }

        let fetched_count = fresh.len();
        let (existing, total_draws, cache_version) = match cached {
            Some(data) => (data.results, data.total_draws, data.cache_version),
            None => (Vec::new(), None, None),
        };
        let mut data = LottoData::new(inner.clock.now(), merge_results(fresh, existing));
        data.total_draws = total_draws;
        data.cache_version = cache_version;

        if let Err(e) = inner.cache.save(&data).await {
            error!(error = %e, "Failed to persist merged results");
            let failed = SyncStatus {
                is_syncing: false,
                error: Some(e.to_string()),
                sync_attempts: 0,
                progress: None,
                ..started
            };
            inner.bus.publish_status(failed);
            return Err(e);
        }

        info!(
            fetched = fetched_count,
            records = data.results.len(),
            "Sync completed"
        );
        inner.bus.publish_data(data.clone());
        inner.bus.publish_status(SyncStatus {
            is_syncing: false,
            last_sync_time: Some(data.last_updated),
            error: None,
            has_cache: true,
            is_online: true,
            sync_attempts: 0,
            progress: None,
        });

        Ok(data)
    }

    /// Publish a failure status, then fall back to `cached` if present.
    fn fail(
        &self,
        started: &SyncStatus,
        error: SyncError,
        attempts: u32,
        cached: Option<LottoData>,
    ) -> Result<LottoData> {
        self.inner.bus.publish_status(SyncStatus {
            is_syncing: false,
            error: Some(error.to_string()),
            sync_attempts: attempts,
            progress: None,
            ..started.clone()
        });

        match cached {
            Some(data) => {
                debug!(records = data.results.len(), "Returning cached results after failure");
                Ok(data)
            }
            None => Err(error),
        }
    }

    #[instrument(skip(self, started))]
    async fn fetch_bootstrap(&self, started: &SyncStatus) -> Result<Vec<LottoResult>> {
        let deadline = self.inner.config.fetch_timeout;
        let total = match with_deadline(deadline, self.inner.remote.count(&[])).await {
            Ok(total) => Some(total),
            Err(e) => {
                debug!(error = %e, "Remote count unavailable, syncing without progress");
                None
            }
        };
        info!(total = ?total, "Bootstrapping cache from remote");

        self.fetch_pages(Vec::new(), |loaded| {
            if let Some(total) = total.filter(|t| *t > 0) {
                let percent = (loaded as u64 * 100 / total).min(100) as u8;
                self.inner.bus.publish_status(SyncStatus {
                    progress: Some(percent),
                    ..started.clone()
                });
            }
        })
        .await
    }

    #[instrument(skip(self), fields(watermark = %since))]
    async fn fetch_incremental(&self, since: chrono::NaiveDate) -> Result<Vec<LottoResult>> {
        info!("Fetching draws newer than cache");
        self.fetch_pages(vec![Condition::DateGt(since)], |_| {}).await
    }

    /// Read every matching record, one page at a time, until a short page.
    async fn fetch_pages<F>(&self, conditions: Vec<Condition>, mut on_page: F) -> Result<Vec<LottoResult>>
    where
        F: FnMut(usize) + Send,
    {
        let deadline = self.inner.config.fetch_timeout;
        let mut records = Vec::new();
        let mut offset = 0;

        loop {
            let mut query = ResultQuery::page(offset, self.inner.config.page_size);
            query.conditions = conditions.clone();

            let page = with_deadline(deadline, self.inner.remote.fetch(&query)).await?;
            let received = page.len();
            records.extend(page);
            on_page(records.len());
            debug!(offset, received, total = records.len(), "Fetched page");

            if received < query.limit || received == 0 {
                break;
            }
            offset += received;
        }

        Ok(records)
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.inner.config)
            .field("is_syncing", &self.is_syncing())
            .finish_non_exhaustive()
    }
}
