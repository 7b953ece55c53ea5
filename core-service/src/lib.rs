//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, connectivity,
//! settings storage, analytics) and a remote result source into the sync
//! core. Desktop apps typically enable the `desktop-shims` feature (which
//! depends on `bridge-desktop`) together with `supabase` for the hosted
//! results table.

pub mod error;
pub mod models;
pub mod search;
pub mod service;

pub use error::{Result, ServiceError};
pub use models::{PaginatedResults, ResultSource, SearchResults};
pub use search::SearchQuery;
pub use service::LottoService;

pub use core_runtime::config::{LottoConfig, LottoConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventStream, SubscriptionId};
pub use core_sync::{CacheInfo, LottoData, SyncError, SyncStatus};

#[cfg(all(feature = "desktop-shims", feature = "supabase"))]
pub use provider_supabase::SupabaseConfig;

/// Convenience bootstrapper for desktop hosts.
///
/// Uses reqwest for HTTP, a HEAD probe for connectivity, SQLite under the
/// user data directory for the cache and the tracing analytics sink.
///
/// ```no_run
/// # #[cfg(all(feature = "desktop-shims", feature = "supabase"))]
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, SupabaseConfig};
///
/// let config = SupabaseConfig::new("https://abc.supabase.co", "anon-key")
///     .map_err(|e| core_service::ServiceError::Config(e.to_string()))?;
/// let service = bootstrap_desktop(config).await?;
/// let latest = service.get_results_paginated(1, 20).await?;
/// # Ok(())
/// # }
/// ```
#[cfg(all(feature = "desktop-shims", feature = "supabase"))]
pub async fn bootstrap_desktop(supabase: SupabaseConfig) -> Result<LottoService> {
    use bridge_desktop::{
        default_settings_path, HttpConnectivityProbe, ReqwestHttpClient, SqliteSettingsStore,
        TracingAnalyticsSink,
    };
    use bridge_traits::http::HttpClient;
    use provider_supabase::SupabaseResultSource;
    use std::sync::Arc;

    let http: Arc<dyn HttpClient> = Arc::new(
        ReqwestHttpClient::new().map_err(|e| ServiceError::InitializationFailed(e.to_string()))?,
    );
    let settings = SqliteSettingsStore::new(default_settings_path())
        .await
        .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;

    let config = LottoConfig::builder()
        .settings_store(Arc::new(settings))
        .remote_source(Arc::new(SupabaseResultSource::new(http.clone(), supabase)))
        .connectivity_probe(Arc::new(HttpConnectivityProbe::new(http)))
        .analytics_sink(Arc::new(TracingAnalyticsSink::new()))
        .build()?;

    LottoService::new(config)
}

/// [`bootstrap_desktop`] with the Supabase settings read from the
/// `LOTTO_SUPABASE_*` environment variables.
#[cfg(all(feature = "desktop-shims", feature = "supabase"))]
pub async fn bootstrap_desktop_from_env() -> Result<LottoService> {
    let supabase =
        SupabaseConfig::from_env().map_err(|e| ServiceError::Config(e.to_string()))?;
    bootstrap_desktop(supabase).await
}
