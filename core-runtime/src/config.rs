//! # Core Configuration Module
//!
//! Configuration for the lottery results core.
//!
//! ## Overview
//!
//! [`LottoConfig`] holds every collaborator the sync engine and the service
//! façade need, plus the tunables that bound their behaviour. It is built with
//! [`LottoConfig::builder()`], which fails fast with an actionable
//! [`Error::CapabilityMissing`] when a required bridge was not injected.
//!
//! ## Required Dependencies
//!
//! - `RemoteResultSource` - the remote store of draw records
//! - `ConnectivityProbe` - online/offline determination
//! - `SettingsStore` - durable cache storage (desktop default available)
//!
//! ## Optional Dependencies
//!
//! - `AnalyticsSink` - user action events (none: nothing is emitted)
//! - `Clock` - time source (default: `SystemClock`)
//!
//! When the `desktop-shims` feature is enabled and no `SettingsStore` is
//! given, a SQLite store is opened at `settings_path` (or the platform data
//! directory).
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::LottoConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = LottoConfig::builder()
//!     .remote_source(Arc::new(supabase))
//!     .connectivity_probe(Arc::new(probe))
//!     .settings_store(Arc::new(settings))
//!     .fetch_timeout(Duration::from_secs(15))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AnalyticsSink, Clock, ConnectivityProbe, RemoteResultSource, SettingsStore, SystemClock,
    MAX_REMOTE_PAGE_SIZE,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Consecutive failed syncs tolerated before the engine stops contacting the
/// remote until the counter is reset.
pub const DEFAULT_MAX_SYNC_ATTEMPTS: u32 = 3;

/// Deadline applied to every individual remote call.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on rows returned by a search.
pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// Configuration for the lottery results core.
///
/// Use [`LottoConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct LottoConfig {
    /// Durable key-value storage backing the local cache
    pub settings_store: Arc<dyn SettingsStore>,

    /// Remote source of truth for draw records
    pub remote_source: Arc<dyn RemoteResultSource>,

    /// Online/offline determination
    pub connectivity_probe: Arc<dyn ConnectivityProbe>,

    /// Optional analytics sink
    pub analytics_sink: Option<Arc<dyn AnalyticsSink>>,

    /// Time source for sync timestamps
    pub clock: Arc<dyn Clock>,

    /// Consecutive failures allowed before sync fails fast
    pub max_sync_attempts: u32,

    /// Rows per request during bulk fetches (capped by the remote)
    pub remote_page_size: usize,

    /// Maximum rows returned by `search`
    pub search_limit: usize,

    /// Deadline for each remote call
    pub fetch_timeout: Duration,

    /// Capacity of the broadcast event channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for LottoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LottoConfig")
            .field("settings_store", &"SettingsStore { ... }")
            .field("remote_source", &"RemoteResultSource { ... }")
            .field("connectivity_probe", &"ConnectivityProbe { ... }")
            .field(
                "analytics_sink",
                &self.analytics_sink.as_ref().map(|_| "AnalyticsSink { ... }"),
            )
            .field("max_sync_attempts", &self.max_sync_attempts)
            .field("remote_page_size", &self.remote_page_size)
            .field("search_limit", &self.search_limit)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl LottoConfig {
    pub fn builder() -> LottoConfigBuilder {
        LottoConfigBuilder::default()
    }

    /// Validates the tunables.
    ///
    /// This checks:
    /// - The retry bound is at least one attempt
    /// - Page size and search limit are within `1..=MAX_REMOTE_PAGE_SIZE`
    /// - The fetch deadline and event buffer are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.max_sync_attempts == 0 {
            return Err(Error::Config(
                "max_sync_attempts must be greater than 0".to_string(),
            ));
        }

        if self.remote_page_size == 0 || self.remote_page_size > MAX_REMOTE_PAGE_SIZE {
            return Err(Error::Config(format!(
                "remote_page_size must be between 1 and {} (the remote row cap), got {}",
                MAX_REMOTE_PAGE_SIZE, self.remote_page_size
            )));
        }

        if self.search_limit == 0 || self.search_limit > MAX_REMOTE_PAGE_SIZE {
            return Err(Error::Config(format!(
                "search_limit must be between 1 and {}, got {}",
                MAX_REMOTE_PAGE_SIZE, self.search_limit
            )));
        }

        if self.fetch_timeout.is_zero() {
            return Err(Error::Config(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "SettingsStore implementation is required to persist the results cache. \
         Desktop: enable the 'desktop-shims' feature to use the default SqliteSettingsStore. \
         Mobile: inject platform-native settings (UserDefaults/DataStore).",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(path: Option<PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use std::thread;
    use tokio::runtime::{Builder, Handle};

    let path = path.unwrap_or_else(bridge_desktop::default_settings_path);

    let open = |path: PathBuf| -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| Error::Internal(format!("Failed to open default SettingsStore: {}", e)))
    };

    // block_on cannot run on a runtime worker, so hop to a plain thread
    let store = match Handle::try_current() {
        Ok(_) => thread::spawn(move || open(path)).join().map_err(|_| {
            Error::Internal("Thread panicked while opening default SettingsStore".to_string())
        })??,
        Err(_) => open(path)?,
    };

    Ok(Arc::new(store))
}

/// Builder for constructing [`LottoConfig`] instances.
#[derive(Default)]
pub struct LottoConfigBuilder {
    settings_store: Option<Arc<dyn SettingsStore>>,
    settings_path: Option<PathBuf>,
    remote_source: Option<Arc<dyn RemoteResultSource>>,
    connectivity_probe: Option<Arc<dyn ConnectivityProbe>>,
    analytics_sink: Option<Arc<dyn AnalyticsSink>>,
    clock: Option<Arc<dyn Clock>>,
    max_sync_attempts: Option<u32>,
    remote_page_size: Option<usize>,
    search_limit: Option<usize>,
    fetch_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl LottoConfigBuilder {
    /// Sets the settings store implementation.
    ///
    /// Required unless the `desktop-shims` feature provides a default.
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Location of the default desktop settings database. Ignored when a
    /// settings store is injected.
    pub fn settings_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.settings_path = Some(path.into());
        self
    }

    /// Sets the remote result source (required).
    pub fn remote_source(mut self, source: Arc<dyn RemoteResultSource>) -> Self {
        self.remote_source = Some(source);
        self
    }

    /// Sets the connectivity probe (required).
    pub fn connectivity_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity_probe = Some(probe);
        self
    }

    pub fn analytics_sink(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics_sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Default: 3
    pub fn max_sync_attempts(mut self, attempts: u32) -> Self {
        self.max_sync_attempts = Some(attempts);
        self
    }

    /// Default: 1000
    pub fn remote_page_size(mut self, size: usize) -> Self {
        self.remote_page_size = Some(size);
        self
    }

    /// Default: 1000
    pub fn search_limit(mut self, limit: usize) -> Self {
        self.search_limit = Some(limit);
        self
    }

    /// Default: 30 seconds
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `LottoConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the remote source, the probe or
    ///   (without `desktop-shims`) the settings store is missing
    /// - [`Error::Config`] when a tunable is out of range
    pub fn build(self) -> Result<LottoConfig> {
        let remote_source = self.remote_source.ok_or_else(|| {
            capability_missing(
                "RemoteResultSource",
                "RemoteResultSource implementation is required to fetch draw results. \
                 Enable the 'supabase' feature and inject a SupabaseResultSource, \
                 or provide your own implementation.",
            )
        })?;

        let connectivity_probe = self.connectivity_probe.ok_or_else(|| {
            capability_missing(
                "ConnectivityProbe",
                "ConnectivityProbe implementation is required to choose between remote and cache. \
                 Desktop: inject bridge_desktop::HttpConnectivityProbe. \
                 Mobile: wrap NWPathMonitor/ConnectivityManager.",
            )
        })?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.settings_path)?,
        };

        let config = LottoConfig {
            settings_store,
            remote_source,
            connectivity_probe,
            analytics_sink: self.analytics_sink,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            max_sync_attempts: self.max_sync_attempts.unwrap_or(DEFAULT_MAX_SYNC_ATTEMPTS),
            remote_page_size: self.remote_page_size.unwrap_or(MAX_REMOTE_PAGE_SIZE),
            search_limit: self.search_limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            fetch_timeout: self.fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
