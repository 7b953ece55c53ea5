//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` (rustls, pooled, retry with backoff)
//! - `ConnectivityProbe` as a single HEAD request with a short deadline
//! - `SettingsStore` using a SQLite-backed key-value table
//! - `AnalyticsSink` that writes actions to the `tracing` stream
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HttpConnectivityProbe, ReqwestHttpClient, SqliteSettingsStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http = Arc::new(ReqwestHttpClient::new()?);
//!     let probe = HttpConnectivityProbe::new(http.clone());
//!     let settings = SqliteSettingsStore::new(bridge_desktop::default_settings_path()).await?;
//!     // Hand these to LottoConfig::builder()
//!     Ok(())
//! }
//! ```

mod analytics;
mod http;
mod network;
mod settings;

use std::path::PathBuf;

pub use analytics::TracingAnalyticsSink;
pub use http::ReqwestHttpClient;
pub use network::{HttpConnectivityProbe, DEFAULT_PROBE_TIMEOUT, DEFAULT_PROBE_URL};
pub use settings::SqliteSettingsStore;

/// Location of the settings database: `<data dir>/lotto/settings.db`,
/// falling back to the working directory when the platform has no data dir.
pub fn default_settings_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lotto")
        .join("settings.db")
}
