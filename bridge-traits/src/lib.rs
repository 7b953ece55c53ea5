//! # Host Bridge Traits
//!
//! Capability traits that the lottery results core consumes but that must be
//! provided by the host platform or by a back-end provider crate.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and its
//! collaborators. Each trait represents one capability the core requires and
//! that is implemented differently per platform (desktop, iOS, Android) or per
//! back-end (Supabase, in-memory fakes for tests).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//! - [`ConnectivityProbe`](network::ConnectivityProbe) - Best-effort online/offline check
//!
//! ### Data
//! - [`RemoteResultSource`](remote::RemoteResultSource) - Paginated, filterable store of draw records
//! - [`SettingsStore`](storage::SettingsStore) - Durable key-value storage with transactions
//!
//! ### Utilities
//! - [`AnalyticsSink`](analytics::AnalyticsSink) - Fire-and-forget user action events
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Implementations
//! should convert platform-specific errors into `BridgeError` with an actionable
//! message (endpoint, key, status code).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod analytics;
pub mod error;
pub mod http;
pub mod network;
pub mod remote;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use analytics::{ActionType, AnalyticsSink, LotteryAction};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use network::{ConnectivityProbe, NetworkStatus};
pub use remote::{
    Condition, DrawNumbers, IntField, LottoResult, RemoteResultSource, ResultQuery, TextField,
    MAX_REMOTE_PAGE_SIZE,
};
pub use storage::{SettingsStore, SettingsTransaction};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
