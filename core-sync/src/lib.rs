//! # Sync Module
//!
//! Offline-first synchronization of lottery draw results.
//!
//! ## Overview
//!
//! This module keeps a local cache of draw results consistent with a remote
//! result source:
//! - Persisting the merged result set, last-sync time and failure counter
//! - Merging fetched draws into the cache without duplicates, newest first
//! - Running bootstrap and incremental fetches with bounded retries
//! - Publishing sync-status and data-change events
//!
//! ## Components
//!
//! - **Cache Store** (`cache`): Transactional persistence over a `SettingsStore`
//! - **Merge** (`merge`): Deduplication by `(draw_num, date)` and date ordering
//! - **Sync Engine** (`engine`): Single-flight orchestration of a sync run
//! - **Models** (`models`): `LottoData`, `SyncStatus` and `CacheInfo`

pub mod cache;
pub mod engine;
pub mod error;
pub mod merge;
pub mod models;

pub use cache::CacheStore;
pub use engine::{with_deadline, SyncConfig, SyncEngine};
pub use error::{Result, SyncError};
pub use merge::{is_sorted_newest_first, merge_results, watermark};
pub use models::{CacheInfo, LottoData, SyncStatus};
