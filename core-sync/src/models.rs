//! Data model shared by the cache, the engine and the service façade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use core_runtime::events::{LottoData, SyncStatus};

/// Read-only diagnostics snapshot of the local cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheInfo {
    pub has_cache: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub sync_attempts: u32,
    /// Size of the serialized cache blob in bytes
    pub cache_size: u64,
    /// Remote exact count when reachable, otherwise the cached record count
    pub total_records: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_version: Option<String>,
}
