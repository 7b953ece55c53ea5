//! # Local Cache Store
//!
//! Persists the merged [`LottoData`] snapshot, the last-sync timestamp and the
//! consecutive sync-failure counter in a [`SettingsStore`].
//!
//! ## Layout
//!
//! | Key | Value |
//! |---|---|
//! | `lotto_cache` | JSON-serialized `LottoData` |
//! | `last_sync` | RFC 3339 timestamp of the last successful save |
//! | `sync_attempts` | consecutive failed fetches, decimal string |
//!
//! ## Failure policy
//!
//! Reads never fail: a missing or undecodable cache is reported as absent and
//! an unreadable counter as zero. Writes of the snapshot and clears are
//! surfaced to the caller. Counter updates are best-effort and only logged.

use bridge_traits::{
    error::Result as BridgeResult,
    storage::{SettingsStore, SettingsTransaction},
    time::Clock,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{models::LottoData, Result, SyncError};

pub const CACHE_KEY: &str = "lotto_cache";
pub const LAST_SYNC_KEY: &str = "last_sync";
pub const SYNC_ATTEMPTS_KEY: &str = "sync_attempts";

enum Write<'a> {
    Set(&'a str, &'a str),
    Delete(&'a str),
}

pub struct CacheStore {
    store: Arc<dyn SettingsStore>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn SettingsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Load the cached snapshot. `None` if never synced or unreadable.
    pub async fn load(&self) -> Option<LottoData> {
        let raw = match self.store.get_string(CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached results");
                return None;
            }
        };

        match serde_json::from_str::<LottoData>(&raw) {
            Ok(data) => {
                debug!(records = data.results.len(), "Loaded cached results");
                Some(data)
            }
            Err(e) => {
                warn!(error = %e, bytes = raw.len(), "Cached results are corrupt, ignoring");
                None
            }
        }
    }

    /// Size in bytes of the stored snapshot, 0 when absent.
    pub async fn cache_size_bytes(&self) -> u64 {
        match self.store.get_string(CACHE_KEY).await {
            Ok(Some(raw)) => raw.len() as u64,
            Ok(None) => 0,
            Err(e) => {
                debug!(error = %e, "Failed to read cache size");
                0
            }
        }
    }

    /// Replace the snapshot, stamp `last_sync` and reset the failure counter
    /// in one transaction.
    pub async fn save(&self, data: &LottoData) -> Result<()> {
        let payload = serde_json::to_string(data)
            .map_err(|e| SyncError::CacheWriteFailed(e.to_string()))?;
        let synced_at = self.clock.now().to_rfc3339();

        self.write_all(&[
            Write::Set(CACHE_KEY, &payload),
            Write::Set(LAST_SYNC_KEY, &synced_at),
            Write::Set(SYNC_ATTEMPTS_KEY, "0"),
        ])
        .await
        .map_err(|e| SyncError::CacheWriteFailed(e.to_string()))?;

        debug!(records = data.results.len(), bytes = payload.len(), "Saved cached results");
        Ok(())
    }

    /// Remove the snapshot, the timestamp and the counter together.
    pub async fn clear(&self) -> Result<()> {
        self.write_all(&[
            Write::Delete(CACHE_KEY),
            Write::Delete(LAST_SYNC_KEY),
            Write::Delete(SYNC_ATTEMPTS_KEY),
        ])
        .await
        .map_err(|e| SyncError::CacheClearFailed(e.to_string()))?;

        debug!("Cleared cached results");
        Ok(())
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        match self.store.get_string(LAST_SYNC_KEY).await {
            Ok(Some(raw)) => match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    debug!(error = %e, "Ignoring unparsable last_sync");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "Failed to read last_sync");
                None
            }
        }
    }

    /// Consecutive failed fetches. Unreadable values count as zero.
    pub async fn sync_attempts(&self) -> u32 {
        match self.store.get_i64(SYNC_ATTEMPTS_KEY).await {
            Ok(Some(n)) => u32::try_from(n).unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                debug!(error = %e, "Failed to read sync attempts");
                0
            }
        }
    }

    /// Bump the failure counter and return the new value.
    pub async fn increment_sync_attempts(&self) -> u32 {
        let attempts = self.sync_attempts().await.saturating_add(1);
        if let Err(e) = self.store.set_i64(SYNC_ATTEMPTS_KEY, i64::from(attempts)).await {
            warn!(error = %e, attempts, "Failed to record sync attempt");
        }
        attempts
    }

    pub async fn reset_sync_attempts(&self) {
        if let Err(e) = self.store.set_i64(SYNC_ATTEMPTS_KEY, 0).await {
            warn!(error = %e, "Failed to reset sync attempts");
        }
    }

    async fn write_all(&self, writes: &[Write<'_>]) -> BridgeResult<()> {
        let mut tx = self.store.begin_transaction().await?;

        match Self::stage(tx.as_mut(), writes).await {
            Ok(()) => tx.commit().await,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Failed to roll back cache transaction");
                }
                Err(e)
            }
        }
    }

    async fn stage(tx: &mut (dyn SettingsTransaction + Send), writes: &[Write<'_>]) -> BridgeResult<()> {
        for write in writes {
            match write {
                Write::Set(key, value) => tx.set_string(key, value).await?,
                Write::Delete(key) => tx.delete(key).await?,
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore").finish_non_exhaustive()
    }
}
