//! Views returned by the service façade.

use bridge_traits::remote::LottoResult;
use core_sync::LottoData;
use serde::{Deserialize, Serialize};

/// Where a page or search result was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Answered by the remote source; totals are authoritative
    Remote,
    /// Sliced from the local cache; totals only cover what is cached
    Cache,
    /// Filtered from the last page handed out; covers that page only
    LoadedPage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResults {
    pub results: Vec<LottoResult>,
    pub total: u64,
    pub has_more: bool,
    /// 1-based
    pub current_page: usize,
    pub source: ResultSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub data: LottoData,
    pub source: ResultSource,
}

impl SearchResults {
    /// Whether only part of the history was searched.
    pub fn is_partial(&self) -> bool {
        self.source != ResultSource::Remote
    }
}
