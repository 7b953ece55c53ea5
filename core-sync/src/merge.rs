//! Merging freshly fetched draws into the cached result set.

use bridge_traits::remote::LottoResult;
use chrono::NaiveDate;
use std::collections::HashSet;

/// Merge `fresh` records into `existing`.
///
/// Fresh records go first so that, for a duplicated `(draw_num, date)`
/// identity, the fresh copy is the one kept. The merged set is then stably
/// sorted newest first. Merging nothing into an already merged set returns it
/// unchanged.
pub fn merge_results(fresh: Vec<LottoResult>, existing: Vec<LottoResult>) -> Vec<LottoResult> {
    let mut seen = HashSet::with_capacity(fresh.len() + existing.len());
    let mut merged: Vec<LottoResult> = fresh
        .into_iter()
        .chain(existing)
        .filter(|result| seen.insert(result.identity()))
        .collect();

    merged.sort_by(|a, b| b.date.cmp(&a.date));
    merged
}

/// Most recent draw date held in `results`.
pub fn watermark(results: &[LottoResult]) -> Option<NaiveDate> {
    results.iter().map(|r| r.date).max()
}

pub fn is_sorted_newest_first(results: &[LottoResult]) -> bool {
    results.windows(2).all(|pair| pair[0].date >= pair[1].date)
}
