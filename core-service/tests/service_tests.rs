//! Integration tests for the service façade
//!
//! These tests verify:
//! - Remote pagination and its cache fallback
//! - Search classification against the remote and the loaded-page fallback
//! - Offline-first reads with background refresh
//! - Cache diagnostics and status snapshots
//! - Analytics emission

use async_trait::async_trait;
use bridge_traits::{
    analytics::{ActionType, AnalyticsSink, LotteryAction},
    error::{BridgeError, Result as BridgeResult},
    network::{ConnectivityProbe, NetworkStatus},
    remote::{Condition, DrawNumbers, LottoResult, RemoteResultSource, ResultQuery},
    storage::{SettingsStore, SettingsTransaction},
    time::Clock,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use core_service::{
    CoreEvent, LottoConfig, LottoData, LottoService, ResultSource, ServiceError,
};
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct MemorySettings {
    values: Arc<Mutex<HashMap<String, String>>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set_i64(&self, key: &str, value: i64) -> BridgeResult<()> {
        self.set_string(key, &value.to_string()).await
    }

    async fn get_i64(&self, key: &str) -> BridgeResult<Option<i64>> {
        Ok(self
            .get_string(key)
            .await?
            .and_then(|raw| raw.parse().ok()))
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn begin_transaction(&self) -> BridgeResult<Box<dyn SettingsTransaction + Send>> {
        Ok(Box::new(MemoryTransaction {
            values: self.values.clone(),
            staged: Vec::new(),
        }))
    }
}

struct MemoryTransaction {
    values: Arc<Mutex<HashMap<String, String>>>,
    staged: Vec<(String, Option<String>)>,
}

#[async_trait]
impl SettingsTransaction for MemoryTransaction {
    async fn set_string(&mut self, key: &str, value: &str) -> BridgeResult<()> {
        self.staged.push((key.to_string(), Some(value.to_string())));
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> BridgeResult<()> {
        self.staged.push((key.to_string(), None));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> BridgeResult<()> {
        let mut values = self.values.lock().unwrap();
        for (key, value) in self.staged {
            match value {
                Some(value) => values.insert(key, value),
                None => values.remove(&key),
            };
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> BridgeResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeRemote {
    records: Mutex<Vec<LottoResult>>,
    failing: AtomicBool,
}

impl FakeRemote {
    fn with_records(records: Vec<LottoResult>) -> Self {
        let remote = Self::default();
        *remote.records.lock().unwrap() = records;
        remote
    }

    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> BridgeResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BridgeError::OperationFailed("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteResultSource for FakeRemote {
    async fn count(&self, conditions: &[Condition]) -> BridgeResult<u64> {
        self.check()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| conditions.iter().all(|c| c.matches(r)))
            .count() as u64)
    }

    async fn fetch(&self, query: &ResultQuery) -> BridgeResult<Vec<LottoResult>> {
        self.check()?;
        let mut matching: Vec<LottoResult> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect())
    }
}

struct OnlineProbe;

#[async_trait]
impl ConnectivityProbe for OnlineProbe {
    async fn probe(&self) -> NetworkStatus {
        NetworkStatus::Online
    }
}

mock! {
    Analytics {}

    #[async_trait]
    impl AnalyticsSink for Analytics {
        async fn track(&self, action: LotteryAction) -> BridgeResult<()>;
    }
}

/// Forwards every action to the test body.
struct ChannelAnalytics(mpsc::UnboundedSender<LotteryAction>);

#[async_trait]
impl AnalyticsSink for ChannelAnalytics {
    async fn track(&self, action: LotteryAction) -> BridgeResult<()> {
        let _ = self.0.send(action);
        Ok(())
    }
}

/// Never finishes tracking.
struct StalledAnalytics;

#[async_trait]
impl AnalyticsSink for StalledAnalytics {
    async fn track(&self, _action: LotteryAction) -> BridgeResult<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 7, 0, 0).unwrap()
    }
}

// ============================================================================
// Harness
// ============================================================================

fn draw(draw_num: i64, date: &str, numbers: &str, power_ball: i64) -> LottoResult {
    LottoResult {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        draw_num,
        numbers: DrawNumbers::parse(numbers),
        power_ball,
        multiplier: 2,
        jackpot: 3_000_000,
        wins: 1,
    }
}

fn history() -> Vec<LottoResult> {
    vec![
        draw(101, "2023-12-27", "01|05|11|22|33", 4),
        draw(102, "2023-12-30", "02|06|12|23|34", 9),
        draw(103, "2024-01-03", "03|07|13|24|35", 7),
        draw(104, "2024-01-06", "04|08|14|25|36", 1),
        draw(105, "2024-02-10", "05|09|15|26|37", 3),
    ]
}

struct Harness {
    service: LottoService,
    remote: Arc<FakeRemote>,
    settings: Arc<MemorySettings>,
}

fn harness_with(remote: FakeRemote, analytics: Option<Arc<dyn AnalyticsSink>>) -> Harness {
    let remote = Arc::new(remote);
    let settings = Arc::new(MemorySettings::default());

    let mut builder = LottoConfig::builder()
        .settings_store(settings.clone())
        .remote_source(remote.clone())
        .connectivity_probe(Arc::new(OnlineProbe))
        .clock(Arc::new(FixedClock));
    if let Some(analytics) = analytics {
        builder = builder.analytics_sink(analytics);
    }

    Harness {
        service: LottoService::new(builder.build().unwrap()).unwrap(),
        remote,
        settings,
    }
}

fn harness(remote: FakeRemote) -> Harness {
    harness_with(remote, None)
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_remote_pages_are_authoritative() {
    let h = harness(FakeRemote::with_records(history()));

    let page = h.service.get_results_paginated(2, 2).await.unwrap();
    assert_eq!(page.source, ResultSource::Remote);
    assert_eq!(page.total, 5);
    assert!(page.has_more);
    assert_eq!(page.current_page, 2);
    let keys: Vec<i64> = page.results.iter().map(|r| r.draw_num).collect();
    assert_eq!(keys, vec![103, 102]);

    let last = h.service.get_results_paginated(3, 2).await.unwrap();
    assert_eq!(last.results.len(), 1);
    assert!(!last.has_more);
}

#[tokio::test]
async fn test_pagination_falls_back_to_cache_totals() {
    let h = harness(FakeRemote::with_records(history()));
    h.service.sync_results().await.unwrap();
    h.remote.fail(true);

    let page = h.service.get_results_paginated(2, 2).await.unwrap();
    assert_eq!(page.source, ResultSource::Cache);
    assert_eq!(page.total, 5);
    assert!(page.has_more);
    let keys: Vec<i64> = page.results.iter().map(|r| r.draw_num).collect();
    assert_eq!(keys, vec![103, 102]);

    let last = h.service.get_results_paginated(3, 2).await.unwrap();
    assert_eq!(last.results.len(), 1);
    assert!(!last.has_more);

    let beyond = h.service.get_results_paginated(9, 2).await.unwrap();
    assert!(beyond.results.is_empty());
    assert_eq!(beyond.total, 5);
    assert!(!beyond.has_more);
}

#[tokio::test]
async fn test_pagination_without_cache_serves_empty_page() {
    let h = harness(FakeRemote::with_records(history()));
    h.remote.fail(true);

    let page = h.service.get_results_paginated(3, 20).await.unwrap();
    assert_eq!(page.source, ResultSource::Cache);
    assert!(page.results.is_empty());
    assert_eq!(page.total, 0);
    assert!(!page.has_more);
    assert_eq!(page.current_page, 3);
}

#[tokio::test]
async fn test_invalid_page_arguments() {
    let h = harness(FakeRemote::default());

    assert!(matches!(
        h.service.get_results_paginated(0, 20).await,
        Err(ServiceError::InvalidArgument(_))
    ));
    assert!(matches!(
        h.service.get_results_paginated(1, 5000).await,
        Err(ServiceError::InvalidArgument(_))
    ));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_classifies_queries() {
    let h = harness(FakeRemote::with_records(history()));

    let numeric = h.service.search("7").await.unwrap();
    let keys: Vec<i64> = numeric.results.iter().map(|r| r.draw_num).collect();
    // power ball 7 on 103, a 7 among the numbers of 103 and 105
    assert_eq!(keys, vec![105, 103]);

    let year = h.service.search("2023").await.unwrap();
    assert_eq!(year.results.len(), 2);

    let month = h.service.search("2024-01").await.unwrap();
    let keys: Vec<i64> = month.results.iter().map(|r| r.draw_num).collect();
    assert_eq!(keys, vec![104, 103]);

    let day = h.service.search("2024-02-10").await.unwrap();
    assert_eq!(day.results[0].draw_num, 105);

    let text = h.service.search("26|37").await.unwrap();
    assert_eq!(text.results.len(), 1);

    let everything = h.service.search("").await.unwrap();
    assert_eq!(everything.results.len(), 5);
}

#[tokio::test]
async fn test_search_falls_back_to_loaded_page_only() {
    let h = harness(FakeRemote::with_records(history()));
    h.service.get_results_paginated(1, 2).await.unwrap();
    h.remote.fail(true);

    let found = h.service.search_detailed("2024").await.unwrap();
    assert_eq!(found.source, ResultSource::LoadedPage);
    assert!(found.is_partial());
    // 103 is a 2024 draw but was not on the loaded page
    let keys: Vec<i64> = found.data.results.iter().map(|r| r.draw_num).collect();
    assert_eq!(keys, vec![105, 104]);
}

#[tokio::test]
async fn test_search_without_loaded_page_fails() {
    let h = harness(FakeRemote::with_records(history()));
    h.remote.fail(true);

    assert!(h.service.search("2024").await.is_err());
}

// ============================================================================
// Offline-first reads
// ============================================================================

#[tokio::test]
async fn test_get_results_without_cache_waits_for_sync() {
    let h = harness(FakeRemote::with_records(history()));

    let data = h.service.get_results().await.unwrap();
    assert_eq!(data.results.len(), 5);
}

#[tokio::test]
async fn test_get_results_serves_cache_and_refreshes_in_background() {
    let h = harness(FakeRemote::with_records(history()[..3].to_vec()));
    h.service.sync_results().await.unwrap();
    h.remote
        .records
        .lock()
        .unwrap()
        .extend(history()[3..].iter().cloned());

    let mut events = h
        .service
        .events()
        .filter(|event| matches!(event, CoreEvent::DataChanged(_)));

    let cached = h.service.get_results().await.unwrap();
    assert_eq!(cached.results.len(), 3);

    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("background sync did not publish")
        .unwrap();
    match event {
        CoreEvent::DataChanged(data) => assert_eq!(data.results.len(), 5),
        other => panic!("unexpected event {:?}", other),
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

#[tokio::test]
async fn test_cache_info_prefers_remote_count() {
    let h = harness(FakeRemote::with_records(history()[..2].to_vec()));
    h.service.sync_results().await.unwrap();
    h.remote.records.lock().unwrap().extend(history()[2..].iter().cloned());

    let info = h.service.get_cache_info().await;
    assert!(info.has_cache);
    assert_eq!(info.total_records, 5);
    assert!(info.cache_size > 0);
    assert_eq!(info.sync_attempts, 0);
    assert_eq!(info.last_sync, Some(FixedClock.now()));

    h.remote.fail(true);
    assert_eq!(h.service.get_cache_info().await.total_records, 2);
}

#[tokio::test]
async fn test_clear_cache_resets_everything() {
    let h = harness(FakeRemote::with_records(history()));
    h.service.sync_results().await.unwrap();

    h.service.clear_cache().await.unwrap();

    h.remote.fail(true);
    let info = h.service.get_cache_info().await;
    assert!(!info.has_cache);
    assert_eq!(info.last_sync, None);
    assert_eq!(info.cache_size, 0);
    assert_eq!(info.total_records, 0);
}

#[tokio::test]
async fn test_status_uses_snapshot_time_when_last_sync_missing() {
    let h = harness(FakeRemote::default());
    let updated = Utc.with_ymd_and_hms(2024, 3, 3, 3, 3, 3).unwrap();
    let data = LottoData::new(updated, history());
    h.settings
        .set_string("lotto_cache", &serde_json::to_string(&data).unwrap())
        .await
        .unwrap();

    let status = h.service.get_current_sync_status().await;
    assert!(status.has_cache);
    assert!(status.is_online);
    assert!(!status.is_syncing);
    assert_eq!(status.last_sync_time, Some(updated));
}

#[tokio::test]
async fn test_connection_check() {
    let h = harness(FakeRemote::default());
    assert!(h.service.test_connection().await);

    h.remote.fail(true);
    assert!(!h.service.test_connection().await);
}

// ============================================================================
// Analytics
// ============================================================================

async fn next_action(rx: &mut mpsc::UnboundedReceiver<LotteryAction>) -> LotteryAction {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("action was not tracked")
        .unwrap()
}

#[tokio::test]
async fn test_sync_and_search_are_tracked() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let h = harness_with(
        FakeRemote::with_records(history()),
        Some(Arc::new(ChannelAnalytics(tx))),
    );

    h.service.sync_results().await.unwrap();
    h.service.search("2024").await.unwrap();

    let mut actions = vec![next_action(&mut rx).await, next_action(&mut rx).await];
    actions.sort_by_key(|action| action.action_type.as_str());

    assert_eq!(actions[0].action_type, ActionType::Search);
    assert_eq!(actions[0].action_data.as_ref().unwrap()["query"], "2024");
    assert_eq!(actions[0].action_data.as_ref().unwrap()["results"], 3);
    assert_eq!(actions[1].action_type, ActionType::SyncData);
    assert_eq!(actions[1].action_data.as_ref().unwrap()["records"], 5);
    assert_eq!(actions[1].action_data.as_ref().unwrap()["success"], true);
}

#[tokio::test]
async fn test_analytics_failures_are_ignored() {
    let mut analytics = MockAnalytics::new();
    analytics
        .expect_track()
        .returning(|_| Err(BridgeError::OperationFailed("collector down".into())));

    let h = harness_with(FakeRemote::with_records(history()), Some(Arc::new(analytics)));
    let page = h.service.get_results_paginated(1, 10).await.unwrap();
    assert_eq!(page.results.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_analytics_sink_does_not_delay_callers() {
    let h = harness_with(FakeRemote::with_records(history()), Some(Arc::new(StalledAnalytics)));

    let found = tokio::time::timeout(Duration::from_secs(1), h.service.search("2024"))
        .await
        .expect("search waited on the analytics sink")
        .unwrap();
    assert_eq!(found.results.len(), 3);

    let page = tokio::time::timeout(Duration::from_secs(1), h.service.get_results_paginated(1, 2))
        .await
        .expect("page read waited on the analytics sink")
        .unwrap();
    assert_eq!(page.results.len(), 2);
}
