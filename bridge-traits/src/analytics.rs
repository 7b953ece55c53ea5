//! Analytics Event Emission
//!
//! Only the emission contract lives here. Aggregation and reporting belong to
//! whatever the host plugs in behind [`AnalyticsSink`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of user action being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CheckResult,
    Search,
    ViewHistory,
    SyncData,
    ViewDetail,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::CheckResult => "check_result",
            ActionType::Search => "search",
            ActionType::ViewHistory => "view_history",
            ActionType::SyncData => "sync_data",
            ActionType::ViewDetail => "view_detail",
        }
    }
}

/// A single reported action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotteryAction {
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_data: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl LotteryAction {
    pub fn new(action_type: ActionType, timestamp: DateTime<Utc>) -> Self {
        Self {
            action_type,
            action_data: None,
            timestamp,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.action_data = Some(data);
        self
    }
}

/// Analytics sink trait
///
/// Callers treat `track` as fire-and-forget: an error is logged and dropped,
/// never propagated into the operation that produced the action.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(&self, action: LotteryAction) -> Result<()>;
}
