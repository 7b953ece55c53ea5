//! Analytics sink that records actions in the tracing stream

use async_trait::async_trait;
use bridge_traits::{
    analytics::{AnalyticsSink, LotteryAction},
    error::Result,
};
use tracing::info;

/// Writes each action as a structured `info!` event under the
/// `lotto::analytics` target. Useful on desktop where no analytics back-end is
/// wired in, and in development to see what would be reported.
#[derive(Debug, Default, Clone)]
pub struct TracingAnalyticsSink;

impl TracingAnalyticsSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AnalyticsSink for TracingAnalyticsSink {
    async fn track(&self, action: LotteryAction) -> Result<()> {
        let data = action
            .action_data
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();

        info!(
            target: "lotto::analytics",
            action = action.action_type.as_str(),
            data = %data,
            at = %action.timestamp.to_rfc3339(),
            "User action"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::analytics::ActionType;
    use chrono::Utc;

    #[tokio::test]
    async fn test_track_never_fails() {
        let sink = TracingAnalyticsSink::new();
        let action = LotteryAction::new(ActionType::Search, Utc::now())
            .with_data(serde_json::json!({ "query": "2024" }));

        assert!(sink.track(action).await.is_ok());
    }
}
