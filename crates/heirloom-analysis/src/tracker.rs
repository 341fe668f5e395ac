//! Read and queue access to persisted analysis state.
//!
//! Needs only the state repository, so status queries work without a step
//! endpoint configured.

use chrono::Utc;
use heirloom_core::{AnalysisState, AppError};
use heirloom_db::AnalysisStateRepository;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct AnalysisTracker {
    states: Arc<dyn AnalysisStateRepository>,
}

impl AnalysisTracker {
    pub fn new(states: Arc<dyn AnalysisStateRepository>) -> Self {
        Self { states }
    }

    /// Record that analysis was requested. An existing state is left untouched.
    pub async fn request_analysis(&self, item_id: Uuid) -> Result<AnalysisState, AppError> {
        self.states
            .insert_if_absent(&AnalysisState::queued(item_id))
            .await
    }

    /// Persisted state of the item; `queued` if nothing was recorded yet.
    pub async fn status(&self, item_id: Uuid) -> Result<AnalysisState, AppError> {
        Ok(self
            .states
            .get(item_id)
            .await?
            .unwrap_or_else(|| AnalysisState::queued(item_id)))
    }

    /// Items stuck in `processing` for longer than `older_than`.
    pub async fn list_stale(&self, older_than: Duration) -> Result<Vec<AnalysisState>, AppError> {
        let older_than = chrono::Duration::from_std(older_than)
            .map_err(|e| AppError::InvalidInput(format!("stale threshold out of range: {}", e)))?;
        self.states.list_stale(Utc::now() - older_than).await
    }
}
