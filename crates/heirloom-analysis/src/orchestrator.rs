//! Per-item analysis pipeline.
//!
//! An item moves `queued -> processing -> done | error`. Steps run strictly in
//! order and the first failing step ends the run. Every run starts from the
//! first step, whatever the item's previous state. A `processing` row left by
//! a crashed run stays as it is until someone re-runs the item; `list_stale`
//! finds such rows.

use futures::future::join_all;
use heirloom_core::config::AnalysisConfig;
use heirloom_core::constants::{DEFAULT_ANALYSIS_STEPS, DEFAULT_MAX_CONCURRENT_ITEMS};
use heirloom_core::{AnalysisState, AnalysisStatus, AppError, StepName};
use heirloom_db::AnalysisStateRepository;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::invoker::AnalysisStepInvoker;
use crate::tracker::AnalysisTracker;

/// What a single run ended with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineOutcome {
    pub item_id: Uuid,
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<StepName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineOutcome {
    pub fn is_done(&self) -> bool {
        self.status == AnalysisStatus::Done
    }
}

pub struct AnalysisOrchestrator {
    invoker: AnalysisStepInvoker,
    states: Arc<dyn AnalysisStateRepository>,
    tracker: AnalysisTracker,
    steps: Vec<StepName>,
    max_concurrent_items: usize,
}

impl AnalysisOrchestrator {
    /// Orchestrator running the default `audio`, `images`, `summary` sequence.
    pub fn new(invoker: AnalysisStepInvoker, states: Arc<dyn AnalysisStateRepository>) -> Self {
        let steps = DEFAULT_ANALYSIS_STEPS
            .iter()
            .filter_map(|s| s.parse::<StepName>().ok())
            .collect();
        Self {
            invoker,
            tracker: AnalysisTracker::new(states.clone()),
            states,
            steps,
            max_concurrent_items: DEFAULT_MAX_CONCURRENT_ITEMS,
        }
    }

    pub fn from_config(
        invoker: AnalysisStepInvoker,
        states: Arc<dyn AnalysisStateRepository>,
        config: &AnalysisConfig,
    ) -> Self {
        Self::new(invoker, states)
            .with_steps(config.steps.clone())
            .with_max_concurrent_items(config.max_concurrent_items)
    }

    pub fn with_steps(mut self, steps: Vec<StepName>) -> Self {
        self.steps = steps;
        self
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_concurrent_items(mut self, max: usize) -> Self {
        self.max_concurrent_items = max.max(1);
        self
    }

    pub fn steps(&self) -> &[StepName] {
        &self.steps
    }

    pub async fn request_analysis(&self, item_id: Uuid) -> Result<AnalysisState, AppError> {
        self.tracker.request_analysis(item_id).await
    }

    pub async fn status(&self, item_id: Uuid) -> Result<AnalysisState, AppError> {
        self.tracker.status(item_id).await
    }

    pub async fn list_stale(&self, older_than: Duration) -> Result<Vec<AnalysisState>, AppError> {
        self.tracker.list_stale(older_than).await
    }

    /// Run the full step sequence for one item.
    ///
    /// A failing step is not an `Err`: it is persisted and returned in the
    /// outcome. `Err` means the state could not be read or written.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, item_id: Uuid) -> Result<PipelineOutcome, AppError> {
        let start = std::time::Instant::now();

        if let Some(previous) = self.states.get(item_id).await? {
            if previous.status == AnalysisStatus::Processing {
                tracing::warn!(
                    since = %previous.updated_at,
                    "Item still marked processing; re-running from the first step"
                );
            } else {
                tracing::debug!(previous = %previous.status, "Re-running analysis");
            }
        }

        self.states.save(&AnalysisState::processing(item_id)).await?;
        tracing::info!(steps = self.steps.len(), "Analysis started");

        for step in &self.steps {
            let outcome = self.invoker.invoke(step, item_id).await;
            if outcome.ok {
                continue;
            }

            let error = outcome
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "unknown error".to_string());
            let state = AnalysisState::failed(item_id, step, &error);
            self.states.save(&state).await?;

            tracing::error!(
                step = %step,
                error = %error,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Analysis failed; remaining steps skipped"
            );

            return Ok(PipelineOutcome {
                item_id,
                status: AnalysisStatus::Error,
                failed_step: Some(step.clone()),
                error: Some(error),
            });
        }

        self.states.save(&AnalysisState::done(item_id)).await?;
        tracing::info!(
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Analysis completed"
        );

        Ok(PipelineOutcome {
            item_id,
            status: AnalysisStatus::Done,
            failed_step: None,
            error: None,
        })
    }

    /// Run several items concurrently, at most `max_concurrent_items` at a time.
    /// Results come back in input order.
    pub async fn run_many(&self, item_ids: &[Uuid]) -> Vec<Result<PipelineOutcome, AppError>> {
        let semaphore = Semaphore::new(self.max_concurrent_items);

        let runs = item_ids.iter().map(|&item_id| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| AppError::Internal(format!("Semaphore closed: {}", e)))?;
                self.run(item_id).await
            }
        });

        join_all(runs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::transport::{StepTransport, TransportError};
    use async_trait::async_trait;
    use chrono::Utc;
    use heirloom_db::InMemoryAnalysisStateRepository;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Fails every call to the named steps, succeeds otherwise.
    #[derive(Default)]
    struct FakeSteps {
        failing: HashSet<String>,
        calls: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeSteps {
        fn failing(steps: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                failing: steps.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StepTransport for FakeSteps {
        async fn call(&self, step: &StepName, _item_id: Uuid) -> Result<(), TransportError> {
            self.calls.lock().unwrap().push(step.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(step.as_str()) {
                Err(TransportError::Remote {
                    status: 502,
                    message: format!("{} backend unavailable", step),
                })
            } else {
                Ok(())
            }
        }
    }

    fn orchestrator(
        transport: Arc<FakeSteps>,
    ) -> (AnalysisOrchestrator, Arc<InMemoryAnalysisStateRepository>) {
        let states = Arc::new(InMemoryAnalysisStateRepository::new());
        let invoker = AnalysisStepInvoker::new(transport).with_retry_policy(RetryPolicy::new(
            Duration::from_millis(1),
            Duration::from_millis(2),
        ));
        (AnalysisOrchestrator::new(invoker, states.clone()), states)
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_steps_succeed() {
        let transport = FakeSteps::failing(&[]);
        let (orchestrator, states) = orchestrator(transport.clone());
        let item = Uuid::new_v4();

        let outcome = orchestrator.run(item).await.unwrap();
        assert!(outcome.is_done());
        assert_eq!(transport.calls(), vec!["audio", "images", "summary"]);

        let state = states.get(item).await.unwrap().unwrap();
        assert_eq!(state.status, AnalysisStatus::Done);
        assert_eq!(state.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_step_failure_stops_pipeline() {
        let transport = FakeSteps::failing(&["images"]);
        let (orchestrator, states) = orchestrator(transport.clone());
        let item = Uuid::new_v4();

        let outcome = orchestrator.run(item).await.unwrap();
        assert_eq!(outcome.status, AnalysisStatus::Error);
        assert_eq!(outcome.failed_step.as_ref().map(|s| s.as_str()), Some("images"));
        assert_eq!(
            outcome.error.as_deref(),
            Some("images backend unavailable (retry)")
        );

        // audio once, images twice (initial + retry), summary never.
        assert_eq!(transport.calls(), vec!["audio", "images", "images"]);
        let distinct: HashSet<String> = transport.calls().into_iter().collect();
        assert_eq!(distinct.len(), 2);

        let state = states.get(item).await.unwrap().unwrap();
        assert_eq!(state.status, AnalysisStatus::Error);
        assert_eq!(
            state.last_error.as_deref(),
            Some("failed at images: images backend unavailable (retry)")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rerun_clears_previous_error() {
        let item = Uuid::new_v4();
        let states = Arc::new(InMemoryAnalysisStateRepository::new());
        let step: StepName = "summary".parse().unwrap();
        states
            .save(&AnalysisState::failed(item, &step, "old failure"))
            .await
            .unwrap();

        let transport = FakeSteps::failing(&[]);
        let invoker = AnalysisStepInvoker::new(transport.clone());
        let orchestrator = AnalysisOrchestrator::new(invoker, states.clone());

        orchestrator.run(item).await.unwrap();
        let state = orchestrator.status(item).await.unwrap();
        assert_eq!(state.status, AnalysisStatus::Done);
        assert_eq!(state.last_error, None);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_defaults_to_queued() {
        let (orchestrator, states) = orchestrator(FakeSteps::failing(&[]));
        let item = Uuid::new_v4();

        let state = orchestrator.status(item).await.unwrap();
        assert_eq!(state.status, AnalysisStatus::Queued);
        assert!(states.get(item).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_analysis_does_not_reset_finished_item() {
        let (orchestrator, _) = orchestrator(FakeSteps::failing(&[]));
        let item = Uuid::new_v4();

        let requested = orchestrator.request_analysis(item).await.unwrap();
        assert_eq!(requested.status, AnalysisStatus::Queued);

        orchestrator.run(item).await.unwrap();
        let requested = orchestrator.request_analysis(item).await.unwrap();
        assert_eq!(requested.status, AnalysisStatus::Done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_steps_run_in_given_order() {
        let transport = FakeSteps::failing(&[]);
        let (orchestrator, _) = orchestrator(transport.clone());
        let orchestrator = orchestrator.with_steps(vec![
            "summary".parse().unwrap(),
            "audio".parse().unwrap(),
        ]);

        orchestrator.run(Uuid::new_v4()).await.unwrap();
        assert_eq!(transport.calls(), vec!["summary", "audio"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_many_bounds_concurrency_and_keeps_order() {
        let transport = FakeSteps::failing(&[]);
        let (orchestrator, _) = orchestrator(transport.clone());
        let orchestrator = orchestrator.with_max_concurrent_items(2);
        let items: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();

        let results = orchestrator.run_many(&items).await;

        let ids: Vec<Uuid> = results
            .iter()
            .map(|r| r.as_ref().unwrap().item_id)
            .collect();
        assert_eq!(ids, items);
        assert!(results.iter().all(|r| r.as_ref().unwrap().is_done()));
        assert_eq!(transport.calls().len(), 15);
        assert_eq!(transport.peak_in_flight.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_list_stale_reports_abandoned_processing_rows() {
        let (orchestrator, states) = orchestrator(FakeSteps::failing(&[]));
        let item = Uuid::new_v4();
        let mut abandoned = AnalysisState::processing(item);
        abandoned.updated_at = Utc::now() - chrono::Duration::hours(1);
        states.save(&abandoned).await.unwrap();
        states
            .save(&AnalysisState::processing(Uuid::new_v4()))
            .await
            .unwrap();

        let stale = orchestrator
            .list_stale(Duration::from_secs(900))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].item_id, item);
    }
}
