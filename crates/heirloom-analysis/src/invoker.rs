//! Reliable invocation of a single named analysis step.

use heirloom_core::config::AnalysisConfig;
use heirloom_core::constants::DEFAULT_STEP_TIMEOUT_MS;
use heirloom_core::StepName;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::retry::RetryPolicy;
use crate::transport::{StepTransport, TransportError};

/// Why a single attempt failed.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("timed out after {0}ms")]
    TimedOut(u64),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result of a step after its retry budget is spent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Calls one remote step with a per-attempt timeout and a single jittered retry.
///
/// A success on the retry is indistinguishable from a first-try success.
/// A failure on the retry gets ` (retry)` appended to its message.
pub struct AnalysisStepInvoker {
    transport: Arc<dyn StepTransport>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl AnalysisStepInvoker {
    pub fn new(transport: Arc<dyn StepTransport>) -> Self {
        Self {
            transport,
            timeout: Duration::from_millis(DEFAULT_STEP_TIMEOUT_MS),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_config(transport: Arc<dyn StepTransport>, config: &AnalysisConfig) -> Self {
        Self::new(transport)
            .with_timeout(config.step_timeout())
            .with_retry_policy(RetryPolicy::from_config(config))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[tracing::instrument(skip(self, step), fields(step = %step))]
    pub async fn invoke(&self, step: &StepName, item_id: Uuid) -> StepOutcome {
        let start = std::time::Instant::now();

        match self
            .retry
            .run(|attempt| self.attempt(step, item_id, attempt))
            .await
        {
            Ok(()) => {
                tracing::info!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Analysis step succeeded"
                );
                StepOutcome::success()
            }
            Err(exhausted) => {
                let mut message = exhausted.error.to_string();
                if exhausted.was_retried() {
                    message.push_str(" (retry)");
                }
                tracing::error!(
                    error = %message,
                    attempts = exhausted.attempts,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Analysis step failed"
                );
                StepOutcome::failure(message)
            }
        }
    }

    /// One attempt. Dropping the transport future on timeout aborts the request.
    async fn attempt(&self, step: &StepName, item_id: Uuid, attempt: u32) -> Result<(), StepFailure> {
        tracing::debug!(attempt, "Calling analysis step");
        match tokio::time::timeout(self.timeout, self.transport.call(step, item_id)).await {
            Ok(result) => result.map_err(StepFailure::from),
            Err(_) => {
                tracing::warn!(
                    attempt,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Analysis step timed out"
                );
                Err(StepFailure::TimedOut(self.timeout.as_millis() as u64))
            }
        }
    }
}
