//! Transport for remote analysis steps.
//!
//! Each step is served at `{base_url}/analyze-{step}`. The endpoint takes
//! `{"itemId": "<uuid>"}` and answers `{"ok": bool, "error": string?}`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use heirloom_core::config::AnalysisConfig;
use heirloom_core::StepName;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The step answered, but with a non-2xx status or `ok: false`.
    #[error("{message}")]
    Remote { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid step response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// One call to one named step. No timeout or retry at this layer.
#[async_trait]
pub trait StepTransport: Send + Sync {
    async fn call(&self, step: &StepName, item_id: Uuid) -> Result<(), TransportError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepRequest {
    item_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct StepResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct HttpStepTransport {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpStepTransport {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client for analysis steps")?;

        let base_url: String = base_url.into();
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .context("ANALYSIS_BASE_URL not configured")?;
        Self::new(base_url, config.api_key.clone())
    }

    fn endpoint(&self, step: &StepName) -> String {
        format!("{}/analyze-{}", self.base_url, step)
    }
}

#[async_trait]
impl StepTransport for HttpStepTransport {
    async fn call(&self, step: &StepName, item_id: Uuid) -> Result<(), TransportError> {
        let mut request = self
            .http_client
            .post(self.endpoint(step))
            .json(&StepRequest { item_id });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let parsed = serde_json::from_str::<StepResponse>(&body);

        if !status.is_success() {
            let message = parsed
                .ok()
                .and_then(|r| r.error)
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| {
                    if body.trim().is_empty() {
                        format!("step returned HTTP {}", status.as_u16())
                    } else {
                        body.trim().to_string()
                    }
                });
            return Err(TransportError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = parsed.map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        if !parsed.ok {
            return Err(TransportError::Remote {
                status: status.as_u16(),
                message: parsed
                    .error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "step reported failure".to_string()),
            });
        }

        Ok(())
    }
}
