use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::PipelineError;
use crate::services::payload::ProviderPayload;
use crate::services::poller::{GenerationProvider, RemoteStatus, StatusReport};

const PROVIDER: &str = "replicate";

/// Client for Replicate model predictions.
pub struct ReplicateClient {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct PredictionResponse {
    id: Option<String>,
    status: Option<String>,
    output: Option<Value>,
    error: Option<Value>,
    logs: Option<String>,
}

impl ReplicateClient {
    pub fn new(http: Client, base_url: String, api_token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        }
    }

    fn token(&self) -> Result<&str, PipelineError> {
        self.api_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| PipelineError::Configuration("REPLICATE_API_TOKEN not set".to_string()))
    }
}

/// Replicate status vocabulary: `starting`, `processing`, `succeeded`,
/// `failed`, `canceled`, `aborted`.
fn map_status(status: &str) -> RemoteStatus {
    match status {
        "starting" | "processing" => RemoteStatus::Running,
        "succeeded" => RemoteStatus::Succeeded,
        "failed" => RemoteStatus::Failed,
        "canceled" | "cancelled" | "aborted" => RemoteStatus::Canceled,
        other => {
            tracing::warn!(provider = PROVIDER, status = other, "Unrecognized prediction status, still polling");
            RemoteStatus::Running
        }
    }
}

/// Replicate reports `error` as a string, but some models return an object.
fn error_text(error: Option<Value>) -> Option<String> {
    match error? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl GenerationProvider for ReplicateClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn submit(&self, payload: &ProviderPayload) -> Result<String, PipelineError> {
        let token = self.token()?;
        let url = format!("{}/models/{}/predictions", self.base_url, payload.target());

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(payload.body())
            .send()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;
        if !status.is_success() {
            return Err(PipelineError::Submission {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let prediction: PredictionResponse =
            serde_json::from_str(&body).map_err(|_| PipelineError::Submission {
                provider: PROVIDER,
                status: status.as_u16(),
                body: body.clone(),
            })?;

        match prediction.id.filter(|id| !id.is_empty()) {
            Some(id) => Ok(id),
            None => Err(PipelineError::Submission {
                provider: PROVIDER,
                status: status.as_u16(),
                body: format!("no prediction id in response: {body}"),
            }),
        }
    }

    async fn status(&self, remote_id: &str) -> Result<StatusReport, PipelineError> {
        let token = self.token()?;
        let url = format!("{}/predictions/{}", self.base_url, remote_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PipelineError::Provider {
                provider: PROVIDER,
                status: status.as_u16(),
                body,
            });
        }

        let prediction: PredictionResponse = response
            .json()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;

        Ok(StatusReport {
            status: map_status(prediction.status.as_deref().unwrap_or("starting")),
            output: prediction.output,
            error: error_text(prediction.error),
            logs: prediction.logs.filter(|logs| !logs.is_empty()),
        })
    }
}
