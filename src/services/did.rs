use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::services::fetch::ArtifactInfo;
use crate::services::payload::ProviderPayload;
use crate::services::poller::{GenerationProvider, RemoteStatus, StatusReport};

const PROVIDER: &str = "d-id";

/// Largest image or audio file D-ID will fetch for a talk.
pub const MAX_INPUT_BYTES: usize = 9_500_000;

/// Client for D-ID talking-head renders driven by an audio track.
pub struct DidClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct TalkResponse {
    id: Option<String>,
    status: Option<String>,
    result_url: Option<String>,
    error: Option<Value>,
}

/// Body for `POST /talks`. Resolution is left to the provider default.
pub fn talk_payload(image_url: &str, audio_url: &str) -> ProviderPayload {
    ProviderPayload::new(
        "talks",
        json!({
            "source_url": image_url,
            "script": { "type": "audio", "audio_url": audio_url },
        }),
    )
}

fn check_input(
    info: &ArtifactInfo,
    what: &'static str,
    field: &str,
    media: &str,
) -> Result<(), PipelineError> {
    if let Some(size) = info.size {
        if size as usize > MAX_INPUT_BYTES {
            return Err(PipelineError::PayloadTooLarge {
                what,
                size: size as usize,
                limit: MAX_INPUT_BYTES,
            });
        }
    }
    if let Some(content_type) = &info.content_type {
        if !content_type.contains(media) {
            return Err(PipelineError::Validation(format!(
                "{field} content-type '{content_type}' is not {media}/*"
            )));
        }
    }
    Ok(())
}

/// Reject talk inputs D-ID would refuse, before any credits are spent.
/// Headers a host did not send are not held against it.
pub fn check_talk_inputs(image: &ArtifactInfo, audio: &ArtifactInfo) -> Result<(), PipelineError> {
    check_input(audio, "Talk audio", "audio_url", "audio")?;
    check_input(image, "Talk image", "image_url", "image")
}

impl DidClient {
    pub fn new(http: Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// `Basic` credential: D-ID accepts the raw key (or `key:secret`) base64-encoded.
    fn authorization(&self) -> Result<String, PipelineError> {
        let key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PipelineError::Configuration("DID_API_KEY not set".to_string()))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(key.as_bytes());
        Ok(format!("Basic {encoded}"))
    }
}

fn map_status(status: &str) -> RemoteStatus {
    match status {
        "done" => RemoteStatus::Succeeded,
        "error" | "rejected" => RemoteStatus::Failed,
        _ => RemoteStatus::Running,
    }
}

/// D-ID errors arrive as `{kind, description}`.
fn error_text(error: Option<Value>) -> Option<String> {
    match error? {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Object(fields) => fields
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(fields).to_string())),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl GenerationProvider for DidClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn submit(&self, payload: &ProviderPayload) -> Result<String, PipelineError> {
        let authorization = self.authorization()?;
        let url = format!("{}/{}", self.base_url, payload.target());

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
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

        let talk: Option<TalkResponse> = serde_json::from_str(&body).ok();
        match talk.and_then(|t| t.id).filter(|id| !id.is_empty()) {
            Some(id) => Ok(id),
            None => Err(PipelineError::Submission {
                provider: PROVIDER,
                status: status.as_u16(),
                body: format!("no talk id in response: {body}"),
            }),
        }
    }

    async fn status(&self, remote_id: &str) -> Result<StatusReport, PipelineError> {
        let authorization = self.authorization()?;
        let url = format!("{}/talks/{}", self.base_url, remote_id);

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, authorization)
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

        let talk: TalkResponse = response
            .json()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;

        Ok(StatusReport {
            status: map_status(talk.status.as_deref().unwrap_or("created")),
            output: talk.result_url.map(Value::String),
            error: error_text(talk.error),
            logs: None,
        })
    }
}
