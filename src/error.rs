use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::time::Duration;

use crate::services::metadata::MetadataError;
use crate::services::muxer::MuxError;
use crate::services::storage::StorageError;

/// Every failure a pipeline run can surface to its caller.
///
/// Variants split into caller faults (fix the request and resend) and
/// upstream faults (a provider or collaborator failed). Nothing here is
/// retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported model '{requested}'. Supported models: {}", .supported.join(", "))]
    UnsupportedModel {
        requested: String,
        supported: Vec<String>,
    },

    /// The request is well-formed but targets the wrong pipeline shape.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("{provider} rejected the submission ({status}): {body}")]
    Submission {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an error ({status}): {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Request to {provider} failed: {source}")]
    Transport {
        provider: &'static str,
        source: reqwest::Error,
    },

    #[error("{provider} job {remote_id} failed: {error}")]
    JobFailed {
        provider: &'static str,
        remote_id: String,
        error: String,
        logs: Option<String>,
    },

    #[error("{provider} job {remote_id} succeeded but returned no usable output")]
    MissingOutput {
        provider: &'static str,
        remote_id: String,
    },

    #[error("{provider} job {remote_id} still running after {waited:?}")]
    PollTimeout {
        provider: &'static str,
        remote_id: String,
        waited: Duration,
    },

    #[error("{what} is too large: {size} bytes (limit {limit})")]
    PayloadTooLarge {
        what: &'static str,
        size: usize,
        limit: usize,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Muxing(MuxError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

impl From<MuxError> for PipelineError {
    fn from(err: MuxError) -> Self {
        match err {
            MuxError::InputTooLarge { size, limit, .. } => Self::PayloadTooLarge {
                what: "Mux input",
                size,
                limit,
            },
            other => Self::Muxing(other),
        }
    }
}

impl PipelineError {
    pub fn transport(provider: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Transport { provider, source }
    }

    /// True when the caller can fix the failure by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedModel { .. }
                | Self::Precondition(_)
                | Self::PayloadTooLarge { .. }
        )
    }

    /// Short stage label used for metrics and logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation(_) | Self::UnsupportedModel { .. } | Self::Precondition(_) => {
                "validation"
            }
            Self::Submission { .. } => "submission",
            Self::Provider { .. } | Self::Transport { .. } => "provider",
            Self::JobFailed { .. } | Self::MissingOutput { .. } | Self::PollTimeout { .. } => {
                "generation"
            }
            Self::PayloadTooLarge { .. } => "size_limit",
            Self::Storage(_) => "storage",
            Self::Muxing(_) => "muxing",
            Self::Metadata(_) => "metadata",
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::UnsupportedModel { .. } => (StatusCode::BAD_REQUEST, "UNSUPPORTED_MODEL"),
            Self::Precondition(_) => (StatusCode::UNPROCESSABLE_ENTITY, "PRECONDITION_FAILED"),
            Self::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::Submission { .. } => (StatusCode::BAD_GATEWAY, "SUBMISSION_ERROR"),
            Self::Provider { .. } | Self::Transport { .. } => {
                (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR")
            }
            Self::JobFailed { .. } => (StatusCode::BAD_GATEWAY, "JOB_FAILED"),
            Self::MissingOutput { .. } => (StatusCode::BAD_GATEWAY, "MISSING_OUTPUT"),
            Self::PollTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "POLL_TIMEOUT"),
            Self::Storage(_) => (StatusCode::BAD_GATEWAY, "STORAGE_ERROR"),
            Self::Muxing(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MUXING_ERROR"),
            Self::Metadata(_) => (StatusCode::INTERNAL_SERVER_ERROR, "METADATA_ERROR"),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, stage = self.stage(), "Pipeline failed");
        } else {
            tracing::warn!(error = %self, stage = self.stage(), "Request rejected");
        }

        let mut body = json!({
            "error": self.to_string(),
            "code": code,
        });
        if let Self::JobFailed { logs: Some(logs), .. } = &self {
            body["logs"] = json!(logs);
        }

        (status, axum::Json(body)).into_response()
    }
}
