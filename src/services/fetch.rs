use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::header::HeaderMap;
use reqwest::Client;

use crate::error::PipelineError;

const PROVIDER: &str = "artifact-host";

/// What a host reports about a URL without sending the whole body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactInfo {
    pub status: u16,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}

/// Downloads provider outputs so they can be re-hosted, and inspects
/// caller-supplied URLs before they are handed to a provider.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError>;

    /// `HEAD`, falling back to a two-byte ranged `GET` for hosts that refuse it.
    async fn inspect(&self, url: &str) -> Result<ArtifactInfo, PipelineError>;
}

/// Total size from `Content-Range: bytes 0-1/<total>`, else `Content-Length`.
fn reported_size(headers: &HeaderMap) -> Option<u64> {
    let total = headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|range| range.rsplit_once('/'))
        .and_then(|(_, total)| total.trim().parse().ok());

    total.or_else(|| {
        headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|len| len.trim().parse().ok())
    })
}

fn artifact_info(status: u16, headers: &HeaderMap) -> ArtifactInfo {
    ArtifactInfo {
        status,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|t| !t.is_empty()),
        size: reported_size(headers).filter(|size| *size > 0),
    }
}

pub struct HttpFetcher {
    http: Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(http: Client, max_bytes: usize) -> Self {
        Self { http, max_bytes }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let response = self
            .http
            .get(url)
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

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(PipelineError::PayloadTooLarge {
                    what: "Generated artifact",
                    size: length as usize,
                    limit: self.max_bytes,
                });
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;
        if bytes.len() > self.max_bytes {
            return Err(PipelineError::PayloadTooLarge {
                what: "Generated artifact",
                size: bytes.len(),
                limit: self.max_bytes,
            });
        }
        tracing::debug!(url, bytes = bytes.len(), "Artifact downloaded");
        Ok(bytes.to_vec())
    }

    async fn inspect(&self, url: &str) -> Result<ArtifactInfo, PipelineError> {
        let head = self
            .http
            .head(url)
            .send()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;
        if head.status().as_u16() < 400 {
            return Ok(artifact_info(head.status().as_u16(), head.headers()));
        }

        let ranged = self
            .http
            .get(url)
            .header(RANGE, "bytes=0-1")
            .send()
            .await
            .map_err(PipelineError::transport(PROVIDER))?;
        let info = artifact_info(ranged.status().as_u16(), ranged.headers());
        tracing::debug!(url, status = info.status, "HEAD refused, retried with ranged GET");
        Ok(info)
    }
}
