use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::error::PipelineError;

const PROVIDER: &str = "elevenlabs";

/// Text to speech. Implementations check both limits locally.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, PipelineError>;
}

#[derive(Debug, Clone, Copy)]
pub struct SpeechLimits {
    pub max_chars: usize,
    pub max_bytes: usize,
}

impl SpeechLimits {
    pub fn check_text(&self, text: &str) -> Result<(), PipelineError> {
        let chars = text.chars().count();
        if chars > self.max_chars {
            return Err(PipelineError::Validation(format!(
                "Text too long ({chars} chars, max {}). Please shorten your script.",
                self.max_chars
            )));
        }
        if text.trim().is_empty() {
            return Err(PipelineError::Validation("Text must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn check_audio(&self, audio: &[u8]) -> Result<(), PipelineError> {
        if audio.len() > self.max_bytes {
            return Err(PipelineError::PayloadTooLarge {
                what: "Synthesized audio",
                size: audio.len(),
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Voice ids become a URL path segment, so only plain identifiers pass.
pub fn check_voice_id(voice_id: &str) -> Result<(), PipelineError> {
    let valid = !voice_id.is_empty()
        && voice_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(PipelineError::Validation(format!("Invalid voice id '{voice_id}'")))
    }
}

/// ElevenLabs text-to-speech client.
pub struct ElevenLabsClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model_id: String,
    output_format: String,
    limits: SpeechLimits,
}

impl ElevenLabsClient {
    pub fn new(
        http: Client,
        base_url: String,
        api_key: Option<String>,
        model_id: String,
        output_format: String,
        limits: SpeechLimits,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id,
            output_format,
            limits,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, PipelineError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| PipelineError::Configuration("ELEVEN_API_KEY not set".to_string()))?;
        self.limits.check_text(text)?;
        check_voice_id(voice_id)?;

        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);
        let response = self
            .http
            .post(&url)
            .query(&[("output_format", self.output_format.as_str())])
            .header("xi-api-key", api_key)
            .json(&json!({
                "text": text,
                "model_id": self.model_id,
            }))
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

        let audio = response
            .bytes()
            .await
            .map_err(PipelineError::transport(PROVIDER))?
            .to_vec();
        self.limits.check_audio(&audio)?;

        tracing::debug!(voice_id, bytes = audio.len(), "Speech synthesized");
        Ok(audio)
    }
}
