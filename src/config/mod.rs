use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string for the `pet_videos` table
    pub database_url: String,

    /// Replicate API token. Calls fail with a configuration error when unset.
    pub replicate_api_token: Option<String>,

    #[serde(default = "default_replicate_base_url")]
    pub replicate_base_url: String,

    /// D-ID API key, either a bare key or "key:secret"
    pub did_api_key: Option<String>,

    #[serde(default = "default_did_base_url")]
    pub did_base_url: String,

    /// ElevenLabs API key
    pub eleven_api_key: Option<String>,

    #[serde(default = "default_eleven_base_url")]
    pub eleven_base_url: String,

    #[serde(default = "default_tts_model_id")]
    pub tts_model_id: String,

    /// ElevenLabs output format (e.g., "mp3_44100_32" for smaller files)
    #[serde(default = "default_tts_output_format")]
    pub tts_output_format: String,

    /// Maximum script length in characters, checked before synthesis
    #[serde(default = "default_tts_max_chars")]
    pub tts_max_chars: usize,

    /// Maximum synthesized audio size in bytes
    #[serde(default = "default_tts_max_bytes")]
    pub tts_max_bytes: usize,

    /// Maximum size of any artifact uploaded to storage
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: usize,

    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,

    /// S3-compatible endpoint URL
    pub storage_endpoint: String,

    #[serde(default = "default_storage_region")]
    pub storage_region: String,

    pub storage_access_key: String,

    pub storage_secret_key: String,

    /// Public URL prefix under which uploaded keys are served
    pub storage_public_base_url: String,

    /// Model used when a request does not name one
    #[serde(default = "default_model")]
    pub default_model: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Optional upper bound on a single remote generation. Unbounded when unset.
    pub poll_timeout_secs: Option<u64>,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    #[serde(default)]
    pub api_auth_enabled: bool,

    pub api_auth_token: Option<String>,

    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_replicate_base_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_did_base_url() -> String {
    "https://api.d-id.com".to_string()
}

fn default_eleven_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_tts_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_tts_output_format() -> String {
    "mp3_44100_64".to_string()
}

fn default_tts_max_chars() -> usize {
    600
}

fn default_tts_max_bytes() -> usize {
    9_500_000
}

fn default_max_artifact_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_storage_bucket() -> String {
    "pets".to_string()
}

fn default_storage_region() -> String {
    "auto".to_string()
}

fn default_model() -> String {
    "minimax/hailuo-02".to_string()
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        self.poll_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_fields() {
        let vars = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/pets".to_string()),
            ("STORAGE_ENDPOINT".to_string(), "https://s3.test".to_string()),
            ("STORAGE_ACCESS_KEY".to_string(), "ak".to_string()),
            ("STORAGE_SECRET_KEY".to_string(), "sk".to_string()),
            (
                "STORAGE_PUBLIC_BASE_URL".to_string(),
                "https://cdn.test/pets".to_string(),
            ),
        ];

        let config: AppConfig = envy::from_iter(vars).unwrap();
        assert_eq!(config.default_model, "minimax/hailuo-02");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert!(config.poll_timeout().is_none());
        assert_eq!(config.tts_max_chars, 600);
        assert!(!config.api_auth_enabled);
        assert!(config.replicate_api_token.is_none());
    }
}
