use garde::Validate;
use serde::{Deserialize, Serialize};

/// Opaque caller identity forwarded by the front end.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserContext {
    #[garde(length(min = 1, max = 64))]
    pub id: String,

    #[garde(skip)]
    pub email: Option<String>,

    #[garde(skip)]
    pub display_name: Option<String>,
}

/// Canonical job request shared by the prompt-driven pipelines.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JobRequest {
    #[serde(alias = "image")]
    #[garde(length(min = 1, max = 2048))]
    pub image_url: String,

    #[garde(length(min = 1, max = 2000))]
    pub prompt: Option<String>,

    /// Text to synthesize. Accepted as `text` on the wire.
    #[serde(default, alias = "text")]
    #[garde(length(min = 1))]
    pub script: Option<String>,

    #[serde(default)]
    #[garde(length(min = 1, max = 128))]
    pub voice_id: Option<String>,

    /// Requested length in seconds. Accepted as `seconds` on the wire.
    #[serde(alias = "seconds")]
    #[garde(range(min = 1, max = 60))]
    pub duration: u32,

    #[garde(length(min = 1, max = 16))]
    pub resolution: String,

    #[serde(default)]
    #[garde(skip)]
    pub model: Option<String>,

    #[serde(default)]
    #[garde(dive)]
    pub user_context: Option<UserContext>,
}

/// POST /jobs: talking-head render from an already hosted audio file.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AudioTalkRequest {
    #[garde(length(min = 1, max = 2048))]
    pub image_url: String,

    #[garde(length(min = 1, max = 2048))]
    pub audio_url: String,
}

/// POST /jobs_tts: talking-head render from a script.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TextTalkRequest {
    #[garde(length(min = 1, max = 2048))]
    pub image_url: String,

    #[garde(length(min = 1))]
    pub text: String,

    #[garde(length(min = 1, max = 128))]
    pub voice_id: String,

    #[serde(default)]
    #[garde(dive)]
    pub user_context: Option<UserContext>,
}

/// URLs produced by a pipeline run. Absent stages are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Output reference reported by the generation provider.
    pub video_url: String,

    /// Public URL of the stored final artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
}
