use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted description of a finished video. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PetVideoRecord {
    pub user_id: Option<Uuid>,
    pub video_url: String,
    pub storage_key: String,
    pub image_url: String,
    pub script: Option<String>,
    pub prompt: String,
    pub voice_id: Option<String>,
    pub resolution: String,
    pub duration: i32,
    pub created_at: DateTime<Utc>,
}
