//! Pipeline entry points. Each handler blocks until its pipeline reaches a
//! terminal state.

use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::error::PipelineError;
use crate::models::request::{AudioTalkRequest, JobRequest, JobResponse, TextTalkRequest};

/// POST /jobs
pub async fn talk_with_audio(
    State(state): State<AppState>,
    Json(req): Json<AudioTalkRequest>,
) -> Result<Json<JobResponse>, PipelineError> {
    tracing::info!(image_url = %req.image_url, "Talk job received");
    state.pipeline.run_talk_with_audio(&req).await.map(Json)
}

/// POST /jobs_tts
pub async fn talk_with_speech(
    State(state): State<AppState>,
    Json(req): Json<TextTalkRequest>,
) -> Result<Json<JobResponse>, PipelineError> {
    tracing::info!(
        image_url = %req.image_url,
        voice_id = %req.voice_id,
        chars = req.text.chars().count(),
        "Talk job with speech received"
    );
    state.pipeline.run_talk_with_speech(&req).await.map(Json)
}

/// POST /jobs_prompt_only
pub async fn prompt_only(
    State(state): State<AppState>,
    Json(req): Json<JobRequest>,
) -> Result<Json<JobResponse>, PipelineError> {
    tracing::info!(
        model = req.model.as_deref().unwrap_or("default"),
        duration = req.duration,
        resolution = %req.resolution,
        "Prompt-only job received"
    );
    state.pipeline.run_prompt_only(&req).await.map(Json)
}

/// POST /jobs_prompt_tts
pub async fn prompt_with_speech(
    State(state): State<AppState>,
    Json(req): Json<JobRequest>,
) -> Result<Json<JobResponse>, PipelineError> {
    tracing::info!(
        model = req.model.as_deref().unwrap_or("default"),
        duration = req.duration,
        resolution = %req.resolution,
        "Prompt job with speech received"
    );
    state.pipeline.run_prompt_with_speech(&req).await.map(Json)
}
