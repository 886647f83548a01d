use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::app_state::AppState;
use crate::models::resolution::ResolutionLabel;
use crate::services::registry::{AudioSupport, ModelConfig, ModelRegistry};

#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub default_model: String,
    pub supported_models: BTreeMap<String, ModelSummary>,
}

#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub provider: &'static str,
    pub supported_resolutions: Vec<ResolutionLabel>,
    pub default_resolution: Option<ResolutionLabel>,
    pub supported_durations: Vec<u32>,
    pub audio: AudioSupport,
}

impl From<&ModelConfig> for ModelSummary {
    fn from(config: &ModelConfig) -> Self {
        let default_resolution = config
            .allowed_resolutions
            .map(|allowed| allowed.default)
            .or_else(|| config.resolution_transform.map(|t| t.fallback_label));

        Self {
            provider: "replicate",
            supported_resolutions: config.supported_resolutions(),
            default_resolution,
            supported_durations: config
                .duration_snap
                .map(|snap| snap.buckets.to_vec())
                .unwrap_or_default(),
            audio: config.audio,
        }
    }
}

pub fn summarize(registry: &ModelRegistry, default_model: &str) -> ModelsResponse {
    ModelsResponse {
        default_model: default_model.to_string(),
        supported_models: registry
            .iter()
            .map(|config| (config.id.to_string(), ModelSummary::from(config)))
            .collect(),
    }
}

/// GET /models
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(summarize(
        state.pipeline.registry(),
        state.pipeline.default_model(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_covers_every_model_with_its_limits() {
        let registry = ModelRegistry::new().unwrap();
        let listing = summarize(&registry, "minimax/hailuo-02");

        assert_eq!(listing.default_model, "minimax/hailuo-02");
        assert_eq!(listing.supported_models.len(), registry.supported_ids().len());

        let hailuo = &listing.supported_models["minimax/hailuo-02"];
        assert_eq!(hailuo.supported_durations, vec![6, 10]);
        assert_eq!(hailuo.default_resolution, Some(ResolutionLabel::P768));
        assert!(hailuo.supported_resolutions.contains(&ResolutionLabel::P1080));

        let kling = &listing.supported_models["kwaivgi/kling-v2.1"];
        assert_eq!(kling.default_resolution, Some(ResolutionLabel::P720));

        let wan = &listing.supported_models["wan-video/wan-2.2-s2v"];
        assert_eq!(wan.audio, AudioSupport::Required);
    }

    #[test]
    fn test_listing_serializes_labels_as_strings() {
        let registry = ModelRegistry::new().unwrap();
        let json = serde_json::to_value(summarize(&registry, "minimax/hailuo-02")).unwrap();
        assert_eq!(
            json["supported_models"]["minimax/hailuo-02"]["default_resolution"],
            "768p"
        );
        assert_eq!(
            json["supported_models"]["wan-video/wan-2.2-s2v"]["audio"],
            "required"
        );
    }
}
