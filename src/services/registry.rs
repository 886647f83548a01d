//! Static table of the image-to-video models this service can drive.
//!
//! Each entry describes how canonical job fields translate into the
//! provider's own input names, plus the per-model duration and resolution
//! rules the provider enforces.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::error::PipelineError;
use crate::models::resolution::ResolutionLabel;

/// Supported generation models, keyed by their Replicate identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum ModelId {
    #[strum(serialize = "minimax/hailuo-02")]
    Hailuo02,
    #[strum(serialize = "bytedance/seedance-1-lite")]
    Seedance1Lite,
    #[strum(serialize = "kwaivgi/kling-v2.1")]
    KlingV21,
    #[strum(serialize = "wan-video/wan-2.2-s2v")]
    Wan22S2v,
}

impl ModelId {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Provider-agnostic job fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CanonicalField {
    Image,
    Prompt,
    Duration,
    Resolution,
    Audio,
}

/// Whether a model takes a speech track as one of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSupport {
    None,
    Required,
}

/// Snaps a requested length onto the provider's permitted buckets.
///
/// Picks the first bucket at or above the request, or the largest bucket
/// when the request exceeds them all. Buckets must be sorted ascending.
#[derive(Debug, Clone, Copy)]
pub struct DurationSnap {
    pub buckets: &'static [u32],
}

impl DurationSnap {
    pub fn snap(&self, requested: u32) -> u32 {
        self.buckets
            .iter()
            .copied()
            .find(|bucket| requested <= *bucket)
            .or_else(|| self.buckets.last().copied())
            .unwrap_or(requested)
    }
}

/// Fixed label set. Unrecognized labels fall back to `default`.
#[derive(Debug, Clone, Copy)]
pub struct AllowedResolutions {
    pub labels: &'static [ResolutionLabel],
    pub default: ResolutionLabel,
}

impl AllowedResolutions {
    pub fn resolve(&self, requested: ResolutionLabel) -> ResolutionLabel {
        if self.labels.contains(&requested) {
            requested
        } else {
            self.default
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModeAspect {
    pub mode: &'static str,
    pub aspect_ratio: &'static str,
}

/// Replaces a resolution label with a quality mode plus aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct ResolutionTransform {
    pub mode_field: &'static str,
    pub aspect_field: &'static str,
    pub table: &'static [(ResolutionLabel, ModeAspect)],
    pub fallback: ModeAspect,
    /// Label the fallback pair stands for when mapped back.
    pub fallback_label: ResolutionLabel,
}

impl ResolutionTransform {
    pub fn apply(&self, label: ResolutionLabel) -> ModeAspect {
        self.table
            .iter()
            .find(|(candidate, _)| *candidate == label)
            .map(|(_, pair)| *pair)
            .unwrap_or(self.fallback)
    }

    /// The label that produces `pair`, used when reporting what was rendered.
    pub fn equivalent_label(&self, pair: ModeAspect) -> ResolutionLabel {
        self.table
            .iter()
            .find(|(_, candidate)| *candidate == pair)
            .map(|(label, _)| *label)
            .unwrap_or(self.fallback_label)
    }

    pub fn labels(&self) -> Vec<ResolutionLabel> {
        self.table.iter().map(|(label, _)| *label).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub id: ModelId,
    /// Applied before any mapped field.
    pub default_params: Map<String, Value>,
    pub mapping: Vec<(CanonicalField, &'static str)>,
    pub audio: AudioSupport,
    pub allowed_resolutions: Option<AllowedResolutions>,
    pub duration_snap: Option<DurationSnap>,
    pub resolution_transform: Option<ResolutionTransform>,
}

const STANDARD_SQUARE: ModeAspect = ModeAspect {
    mode: "standard",
    aspect_ratio: "1:1",
};

const KLING_RESOLUTIONS: &[(ResolutionLabel, ModeAspect)] = &[
    (
        ResolutionLabel::P1080,
        ModeAspect {
            mode: "pro",
            aspect_ratio: "16:9",
        },
    ),
    (
        ResolutionLabel::P1024,
        ModeAspect {
            mode: "standard",
            aspect_ratio: "16:9",
        },
    ),
];

impl ModelConfig {
    fn for_model(id: ModelId) -> Self {
        use CanonicalField::*;

        match id {
            ModelId::Hailuo02 => Self {
                id,
                default_params: object(json!({ "prompt_optimizer": false })),
                mapping: vec![
                    (Image, "first_frame_image"),
                    (Prompt, "prompt"),
                    (Duration, "duration"),
                    (Resolution, "resolution"),
                ],
                audio: AudioSupport::None,
                allowed_resolutions: Some(AllowedResolutions {
                    labels: &[ResolutionLabel::P512, ResolutionLabel::P768, ResolutionLabel::P1080],
                    default: ResolutionLabel::P768,
                }),
                duration_snap: Some(DurationSnap { buckets: &[6, 10] }),
                resolution_transform: None,
            },
            ModelId::Seedance1Lite => Self {
                id,
                default_params: object(json!({ "fps": 24, "camera_fixed": false })),
                mapping: vec![
                    (Image, "image"),
                    (Prompt, "prompt"),
                    (Duration, "duration"),
                    (Resolution, "resolution"),
                ],
                audio: AudioSupport::None,
                allowed_resolutions: Some(AllowedResolutions {
                    labels: &[ResolutionLabel::P480, ResolutionLabel::P720, ResolutionLabel::P1080],
                    default: ResolutionLabel::P720,
                }),
                duration_snap: Some(DurationSnap { buckets: &[5, 10] }),
                resolution_transform: None,
            },
            ModelId::KlingV21 => Self {
                id,
                default_params: object(json!({ "negative_prompt": "" })),
                mapping: vec![
                    (Image, "start_image"),
                    (Prompt, "prompt"),
                    (Duration, "duration"),
                ],
                audio: AudioSupport::None,
                allowed_resolutions: None,
                duration_snap: Some(DurationSnap { buckets: &[5, 10] }),
                resolution_transform: Some(ResolutionTransform {
                    mode_field: "mode",
                    aspect_field: "aspect_ratio",
                    table: KLING_RESOLUTIONS,
                    fallback: STANDARD_SQUARE,
                    fallback_label: ResolutionLabel::P720,
                }),
            },
            ModelId::Wan22S2v => Self {
                id,
                default_params: object(json!({ "num_frames_per_chunk": 81 })),
                mapping: vec![(Image, "image"), (Prompt, "prompt"), (Audio, "audio")],
                audio: AudioSupport::Required,
                allowed_resolutions: None,
                duration_snap: None,
                resolution_transform: None,
            },
        }
    }

    /// Provider field name for a canonical field, if the model takes it.
    pub fn field(&self, canonical: CanonicalField) -> Option<&'static str> {
        self.mapping
            .iter()
            .find(|(field, _)| *field == canonical)
            .map(|(_, name)| *name)
    }

    pub fn accepts_audio(&self) -> bool {
        self.field(CanonicalField::Audio).is_some()
    }

    pub fn requires_audio(&self) -> bool {
        self.audio == AudioSupport::Required
    }

    pub fn supported_resolutions(&self) -> Vec<ResolutionLabel> {
        match (&self.allowed_resolutions, &self.resolution_transform) {
            (Some(allowed), _) => allowed.labels.to_vec(),
            (None, Some(transform)) => transform.labels(),
            (None, None) => Vec::new(),
        }
    }

    fn check_mapping(&self) -> Result<(), PipelineError> {
        for required in [CanonicalField::Image, CanonicalField::Prompt] {
            if self.field(required).is_none() {
                return Err(PipelineError::Configuration(format!(
                    "model {} does not map required field '{}'",
                    self.id, required
                )));
            }
        }
        Ok(())
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Lookup table built once at startup and shared read-only across requests.
///
/// One slot per `ModelId`, so every lookup is an exhaustive match.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    hailuo: ModelConfig,
    seedance: ModelConfig,
    kling: ModelConfig,
    wan: ModelConfig,
}

impl ModelRegistry {
    pub fn new() -> Result<Self, PipelineError> {
        let registry = Self {
            hailuo: ModelConfig::for_model(ModelId::Hailuo02),
            seedance: ModelConfig::for_model(ModelId::Seedance1Lite),
            kling: ModelConfig::for_model(ModelId::KlingV21),
            wan: ModelConfig::for_model(ModelId::Wan22S2v),
        };
        for config in registry.iter() {
            config.check_mapping()?;
        }
        Ok(registry)
    }

    pub fn get_config(&self, model_id: &str) -> Result<&ModelConfig, PipelineError> {
        let id = ModelId::from_str(model_id).map_err(|_| PipelineError::UnsupportedModel {
            requested: model_id.to_string(),
            supported: self.supported_ids(),
        })?;
        Ok(self.config(id))
    }

    pub fn config(&self, id: ModelId) -> &ModelConfig {
        match id {
            ModelId::Hailuo02 => &self.hailuo,
            ModelId::Seedance1Lite => &self.seedance,
            ModelId::KlingV21 => &self.kling,
            ModelId::Wan22S2v => &self.wan,
        }
    }

    pub fn supported_ids(&self) -> Vec<String> {
        self.iter().map(|c| c.id.to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelConfig> {
        ModelId::iter().map(move |id| self.config(id))
    }
}
