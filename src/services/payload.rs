use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::models::resolution::ResolutionLabel;
use crate::services::registry::{CanonicalField, ModelConfig};

/// Request body for a remote generation provider.
///
/// Only constructible through the builders, so a payload sent to a provider
/// is always exactly what the translation rules produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderPayload {
    target: String,
    body: Value,
}

impl ProviderPayload {
    pub(crate) fn new(target: impl Into<String>, body: Value) -> Self {
        Self {
            target: target.into(),
            body,
        }
    }

    /// Model path or endpoint the payload is meant for.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// The provider `input` object, for providers that nest their parameters.
    pub fn input(&self) -> Option<&Map<String, Value>> {
        self.body.get("input").and_then(Value::as_object)
    }
}

/// Canonical job parameters before translation.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalParams<'a> {
    pub image: &'a str,
    pub prompt: &'a str,
    pub duration: u32,
    pub resolution: ResolutionLabel,
    pub audio: Option<&'a str>,
}

/// Translate canonical parameters into a model's input body.
///
/// Defaults go in first, then the mapped canonical fields, then the
/// duration and resolution rules, which overwrite whatever the plain
/// mapping wrote. Absent optional inputs leave their field out entirely.
pub fn build(config: &ModelConfig, params: &CanonicalParams<'_>) -> ProviderPayload {
    let mut input = config.default_params.clone();

    for (canonical, provider_field) in &config.mapping {
        let value = match canonical {
            CanonicalField::Image => Some(json!(params.image)),
            CanonicalField::Prompt => Some(json!(params.prompt)),
            CanonicalField::Duration => Some(json!(params.duration)),
            CanonicalField::Resolution => Some(json!(params.resolution.as_str())),
            CanonicalField::Audio => params.audio.map(|audio| json!(audio)),
        };
        if let Some(value) = value {
            input.insert((*provider_field).to_string(), value);
        }
    }

    if let (Some(snap), Some(field)) = (config.duration_snap, config.field(CanonicalField::Duration)) {
        input.insert(field.to_string(), json!(snap.snap(params.duration)));
    }

    if let (Some(allowed), Some(field)) = (
        config.allowed_resolutions,
        config.field(CanonicalField::Resolution),
    ) {
        let label = allowed.resolve(params.resolution);
        input.insert(field.to_string(), json!(label.as_str()));
    }

    if let Some(transform) = config.resolution_transform {
        let pair = transform.apply(params.resolution);
        input.insert(transform.mode_field.to_string(), json!(pair.mode));
        input.insert(transform.aspect_field.to_string(), json!(pair.aspect_ratio));
    }

    ProviderPayload::new(config.id.as_str(), json!({ "input": Value::Object(input) }))
}
