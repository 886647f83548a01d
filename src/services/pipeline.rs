//! Sequences synthesis, generation, muxing, storage and persistence for one job.
//!
//! Stages run strictly one after another. The only compensation is a
//! best-effort delete of artifacts this run already uploaded; deletes never
//! replace the error that triggered them.

use chrono::Utc;
use garde::Validate;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::pet_video::PetVideoRecord;
use crate::models::request::{AudioTalkRequest, JobRequest, JobResponse, TextTalkRequest, UserContext};
use crate::models::resolution::ResolutionLabel;
use crate::services::did;
use crate::services::fetch::ArtifactFetcher;
use crate::services::metadata::MetadataRecorder;
use crate::services::muxer::MediaMuxer;
use crate::services::payload::{self, CanonicalParams};
use crate::services::poller::{AsyncJobPoller, GenerationProvider};
use crate::services::registry::{ModelConfig, ModelRegistry};
use crate::services::storage::{build_storage_key, resolve_user_prefix, BlobStore};
use crate::services::tts::{check_voice_id, SpeechLimits, SpeechSynthesizer};

/// External services a pipeline run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Image-to-video models from the registry.
    pub generator: Arc<dyn GenerationProvider>,
    /// Talking-head renders driven by an audio track.
    pub talker: Arc<dyn GenerationProvider>,
    pub storage: Arc<dyn BlobStore>,
    pub fetcher: Arc<dyn ArtifactFetcher>,
    pub muxer: Arc<dyn MediaMuxer>,
    pub recorder: Arc<dyn MetadataRecorder>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub default_model: String,
    pub poller: AsyncJobPoller,
    pub speech_limits: SpeechLimits,
    pub max_artifact_bytes: usize,
}

pub struct PipelineOrchestrator {
    registry: Arc<ModelRegistry>,
    collaborators: Collaborators,
    settings: PipelineSettings,
}

/// A request that passed every local check.
struct PreparedJob<'a> {
    config: &'a ModelConfig,
    resolution: ResolutionLabel,
    prompt: &'a str,
    prefix: String,
    user_id: Option<Uuid>,
}

impl PipelineOrchestrator {
    /// Fails when the configured default model is not in the registry.
    pub fn new(
        registry: Arc<ModelRegistry>,
        collaborators: Collaborators,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        registry.get_config(&settings.default_model)?;
        Ok(Self {
            registry,
            collaborators,
            settings,
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn default_model(&self) -> &str {
        &self.settings.default_model
    }

    /// Image + prompt → video, stored and recorded.
    pub async fn run_prompt_only(&self, req: &JobRequest) -> Result<JobResponse, PipelineError> {
        let result: Result<JobResponse, PipelineError> = async {
            let job = self.prepare(req)?;
            if job.config.requires_audio() {
                return Err(PipelineError::Precondition(format!(
                    "Model {} requires an audio track; submit a script and voice to /jobs_prompt_tts",
                    job.config.id
                )));
            }
            self.prompt_only(req, &job).await
        }
        .await;

        observe("prompt_only", result)
    }

    /// Image + prompt + script → speech-synced video, stored and recorded.
    pub async fn run_prompt_with_speech(
        &self,
        req: &JobRequest,
    ) -> Result<JobResponse, PipelineError> {
        let result: Result<JobResponse, PipelineError> = async {
            let job = self.prepare(req)?;
            let script = required(req.script.as_deref(), "text")?;
            let voice_id = required(req.voice_id.as_deref(), "voice_id")?;
            check_voice_id(voice_id)?;
            self.settings.speech_limits.check_text(script)?;

            let (audio_key, audio_url) = self.synthesize_and_upload(script, voice_id, &job.prefix).await?;

            let mut uploaded = vec![audio_key];
            match self
                .prompt_with_speech(req, &job, script, voice_id, &audio_url, &mut uploaded)
                .await
            {
                Ok(mut response) => {
                    response.audio_url = Some(audio_url);
                    Ok(response)
                }
                Err(e) => {
                    self.compensate(&uploaded, &e).await;
                    Err(e)
                }
            }
        }
        .await;

        observe("prompt_speech", result)
    }

    /// Image + hosted audio → talking-head video. The provider's output is returned as-is.
    pub async fn run_talk_with_audio(
        &self,
        req: &AudioTalkRequest,
    ) -> Result<JobResponse, PipelineError> {
        let result: Result<JobResponse, PipelineError> = async {
            req.validate()
                .map_err(|report| PipelineError::Validation(report.to_string()))?;
            let video_url = self.talk(&req.image_url, &req.audio_url).await?;
            Ok(JobResponse {
                audio_url: None,
                video_url,
                final_url: None,
            })
        }
        .await;

        observe("talk_audio", result)
    }

    /// Image + script → synthesized speech → talking-head video.
    pub async fn run_talk_with_speech(
        &self,
        req: &TextTalkRequest,
    ) -> Result<JobResponse, PipelineError> {
        let result: Result<JobResponse, PipelineError> = async {
            req.validate()
                .map_err(|report| PipelineError::Validation(report.to_string()))?;
            check_voice_id(&req.voice_id)?;
            self.settings.speech_limits.check_text(&req.text)?;
            let prefix = resolve_user_prefix(req.user_context.as_ref())?;

            let (audio_key, audio_url) =
                self.synthesize_and_upload(&req.text, &req.voice_id, &prefix).await?;

            match self.talk(&req.image_url, &audio_url).await {
                Ok(video_url) => Ok(JobResponse {
                    audio_url: Some(audio_url),
                    video_url,
                    final_url: None,
                }),
                Err(e) => {
                    self.compensate(&[audio_key], &e).await;
                    Err(e)
                }
            }
        }
        .await;

        observe("talk_speech", result)
    }

    fn prepare<'a>(&'a self, req: &'a JobRequest) -> Result<PreparedJob<'a>, PipelineError> {
        req.validate()
            .map_err(|report| PipelineError::Validation(report.to_string()))?;

        let model = req.model.as_deref().unwrap_or(&self.settings.default_model);
        let config = self.registry.get_config(model)?;

        let resolution = ResolutionLabel::from_str(&req.resolution).map_err(|_| {
            PipelineError::Validation(format!(
                "Unsupported resolution '{}'. Expected one of: 480p, 512p, 720p, 768p, 1024p, 1080p",
                req.resolution
            ))
        })?;

        let prompt = required(req.prompt.as_deref(), "prompt")?;
        let prefix = resolve_user_prefix(req.user_context.as_ref())?;
        let user_id = user_id(req.user_context.as_ref())?;

        Ok(PreparedJob {
            config,
            resolution,
            prompt,
            prefix,
            user_id,
        })
    }

    async fn prompt_only(
        &self,
        req: &JobRequest,
        job: &PreparedJob<'_>,
    ) -> Result<JobResponse, PipelineError> {
        let video_url = self.generate(req, job, None).await?;

        let video = self.collaborators.fetcher.fetch(&video_url).await?;
        self.check_size("Generated video", &video)?;

        let key = build_storage_key(&job.prefix, "videos", "mp4");
        let final_url = self
            .collaborators
            .storage
            .upload(&video, &key, "video/mp4")
            .await?;

        let record = self.record_for(req, job, &final_url, &key, None, None);
        if let Err(e) = self.collaborators.recorder.record(&record).await {
            let err = PipelineError::from(e);
            self.compensate(&[key], &err).await;
            return Err(err);
        }

        Ok(JobResponse {
            audio_url: None,
            video_url,
            final_url: Some(final_url),
        })
    }

    async fn prompt_with_speech(
        &self,
        req: &JobRequest,
        job: &PreparedJob<'_>,
        script: &str,
        voice_id: &str,
        audio_url: &str,
        uploaded: &mut Vec<String>,
    ) -> Result<JobResponse, PipelineError> {
        let (video_url, final_video) = if job.config.accepts_audio() {
            // The provider renders speech into the video itself.
            let video_url = self.generate(req, job, Some(audio_url)).await?;
            let video = self.collaborators.fetcher.fetch(&video_url).await?;
            (video_url, video)
        } else {
            let video_url = self.generate(req, job, None).await?;
            let muxed = self.collaborators.muxer.mux(&video_url, audio_url).await?;
            (video_url, muxed)
        };
        self.check_size("Final video", &final_video)?;

        let key = build_storage_key(&job.prefix, "videos", "mp4");
        let final_url = self
            .collaborators
            .storage
            .upload(&final_video, &key, "video/mp4")
            .await?;
        uploaded.push(key.clone());

        let record = self.record_for(req, job, &final_url, &key, Some(script), Some(voice_id));
        self.collaborators.recorder.record(&record).await?;

        Ok(JobResponse {
            audio_url: None,
            video_url,
            final_url: Some(final_url),
        })
    }

    async fn generate(
        &self,
        req: &JobRequest,
        job: &PreparedJob<'_>,
        audio: Option<&str>,
    ) -> Result<String, PipelineError> {
        let params = CanonicalParams {
            image: &req.image_url,
            prompt: job.prompt,
            duration: req.duration,
            resolution: job.resolution,
            audio,
        };
        let payload = payload::build(job.config, &params);

        tracing::info!(
            model = %job.config.id,
            with_audio = audio.is_some(),
            "Starting video generation"
        );
        let generated = self
            .settings
            .poller
            .run(self.collaborators.generator.as_ref(), &payload)
            .await?;

        generated.result.ok_or(PipelineError::MissingOutput {
            provider: self.collaborators.generator.name(),
            remote_id: generated.remote_id,
        })
    }

    async fn talk(&self, image_url: &str, audio_url: &str) -> Result<String, PipelineError> {
        let audio = self.collaborators.fetcher.inspect(audio_url).await?;
        let image = self.collaborators.fetcher.inspect(image_url).await?;
        tracing::debug!(?audio, ?image, "Talk inputs inspected");
        did::check_talk_inputs(&image, &audio)?;

        let payload = did::talk_payload(image_url, audio_url);
        let talked = self
            .settings
            .poller
            .run(self.collaborators.talker.as_ref(), &payload)
            .await?;

        talked.result.ok_or(PipelineError::MissingOutput {
            provider: self.collaborators.talker.name(),
            remote_id: talked.remote_id,
        })
    }

    async fn synthesize_and_upload(
        &self,
        script: &str,
        voice_id: &str,
        prefix: &str,
    ) -> Result<(String, String), PipelineError> {
        let audio = self.collaborators.speech.synthesize(script, voice_id).await?;
        self.settings.speech_limits.check_audio(&audio)?;

        let key = build_storage_key(prefix, "audio", "mp3");
        let url = self
            .collaborators
            .storage
            .upload(&audio, &key, "audio/mpeg")
            .await?;
        Ok((key, url))
    }

    fn record_for(
        &self,
        req: &JobRequest,
        job: &PreparedJob<'_>,
        final_url: &str,
        key: &str,
        script: Option<&str>,
        voice_id: Option<&str>,
    ) -> PetVideoRecord {
        PetVideoRecord {
            user_id: job.user_id,
            video_url: final_url.to_string(),
            storage_key: key.to_string(),
            image_url: req.image_url.clone(),
            script: script.map(str::to_string),
            prompt: job.prompt.to_string(),
            voice_id: voice_id.map(str::to_string),
            resolution: req.resolution.clone(),
            duration: req.duration as i32,
            created_at: Utc::now(),
        }
    }

    fn check_size(&self, what: &'static str, data: &[u8]) -> Result<(), PipelineError> {
        if data.len() > self.settings.max_artifact_bytes {
            return Err(PipelineError::PayloadTooLarge {
                what,
                size: data.len(),
                limit: self.settings.max_artifact_bytes,
            });
        }
        Ok(())
    }

    /// Delete uploaded artifacts newest first.
    async fn compensate(&self, keys: &[String], cause: &PipelineError) {
        for key in keys.iter().rev() {
            tracing::warn!(storage_key = %key, cause = %cause, "Removing artifact after failed run");
            self.collaborators.storage.delete(key).await;
            metrics::counter!("compensating_deletes_total").increment(1);
        }
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, PipelineError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| PipelineError::Validation(format!("'{field}' is required")))
}

fn user_id(user: Option<&UserContext>) -> Result<Option<Uuid>, PipelineError> {
    user.map(|ctx| {
        Uuid::parse_str(ctx.id.trim())
            .map_err(|_| PipelineError::Validation(format!("Invalid user id '{}'", ctx.id)))
    })
    .transpose()
}

fn observe<T>(shape: &'static str, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
    metrics::counter!("pipeline_runs_total", "shape" => shape).increment(1);
    if let Err(e) = &result {
        metrics::counter!("pipeline_failures_total", "shape" => shape, "stage" => e.stage())
            .increment(1);
    }
    result
}
