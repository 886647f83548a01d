//! Recording fakes for every pipeline collaborator.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use talking_pet::error::PipelineError;
use talking_pet::models::pet_video::PetVideoRecord;
use talking_pet::models::request::JobRequest;
use talking_pet::services::fetch::{ArtifactFetcher, ArtifactInfo};
use talking_pet::services::metadata::{MetadataError, MetadataRecorder};
use talking_pet::services::muxer::{MediaMuxer, MuxError};
use talking_pet::services::payload::ProviderPayload;
use talking_pet::services::pipeline::{Collaborators, PipelineOrchestrator, PipelineSettings};
use talking_pet::services::poller::{
    AsyncJobPoller, GenerationProvider, RemoteStatus, StatusReport,
};
use talking_pet::services::registry::ModelRegistry;
use talking_pet::services::storage::{BlobStore, StorageError};
use talking_pet::services::tts::{SpeechLimits, SpeechSynthesizer};

pub const PUBLIC_BASE: &str = "https://cdn.test/pets";
pub const GENERATED_URL: &str = "https://replicate.delivery/out/final.mp4";
pub const TALK_URL: &str = "https://d-id.test/talks/result.mp4";

/// One observed collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Synthesize { text: String, voice_id: String },
    Upload { key: String, content_type: String },
    Delete { key: String },
    Submit { provider: &'static str, target: String, body: Value },
    Fetch { url: String },
    Inspect { url: String },
    Mux { video_url: String, audio_url: String },
    Record(PetVideoRecord),
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload { key, content_type } => Some((key, content_type)),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { key } => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn submissions(&self) -> Vec<(&'static str, String, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Submit { provider, target, body } => Some((provider, target, body)),
                _ => None,
            })
            .collect()
    }

    pub fn records(&self) -> Vec<PetVideoRecord> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Record(record) => Some(record),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }
}

struct FakeSpeech {
    log: CallLog,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, PipelineError> {
        self.log.push(Call::Synthesize {
            text: text.to_string(),
            voice_id: voice_id.to_string(),
        });
        Ok(b"ID3 fake mp3".to_vec())
    }
}

/// Reports `Running` once, then the scripted terminal state.
struct FakeProvider {
    name: &'static str,
    log: CallLog,
    output: Value,
    failure: Option<String>,
    polls: AtomicUsize,
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn submit(&self, payload: &ProviderPayload) -> Result<String, PipelineError> {
        self.log.push(Call::Submit {
            provider: self.name,
            target: payload.target().to_string(),
            body: payload.body().clone(),
        });
        Ok(format!("{}-job-1", self.name))
    }

    async fn status(&self, _remote_id: &str) -> Result<StatusReport, PipelineError> {
        if self.polls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(StatusReport::running());
        }
        Ok(match &self.failure {
            Some(error) => StatusReport {
                status: RemoteStatus::Failed,
                output: None,
                error: Some(error.clone()),
                logs: Some("worker crashed".to_string()),
            },
            None => StatusReport {
                status: RemoteStatus::Succeeded,
                output: Some(self.output.clone()),
                error: None,
                logs: None,
            },
        })
    }
}

struct FakeStore {
    log: CallLog,
    fail_upload: Option<usize>,
    uploads: AtomicUsize,
}

#[async_trait]
impl BlobStore for FakeStore {
    async fn upload(&self, _data: &[u8], key: &str, content_type: &str) -> Result<String, StorageError> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail_upload == Some(n) {
            return Err(StorageError::Rejected {
                status: 503,
                body: "storage unavailable".to_string(),
            });
        }
        self.log.push(Call::Upload {
            key: key.to_string(),
            content_type: content_type.to_string(),
        });
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) {
        self.log.push(Call::Delete { key: key.to_string() });
    }

    fn public_url(&self, key: &str) -> String {
        format!("{PUBLIC_BASE}/{key}")
    }
}

struct FakeFetcher {
    log: CallLog,
    size: usize,
    header_overrides: Vec<(&'static str, ArtifactInfo)>,
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        self.log.push(Call::Fetch { url: url.to_string() });
        Ok(vec![0; self.size])
    }

    /// Well-behaved headers keyed on the extension unless a scenario overrides the URL suffix.
    async fn inspect(&self, url: &str) -> Result<ArtifactInfo, PipelineError> {
        self.log.push(Call::Inspect { url: url.to_string() });
        if let Some((_, info)) = self.header_overrides.iter().find(|(suffix, _)| url.ends_with(suffix)) {
            return Ok(info.clone());
        }
        let content_type = if url.ends_with(".mp3") { "audio/mpeg" } else { "image/jpeg" };
        Ok(ArtifactInfo {
            status: 200,
            content_type: Some(content_type.to_string()),
            size: Some(48_000),
        })
    }
}

struct FakeMuxer {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl MediaMuxer for FakeMuxer {
    async fn mux(&self, video_url: &str, audio_url: &str) -> Result<Vec<u8>, MuxError> {
        self.log.push(Call::Mux {
            video_url: video_url.to_string(),
            audio_url: audio_url.to_string(),
        });
        if self.fail {
            return Err(MuxError::ExecutionFailed {
                exit_code: Some(1),
                stderr: "Invalid data found when processing input".to_string(),
            });
        }
        Ok(b"muxed mp4".to_vec())
    }
}

struct FakeRecorder {
    log: CallLog,
    fail: bool,
}

#[async_trait]
impl MetadataRecorder for FakeRecorder {
    async fn record(&self, record: &PetVideoRecord) -> Result<(), MetadataError> {
        self.log.push(Call::Record(record.clone()));
        if self.fail {
            return Err(MetadataError::Rejected("duplicate storage_key".to_string()));
        }
        Ok(())
    }
}

/// Which collaborator misbehaves, and the limits the orchestrator enforces.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub generation_error: Option<String>,
    pub talk_error: Option<String>,
    pub fail_upload: Option<usize>,
    pub fail_mux: bool,
    pub fail_record: bool,
    pub fetched_bytes: usize,
    pub max_artifact_bytes: usize,
    pub max_chars: usize,
    /// `(url suffix, headers)` reported by the fetcher's header lookup.
    pub header_overrides: Vec<(&'static str, ArtifactInfo)>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            generation_error: None,
            talk_error: None,
            fail_upload: None,
            fail_mux: false,
            fail_record: false,
            fetched_bytes: 16,
            max_artifact_bytes: 1024,
            max_chars: 600,
            header_overrides: Vec::new(),
        }
    }
}

pub struct Harness {
    pub log: CallLog,
    pub orchestrator: PipelineOrchestrator,
}

pub fn harness(scenario: Scenario) -> Harness {
    let log = CallLog::default();

    let collaborators = Collaborators {
        speech: Arc::new(FakeSpeech { log: log.clone() }),
        generator: Arc::new(FakeProvider {
            name: "replicate",
            log: log.clone(),
            output: json!(["https://replicate.delivery/out/preview.jpg", GENERATED_URL]),
            failure: scenario.generation_error,
            polls: AtomicUsize::new(0),
        }),
        talker: Arc::new(FakeProvider {
            name: "d-id",
            log: log.clone(),
            output: json!(TALK_URL),
            failure: scenario.talk_error,
            polls: AtomicUsize::new(0),
        }),
        storage: Arc::new(FakeStore {
            log: log.clone(),
            fail_upload: scenario.fail_upload,
            uploads: AtomicUsize::new(0),
        }),
        fetcher: Arc::new(FakeFetcher {
            log: log.clone(),
            size: scenario.fetched_bytes,
            header_overrides: scenario.header_overrides,
        }),
        muxer: Arc::new(FakeMuxer {
            log: log.clone(),
            fail: scenario.fail_mux,
        }),
        recorder: Arc::new(FakeRecorder {
            log: log.clone(),
            fail: scenario.fail_record,
        }),
    };

    let settings = PipelineSettings {
        default_model: "minimax/hailuo-02".to_string(),
        poller: AsyncJobPoller::new(Duration::from_millis(1), None),
        speech_limits: SpeechLimits {
            max_chars: scenario.max_chars,
            max_bytes: 1024,
        },
        max_artifact_bytes: scenario.max_artifact_bytes,
    };

    let registry = Arc::new(ModelRegistry::new().unwrap());
    let orchestrator = PipelineOrchestrator::new(registry, collaborators, settings).unwrap();
    Harness { log, orchestrator }
}

/// Deserialize a request the way the HTTP layer would.
pub fn job_request(body: Value) -> JobRequest {
    serde_json::from_value(body).unwrap()
}

pub fn speech_request(model: &str) -> JobRequest {
    job_request(json!({
        "image_url": "https://example.com/dog.jpg",
        "prompt": "wave hello",
        "seconds": 6,
        "resolution": "768p",
        "text": "Hello!",
        "voice_id": "voice-1",
        "model": model,
    }))
}

pub fn prompt_request(model: &str) -> JobRequest {
    job_request(json!({
        "image_url": "https://example.com/dog.jpg",
        "prompt": "wave hello",
        "duration": 6,
        "resolution": "768p",
        "model": model,
    }))
}
