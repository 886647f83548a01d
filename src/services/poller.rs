//! Submit-then-poll driver shared by the remote generation providers.

use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::PipelineError;
use crate::models::job::{JobStatus, PollableJob};
use crate::services::payload::ProviderPayload;

/// Provider status collapsed onto the poller's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Running,
    Succeeded,
    Failed,
    Canceled,
}

/// One status response from a provider.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: RemoteStatus,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub logs: Option<String>,
}

impl StatusReport {
    pub fn running() -> Self {
        Self {
            status: RemoteStatus::Running,
            output: None,
            error: None,
            logs: None,
        }
    }
}

/// A remote service that accepts a job and reports on it by id.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Create the remote job and return its id. A response without an id
    /// is a submission error.
    async fn submit(&self, payload: &ProviderPayload) -> Result<String, PipelineError>;

    async fn status(&self, remote_id: &str) -> Result<StatusReport, PipelineError>;
}

/// Drives one job to a terminal state: one status call, wait, repeat.
///
/// There is no cancel call into the provider. Dropping the future stops
/// polling; the remote job keeps running on the provider side.
#[derive(Debug, Clone, Copy)]
pub struct AsyncJobPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl AsyncJobPoller {
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    pub async fn run(
        &self,
        provider: &dyn GenerationProvider,
        payload: &ProviderPayload,
    ) -> Result<PollableJob, PipelineError> {
        let started = Instant::now();
        let remote_id = provider.submit(payload).await?;
        let mut job = PollableJob::created(provider.name(), remote_id);

        tracing::info!(
            provider = provider.name(),
            remote_id = %job.remote_id,
            target = payload.target(),
            "Generation job submitted"
        );

        loop {
            let report = provider.status(&job.remote_id).await?;

            match report.status {
                RemoteStatus::Running => {
                    job.transition(JobStatus::Polling);
                    if let Some(limit) = self.timeout {
                        if started.elapsed() >= limit {
                            return Err(PipelineError::PollTimeout {
                                provider: provider.name(),
                                remote_id: job.remote_id,
                                waited: started.elapsed(),
                            });
                        }
                    }
                    sleep(self.interval).await;
                }
                RemoteStatus::Succeeded => {
                    let Some(result) = extract_result(report.output.as_ref()) else {
                        return Err(PipelineError::MissingOutput {
                            provider: provider.name(),
                            remote_id: job.remote_id,
                        });
                    };
                    job.succeed(result);

                    let elapsed = started.elapsed();
                    metrics::histogram!("generation_seconds", "provider" => provider.name())
                        .record(elapsed.as_secs_f64());
                    tracing::info!(
                        provider = provider.name(),
                        remote_id = %job.remote_id,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Generation job succeeded"
                    );
                    return Ok(job);
                }
                RemoteStatus::Failed | RemoteStatus::Canceled => {
                    let terminal = if report.status == RemoteStatus::Canceled {
                        JobStatus::Canceled
                    } else {
                        JobStatus::Failed
                    };
                    let error = report
                        .error
                        .unwrap_or_else(|| format!("{} job ended as {:?}", provider.name(), terminal));
                    job.fail(terminal, error.clone());

                    tracing::warn!(
                        provider = provider.name(),
                        remote_id = %job.remote_id,
                        status = ?terminal,
                        error = %error,
                        "Generation job did not succeed"
                    );
                    return Err(PipelineError::JobFailed {
                        provider: provider.name(),
                        remote_id: job.remote_id,
                        error,
                        logs: report.logs,
                    });
                }
            }
        }
    }
}

/// Output is either a non-empty list of URIs (the last one is the final
/// artifact) or a single URI.
pub fn extract_result(output: Option<&Value>) -> Option<String> {
    match output? {
        Value::Array(items) => items
            .last()
            .and_then(Value::as_str)
            .filter(|uri| !uri.is_empty())
            .map(str::to_string),
        Value::String(uri) if !uri.is_empty() => Some(uri.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct ScriptedProvider {
        script: Mutex<VecDeque<StatusReport>>,
        status_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(script: Vec<StatusReport>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                status_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn submit(&self, _payload: &ProviderPayload) -> Result<String, PipelineError> {
            Ok("job-1".to_string())
        }

        async fn status(&self, _remote_id: &str) -> Result<StatusReport, PipelineError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(StatusReport::running))
        }
    }

    fn report(status: RemoteStatus, output: Option<Value>, error: Option<&str>) -> StatusReport {
        StatusReport {
            status,
            output,
            error: error.map(str::to_string),
            logs: None,
        }
    }

    fn poller() -> AsyncJobPoller {
        AsyncJobPoller::new(Duration::from_millis(1), None)
    }

    fn payload() -> ProviderPayload {
        ProviderPayload::new("test/model", json!({ "input": {} }))
    }

    #[tokio::test]
    async fn test_returns_last_output_after_running_statuses() {
        let provider = ScriptedProvider::new(vec![
            StatusReport::running(),
            StatusReport::running(),
            report(
                RemoteStatus::Succeeded,
                Some(json!(["a", "b", "final.mp4"])),
                None,
            ),
        ]);

        let job = poller().run(&provider, &payload()).await.unwrap();
        assert_eq!(job.result.as_deref(), Some("final.mp4"));
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(provider.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_uri_output_is_accepted() {
        let provider = ScriptedProvider::new(vec![report(
            RemoteStatus::Succeeded,
            Some(json!("https://cdn.test/out.mp4")),
            None,
        )]);

        let job = poller().run(&provider, &payload()).await.unwrap();
        assert_eq!(job.result.as_deref(), Some("https://cdn.test/out.mp4"));
    }

    #[tokio::test]
    async fn test_failed_status_carries_provider_error() {
        let provider = ScriptedProvider::new(vec![StatusReport {
            status: RemoteStatus::Failed,
            output: None,
            error: Some("out of credits".to_string()),
            logs: Some("boot\ncrash".to_string()),
        }]);

        match poller().run(&provider, &payload()).await {
            Err(PipelineError::JobFailed { error, logs, remote_id, .. }) => {
                assert_eq!(error, "out of credits");
                assert_eq!(logs.as_deref(), Some("boot\ncrash"));
                assert_eq!(remote_id, "job-1");
            }
            other => panic!("expected JobFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_canceled_status_is_a_job_failure() {
        let provider = ScriptedProvider::new(vec![report(RemoteStatus::Canceled, None, None)]);
        assert!(matches!(
            poller().run(&provider, &payload()).await,
            Err(PipelineError::JobFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_output_list_is_missing_output() {
        let provider =
            ScriptedProvider::new(vec![report(RemoteStatus::Succeeded, Some(json!([])), None)]);
        assert!(matches!(
            poller().run(&provider, &payload()).await,
            Err(PipelineError::MissingOutput { .. })
        ));
    }

    #[tokio::test]
    async fn test_optional_timeout_stops_polling() {
        let provider = ScriptedProvider::new(Vec::new());
        let poller = AsyncJobPoller::new(Duration::from_millis(5), Some(Duration::from_millis(20)));

        assert!(matches!(
            poller.run(&provider, &payload()).await,
            Err(PipelineError::PollTimeout { .. })
        ));
        assert!(provider.status_calls.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn test_extract_result_shapes() {
        assert_eq!(extract_result(Some(&json!(["x", "y"]))), Some("y".to_string()));
        assert_eq!(extract_result(Some(&json!("z"))), Some("z".to_string()));
        assert_eq!(extract_result(Some(&json!(""))), None);
        assert_eq!(extract_result(Some(&json!({"url": "x"}))), None);
        assert_eq!(extract_result(Some(&json!([1, 2]))), None);
        assert_eq!(extract_result(None), None);
    }
}
