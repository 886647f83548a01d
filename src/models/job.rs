use serde::{Deserialize, Serialize};

/// Lifecycle of a remote generation job as seen by the poller.
///
/// `Succeeded`, `Failed` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Polling,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// A job submitted to a remote generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollableJob {
    pub provider: String,
    pub remote_id: String,
    pub status: JobStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl PollableJob {
    pub fn created(provider: &str, remote_id: String) -> Self {
        Self {
            provider: provider.to_string(),
            remote_id,
            status: JobStatus::Created,
            result: None,
            error: None,
        }
    }

    /// Move to `next`. Returns false and leaves the job untouched once it is terminal.
    pub fn transition(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }

    pub fn succeed(&mut self, result: String) -> bool {
        if !self.transition(JobStatus::Succeeded) {
            return false;
        }
        self.result = Some(result);
        true
    }

    pub fn fail(&mut self, status: JobStatus, error: String) -> bool {
        if !self.transition(status) {
            return false;
        }
        self.error = Some(error);
        true
    }
}
