use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::request::UserContext;

pub const ANONYMOUS_PREFIX: &str = "anonymous";

/// Artifact storage with public read URLs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, overwriting any existing object, and return its public URL.
    async fn upload(&self, data: &[u8], key: &str, content_type: &str) -> Result<String, StorageError>;

    /// Best-effort removal. Failures are logged, never returned.
    async fn delete(&self, key: &str);

    fn public_url(&self, key: &str) -> String;
}

/// Client for S3-compatible object storage (Supabase Storage, R2, MinIO).
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    public_base_url: String,
}

impl S3BlobStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        public_base_url: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: region.to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials =
            Credentials::new(Some(access_key), Some(secret_key), None, None, None)
                .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?
            .with_path_style();

        Ok(Self {
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn upload(&self, data: &[u8], key: &str, content_type: &str) -> Result<String, StorageError> {
        let response = self
            .bucket
            .put_object_with_content_type(key, data, content_type)
            .await?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            return Err(StorageError::Rejected {
                status,
                body: String::from_utf8_lossy(response.as_slice()).to_string(),
            });
        }

        tracing::info!(storage_key = key, bytes = data.len(), content_type, "Artifact uploaded");
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) {
        match self.bucket.delete_object(key).await {
            Ok(response) if (200..300).contains(&response.status_code()) => {
                tracing::info!(storage_key = key, "Artifact deleted");
            }
            Ok(response) => {
                tracing::warn!(
                    storage_key = key,
                    status = response.status_code(),
                    "Artifact delete rejected"
                );
            }
            Err(e) => {
                tracing::warn!(storage_key = key, error = %e, "Artifact delete failed");
            }
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage rejected the upload ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Storage configuration error: {0}")]
    Config(String),
}

/// `users/<uuid>` for an identified caller, `anonymous` otherwise.
pub fn resolve_user_prefix(user: Option<&UserContext>) -> Result<String, PipelineError> {
    let Some(user) = user else {
        return Ok(ANONYMOUS_PREFIX.to_string());
    };

    let id = Uuid::parse_str(user.id.trim())
        .map_err(|_| PipelineError::Validation(format!("Invalid user id '{}'", user.id)))?;
    Ok(format!("users/{}", id.hyphenated()))
}

/// Keep only plain segments: separators split, `.`/`..`/empty segments
/// vanish and anything outside `[A-Za-z0-9_-]` is removed.
fn sanitize_path(raw: &str) -> Vec<String> {
    raw.split(['/', '\\'])
        .filter(|segment| !matches!(*segment, "" | "." | ".."))
        .map(|segment| {
            segment
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
        })
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// `<prefix>/<category>/<uuid>.<extension>`, every component sanitized.
pub fn build_storage_key(prefix: &str, category: &str, extension: &str) -> String {
    let mut segments = sanitize_path(prefix);
    if segments.is_empty() {
        segments.push(ANONYMOUS_PREFIX.to_string());
    }
    segments.extend(sanitize_path(category));

    let extension = sanitize_path(extension).concat();
    let extension = if extension.is_empty() { "bin".to_string() } else { extension };

    segments.push(format!("{}.{}", Uuid::new_v4(), extension));
    segments.join("/")
}
