use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::queries;
use crate::models::pet_video::PetVideoRecord;

/// Persists the record of a finished video.
#[async_trait]
pub trait MetadataRecorder: Send + Sync {
    async fn record(&self, record: &PetVideoRecord) -> Result<(), MetadataError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to store video metadata: {0}")]
    Database(sqlx::Error),

    #[error("Video metadata rejected: {0}")]
    Rejected(String),
}

pub struct PgMetadataRecorder {
    pool: PgPool,
}

impl PgMetadataRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// A second row for the same storage key is a rejection, not an outage.
fn classify(err: sqlx::Error, storage_key: &str) -> MetadataError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            MetadataError::Rejected(format!("storage key {storage_key} already recorded"))
        }
        other => MetadataError::Database(other),
    }
}

#[async_trait]
impl MetadataRecorder for PgMetadataRecorder {
    async fn record(&self, record: &PetVideoRecord) -> Result<(), MetadataError> {
        queries::insert_pet_video(&self.pool, record)
            .await
            .map_err(|err| classify(err, &record.storage_key))?;
        tracing::info!(
            storage_key = %record.storage_key,
            user_id = ?record.user_id,
            "Pet video recorded"
        );
        Ok(())
    }
}
