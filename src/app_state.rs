use sqlx::PgPool;
use std::sync::Arc;

use crate::routes::auth::AuthSettings;
use crate::services::pipeline::PipelineOrchestrator;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub pipeline: Arc<PipelineOrchestrator>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(db: PgPool, pipeline: PipelineOrchestrator, auth: AuthSettings) -> Self {
        Self {
            db,
            pipeline: Arc::new(pipeline),
            auth: Arc::new(auth),
        }
    }
}
