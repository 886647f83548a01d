use axum::http::HeaderValue;
use axum::{middleware, routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use talking_pet::app_state::AppState;
use talking_pet::config::AppConfig;
use talking_pet::db;
use talking_pet::routes::{self, auth::AuthSettings};
use talking_pet::services::{
    did::DidClient,
    fetch::HttpFetcher,
    metadata::PgMetadataRecorder,
    muxer::FfmpegMuxer,
    pipeline::{Collaborators, PipelineOrchestrator, PipelineSettings},
    poller::AsyncJobPoller,
    registry::ModelRegistry,
    replicate::ReplicateClient,
    storage::S3BlobStore,
    tts::{ElevenLabsClient, SpeechLimits},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing talking-pet server");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("pipeline_runs_total", "Pipeline runs started, by shape");
    metrics::describe_counter!(
        "pipeline_failures_total",
        "Pipeline runs that ended in an error, by shape and stage"
    );
    metrics::describe_histogram!(
        "generation_seconds",
        "Wall time from remote submission to terminal status"
    );
    metrics::describe_counter!(
        "compensating_deletes_total",
        "Uploaded artifacts removed after a later stage failed"
    );

    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let registry = ModelRegistry::new().expect("Model registry is inconsistent");

    tracing::info!(bucket = %config.storage_bucket, "Initializing object storage client");
    let storage = S3BlobStore::new(
        &config.storage_bucket,
        &config.storage_endpoint,
        &config.storage_region,
        &config.storage_access_key,
        &config.storage_secret_key,
        &config.storage_public_base_url,
    )
    .expect("Failed to initialize storage client");

    let http = reqwest::Client::new();
    let speech_limits = SpeechLimits {
        max_chars: config.tts_max_chars,
        max_bytes: config.tts_max_bytes,
    };

    if config.replicate_api_token.is_none() {
        tracing::warn!("REPLICATE_API_TOKEN not set; prompt pipelines will fail");
    }
    if config.eleven_api_key.is_none() {
        tracing::warn!("ELEVEN_API_KEY not set; speech pipelines will fail");
    }

    let collaborators = Collaborators {
        speech: Arc::new(ElevenLabsClient::new(
            http.clone(),
            config.eleven_base_url.clone(),
            config.eleven_api_key.clone(),
            config.tts_model_id.clone(),
            config.tts_output_format.clone(),
            speech_limits,
        )),
        generator: Arc::new(ReplicateClient::new(
            http.clone(),
            config.replicate_base_url.clone(),
            config.replicate_api_token.clone(),
        )),
        talker: Arc::new(DidClient::new(
            http.clone(),
            config.did_base_url.clone(),
            config.did_api_key.clone(),
        )),
        storage: Arc::new(storage),
        fetcher: Arc::new(HttpFetcher::new(http.clone(), config.max_artifact_bytes)),
        muxer: Arc::new(FfmpegMuxer::new(
            http,
            config.ffmpeg_path.clone(),
            config.max_artifact_bytes,
        )),
        recorder: Arc::new(PgMetadataRecorder::new(db_pool.clone())),
    };

    let settings = PipelineSettings {
        default_model: config.default_model.clone(),
        poller: AsyncJobPoller::new(config.poll_interval(), config.poll_timeout()),
        speech_limits,
        max_artifact_bytes: config.max_artifact_bytes,
    };

    let pipeline = PipelineOrchestrator::new(Arc::new(registry), collaborators, settings)
        .expect("DEFAULT_MODEL is not a supported model");

    let auth = AuthSettings {
        enabled: config.api_auth_enabled,
        token: config.api_auth_token.clone(),
    };
    if auth.enabled && auth.token.is_none() {
        tracing::error!("API_AUTH_ENABLED is set without API_AUTH_TOKEN; protected routes will return 500");
    }

    let state = AppState::new(db_pool, pipeline, auth);

    let cors = if config.allowed_origin == "*" {
        CorsLayer::permissive()
    } else {
        let origin: HeaderValue = config
            .allowed_origin
            .parse()
            .expect("ALLOWED_ORIGIN is not a valid header value");
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let protected = Router::new()
        .route("/models", get(routes::models::list_models))
        .route("/jobs", post(routes::jobs::talk_with_audio))
        .route("/jobs_tts", post(routes::jobs::talk_with_speech))
        .route("/jobs_prompt_only", post(routes::jobs::prompt_only))
        .route("/jobs_prompt_tts", post(routes::jobs::prompt_with_speech))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::require_bearer,
        ));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(protected)
        .with_state(state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(1024 * 1024));

    tracing::info!("Starting talking-pet on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
