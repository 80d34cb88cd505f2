use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    config::{AppConfig, AuthConfig, Environment},
    database,
    error::Result,
    routes,
    services::ImageStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub auth: AuthConfig,
    pub storage: Arc<ImageStorage>,
    pub environment: Environment,
}

pub async fn build(config: &AppConfig) -> Result<Router> {
    let pool = database::create_pool(&config.database).await?;

    let storage = ImageStorage::from_config(&config.storage).await?;
    tracing::info!("Image storage backend: {}", storage.storage_type());

    let state = AppState {
        db: pool,
        auth: config.auth.clone(),
        storage: Arc::new(storage),
        environment: config.environment,
    };

    let allowed_origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .map(|origin| {
            origin.parse::<HeaderValue>().map_err(|_| {
                crate::error::AppError::ConfigError(format!("Invalid CORS origin: {}", origin))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_credentials(true)
        .allow_origin(allowed_origins);

    let app = routes::create_router(state)
        .nest_service("/uploads", ServeDir::new(&config.storage.upload_dir))
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}
