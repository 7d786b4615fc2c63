//! HTTP server
//!
//! Exposes the generation service over a small JSON API:
//!
//! - POST /deconstruct - Decompose an invention
//! - POST /simulate - Development pathways in a target era
//! - POST /generate-image - Illustrate a prompt or pathway
//! - POST /narrative - Story for one pathway
//! - POST /transcribe - Speech to text (multipart field `audio`)
//! - POST /export - PowerPoint download of collected results
//! - GET /health - Uptime, version and provider availability
//! - GET /cache-stats, POST /cache/clear - Cache maintenance
//!
//! CORS is permissive on every route. The generation endpoints share a
//! per-client rate limit.

pub mod error;
pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use sdk::errors::EngineError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::cache::spawn_sweeper;
use crate::config::Config;
use crate::rate_limiter::RateLimiter;
use crate::service::GenerationService;

pub use error::{ApiError, ErrorBody};

/// Headroom above the audio limit for multipart framing and JSON exports
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GenerationService>,
    pub limiter: Option<Arc<RateLimiter>>,
    pub started: Instant,
}

impl AppState {
    /// State with the rate limit taken from the service limits
    pub fn new(service: Arc<GenerationService>) -> Self {
        let per_minute = service.limits().rate_limit_per_minute;
        let limiter = (per_minute > 0).then(|| Arc::new(RateLimiter::per_minute(per_minute)));
        Self {
            service,
            limiter,
            started: Instant::now(),
        }
    }

    pub fn with_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.service.limits().max_audio_bytes + BODY_LIMIT_SLACK;

    Router::new()
        .route("/deconstruct", post(routes::deconstruct))
        .route("/simulate", post(routes::simulate))
        .route("/generate-image", post(routes::generate_image))
        .route("/narrative", post(routes::narrative))
        .route("/transcribe", post(routes::transcribe))
        .route("/export", post(routes::export_deck))
        .route("/health", get(routes::health))
        .route("/cache-stats", get(routes::cache_stats))
        .route("/cache/clear", post(routes::cache_clear))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Bind, serve until Ctrl-C, then stop the cache sweep
pub async fn serve(config: &Config, service: GenerationService) -> Result<(), EngineError> {
    let service = Arc::new(service);
    let sweeper = spawn_sweeper(
        Arc::clone(service.cache()),
        Duration::from_secs(config.cache.sweep_interval_secs),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;
    tracing::info!("Uchronia listening on http://{}", local);

    let app = router(AppState::new(service));
    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    sweeper.abort();
    tracing::info!("Server stopped");
    result.map_err(EngineError::from)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down gracefully");
}
