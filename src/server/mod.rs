mod error;
mod rate_limit;
mod routes;

use crate::{
    config::{Config, ServerConfig},
    media::MediaService,
};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use error::ApiError;
use rate_limit::RateLimiter;
use std::{any::Any, net::SocketAddr};
use tokio::{net::TcpListener, signal};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any as AnyOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub media: MediaService,
    pub expose_errors: bool,
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .expose_headers([header::CONTENT_DISPOSITION]);

    if server.allows_any_origin() {
        return cors.allow_origin(AnyOrigin);
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
}

fn handle_panic(_panic: Box<dyn Any + Send + 'static>) -> Response {
    error!("Request handler panicked");
    ApiError::internal("Internal server error", "Something went wrong").into_response()
}

pub fn router(state: AppState, config: &Config) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/download/info", post(routes::download_info))
        .route("/api/download/start", post(routes::download_start))
        .fallback(routes::not_found)
        .with_state(state);

    if let Some(limiter) = RateLimiter::from_config(&config.rate_limit) {
        app = app.layer(middleware::from_fn_with_state(
            limiter,
            rate_limit::limit_requests,
        ));
    }

    app.layer(DefaultBodyLimit::max(config.server.body_limit_bytes))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
    info!("Shutdown signal received");
}

pub async fn run(config: Config) -> Result<()> {
    let media = MediaService::new(&config.media).context("Failed to initialize media service")?;
    media.test_setup().await;

    let state = AppState {
        media,
        expose_errors: !config.server.is_production(),
    };
    let app = router(state, &config);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("📱 Environment: {}", config.server.environment);
    info!("🔗 Health check: http://{}/api/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    Ok(())
}
