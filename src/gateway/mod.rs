//! Gateway 应用层
//!
//! HTTP 服务器和请求处理

mod handlers;
mod middleware;
mod state;

pub use state::AppState;

use anyhow::Result;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::library::ProvocationLibrary;
use crate::providers::{GeminiConfig, GeminiProvider};
use crate::relay::ProvocationRelay;
use crate::utils::build_upstream_client;

pub async fn serve(config: Config) -> Result<()> {
    let provider = GeminiProvider::new(
        build_upstream_client()?,
        GeminiConfig {
            base_url: config.gemini_base_url.clone(),
            model: config.gemini_model.clone(),
        },
    );
    tracing::info!(model = provider.model(), "Using Gemini provider");

    if config.gemini_api_key.is_none() {
        tracing::warn!(
            "GEMINI_API_KEY is not set; /generate-provocation will report a configuration error"
        );
    }

    let relay = ProvocationRelay::new(config.gemini_api_key.clone(), Arc::new(provider));
    tracing::info!(
        provocations = %config.library.provocations.display(),
        scores = %config.library.scores.display(),
        "Using provocation library files"
    );
    let state = AppState::new(relay, ProvocationLibrary::new(config.library.clone()));

    let static_dir = config.static_dir();
    match static_dir {
        Some(dir) => tracing::info!("Serving static files from {}", dir.display()),
        None => tracing::info!(
            "Static directory {} not found, static serving disabled",
            config.static_dir.display()
        ),
    }

    let app = build_router(state, static_dir);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn build_router(state: AppState, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route(
            "/generate-provocation",
            post(handlers::handle_generate_provocation),
        )
        .route("/health", get(handlers::handle_health))
        .route("/api/thinkers", get(handlers::handle_thinkers))
        .route("/api/provocations", get(handlers::handle_provocations))
        .route("/api/vote", post(handlers::handle_tally_vote))
        .route("/get_unvoted_provocations", get(handlers::handle_unvoted))
        .route("/vote", post(handlers::handle_score_vote));

    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_logger))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    tokio::select! {
        _ = ctrl_c => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
