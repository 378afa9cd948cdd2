//! Teammate chat backend
//!
//! Serves `POST /api/chat`. With `OPENAI_API_KEY` set, replies come from an
//! OpenAI-compatible model; otherwise a templated reply echoes the request.

use std::net::SocketAddr;
use teammate::api::{create_router, AppState};
use teammate::config::ServerConfig;
use teammate::llm::LlmService;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teammate=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env();

    let llm = config.llm.build_service();
    match &llm {
        Some(service) => tracing::info!(model = %service.model_id(), "Model configured"),
        None => tracing::warn!("OPENAI_API_KEY not set, answering with templated replies"),
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(AppState::new(llm))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Teammate backend listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
