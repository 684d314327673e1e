//! # Outreach Node
//!
//! Development backend serving the research draft endpoints from memory.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use outreach_core::OutreachConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod state;

use state::AppState;

/// Run the outreach node server.
pub async fn run_server(config: OutreachConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .node
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {:?}", config.node.bind))?;

    let state = AppState::from_config(&config.node);
    if !config.node.outbound_configured {
        info!("Outbound mail disabled; sends will report SMTP not configured");
    }

    let app = create_router(state);

    info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router.
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/api/v1/research/:id/drafts", get(api::research::get_drafts))
        .route("/api/v1/research/:id/generate", post(api::research::generate))
        .route("/api/v1/research/:id/send", post(api::research::send_ad_hoc))
        .route(
            "/api/v1/research/send/:email_log_id",
            post(api::research::send_draft),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("OUTREACH_CONFIG").ok())
        .map(PathBuf::from);

    let config = OutreachConfig::load(config_path.as_deref())?;

    info!("Outreach node starting...");
    run_server(config).await
}
