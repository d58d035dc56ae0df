use std::sync::Arc;

use viewsync::auth::StaticTokens;
use viewsync::config::RelayConfig;
use viewsync::{routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = RelayConfig::from_env();
    let tokens = StaticTokens::parse(&config.tokens).expect("invalid VIEWSYNC_TOKENS");
    if tokens.is_empty() {
        tracing::warn!("VIEWSYNC_TOKENS is empty; every connection will be rejected");
    }

    let state = state::AppState::new(Arc::new(tokens), config.client_queue);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "viewsync relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
