//! Bot analyzer server
//!
//! Serves the conversation store over HTTP and relays start calls to the
//! target bot's webhook.

use bot_analyzer::api::{create_router, AppState};
use bot_analyzer::config::ServerConfig;
use bot_analyzer::store::{spawn_sweeper, ConversationStore};
use bot_analyzer::webhook::{HttpWebhook, LoggingForwarder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bot_analyzer=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        port = config.port,
        ttl_secs = config.conversation_ttl.as_secs(),
        sweep_secs = config.sweep_interval.as_secs(),
        "Configuration loaded"
    );

    let store = Arc::new(ConversationStore::new(config.conversation_ttl));
    let webhook = Arc::new(LoggingForwarder::new(Arc::new(HttpWebhook::new(
        config.webhook_timeout,
    )?)));

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(store.clone(), config.sweep_interval, shutdown.clone());

    let state = AppState::new(store, webhook);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true).deflate(true);

    let app = create_router(state).layer(cors).layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Bot analyzer listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown requested");
        })
        .await?;

    shutdown.cancel();
    sweeper.await?;

    Ok(())
}
