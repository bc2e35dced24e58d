//! Voice Bot Server Entry Point

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voicebot_config::{load_settings, Settings};
use voicebot_server::{create_router, init_metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine; the environment may already be set
    let dotenv = dotenvy::dotenv();

    // Priority: env vars > config/{env} > config/default > defaults
    let env = std::env::var("VOICEBOT_ENV").ok();
    let settings = load_settings(env.as_deref()).context("loading configuration")?;

    init_tracing(&settings);

    tracing::info!("Starting Voice Bot Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = ?settings.environment,
        config_env = env.as_deref().unwrap_or("default"),
        dotenv = dotenv.is_ok(),
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled && init_metrics().is_some() {
        tracing::info!("Initialized Prometheus metrics at /metrics");
    }

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}", settings.server.host))?;

    let state = AppState::build(settings).await?;
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("voicebot={},tower_http=info", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
