use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsclf_server::config::{Args, LogFormat, ServerConfig};
use newsclf_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServerConfig::load(&args)?;

    init_tracing(&config);

    tracing::info!(
        "Starting newsclf-server (model_dir={}, tokenizer={}, mode={:?}, dummy_fallback={})",
        config.artifacts.model_dir.display(),
        config.artifacts.tokenizer_path.display(),
        config.loading.mode,
        config.loading.dummy_fallback
    );

    let addr = config.resolve_addr().await?;
    let state = AppState::initialize(config).await?;
    let app = build_router(state);

    tracing::info!("🚀 newsclf server listening on http://{}", addr);
    tracing::info!("📚 Try: curl -X POST http://{}/predict -H 'content-type: application/json' -d '{{\"text\": \"...\"}}'", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log.level.clone().into());

    let registry = tracing_subscriber::registry().with(filter);
    match config.log.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        // 无法监听信号时一直运行
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
