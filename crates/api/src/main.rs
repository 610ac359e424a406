use std::time::Duration;

use anyhow::{Context, Result};
use rihla_api::{build_router, build_state, ApiConfig};
use rihla_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("rihla_api");

    let config = ApiConfig::from_env();
    let state = build_state(&config)?;
    let conversations = state.conversations.clone();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed binding {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        reply_delay_ms = config.reply_delay.as_millis() as u64,
        "rihla chat api started"
    );

    let sweeper = {
        let conversations = conversations.clone();
        let period = config.conversation_idle.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                conversations.evict_idle();
            }
        })
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    sweeper.abort();
    conversations.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed listening for ctrl-c; serving until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("ctrl-c received, shutting down");
}
