use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use chartgate::{build_app, demo_state};
use chartgate_phi_cipher::FieldCipher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let secret =
        std::env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".to_string());
    let cipher = FieldCipher::from_env();
    tracing::info!(mode = ?cipher.mode(), "PHI field cipher initialized");

    let state = demo_state(secret.as_bytes(), cipher);
    let app = build_app(state);

    let bind: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        .parse()
        .context("invalid BIND_ADDR")?;
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, "chartgate demo server listening");

    axum::serve(listener, app.into_make_service())
        .await
        .context("server exited")?;
    Ok(())
}
