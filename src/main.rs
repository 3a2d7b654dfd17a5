//! video-vlm-api: ask a vision-language model about an uploaded video
//!
//! Provides endpoints for:
//! - POST /upload/ - multipart `video` + `text`, answers `{"text": ...}`
//! - GET  /health - Liveness
//! - GET  /v1/models/status - Loaded model and request counters
//!
//! The engine is owned by a dedicated inference thread and requests reach it
//! over a channel, so generation is serialized no matter how many uploads
//! arrive at once.

use eyre::Context;
use salvo::prelude::*;
use tokio::sync::{mpsc, oneshot};

mod config;
mod download;
mod error;
mod state;
mod storage;

mod engines;
mod handlers;
mod inference;
mod router;

mod types;
mod utils;

use config::Config;
use inference::InferenceRequest;
use state::AppState;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_vlm_api=info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Starting video-vlm-api server on port {}", config.port);

    let uploads = storage::UploadStore::new(&config.upload_dir, config.retain_uploads);
    uploads.ensure_dir()?;
    tracing::info!(
        "Uploads stored in {:?} (retain: {})",
        uploads.dir(),
        config.retain_uploads
    );
    if let Some(ref fixed) = config.video_path_override {
        tracing::warn!("VIDEO_PATH_OVERRIDE set: every request will use {}", fixed);
    }

    let (inference_tx, inference_rx) = mpsc::channel::<InferenceRequest>(32);
    let (ready_tx, ready_rx) = oneshot::channel();

    // Spawn inference thread (owns the engine)
    let config_clone = config.clone();
    std::thread::spawn(move || {
        inference::inference_thread(
            || engines::qwen2_vl::Qwen2VlBackend::load(&config_clone),
            inference_rx,
            ready_tx,
        );
    });

    // Wait for the model to load
    let model_id = ready_rx
        .await
        .context("Failed to receive ready signal from inference thread")?
        .context("Failed to load VLM model")?;
    tracing::info!("Inference thread ready with model {}", model_id);

    let state = AppState::new(&config, inference_tx);
    let router = router::build_router(state);

    let listen_addr = format!("0.0.0.0:{}", config.port);
    let acceptor = TcpListener::new(&listen_addr).bind().await;

    tracing::info!("HTTP server listening on http://{}", listen_addr);
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /v1/models/status");
    tracing::info!("  POST /upload/");

    Server::new(acceptor).serve(router).await;

    Ok(())
}
