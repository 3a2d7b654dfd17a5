use tokio::sync::{mpsc, oneshot};

use crate::engines::{VideoDescriber, VisionLanguageBackend};

use super::{InferenceRequest, ModelStatus};

/// Inference thread that owns the engine.
///
/// Requests are handled strictly one at a time, so the backend never sees
/// concurrent calls. `ready_tx` receives the loaded model id, or the load
/// error, in which case the thread exits without serving anything.
pub fn inference_thread<B, F>(
    loader: F,
    mut rx: mpsc::Receiver<InferenceRequest>,
    ready_tx: oneshot::Sender<eyre::Result<String>>,
) where
    B: VisionLanguageBackend,
    F: FnOnce() -> eyre::Result<B>,
{
    let mut describer = match loader() {
        Ok(backend) => VideoDescriber::new(backend),
        Err(e) => {
            tracing::error!("Failed to load VLM model: {:#}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let loaded_at = chrono::Utc::now().timestamp();
    let mut requests_served: u64 = 0;
    let mut requests_failed: u64 = 0;

    tracing::info!("Model loaded successfully: {}", describer.model_id());
    let _ = ready_tx.send(Ok(describer.model_id().to_string()));

    tracing::info!("Inference thread ready, processing requests...");

    while let Some(request) = rx.blocking_recv() {
        match request {
            InferenceRequest::DescribeVideo {
                prompt,
                upload,
                response_tx,
            } => {
                let result = describer.describe(&prompt);
                match &result {
                    Ok(_) => requests_served += 1,
                    Err(e) => {
                        requests_failed += 1;
                        tracing::error!("Inference failed for {}: {:#}", upload.declared_name(), e);
                    }
                }
                // the stored file is released only after the engine is done
                drop(upload);
                if response_tx.send(result).is_err() {
                    tracing::warn!("Caller went away before inference finished");
                }
            }

            InferenceRequest::GetModelStatus { response_tx } => {
                let status = ModelStatus {
                    vlm: describer.model_id().to_string(),
                    loaded_at,
                    requests_served,
                    requests_failed,
                };
                let _ = response_tx.send(status);
            }
        }
    }

    tracing::info!("Inference thread shutting down");
}
