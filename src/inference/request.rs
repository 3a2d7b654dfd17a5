use tokio::sync::oneshot;

use crate::storage::StoredUpload;
use crate::types::VideoPrompt;

/// Request sent to the inference thread
pub enum InferenceRequest {
    /// Answer a prompt about a stored upload.
    ///
    /// The upload travels with the request so the file stays on disk until
    /// the engine is done with it, even if the caller stopped waiting.
    DescribeVideo {
        prompt: VideoPrompt,
        upload: StoredUpload,
        response_tx: oneshot::Sender<eyre::Result<String>>,
    },
    /// Get current model status
    GetModelStatus {
        response_tx: oneshot::Sender<ModelStatus>,
    },
}

/// Current status of the loaded model
#[derive(Clone, Debug, serde::Serialize)]
pub struct ModelStatus {
    pub vlm: String,
    /// Unix timestamp of when the model finished loading
    pub loaded_at: i64,
    pub requests_served: u64,
    pub requests_failed: u64,
}
