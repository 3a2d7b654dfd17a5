use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::Config;
use crate::inference::InferenceRequest;
use crate::storage::UploadStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Channel to send inference requests
    pub inference_tx: mpsc::Sender<InferenceRequest>,
    /// Where uploads are written for the duration of a request
    pub uploads: UploadStore,
    /// Upper bound on how long a handler waits for the inference thread
    pub inference_timeout: Duration,
    pub max_upload_bytes: u64,
    /// Fixed video reference used in place of the stored upload
    pub video_path_override: Option<String>,
    pub worker_url: String,
}

impl AppState {
    pub fn new(config: &Config, inference_tx: mpsc::Sender<InferenceRequest>) -> Self {
        Self {
            inference_tx,
            uploads: UploadStore::new(&config.upload_dir, config.retain_uploads),
            inference_timeout: config.inference_timeout,
            max_upload_bytes: config.max_upload_bytes,
            video_path_override: config.video_path_override.clone(),
            worker_url: config.worker_url.clone(),
        }
    }
}
