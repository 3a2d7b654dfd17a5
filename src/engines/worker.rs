//! HTTP client for the generation worker
//!
//! Generation runs out of process next to the GPU. The worker receives
//! prompt token ids plus references to the stored media and answers with
//! full sequences (prompt followed by new tokens).

use std::time::Duration;

use eyre::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::types::{ImageInput, VideoInput};

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub input_ids: &'a [Vec<u32>],
    pub videos: &'a [VideoInput],
    pub images: &'a [ImageInput],
    pub max_new_tokens: usize,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub sequences: Vec<Vec<u32>>,
}

pub struct GenerationWorker {
    client: Client,
    base_url: String,
}

impl GenerationWorker {
    /// Build a client for the worker at `base_url` (e.g. "http://127.0.0.1:8001").
    ///
    /// Must not be called from inside an async runtime.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the worker answers its health endpoint
    pub fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Generation worker unreachable at {}", url))?;
        if !response.status().is_success() {
            return Err(eyre::eyre!(
                "Generation worker health check failed: {}",
                response.status()
            ));
        }
        Ok(())
    }

    pub fn generate(&self, request: &GenerateRequest<'_>) -> Result<Vec<Vec<u32>>> {
        let url = format!("{}/generate", self.base_url);
        tracing::debug!(
            "Sending generate request to {} ({} sequences, {} videos, max_new_tokens={})",
            url,
            request.input_ids.len(),
            request.videos.len(),
            request.max_new_tokens
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .context("Generation request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(eyre::eyre!("Generation worker returned {}: {}", status, body));
        }

        let response: GenerateResponse = response
            .json()
            .context("Failed to parse generation response")?;

        if response.sequences.len() != request.input_ids.len() {
            return Err(eyre::eyre!(
                "Generation worker returned {} sequences for {} prompts",
                response.sequences.len(),
                request.input_ids.len()
            ));
        }
        Ok(response.sequences)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_worker_url_normalized() {
        let worker = GenerationWorker::new("http://127.0.0.1:8001/", Duration::from_secs(5)).unwrap();
        assert_eq!(worker.base_url(), "http://127.0.0.1:8001");
    }

    #[test]
    fn test_generate_request_body() {
        let input_ids = vec![vec![151644, 872, 198]];
        let videos = vec![VideoInput {
            path: PathBuf::from("/srv/uploads/upload-abc-clip.mp4"),
            fps: 1.0,
            min_pixels: 200_704,
            max_pixels: 200_704,
        }];
        let request = GenerateRequest {
            model: "Qwen/Qwen2-VL-7B-Instruct-GPTQ-Int4",
            input_ids: &input_ids,
            videos: &videos,
            images: &[],
            max_new_tokens: 128,
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["input_ids"][0][0], 151644);
        assert_eq!(body["videos"][0]["path"], "/srv/uploads/upload-abc-clip.mp4");
        assert_eq!(body["videos"][0]["fps"], 1.0);
        assert_eq!(body["images"].as_array().unwrap().len(), 0);
        assert_eq!(body["max_new_tokens"], 128);
    }

    #[test]
    fn test_unreachable_worker_errors() {
        // port 9 (discard) is not expected to run an HTTP server
        let worker = GenerationWorker::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(worker.health_check().is_err());
    }
}
