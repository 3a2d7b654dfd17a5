//! Processor file download from the model registry
//!
//! Only the files the in-process processor needs are fetched; weights stay
//! with the generation worker.

use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;

/// Files fetched for a model. The first one is mandatory.
const PROCESSOR_FILES: &[&str] = &[
    "tokenizer.json",
    "tokenizer_config.json",
    "config.json",
    "preprocessor_config.json",
];

/// Download the processor files of `model_id` into the local cache and
/// return the directory they live in.
///
/// Already-present files are not fetched again.
pub fn fetch_processor_files(model_id: &str) -> Result<PathBuf> {
    if model_id.contains("..") || model_id.split('/').count() != 2 {
        return Err(eyre::eyre!(
            "Model id '{}' is not a registry id of the form org/name",
            model_id
        ));
    }

    let dest_dir = cache_dir_for(model_id)?;
    std::fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Failed to create model directory {:?}", dest_dir))?;

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(600))
        .build()
        .context("Failed to create HTTP client")?;
    let base = hf_base_url();
    let token = get_hf_token();

    for (index, file) in PROCESSOR_FILES.iter().enumerate() {
        let local_path = dest_dir.join(file);
        if local_path.exists() {
            continue;
        }

        let url = format!("{}/{}/resolve/main/{}", base, model_id, file);
        tracing::info!("Downloading [{}/{}]: {}", index + 1, PROCESSOR_FILES.len(), url);
        match download_file(&client, &url, &local_path, token.as_deref()) {
            Ok(true) => {}
            Ok(false) if index == 0 => {
                return Err(eyre::eyre!("{} not found in registry for {}", file, model_id));
            }
            Ok(false) => tracing::warn!("{} not published for {}, skipping", file, model_id),
            Err(e) => return Err(e),
        }
    }

    tracing::info!("Processor files ready in {:?}", dest_dir);
    Ok(dest_dir)
}

/// Local cache directory for a registry model id
fn cache_dir_for(model_id: &str) -> Result<PathBuf> {
    let root = match std::env::var("VLM_CACHE_DIR") {
        Ok(dir) => PathBuf::from(crate::utils::expand_tilde(&dir)),
        Err(_) => dirs::home_dir()
            .ok_or_else(|| eyre::eyre!("Cannot determine home directory for model cache"))?
            .join(".cache/video-vlm-api/models"),
    };
    Ok(root.join(model_id.replace('/', "--")))
}

/// Registry host, honoring `HF_ENDPOINT` mirrors
fn hf_base_url() -> String {
    std::env::var("HF_ENDPOINT")
        .map(|e| e.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| "https://huggingface.co".to_string())
}

/// Read the HuggingFace token from `HF_TOKEN` or `~/.cache/huggingface/token`.
fn get_hf_token() -> Option<String> {
    std::env::var("HF_TOKEN")
        .ok()
        .or_else(|| {
            let token_path = dirs::home_dir()?.join(".cache/huggingface/token");
            std::fs::read_to_string(token_path).ok()
        })
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Stream `url` into `dest`. Returns `Ok(false)` when the file does not exist.
fn download_file(client: &Client, url: &str, dest: &Path, token: Option<&str>) -> Result<bool> {
    let mut request = client.get(url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let mut response = request
        .send()
        .with_context(|| format!("Request to {} failed", url))?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    if !response.status().is_success() {
        return Err(eyre::eyre!("Download of {} failed: HTTP {}", url, response.status()));
    }

    // write to a sibling and rename so a crash never leaves a truncated file
    let partial = dest.with_extension("part");
    let mut file = std::fs::File::create(&partial)
        .with_context(|| format!("Failed to create {:?}", partial))?;
    let result = response
        .copy_to(&mut file)
        .map_err(eyre::Report::from)
        .and_then(|_| file.flush().map_err(eyre::Report::from));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(e.wrap_err(format!("Failed to download {}", url)));
    }
    std::fs::rename(&partial, dest)
        .with_context(|| format!("Failed to move {:?} into place", partial))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_registry_ids() {
        assert!(fetch_processor_files("/models/local-dir/qwen").is_err());
        assert!(fetch_processor_files("../escape/x").is_err());
        assert!(fetch_processor_files("no-org").is_err());
    }

    #[test]
    fn test_cache_dir_flattens_org() {
        let dir = cache_dir_for("Qwen/Qwen2-VL-7B-Instruct-GPTQ-Int4").unwrap();
        assert!(dir.ends_with("Qwen--Qwen2-VL-7B-Instruct-GPTQ-Int4"));
    }
}
