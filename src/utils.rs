//! Shared utility functions

use std::path::{Path, PathBuf};

use eyre::Result;

/// Longest stored filename suffix kept from a client-declared name
const MAX_FILENAME_LEN: usize = 128;

/// Expand `~` prefix to the user's home directory.
///
/// Returns the original string unchanged if it doesn't start with `~/`
/// or if the home directory cannot be determined.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    path.to_string()
}

/// Resolve a HuggingFace Hub cache directory to its snapshot path.
///
/// Picks the first snapshot that actually carries a tokenizer, falling
/// back to the directory itself when there is no `snapshots/` layout.
pub fn resolve_hf_snapshot(model_dir: &Path) -> Result<PathBuf> {
    let snapshots_dir = model_dir.join("snapshots");
    if !snapshots_dir.exists() {
        return Ok(model_dir.to_path_buf());
    }
    std::fs::read_dir(&snapshots_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.is_dir() && p.join("tokenizer.json").exists())
        .ok_or_else(|| eyre::eyre!("No usable snapshot found in {:?}", snapshots_dir))
}

/// Resolve a model ID (e.g. "Qwen/Qwen2-VL-7B-Instruct") by searching
/// standard model hub cache directories.
///
/// Checks `HUGGINGFACE_HUB_CACHE`, `HF_HOME/hub`, `~/.cache/huggingface/hub`,
/// then the ModelScope caches. Returns `None` when no cached copy has a
/// `tokenizer.json`.
pub fn resolve_from_hub_cache(model_id: &str) -> Option<PathBuf> {
    let home = dirs::home_dir();

    let hf_dir_name = format!("models--{}", model_id.replace('/', "--"));
    let hf_cache_roots = [
        std::env::var("HUGGINGFACE_HUB_CACHE").map(PathBuf::from).ok(),
        std::env::var("HF_HOME")
            .map(|h| PathBuf::from(h).join("hub"))
            .ok(),
        home.as_ref().map(|h| h.join(".cache/huggingface/hub")),
    ];

    for root in hf_cache_roots.iter().flatten() {
        let model_dir = root.join(&hf_dir_name);
        if model_dir.exists() {
            if let Ok(resolved) = resolve_hf_snapshot(&model_dir) {
                tracing::info!("Found model in HuggingFace cache: {:?}", resolved);
                return Some(resolved);
            }
        }
    }

    let ms_cache_roots = [
        std::env::var("MODELSCOPE_CACHE")
            .map(|c| PathBuf::from(c).join("hub"))
            .ok(),
        home.as_ref().map(|h| h.join(".cache/modelscope/hub")),
    ];

    for root in ms_cache_roots.iter().flatten() {
        let model_dir = root.join(model_id);
        if model_dir.join("tokenizer.json").exists() {
            tracing::info!("Found model in ModelScope cache: {:?}", model_dir);
            return Some(model_dir);
        }
    }

    None
}

/// Reduce a client-declared filename to something safe to embed in a
/// local file name.
///
/// Directory components are dropped, anything outside
/// `[A-Za-z0-9._-]` becomes `_`, and leading dots are stripped so the
/// result is never hidden or a traversal component.
pub fn sanitize_upload_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    // keep the tail so the extension survives truncation
    let char_count = cleaned.chars().count();
    let cleaned: String = if char_count > MAX_FILENAME_LEN {
        cleaned.chars().skip(char_count - MAX_FILENAME_LEN).collect()
    } else {
        cleaned.to_string()
    };

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Turn a `file://` URI (or a bare path) from a content block into a path.
pub fn path_from_media_uri(uri: &str) -> Result<PathBuf> {
    if let Some(path) = uri.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if uri.contains("://") {
        return Err(eyre::eyre!("Unsupported media source: {}", uri));
    }
    Ok(PathBuf::from(expand_tilde(uri)))
}
