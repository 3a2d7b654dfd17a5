use std::path::PathBuf;
use std::time::Duration;

/// Default model served when `VLM_MODEL` is unset
pub const DEFAULT_VLM_MODEL: &str = "Qwen/Qwen2-VL-7B-Instruct-GPTQ-Int4";

/// Configuration from environment
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub vlm_model: String,
    pub worker_url: String,
    pub upload_dir: PathBuf,
    pub retain_uploads: bool,
    pub max_upload_bytes: u64,
    pub inference_timeout: Duration,
    /// Fixed video reference sent to the engine instead of the stored upload
    pub video_path_override: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            vlm_model: lookup("VLM_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VLM_MODEL.to_string()),
            worker_url: lookup("VLM_WORKER_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://127.0.0.1:8001".to_string()),
            upload_dir: lookup("UPLOAD_DIR")
                .map(|d| PathBuf::from(crate::utils::expand_tilde(&d)))
                .unwrap_or_else(|| PathBuf::from("uploads")),
            retain_uploads: lookup("RETAIN_UPLOADS")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(512 * 1024 * 1024),
            inference_timeout: Duration::from_secs(
                lookup("INFERENCE_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            video_path_override: lookup("VIDEO_PATH_OVERRIDE").filter(|p| !p.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.vlm_model, DEFAULT_VLM_MODEL);
        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert!(!config.retain_uploads);
        assert_eq!(config.inference_timeout, Duration::from_secs(300));
        assert!(config.video_path_override.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("PORT", "9100"),
            ("VLM_WORKER_URL", "http://gpu-box:9000/"),
            ("RETAIN_UPLOADS", "TRUE"),
            ("INFERENCE_TIMEOUT_SECS", "30"),
            ("VIDEO_PATH_OVERRIDE", "file:///srv/clip.mp4"),
        ]);
        assert_eq!(config.port, 9100);
        assert_eq!(config.worker_url, "http://gpu-box:9000");
        assert!(config.retain_uploads);
        assert_eq!(config.inference_timeout, Duration::from_secs(30));
        assert_eq!(config.video_path_override.as_deref(), Some("file:///srv/clip.mp4"));
    }

    #[test]
    fn test_unparsable_port_falls_back() {
        assert_eq!(config_with(&[("PORT", "eighty")]).port, 8000);
    }
}
