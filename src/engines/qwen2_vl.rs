//! Qwen2-VL processor
//!
//! Implements the text side of the Qwen2-VL processor in process: ChatML
//! template rendering, vision-info extraction with pixel-bound clamping,
//! tokenization and detokenization. Generation itself is delegated to the
//! [`GenerationWorker`].

use std::path::PathBuf;

use eyre::{Context, Result};
use tokenizers::Tokenizer;

use crate::config::Config;
use crate::types::{ChatMessage, ContentBlock, ImageInput, PreparedInputs, VideoInput, VisionInputs};
use crate::utils::path_from_media_uri;

use super::vlm::VisionLanguageBackend;
use super::worker::{GenerateRequest, GenerationWorker};

/// Processor-wide pixel range every image/video is clamped into
pub const PROCESSOR_MIN_PIXELS: u32 = 256 * 28 * 28;
pub const PROCESSOR_MAX_PIXELS: u32 = 1280 * 28 * 28;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

// Per-block defaults when a content block leaves them out
const DEFAULT_VIDEO_FPS: f32 = 2.0;
const VIDEO_MIN_PIXELS: u32 = 128 * 28 * 28;
const VIDEO_MAX_PIXELS: u32 = 768 * 28 * 28;
const IMAGE_MIN_PIXELS: u32 = 4 * 28 * 28;
const IMAGE_MAX_PIXELS: u32 = 16384 * 28 * 28;

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";
const VISION_START: &str = "<|vision_start|>";
const VISION_END: &str = "<|vision_end|>";
const IMAGE_PAD: &str = "<|image_pad|>";
const VIDEO_PAD: &str = "<|video_pad|>";

/// Qwen2-VL backend: local processor + remote generation
pub struct Qwen2VlBackend {
    model_id: String,
    tokenizer: Tokenizer,
    worker: GenerationWorker,
    min_pixels: u32,
    max_pixels: u32,
}

impl Qwen2VlBackend {
    /// Load the processor for `config.vlm_model` and connect to the worker.
    pub fn load(config: &Config) -> Result<Self> {
        tracing::info!("Loading VLM processor: {}", config.vlm_model);

        let model_dir = resolve_model_dir(&config.vlm_model)?;
        tracing::info!("Using VLM model directory: {:?}", model_dir);

        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(eyre::eyre!("tokenizer.json not found at {:?}", tokenizer_path));
        }
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| eyre::eyre!("Failed to load tokenizer: {}", e))?;

        let worker = GenerationWorker::new(&config.worker_url, config.inference_timeout)?;
        match worker.health_check() {
            Ok(()) => tracing::info!("Generation worker ready at {}", worker.base_url()),
            Err(e) => tracing::warn!("Generation worker not ready yet: {}", e),
        }

        Self::from_parts(&config.vlm_model, tokenizer, worker)
    }

    pub fn from_parts(model_id: &str, tokenizer: Tokenizer, worker: GenerationWorker) -> Result<Self> {
        for token in [IM_START, IM_END, VISION_START, VISION_END, IMAGE_PAD, VIDEO_PAD] {
            if tokenizer.token_to_id(token).is_none() {
                return Err(eyre::eyre!(
                    "Tokenizer for {} is missing special token {}",
                    model_id,
                    token
                ));
            }
        }

        Ok(Self {
            model_id: model_id.to_string(),
            tokenizer,
            worker,
            min_pixels: PROCESSOR_MIN_PIXELS,
            max_pixels: PROCESSOR_MAX_PIXELS,
        })
    }

    /// Clamp a requested pixel range into the processor range, keeping min <= max.
    fn clamp_pixels(&self, min: u32, max: u32) -> (u32, u32) {
        let max = max.clamp(self.min_pixels, self.max_pixels);
        let min = min.clamp(self.min_pixels, self.max_pixels).min(max);
        (min, max)
    }
}

impl VisionLanguageBackend for Qwen2VlBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        let mut prompt = String::new();

        for (index, msg) in messages.iter().enumerate() {
            if index == 0 && msg.role != crate::types::Role::System {
                prompt.push_str(IM_START);
                prompt.push_str("system\n");
                prompt.push_str(DEFAULT_SYSTEM_PROMPT);
                prompt.push_str(IM_END);
                prompt.push('\n');
            }

            prompt.push_str(IM_START);
            prompt.push_str(msg.role.as_str());
            prompt.push('\n');
            for block in &msg.content {
                match block {
                    ContentBlock::Image { .. } => {
                        prompt.push_str(VISION_START);
                        prompt.push_str(IMAGE_PAD);
                        prompt.push_str(VISION_END);
                    }
                    ContentBlock::Video { .. } => {
                        prompt.push_str(VISION_START);
                        prompt.push_str(VIDEO_PAD);
                        prompt.push_str(VISION_END);
                    }
                    ContentBlock::Text { text } => prompt.push_str(text),
                }
            }
            prompt.push_str(IM_END);
            prompt.push('\n');
        }

        if add_generation_prompt {
            prompt.push_str(IM_START);
            prompt.push_str("assistant\n");
        }
        Ok(prompt)
    }

    fn process_vision_info(&self, messages: &[ChatMessage]) -> Result<VisionInputs> {
        let mut vision = VisionInputs::default();

        for block in messages.iter().flat_map(|m| &m.content) {
            match block {
                ContentBlock::Video {
                    video,
                    fps,
                    min_pixels,
                    max_pixels,
                } => {
                    let path = path_from_media_uri(video)?;
                    if !path.is_file() {
                        return Err(eyre::eyre!("Video file not found: {:?}", path));
                    }
                    let fps = fps.unwrap_or(DEFAULT_VIDEO_FPS);
                    if !fps.is_finite() || fps <= 0.0 {
                        return Err(eyre::eyre!("Invalid fps {} for video {:?}", fps, path));
                    }
                    let (min_pixels, max_pixels) = self.clamp_pixels(
                        min_pixels.unwrap_or(VIDEO_MIN_PIXELS),
                        max_pixels.unwrap_or(VIDEO_MAX_PIXELS),
                    );
                    vision.videos.push(VideoInput {
                        path,
                        fps,
                        min_pixels,
                        max_pixels,
                    });
                }
                ContentBlock::Image {
                    image,
                    min_pixels,
                    max_pixels,
                } => {
                    let path = path_from_media_uri(image)?;
                    if !path.is_file() {
                        return Err(eyre::eyre!("Image file not found: {:?}", path));
                    }
                    let (min_pixels, max_pixels) = self.clamp_pixels(
                        min_pixels.unwrap_or(IMAGE_MIN_PIXELS),
                        max_pixels.unwrap_or(IMAGE_MAX_PIXELS),
                    );
                    vision.images.push(ImageInput {
                        path,
                        min_pixels,
                        max_pixels,
                    });
                }
                ContentBlock::Text { .. } => {}
            }
        }

        Ok(vision)
    }

    fn prepare_inputs(&self, texts: &[String], vision: VisionInputs) -> Result<PreparedInputs> {
        let input_ids = texts
            .iter()
            .map(|text| {
                // the template already carries every special token
                self.tokenizer
                    .encode(text.as_str(), false)
                    .map(|encoding| encoding.get_ids().to_vec())
                    .map_err(|e| eyre::eyre!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PreparedInputs { input_ids, vision })
    }

    fn generate(&mut self, inputs: &PreparedInputs, max_new_tokens: usize) -> Result<Vec<Vec<u32>>> {
        self.worker.generate(&GenerateRequest {
            model: &self.model_id,
            input_ids: &inputs.input_ids,
            videos: &inputs.vision.videos,
            images: &inputs.vision.images,
            max_new_tokens,
        })
    }

    fn batch_decode(&self, sequences: &[Vec<u32>], skip_special_tokens: bool) -> Result<Vec<String>> {
        sequences
            .iter()
            .map(|ids| {
                self.tokenizer
                    .decode(ids, skip_special_tokens)
                    .map_err(|e| eyre::eyre!("Decoding failed: {}", e))
            })
            .collect()
    }
}

/// Resolve a VLM model path/ID to a local directory holding `tokenizer.json`
fn resolve_model_dir(model_path: &str) -> Result<PathBuf> {
    let direct_path = PathBuf::from(crate::utils::expand_tilde(model_path));
    if direct_path.join("tokenizer.json").exists() {
        return Ok(direct_path);
    }

    if let Some(hub_path) = crate::utils::resolve_from_hub_cache(model_path) {
        return Ok(hub_path);
    }

    tracing::info!("Model {} not cached locally, fetching processor files", model_path);
    crate::download::fetch_processor_files(model_path)
        .with_context(|| format!("VLM model '{}' not found locally and could not be fetched", model_path))
}
