//! In-memory backend for tests.
//!
//! Tokens are Unicode scalar values; private-use code points stand in for
//! special tokens. Generation echoes the prompt and appends a fixed reply.

use eyre::Result;

use super::vlm::VisionLanguageBackend;
use crate::types::{ChatMessage, ContentBlock, PreparedInputs, VideoInput, VisionInputs};

const TURN_START: char = '\u{E000}';
const TURN_END: char = '\u{E001}';
const VIDEO_PAD: char = '\u{E002}';

pub struct ScriptedBackend {
    reply: String,
}

impl ScriptedBackend {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
        }
    }
}

fn is_special(id: u32) -> bool {
    (0xE000..=0xE0FF).contains(&id)
}

impl VisionLanguageBackend for ScriptedBackend {
    fn model_id(&self) -> &str {
        "scripted"
    }

    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        let mut prompt = String::new();
        for message in messages {
            prompt.push(TURN_START);
            prompt.push_str(message.role.as_str());
            prompt.push('\n');
            for block in &message.content {
                match block {
                    ContentBlock::Video { .. } | ContentBlock::Image { .. } => prompt.push(VIDEO_PAD),
                    ContentBlock::Text { text } => prompt.push_str(text),
                }
            }
            prompt.push(TURN_END);
            prompt.push('\n');
        }
        if add_generation_prompt {
            prompt.push(TURN_START);
            prompt.push_str("assistant\n");
        }
        Ok(prompt)
    }

    fn process_vision_info(&self, messages: &[ChatMessage]) -> Result<VisionInputs> {
        let mut vision = VisionInputs::default();
        for block in messages.iter().flat_map(|m| &m.content) {
            if let ContentBlock::Video { video, fps, .. } = block {
                let path = crate::utils::path_from_media_uri(video)?;
                if !path.exists() {
                    return Err(eyre::eyre!("Video file not found: {:?}", path));
                }
                vision.videos.push(VideoInput {
                    path,
                    fps: fps.unwrap_or(2.0),
                    min_pixels: 0,
                    max_pixels: u32::MAX,
                });
            }
        }
        Ok(vision)
    }

    fn prepare_inputs(&self, texts: &[String], vision: VisionInputs) -> Result<PreparedInputs> {
        Ok(PreparedInputs {
            input_ids: texts
                .iter()
                .map(|t| t.chars().map(u32::from).collect())
                .collect(),
            vision,
        })
    }

    fn generate(&mut self, inputs: &PreparedInputs, max_new_tokens: usize) -> Result<Vec<Vec<u32>>> {
        Ok(inputs
            .input_ids
            .iter()
            .map(|prompt| {
                let mut sequence = prompt.clone();
                sequence.extend(self.reply.chars().map(u32::from).take(max_new_tokens));
                sequence.push(u32::from(TURN_END));
                sequence
            })
            .collect())
    }

    fn batch_decode(&self, sequences: &[Vec<u32>], skip_special_tokens: bool) -> Result<Vec<String>> {
        Ok(sequences
            .iter()
            .map(|ids| {
                ids.iter()
                    .filter(|id| !(skip_special_tokens && is_special(**id)))
                    .filter_map(|id| char::from_u32(*id))
                    .collect()
            })
            .collect())
    }
}
