use std::path::PathBuf;

use serde::Serialize;

/// Tokens generated per request
pub const MAX_NEW_TOKENS: usize = 128;
/// Frame sampling rate requested for uploaded videos
pub const VIDEO_FPS: f32 = 1.0;
/// Per-video pixel ceiling requested for uploaded videos
pub const VIDEO_MAX_PIXELS: u32 = 360 * 420;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// A typed unit of a conversational turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Video {
        video: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        fps: Option<f32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_pixels: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_pixels: Option<u32>,
    },
    Image {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_pixels: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_pixels: Option<u32>,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub max_new_tokens: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: MAX_NEW_TOKENS,
        }
    }
}

/// A single-turn video question, built fresh for every upload.
///
/// Fields are private so a prompt cannot be edited after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoPrompt {
    messages: Vec<ChatMessage>,
    generation: GenerationParams,
}

impl VideoPrompt {
    /// One user turn: the video reference followed by the caller's text.
    pub fn for_video(video_uri: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::User,
                content: vec![
                    ContentBlock::Video {
                        video: video_uri.into(),
                        fps: Some(VIDEO_FPS),
                        min_pixels: None,
                        max_pixels: Some(VIDEO_MAX_PIXELS),
                    },
                    ContentBlock::Text {
                        text: prompt.into(),
                    },
                ],
            }],
            generation: GenerationParams::default(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn generation(&self) -> GenerationParams {
        self.generation
    }
}

/// Video input extracted from the messages, ready for the generation worker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoInput {
    pub path: PathBuf,
    pub fps: f32,
    pub min_pixels: u32,
    pub max_pixels: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInput {
    pub path: PathBuf,
    pub min_pixels: u32,
    pub max_pixels: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisionInputs {
    pub images: Vec<ImageInput>,
    pub videos: Vec<VideoInput>,
}

/// Engine-native inputs: one prompt token sequence per rendered text
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInputs {
    pub input_ids: Vec<Vec<u32>>,
    pub vision: VisionInputs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_prompt_layout() {
        let prompt = VideoPrompt::for_video("file:///tmp/clip.mp4", "Describe this video.");
        let messages = prompt.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(matches!(
            &messages[0].content[0],
            ContentBlock::Video { video, fps: Some(fps), max_pixels: Some(151_200), .. }
                if video == "file:///tmp/clip.mp4" && *fps == 1.0
        ));
        assert_eq!(
            messages[0].content[1],
            ContentBlock::Text {
                text: "Describe this video.".to_string()
            }
        );
        assert_eq!(prompt.generation().max_new_tokens, 128);
    }

    #[test]
    fn test_content_block_wire_shape() {
        let block = ContentBlock::Video {
            video: "file:///tmp/a.mp4".to_string(),
            fps: Some(1.0),
            min_pixels: None,
            max_pixels: Some(VIDEO_MAX_PIXELS),
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "video");
        assert_eq!(value["max_pixels"], 151_200);
        assert!(value.get("min_pixels").is_none());
    }
}
