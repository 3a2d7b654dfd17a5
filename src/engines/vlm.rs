//! VLM (Vision-Language Model) inference pipeline
//!
//! The heavy lifting (templating, vision preprocessing, generation,
//! detokenization) belongs to a [`VisionLanguageBackend`]. [`VideoDescriber`]
//! drives a backend through one request and owns the parts that do not
//! depend on the engine: trimming the prompt off each output sequence and
//! picking the first decoded string.

use eyre::Result;

use crate::types::{ChatMessage, PreparedInputs, VideoPrompt, VisionInputs};

/// Contract of the external inference engine.
///
/// Implementations are constructed once at startup (model + processor
/// load) and then only driven through these calls.
pub trait VisionLanguageBackend {
    /// Model identifier the backend was loaded from
    fn model_id(&self) -> &str;

    /// Flatten structured turns into the model's prompt text
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String>;

    /// Collect image and video inputs referenced by the messages, in order
    fn process_vision_info(&self, messages: &[ChatMessage]) -> Result<VisionInputs>;

    /// Turn rendered prompts plus vision inputs into engine inputs
    fn prepare_inputs(&self, texts: &[String], vision: VisionInputs) -> Result<PreparedInputs>;

    /// Run generation. Each returned sequence starts with its prompt tokens.
    fn generate(&mut self, inputs: &PreparedInputs, max_new_tokens: usize) -> Result<Vec<Vec<u32>>>;

    fn batch_decode(&self, sequences: &[Vec<u32>], skip_special_tokens: bool) -> Result<Vec<String>>;
}

/// Runs video prompts through a backend
pub struct VideoDescriber<B> {
    backend: B,
}

impl<B: VisionLanguageBackend> VideoDescriber<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    /// Generate the answer to a video prompt, returning the first decoded output.
    pub fn describe(&mut self, prompt: &VideoPrompt) -> Result<String> {
        let text = self.backend.apply_chat_template(prompt.messages(), true)?;
        let vision = self.backend.process_vision_info(prompt.messages())?;
        let inputs = self.backend.prepare_inputs(&[text], vision)?;

        let generated = self
            .backend
            .generate(&inputs, prompt.generation().max_new_tokens)?;
        let trimmed = trim_prompt_prefix(&inputs.input_ids, generated);
        tracing::debug!(
            "Generated {} new tokens",
            trimmed.first().map(Vec::len).unwrap_or(0)
        );

        let decoded = self.backend.batch_decode(&trimmed, true)?;
        decoded
            .into_iter()
            .next()
            .ok_or_else(|| eyre::eyre!("Engine returned no output sequences"))
    }
}

/// Drop the prompt tokens from every generated sequence.
///
/// Pairs inputs and outputs positionally; unmatched outputs are discarded
/// and an output shorter than its prompt yields an empty sequence.
pub(crate) fn trim_prompt_prefix(inputs: &[Vec<u32>], outputs: Vec<Vec<u32>>) -> Vec<Vec<u32>> {
    inputs
        .iter()
        .zip(outputs)
        .map(|(prompt, mut output)| output.split_off(prompt.len().min(output.len())))
        .collect()
}
