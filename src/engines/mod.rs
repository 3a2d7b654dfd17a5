//! Inference engines

pub mod qwen2_vl;
pub mod vlm;
pub mod worker;

#[cfg(test)]
pub(crate) mod scripted;

pub use vlm::{VideoDescriber, VisionLanguageBackend};
