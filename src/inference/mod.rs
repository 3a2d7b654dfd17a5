//! Dedicated inference thread and the messages it accepts

mod request;
mod thread;

pub use request::{InferenceRequest, ModelStatus};
pub use thread::inference_thread;
