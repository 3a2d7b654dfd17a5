//! Request/response and message types

mod error;
mod upload;
mod vlm;

pub use error::*;
pub use upload::*;
pub use vlm::*;
