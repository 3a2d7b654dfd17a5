use serde::Serialize;

/// Body of a successful `POST /upload/`
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub text: String,
}
