use salvo::http::StatusCode;
use salvo::prelude::*;

use crate::error::render_error;
use crate::inference::InferenceRequest;
use crate::types::{UploadResponse, VideoPrompt};

use super::helpers::{get_state, send_and_wait};

/// Declared name used when the client omits one
const FALLBACK_FILENAME: &str = "upload.bin";

/// Room for boundaries, part headers and the prompt field
const FORM_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Largest request body accepted on the upload route.
///
/// Bodies without a declared length are refused outright, so nothing past
/// this bound is ever written to disk.
pub fn body_limit(max_upload_bytes: u64) -> u64 {
    max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES)
}

/// POST /upload/ - Ask the VLM about an uploaded video
///
/// Multipart fields: `video` (file, non-empty) and `text` (prompt, may be empty).
#[handler]
pub async fn upload_video(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), StatusError> {
    let state = get_state(depot)?;

    let form = req.form_data().await.map_err(|e| {
        tracing::error!("Failed to parse multipart upload: {}", e);
        StatusError::bad_request()
    })?;

    let Some(video) = form.files.get("video") else {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            "multipart field 'video' is required",
            "invalid_request_error",
            Some("video"),
        );
        return Ok(());
    };
    let Some(text) = form.fields.get("text").cloned() else {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            "multipart field 'text' is required",
            "invalid_request_error",
            Some("text"),
        );
        return Ok(());
    };

    if video.size() == 0 {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            "uploaded video is empty",
            "invalid_request_error",
            Some("video"),
        );
        return Ok(());
    }
    if video.size() > state.max_upload_bytes {
        render_error(
            res,
            StatusCode::PAYLOAD_TOO_LARGE,
            &format!("uploaded video exceeds {} bytes", state.max_upload_bytes),
            "invalid_request_error",
            Some("video"),
        );
        return Ok(());
    }

    let declared_name = video.name().unwrap_or(FALLBACK_FILENAME).to_string();
    let upload = state
        .uploads
        .persist(video.path(), &declared_name)
        .await
        .map_err(|e| {
            tracing::error!("Failed to store upload {}: {:#}", declared_name, e);
            StatusError::internal_server_error()
        })?;

    tracing::info!(
        "Received file: {}, size: {} bytes",
        upload.declared_name(),
        upload.size()
    );

    let video_uri = match &state.video_path_override {
        Some(fixed) => fixed.clone(),
        None => upload.file_uri(),
    };
    let prompt = VideoPrompt::for_video(video_uri, text);

    let text = send_and_wait(
        &state.inference_tx,
        |tx| InferenceRequest::DescribeVideo {
            prompt,
            upload,
            response_tx: tx,
        },
        state.inference_timeout,
    )
    .await?;

    res.render(Json(UploadResponse { text }));
    Ok(())
}
